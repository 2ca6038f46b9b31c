//! End-to-end reconstruction scenarios against a live Postgres.
//!
//! These walk the full snapshot → upserter → repository path and are
//! ignored by default; point `DATABASE_URL` at a scratch database and run
//!
//! ```text
//! DATABASE_URL=postgres://localhost/railsink_test cargo test -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Duration;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use railsink::db::time::EasternTime;
use railsink::db::upsert::Upserter;
use railsink::db::{PgRepository, Repository};
use railsink::marta::Snapshot;

async fn connect() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("failed to connect to test database")
}

async fn scrub(pool: &PgPool) {
    for table in ["estimates", "arrivals", "runs"] {
        sqlx::query(&format!("DELETE FROM {}", table))
            .execute(pool)
            .await
            .unwrap();
    }
}

fn snapshot(event_time: &str, station: &str, next_arrival: &str, waiting: &str) -> Snapshot {
    Snapshot {
        destination: "Doraville".into(),
        direction: "N".into(),
        event_time: event_time.into(),
        line: "GOLD".into(),
        next_arrival: next_arrival.into(),
        station: station.into(),
        train_id: "193230".into(),
        waiting_seconds: "120".into(),
        waiting_time: if waiting.is_empty() { "2 min" } else { waiting }.into(),
    }
}

async fn run_moments(pool: &PgPool) -> Vec<(String, String, String)> {
    sqlx::query_as(
        "SELECT identifier, run_first_event_moment, most_recent_event_moment
         FROM runs ORDER BY run_first_event_moment",
    )
    .fetch_all(pool)
    .await
    .unwrap()
}

async fn arrivals_of(pool: &PgPool, run_identifier: &str) -> Vec<(String, Option<String>)> {
    sqlx::query_as(
        "SELECT station, arrival_time FROM arrivals WHERE run_identifier = $1 ORDER BY station",
    )
    .bind(run_identifier)
    .fetch_all(pool)
    .await
    .unwrap()
}

async fn estimates_of(pool: &PgPool, run_identifier: &str) -> Vec<(String, String)> {
    sqlx::query_as(
        "SELECT event_moment, estimated_arrival_moment FROM estimates
         WHERE run_identifier = $1 ORDER BY event_moment",
    )
    .bind(run_identifier)
    .fetch_all(pool)
    .await
    .unwrap()
}

#[tokio::test]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn test_reconstruction_lifecycle() {
    let pool = connect().await;
    let repo = PgRepository::new(pool.clone());
    repo.ensure_tables(false).await.unwrap();
    scrub(&pool).await;

    let repo = Arc::new(PgRepository::new(pool.clone()));
    let upserter = Upserter::new(repo.clone(), Duration::hours(1));

    let first_run = "N_GOLD_193230_2019-08-05T18:15:16-04:00";

    // Scenario 1: a fresh snapshot creates run, arrival and estimate.
    let rec = snapshot("8/5/2019 6:15:16 PM", "FIVE POINTS", "6:20:16 PM", "");
    upserter
        .add_record(&rec, "GOLD", "N", None, None, None)
        .await
        .unwrap();

    assert_eq!(
        run_moments(&pool).await,
        vec![(
            first_run.to_string(),
            "2019-08-05T18:15:16-04:00".to_string(),
            "2019-08-05T18:15:16-04:00".to_string(),
        )]
    );
    assert_eq!(
        arrivals_of(&pool, first_run).await,
        vec![("FIVE POINTS".to_string(), None)]
    );
    assert_eq!(
        estimates_of(&pool, first_run).await,
        vec![(
            "2019-08-05T18:15:16-04:00".to_string(),
            "2019-08-05T18:20:16-04:00".to_string(),
        )]
    );

    // Scenario 2: resubmitting the identical snapshot changes nothing.
    upserter
        .add_record(&rec, "GOLD", "N", None, None, None)
        .await
        .unwrap();
    assert_eq!(estimates_of(&pool, first_run).await.len(), 1);
    assert_eq!(arrivals_of(&pool, first_run).await.len(), 1);

    // Scenario 3: a later snapshot continues the run.
    let rec = snapshot("8/5/2019 6:17:16 PM", "PEACHTREE CENTER", "6:22:16 PM", "");
    upserter
        .add_record(&rec, "GOLD", "N", None, None, None)
        .await
        .unwrap();

    let runs = run_moments(&pool).await;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].2, "2019-08-05T18:17:16-04:00");
    assert_eq!(arrivals_of(&pool, first_run).await.len(), 2);
    assert_eq!(estimates_of(&pool, first_run).await.len(), 2);

    // Scenario 4: an ARRIVED snapshot finalizes the arrival; the first
    // write wins against later ones.
    let rec = snapshot("8/5/2019 6:19:00 PM", "FIVE POINTS", "", "Arrived");
    upserter
        .add_record(&rec, "GOLD", "N", None, None, None)
        .await
        .unwrap();
    assert_eq!(
        arrivals_of(&pool, first_run).await[0],
        (
            "FIVE POINTS".to_string(),
            Some("2019-08-05T18:19:00-04:00".to_string())
        )
    );
    assert_eq!(run_moments(&pool).await[0].2, "2019-08-05T18:19:00-04:00");

    let rec = snapshot("8/5/2019 6:19:30 PM", "FIVE POINTS", "", "Arrived");
    upserter
        .add_record(&rec, "GOLD", "N", None, None, None)
        .await
        .unwrap();
    assert_eq!(
        arrivals_of(&pool, first_run).await[0].1,
        Some("2019-08-05T18:19:00-04:00".to_string()),
        "arrival time is first-write-wins"
    );
    assert_eq!(run_moments(&pool).await[0].2, "2019-08-05T18:19:30-04:00");

    // Scenario 5: a snapshot after more than an hour of silence starts a
    // second run and leaves the first untouched.
    let rec = snapshot("8/5/2019 8:30:00 PM", "LINDBERGH", "8:35:00 PM", "");
    upserter
        .add_record(&rec, "GOLD", "N", None, None, None)
        .await
        .unwrap();

    let runs = run_moments(&pool).await;
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].2, "2019-08-05T18:19:30-04:00");
    assert_eq!(runs[1].1, "2019-08-05T20:30:00-04:00");
    assert_eq!(runs[1].2, "2019-08-05T20:30:00-04:00");

    // Scenario 6: reaping below a threshold removes the first run and its
    // children, cascade-style, and reports what it dropped.
    let threshold = EasternTime::parse_rfc3339("2019-08-05T20:00:00-04:00").unwrap();
    let counts = repo.delete_stale_runs(threshold).await.unwrap();
    assert_eq!((counts.estimates, counts.arrivals, counts.runs), (2, 2, 1));

    let runs = run_moments(&pool).await;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].1, "2019-08-05T20:30:00-04:00");
    assert!(estimates_of(&pool, first_run).await.is_empty());
    assert!(arrivals_of(&pool, first_run).await.is_empty());
}

#[tokio::test]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn test_active_runs_nested_assembly() {
    let pool = connect().await;
    let repo = PgRepository::new(pool.clone());
    repo.ensure_tables(false).await.unwrap();
    scrub(&pool).await;

    let repo = Arc::new(PgRepository::new(pool.clone()));
    let upserter = Upserter::new(repo.clone(), Duration::hours(1));

    for (event, station, next) in [
        ("8/5/2019 6:15:16 PM", "FIVE POINTS", "6:20:16 PM"),
        ("8/5/2019 6:16:16 PM", "FIVE POINTS", "6:21:16 PM"),
        ("8/5/2019 6:17:16 PM", "PEACHTREE CENTER", "6:22:16 PM"),
    ] {
        let rec = snapshot(event, station, next, "");
        upserter
            .add_record(&rec, "GOLD", "N", None, None, None)
            .await
            .unwrap();
    }

    let threshold = EasternTime::parse_rfc3339("2019-08-05T18:00:00-04:00").unwrap();
    let active = repo.recently_active_runs(threshold).await.unwrap();
    assert_eq!(active.len(), 1);

    let run = &active[0];
    assert_eq!(run.run_group_identifier, "N_GOLD_193230");
    assert_eq!(run.arrivals.len(), 2);
    assert_eq!(run.arrivals["FIVE POINTS"].estimates.len(), 2);
    assert_eq!(run.arrivals["PEACHTREE CENTER"].estimates.len(), 1);
    assert!(run.arrivals["FIVE POINTS"].arrival_time.is_none());
    assert!(!run.finished());

    // Nothing qualifies above the most recent activity.
    let later = EasternTime::parse_rfc3339("2019-08-05T19:00:00-04:00").unwrap();
    assert!(repo.recently_active_runs(later).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn test_latest_estimates_window_ranking() {
    let pool = connect().await;
    let repo = PgRepository::new(pool.clone());
    repo.ensure_tables(false).await.unwrap();
    scrub(&pool).await;

    let repo = Arc::new(PgRepository::new(pool.clone()));
    let upserter = Upserter::new(repo.clone(), Duration::hours(1));

    // Two successive estimates for the same unresolved arrival, written
    // with a station ID as a third-rail deployment would.
    for (event, next) in [
        ("8/5/2019 6:15:16 PM", "6:20:16 PM"),
        ("8/5/2019 6:16:16 PM", "6:21:16 PM"),
    ] {
        let rec = snapshot(event, "FIVE POINTS", next, "");
        upserter
            .add_record(&rec, "GOLD", "N", None, None, Some(5))
            .await
            .unwrap();
    }

    let latest = repo.latest_estimates(5).await.unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].event_moment, "2019-08-05T18:16:16-04:00");
    assert_eq!(
        latest[0].estimated_arrival_moment,
        "2019-08-05T18:21:16-04:00"
    );

    // Once the arrival resolves it drops out of the estimate feed.
    let rec = snapshot("8/5/2019 6:21:00 PM", "FIVE POINTS", "", "Arrived");
    upserter
        .add_record(&rec, "GOLD", "N", None, None, Some(5))
        .await
        .unwrap();
    assert!(repo.latest_estimates(5).await.unwrap().is_empty());
}
