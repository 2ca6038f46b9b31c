//! SQL implementation of the [`Repository`] trait.
//!
//! All timestamp columns are RFC3339 text in a fixed zone, so string
//! comparison in SQL is chronological comparison and the data reads the
//! same from any client session. Identifier columns join the three layers
//! without surrogate keys.

use async_trait::async_trait;
use sqlx::postgres::PgQueryResult;
use sqlx::{Postgres, Transaction};

use crate::db::models::{ActiveArrival, ActiveRun, DeleteCounts, LatestEstimate, RunKey};
use crate::db::time::EasternTime;
use crate::db::{PgRepository, Repository};
use crate::errors::AppError;

/// Flat row of the active-runs join. All arrival and estimate columns are
/// `Option` because of the LEFT JOINs; nesting happens in Rust.
#[derive(Debug, sqlx::FromRow)]
struct ActiveRunJoinRow {
    run_identifier: String,
    run_group_identifier: String,
    direction: String,
    line: String,
    train_id: String,
    run_first_event_moment: String,
    most_recent_event_moment: String,
    corrected_line: Option<String>,
    corrected_direction: Option<String>,

    arrival_identifier: Option<String>,
    station: Option<String>,
    arrival_time: Option<String>,

    event_moment: Option<String>,
    estimated_arrival_moment: Option<String>,
}

/// Unique-violation SQLSTATE, used to recognize run identifier collisions.
const UNIQUE_VIOLATION: &str = "23505";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

/// Update the run's most-recent event moment inside an open transaction.
/// Exactly one row must change — zero means the run was reaped or never
/// created, more than one means the identifier scheme is broken.
async fn touch_run_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    run_identifier: &str,
    event_time: EasternTime,
) -> Result<(), AppError> {
    let result: PgQueryResult =
        sqlx::query("UPDATE runs SET most_recent_event_moment = $1 WHERE identifier = $2")
            .bind(event_time.to_string())
            .bind(run_identifier)
            .execute(&mut **tx)
            .await?;
    expect_one_row(result, run_identifier)
}

fn expect_one_row(result: PgQueryResult, run_identifier: &str) -> Result<(), AppError> {
    match result.rows_affected() {
        1 => Ok(()),
        n => Err(AppError::DbInvariant(format!(
            "touching run `{}` affected {} rows",
            run_identifier, n
        ))),
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn ensure_tables(&self, third_rail: bool) -> Result<(), AppError> {
        // The catalog ID columns are always present so that data collected
        // without a catalog survives a later third-rail migration; only
        // the constraints are conditional.
        let line_fk = if third_rail { " REFERENCES lines(id)" } else { "" };
        let direction_fk = if third_rail {
            " REFERENCES directions(id)"
        } else {
            ""
        };
        let station_fk = if third_rail { " REFERENCES stations(id)" } else { "" };

        let runs_ddl = format!(
            "CREATE TABLE IF NOT EXISTS runs (
                 identifier text PRIMARY KEY,
                 run_group_identifier text NOT NULL,
                 direction text NOT NULL,
                 line text NOT NULL,
                 train_id text NOT NULL,
                 run_first_event_moment text NOT NULL,
                 most_recent_event_moment text NOT NULL,
                 corrected_line text,
                 corrected_direction text,
                 line_id integer{line_fk},
                 direction_id integer{direction_fk}
             )"
        );
        let arrivals_ddl = format!(
            "CREATE TABLE IF NOT EXISTS arrivals (
                 identifier text PRIMARY KEY,
                 run_identifier text NOT NULL REFERENCES runs(identifier),
                 station text NOT NULL,
                 station_id integer{station_fk},
                 arrival_time text
             )"
        );
        let statements = [
            runs_ddl.as_str(),
            arrivals_ddl.as_str(),
            "CREATE TABLE IF NOT EXISTS estimates (
                 arrival_identifier text NOT NULL REFERENCES arrivals(identifier),
                 run_identifier text NOT NULL,
                 event_moment text NOT NULL,
                 estimated_arrival_moment text NOT NULL,
                 PRIMARY KEY (arrival_identifier, event_moment)
             )",
            "CREATE INDEX IF NOT EXISTS runs_group_idx ON runs (run_group_identifier)",
            "CREATE INDEX IF NOT EXISTS runs_group_latest_idx ON runs \
                 (run_group_identifier, run_first_event_moment DESC, most_recent_event_moment DESC)",
            "CREATE INDEX IF NOT EXISTS arrivals_run_idx ON arrivals (run_identifier)",
            "CREATE INDEX IF NOT EXISTS estimates_arrival_idx ON estimates (arrival_identifier)",
            "CREATE INDEX IF NOT EXISTS estimates_run_idx ON estimates (run_identifier)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(self.pool()).await?;
        }
        Ok(())
    }

    async fn latest_run_moments(
        &self,
        direction: &str,
        line: &str,
        train_id: &str,
        as_of: EasternTime,
    ) -> Result<Option<(EasternTime, EasternTime)>, AppError> {
        let group = crate::db::models::run_group_identifier(direction, line, train_id);
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT run_first_event_moment, most_recent_event_moment
             FROM runs
             WHERE run_group_identifier = $1
               AND most_recent_event_moment <= $2
             ORDER BY run_first_event_moment DESC, most_recent_event_moment DESC
             LIMIT 1",
        )
        .bind(&group)
        .bind(as_of.to_string())
        .fetch_optional(self.pool())
        .await?;

        row.map(|(first, most_recent)| {
            Ok((
                EasternTime::parse_rfc3339(&first)?,
                EasternTime::parse_rfc3339(&most_recent)?,
            ))
        })
        .transpose()
    }

    async fn create_run_record(
        &self,
        key: RunKey<'_>,
        corrected_line: &str,
        corrected_direction: &str,
        line_id: Option<i32>,
        direction_id: Option<i32>,
    ) -> Result<(), AppError> {
        let identifier = key.identifier();
        let result = sqlx::query(
            "INSERT INTO runs (
                 identifier, run_group_identifier, direction, line, train_id,
                 run_first_event_moment, most_recent_event_moment,
                 corrected_line, corrected_direction, line_id, direction_id
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&identifier)
        .bind(key.group_identifier())
        .bind(key.direction)
        .bind(key.line)
        .bind(key.train_id)
        .bind(key.run_first_event_moment.to_string())
        .bind(key.run_first_event_moment.to_string())
        .bind(corrected_line)
        .bind(corrected_direction)
        .bind(line_id)
        .bind(direction_id)
        .execute(self.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::RunCollision(identifier.clone())
            } else {
                AppError::Database(e)
            }
        })?;

        match result.rows_affected() {
            1 => Ok(()),
            n => Err(AppError::DbInvariant(format!(
                "creating run `{}` affected {} rows",
                identifier, n
            ))),
        }
    }

    async fn ensure_arrival_record(
        &self,
        key: RunKey<'_>,
        station: &str,
        station_id: Option<i32>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO arrivals (identifier, run_identifier, station, station_id, arrival_time)
             VALUES ($1, $2, $3, $4, NULL)
             ON CONFLICT DO NOTHING",
        )
        .bind(key.arrival_identifier(station))
        .bind(key.identifier())
        .bind(station)
        .bind(station_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn add_arrival_estimate(
        &self,
        key: RunKey<'_>,
        station: &str,
        event_time: EasternTime,
        estimate: EasternTime,
    ) -> Result<(), AppError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "INSERT INTO estimates (arrival_identifier, run_identifier, event_moment, estimated_arrival_moment)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT DO NOTHING",
        )
        .bind(key.arrival_identifier(station))
        .bind(key.identifier())
        .bind(event_time.to_string())
        .bind(estimate.to_string())
        .execute(&mut *tx)
        .await?;

        touch_run_in_tx(&mut tx, &key.identifier(), event_time).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn set_arrival_time(
        &self,
        key: RunKey<'_>,
        station: &str,
        event_time: EasternTime,
        arrival_time: EasternTime,
    ) -> Result<(), AppError> {
        let mut tx = self.pool().begin().await?;

        // First write wins: an arrival time, once set, is never revised by
        // later snapshots of the train sitting in the station.
        sqlx::query(
            "UPDATE arrivals SET arrival_time = $1
             WHERE identifier = $2 AND arrival_time IS NULL",
        )
        .bind(arrival_time.to_string())
        .bind(key.arrival_identifier(station))
        .execute(&mut *tx)
        .await?;

        touch_run_in_tx(&mut tx, &key.identifier(), event_time).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn touch_run(&self, key: RunKey<'_>, event_time: EasternTime) -> Result<(), AppError> {
        let result =
            sqlx::query("UPDATE runs SET most_recent_event_moment = $1 WHERE identifier = $2")
                .bind(event_time.to_string())
                .bind(key.identifier())
                .execute(self.pool())
                .await?;
        expect_one_row(result, &key.identifier())
    }

    async fn delete_stale_runs(&self, threshold: EasternTime) -> Result<DeleteCounts, AppError> {
        let threshold = threshold.to_string();
        let mut tx = self.pool().begin().await?;

        let estimates = sqlx::query(
            "DELETE FROM estimates WHERE run_identifier IN
                 (SELECT identifier FROM runs WHERE most_recent_event_moment < $1)",
        )
        .bind(&threshold)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let arrivals = sqlx::query(
            "DELETE FROM arrivals WHERE run_identifier IN
                 (SELECT identifier FROM runs WHERE most_recent_event_moment < $1)",
        )
        .bind(&threshold)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let runs = sqlx::query("DELETE FROM runs WHERE most_recent_event_moment < $1")
            .bind(&threshold)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(DeleteCounts {
            estimates,
            arrivals,
            runs,
        })
    }

    async fn recently_active_runs(
        &self,
        threshold: EasternTime,
    ) -> Result<Vec<ActiveRun>, AppError> {
        let rows: Vec<ActiveRunJoinRow> = sqlx::query_as(
            "SELECT r.identifier AS run_identifier, r.run_group_identifier,
                    r.direction, r.line, r.train_id,
                    r.run_first_event_moment, r.most_recent_event_moment,
                    r.corrected_line, r.corrected_direction,
                    a.identifier AS arrival_identifier, a.station, a.arrival_time,
                    e.event_moment, e.estimated_arrival_moment
             FROM runs r
             LEFT JOIN arrivals a ON a.run_identifier = r.identifier
             LEFT JOIN estimates e ON e.arrival_identifier = a.identifier
             WHERE r.most_recent_event_moment >= $1
             ORDER BY r.identifier, a.identifier, e.event_moment",
        )
        .bind(threshold.to_string())
        .fetch_all(self.pool())
        .await?;

        // Nested assembly: rows arrive grouped by run then arrival, so one
        // pass suffices.
        let mut runs: Vec<ActiveRun> = Vec::new();
        for row in rows {
            if runs.last().map(|r| r.identifier.as_str()) != Some(row.run_identifier.as_str()) {
                runs.push(ActiveRun {
                    identifier: row.run_identifier.clone(),
                    run_group_identifier: row.run_group_identifier,
                    direction: row.direction,
                    line: row.line,
                    train_id: row.train_id,
                    run_first_event_moment: row.run_first_event_moment,
                    most_recent_event_moment: row.most_recent_event_moment,
                    corrected_line: row.corrected_line,
                    corrected_direction: row.corrected_direction,
                    arrivals: Default::default(),
                });
            }
            let run = runs.last_mut().expect("just pushed");

            let (Some(arrival_identifier), Some(station)) = (row.arrival_identifier, row.station)
            else {
                continue; // run with no arrivals yet
            };
            let arrival = run
                .arrivals
                .entry(station.clone())
                .or_insert_with(|| ActiveArrival {
                    identifier: arrival_identifier,
                    station,
                    arrival_time: row.arrival_time,
                    estimates: Default::default(),
                });
            if let (Some(event), Some(estimated)) = (row.event_moment, row.estimated_arrival_moment)
            {
                arrival.estimates.insert(event, estimated);
            }
        }
        Ok(runs)
    }

    async fn latest_estimates(&self, station_id: i32) -> Result<Vec<LatestEstimate>, AppError> {
        let estimates: Vec<LatestEstimate> = sqlx::query_as(
            "SELECT run_identifier, arrival_identifier, station,
                    corrected_line, corrected_direction,
                    event_moment, estimated_arrival_moment
             FROM (
                 SELECT e.run_identifier, e.arrival_identifier, a.station,
                        r.corrected_line, r.corrected_direction,
                        e.event_moment, e.estimated_arrival_moment,
                        ROW_NUMBER() OVER (
                            PARTITION BY e.run_identifier
                            ORDER BY e.event_moment DESC
                        ) AS recency_rank
                 FROM arrivals a
                 JOIN estimates e ON e.arrival_identifier = a.identifier
                 JOIN runs r ON r.identifier = a.run_identifier
                 WHERE a.station_id = $1
                   AND a.arrival_time IS NULL
             ) ranked
             WHERE recency_rank = 1
             ORDER BY estimated_arrival_moment",
        )
        .bind(station_id)
        .fetch_all(self.pool())
        .await?;
        Ok(estimates)
    }
}
