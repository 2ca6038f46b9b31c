//! Reconstruction of train runs from individual snapshot records.
//!
//! Each accepted record performs at most one of {create estimate, set
//! arrival time} plus a guaranteed touch of the owning run's
//! `most_recent_event_moment`, all atomically at the repository layer. A
//! record that fails to parse writes nothing.

use std::sync::Arc;

use chrono::Duration;

use crate::db::models::RunKey;
use crate::db::time::EasternTime;
use crate::db::Repository;
use crate::errors::AppError;
use crate::marta::Snapshot;

/// Decides new-run vs. continuation for each snapshot and writes through
/// the repository.
pub struct Upserter {
    repo: Arc<dyn Repository>,
    run_lifetime: Duration,
}

impl Upserter {
    /// `run_lifetime` is the idle-timeout: a train ID silent for longer
    /// than this starts a fresh run on its next observation.
    pub fn new(repo: Arc<dyn Repository>, run_lifetime: Duration) -> Self {
        Upserter { repo, run_lifetime }
    }

    /// Attribute one snapshot to a run (creating the run if needed) and
    /// record its estimate or arrival moment.
    pub async fn add_record(
        &self,
        rec: &Snapshot,
        corrected_line: &str,
        corrected_direction: &str,
        line_id: Option<i32>,
        direction_id: Option<i32>,
        station_id: Option<i32>,
    ) -> Result<(), AppError> {
        let event_time = EasternTime::parse_feed_datetime(&rec.event_time)?;

        let latest = self
            .repo
            .latest_run_moments(&rec.direction, &rec.line, &rec.train_id, event_time)
            .await?;

        // The run continues only if its latest activity is within the
        // idle-timeout looking back from this event; otherwise this
        // snapshot starts a new run whose first moment is the event time.
        let run_first_event_moment = match latest {
            Some((first, most_recent)) if most_recent >= event_time - self.run_lifetime => first,
            _ => {
                let key = RunKey {
                    direction: &rec.direction,
                    line: &rec.line,
                    train_id: &rec.train_id,
                    run_first_event_moment: event_time,
                };
                self.repo
                    .create_run_record(key, corrected_line, corrected_direction, line_id, direction_id)
                    .await?;
                event_time
            }
        };

        let key = RunKey {
            direction: &rec.direction,
            line: &rec.line,
            train_id: &rec.train_id,
            run_first_event_moment,
        };

        self.repo
            .ensure_arrival_record(key, &rec.station, station_id)
            .await?;

        if rec.has_arrived() {
            // The first event time at which the train reports as arrived
            // is taken as the arrival moment; later ARRIVED/BOARDING
            // snapshots cannot revise it.
            self.repo
                .set_arrival_time(key, &rec.station, event_time, event_time)
                .await?;
        } else if rec.is_arriving() {
            // No estimate and no arrival moment; the arrival itself is
            // recorded by the next ARRIVED snapshot. The run still
            // registers the activity.
            self.repo.touch_run(key, event_time).await?;
        } else {
            let time_of_day = EasternTime::parse_feed_time_of_day(&rec.next_arrival)?;
            let estimate = run_first_event_moment.with_time_of_day(time_of_day)?;
            self.repo
                .add_arrival_estimate(key, &rec.station, event_time, estimate)
                .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testutil::FakeRepository;

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

    fn upserter(repo: Arc<FakeRepository>) -> Upserter {
        Upserter::new(repo, Duration::hours(1))
    }

    #[tokio::test]
    async fn test_fresh_run_creates_run_arrival_and_estimate() {
        let repo = Arc::new(FakeRepository::default());
        let up = upserter(repo.clone());

        let rec = snapshot("8/5/2019 6:15:16 PM", "FIVE POINTS", "6:20:16 PM", "");
        up.add_record(&rec, "GOLD", "N", None, None, None)
            .await
            .unwrap();

        let run_id = "N_GOLD_193230_2019-08-05T18:15:16-04:00";
        assert_eq!(
            *repo.created_runs.lock().unwrap(),
            vec![(run_id.to_string(), "GOLD".to_string(), "N".to_string(), None, None)]
        );
        assert_eq!(
            *repo.ensured_arrivals.lock().unwrap(),
            vec![(format!("{}_FIVE POINTS", run_id), None)]
        );
        assert_eq!(
            *repo.estimates.lock().unwrap(),
            vec![(
                format!("{}_FIVE POINTS", run_id),
                "2019-08-05T18:15:16-04:00".to_string(),
                "2019-08-05T18:20:16-04:00".to_string(),
            )]
        );
        assert!(repo.arrival_times.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_continuation_keeps_run_start() {
        let repo = Arc::new(FakeRepository::with_latest(
            "2019-08-05T18:15:16-04:00",
            "2019-08-05T18:17:16-04:00",
        ));
        let up = upserter(repo.clone());

        let rec = snapshot("8/5/2019 6:19:16 PM", "PEACHTREE CENTER", "6:22:16 PM", "");
        up.add_record(&rec, "GOLD", "N", None, None, None)
            .await
            .unwrap();

        assert!(repo.created_runs.lock().unwrap().is_empty());
        assert_eq!(
            *repo.ensured_arrivals.lock().unwrap(),
            vec![(
                "N_GOLD_193230_2019-08-05T18:15:16-04:00_PEACHTREE CENTER".to_string(),
                None
            )]
        );
    }

    #[tokio::test]
    async fn test_idle_gap_exactly_at_lifetime_continues() {
        let repo = Arc::new(FakeRepository::with_latest(
            "2019-08-05T18:15:16-04:00",
            "2019-08-05T18:30:00-04:00",
        ));
        let up = upserter(repo.clone());

        // Exactly one hour after the most recent event: still the same run.
        let rec = snapshot("8/5/2019 7:30:00 PM", "LINDBERGH", "7:35:00 PM", "");
        up.add_record(&rec, "GOLD", "N", None, None, None)
            .await
            .unwrap();
        assert!(repo.created_runs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_idle_gap_beyond_lifetime_starts_new_run() {
        let repo = Arc::new(FakeRepository::with_latest(
            "2019-08-05T18:15:16-04:00",
            "2019-08-05T18:30:00-04:00",
        ));
        let up = upserter(repo.clone());

        let rec = snapshot("8/5/2019 8:30:00 PM", "LINDBERGH", "8:35:00 PM", "");
        up.add_record(&rec, "GOLD", "N", None, None, None)
            .await
            .unwrap();

        let created = repo.created_runs.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].0, "N_GOLD_193230_2019-08-05T20:30:00-04:00");
    }

    #[tokio::test]
    async fn test_arrived_sets_arrival_time_to_event_time() {
        let repo = Arc::new(FakeRepository::with_latest(
            "2019-08-05T18:15:16-04:00",
            "2019-08-05T18:17:16-04:00",
        ));
        let up = upserter(repo.clone());

        let rec = snapshot("8/5/2019 6:19:00 PM", "FIVE POINTS", "", "Arrived");
        up.add_record(&rec, "GOLD", "N", None, None, None)
            .await
            .unwrap();

        assert_eq!(
            *repo.arrival_times.lock().unwrap(),
            vec![(
                "N_GOLD_193230_2019-08-05T18:15:16-04:00_FIVE POINTS".to_string(),
                "2019-08-05T18:19:00-04:00".to_string(),
                "2019-08-05T18:19:00-04:00".to_string(),
            )]
        );
        assert!(repo.estimates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_arriving_only_touches_run() {
        let repo = Arc::new(FakeRepository::with_latest(
            "2019-08-05T18:15:16-04:00",
            "2019-08-05T18:17:16-04:00",
        ));
        let up = upserter(repo.clone());

        let rec = snapshot("8/5/2019 6:18:30 PM", "FIVE POINTS", "", "Arriving");
        up.add_record(&rec, "GOLD", "N", None, None, None)
            .await
            .unwrap();

        assert!(repo.estimates.lock().unwrap().is_empty());
        assert!(repo.arrival_times.lock().unwrap().is_empty());
        assert_eq!(
            *repo.touches.lock().unwrap(),
            vec![(
                "N_GOLD_193230_2019-08-05T18:15:16-04:00".to_string(),
                "2019-08-05T18:18:30-04:00".to_string(),
            )]
        );
    }

    #[tokio::test]
    async fn test_bad_event_time_writes_nothing() {
        let repo = Arc::new(FakeRepository::default());
        let up = upserter(repo.clone());

        let rec = snapshot("yesterday-ish", "FIVE POINTS", "6:20:16 PM", "");
        let err = up
            .add_record(&rec, "GOLD", "N", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InputParse(_)));
        assert!(repo.created_runs.lock().unwrap().is_empty());
        assert!(repo.ensured_arrivals.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_estimate_time_is_input_parse() {
        let repo = Arc::new(FakeRepository::default());
        let up = upserter(repo.clone());

        let rec = snapshot("8/5/2019 6:15:16 PM", "FIVE POINTS", "whenever", "");
        let err = up
            .add_record(&rec, "GOLD", "N", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InputParse(_)));
        assert!(repo.estimates.lock().unwrap().is_empty());
    }
}
