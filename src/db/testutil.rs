//! In-memory [`Repository`] fake shared by the upserter and Postgres-sink
//! tests. Records every call; `latest` seeds the run lookup and
//! `fail_latest_for_train` injects a per-train lookup failure.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::db::models::{ActiveRun, DeleteCounts, LatestEstimate, RunKey};
use crate::db::time::EasternTime;
use crate::db::Repository;
use crate::errors::AppError;

#[derive(Default)]
pub struct FakeRepository {
    pub latest: Mutex<Option<(EasternTime, EasternTime)>>,
    pub fail_latest_for_train: Mutex<Option<String>>,
    /// (identifier, corrected_line, corrected_direction, line_id, direction_id)
    pub created_runs: Mutex<Vec<(String, String, String, Option<i32>, Option<i32>)>>,
    /// (arrival identifier, station_id)
    pub ensured_arrivals: Mutex<Vec<(String, Option<i32>)>>,
    /// (arrival identifier, event moment, estimated arrival moment)
    pub estimates: Mutex<Vec<(String, String, String)>>,
    /// (arrival identifier, event moment, arrival moment)
    pub arrival_times: Mutex<Vec<(String, String, String)>>,
    /// (run identifier, event moment)
    pub touches: Mutex<Vec<(String, String)>>,
}

impl FakeRepository {
    pub fn with_latest(first: &str, most_recent: &str) -> Self {
        let fake = FakeRepository::default();
        *fake.latest.lock().unwrap() = Some((
            EasternTime::parse_rfc3339(first).unwrap(),
            EasternTime::parse_rfc3339(most_recent).unwrap(),
        ));
        fake
    }
}

#[async_trait]
impl Repository for FakeRepository {
    async fn ensure_tables(&self, _third_rail: bool) -> Result<(), AppError> {
        Ok(())
    }

    async fn latest_run_moments(
        &self,
        _direction: &str,
        _line: &str,
        train_id: &str,
        _as_of: EasternTime,
    ) -> Result<Option<(EasternTime, EasternTime)>, AppError> {
        if self.fail_latest_for_train.lock().unwrap().as_deref() == Some(train_id) {
            return Err(AppError::DbInvariant(format!(
                "injected failure for train `{}`",
                train_id
            )));
        }
        Ok(*self.latest.lock().unwrap())
    }

    async fn create_run_record(
        &self,
        key: RunKey<'_>,
        corrected_line: &str,
        corrected_direction: &str,
        line_id: Option<i32>,
        direction_id: Option<i32>,
    ) -> Result<(), AppError> {
        self.created_runs.lock().unwrap().push((
            key.identifier(),
            corrected_line.to_string(),
            corrected_direction.to_string(),
            line_id,
            direction_id,
        ));
        Ok(())
    }

    async fn ensure_arrival_record(
        &self,
        key: RunKey<'_>,
        station: &str,
        station_id: Option<i32>,
    ) -> Result<(), AppError> {
        self.ensured_arrivals
            .lock()
            .unwrap()
            .push((key.arrival_identifier(station), station_id));
        Ok(())
    }

    async fn add_arrival_estimate(
        &self,
        key: RunKey<'_>,
        station: &str,
        event_time: EasternTime,
        estimate: EasternTime,
    ) -> Result<(), AppError> {
        self.estimates.lock().unwrap().push((
            key.arrival_identifier(station),
            event_time.to_string(),
            estimate.to_string(),
        ));
        Ok(())
    }

    async fn set_arrival_time(
        &self,
        key: RunKey<'_>,
        station: &str,
        event_time: EasternTime,
        arrival_time: EasternTime,
    ) -> Result<(), AppError> {
        self.arrival_times.lock().unwrap().push((
            key.arrival_identifier(station),
            event_time.to_string(),
            arrival_time.to_string(),
        ));
        Ok(())
    }

    async fn touch_run(&self, key: RunKey<'_>, event_time: EasternTime) -> Result<(), AppError> {
        self.touches
            .lock()
            .unwrap()
            .push((key.identifier(), event_time.to_string()));
        Ok(())
    }

    async fn delete_stale_runs(&self, _threshold: EasternTime) -> Result<DeleteCounts, AppError> {
        unimplemented!("not exercised through the fake")
    }

    async fn recently_active_runs(
        &self,
        _threshold: EasternTime,
    ) -> Result<Vec<ActiveRun>, AppError> {
        unimplemented!("not exercised through the fake")
    }

    async fn latest_estimates(&self, _station_id: i32) -> Result<Vec<LatestEstimate>, AppError> {
        unimplemented!("not exercised through the fake")
    }
}
