//! The relational core: run/arrival/estimate persistence and the upserter
//! that reconstructs runs from snapshot streams.
//!
//! `Repository` is the seam between reconstruction logic and SQL — the
//! upserter is tested against an in-memory fake, `PgRepository` carries
//! the real queries.

pub mod models;
pub mod queries;
#[cfg(test)]
pub mod testutil;
pub mod time;
pub mod upsert;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::models::{ActiveRun, DeleteCounts, LatestEstimate, RunKey};
use crate::db::time::EasternTime;
use crate::errors::AppError;

/// Relational operations over runs, arrivals and estimates. Each method is
/// a single transaction unless noted.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Idempotently create the three tables and their indexes. When
    /// `third_rail` is set, the catalog ID columns are declared as foreign
    /// keys into the companion catalog service's tables.
    async fn ensure_tables(&self, third_rail: bool) -> Result<(), AppError>;

    /// From all runs in the `(direction, line, train_id)` group whose
    /// most-recent event moment is at or before `as_of`, return the latest
    /// run's `(run_first_event_moment, most_recent_event_moment)`, or
    /// `None` when the group has no such run.
    async fn latest_run_moments(
        &self,
        direction: &str,
        line: &str,
        train_id: &str,
        as_of: EasternTime,
    ) -> Result<Option<(EasternTime, EasternTime)>, AppError>;

    /// Insert a new run row. A duplicate identifier is an error, never a
    /// silent upsert.
    async fn create_run_record(
        &self,
        key: RunKey<'_>,
        corrected_line: &str,
        corrected_direction: &str,
        line_id: Option<i32>,
        direction_id: Option<i32>,
    ) -> Result<(), AppError>;

    /// Insert the (run, station) arrival row if it does not exist yet.
    async fn ensure_arrival_record(
        &self,
        key: RunKey<'_>,
        station: &str,
        station_id: Option<i32>,
    ) -> Result<(), AppError>;

    /// Transaction: insert the estimate unless one already exists for this
    /// event moment, and touch the run.
    async fn add_arrival_estimate(
        &self,
        key: RunKey<'_>,
        station: &str,
        event_time: EasternTime,
        estimate: EasternTime,
    ) -> Result<(), AppError>;

    /// Transaction: set the arrival time unless one is already recorded
    /// (first write wins), and touch the run.
    async fn set_arrival_time(
        &self,
        key: RunKey<'_>,
        station: &str,
        event_time: EasternTime,
        arrival_time: EasternTime,
    ) -> Result<(), AppError>;

    /// Update the run's `most_recent_event_moment`. Must affect exactly
    /// one row; anything else means the run was concurrently reaped or
    /// never created.
    async fn touch_run(&self, key: RunKey<'_>, event_time: EasternTime) -> Result<(), AppError>;

    /// Transaction: delete estimates, then arrivals, then runs whose
    /// most-recent event moment predates `threshold`. Returns the counts
    /// in that order.
    async fn delete_stale_runs(&self, threshold: EasternTime) -> Result<DeleteCounts, AppError>;

    /// All runs updated since `threshold`, with arrivals and estimate
    /// series nested in.
    async fn recently_active_runs(
        &self,
        threshold: EasternTime,
    ) -> Result<Vec<ActiveRun>, AppError>;

    /// The latest estimate per run for unresolved arrivals at one station.
    /// Only meaningful in third-rail deployments, where `station_id` is
    /// populated.
    async fn latest_estimates(&self, station_id: i32) -> Result<Vec<LatestEstimate>, AppError>;
}

/// Postgres-backed [`Repository`].
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        PgRepository { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
