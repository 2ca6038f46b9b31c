//! Row types and identifier construction for the run/arrival/estimate
//! data model.
//!
//! Identifiers are deterministic text concatenations of the raw feed
//! strings — `_` never appears inside a component — so the three layers
//! join without surrogate keys and audit logs stay self-describing:
//!
//! - run group: `{dir}_{line}_{train_id}`
//! - run:       `{group}_{rfc3339 first event moment}`
//! - arrival:   `{run}_{station}`

use std::collections::BTreeMap;

use crate::db::time::EasternTime;
use crate::taxonomy::{Direction, Line, Station, terminus};

/// The stable coordinates of one run: the raw reported direction, line and
/// train ID, plus the moment the run's first snapshot was observed.
#[derive(Debug, Clone, Copy)]
pub struct RunKey<'a> {
    pub direction: &'a str,
    pub line: &'a str,
    pub train_id: &'a str,
    pub run_first_event_moment: EasternTime,
}

impl RunKey<'_> {
    /// `{dir}_{line}_{train_id}` — the equivalence class of all runs made
    /// by this train in this reported direction on this reported line.
    pub fn group_identifier(&self) -> String {
        run_group_identifier(self.direction, self.line, self.train_id)
    }

    /// `{group}_{first event moment}` — one continuous journey.
    pub fn identifier(&self) -> String {
        format!("{}_{}", self.group_identifier(), self.run_first_event_moment)
    }

    /// `{run}_{station}` — one (run, station) pair.
    pub fn arrival_identifier(&self, station: &str) -> String {
        format!("{}_{}", self.identifier(), station)
    }
}

pub fn run_group_identifier(direction: &str, line: &str, train_id: &str) -> String {
    format!("{}_{}_{}", direction, line, train_id)
}

/// Counts returned by the stale-run reaper, in deletion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteCounts {
    pub estimates: u64,
    pub arrivals: u64,
    pub runs: u64,
}

/// A run with its arrivals and their estimate series nested in, as
/// assembled by the active-runs query. Maps are keyed by raw station name
/// and RFC3339 event moment respectively, so iteration order is stable.
#[derive(Debug, Clone)]
pub struct ActiveRun {
    pub identifier: String,
    pub run_group_identifier: String,
    pub direction: String,
    pub line: String,
    pub train_id: String,
    pub run_first_event_moment: String,
    pub most_recent_event_moment: String,
    pub corrected_line: Option<String>,
    pub corrected_direction: Option<String>,
    pub arrivals: BTreeMap<String, ActiveArrival>,
}

#[derive(Debug, Clone)]
pub struct ActiveArrival {
    pub identifier: String,
    pub station: String,
    pub arrival_time: Option<String>,
    /// event moment → estimated arrival moment
    pub estimates: BTreeMap<String, String>,
}

impl ActiveRun {
    /// Whether this run has reached its terminus: the arrival at the last
    /// station of the (corrected, falling back to reported) line and
    /// direction has a recorded arrival time.
    pub fn finished(&self) -> bool {
        let line = self
            .corrected_line
            .as_deref()
            .and_then(Line::parse)
            .or_else(|| Line::parse(&self.line));
        let direction = self
            .corrected_direction
            .as_deref()
            .and_then(Direction::parse)
            .or_else(|| Direction::parse(&self.direction));
        let (Some(line), Some(direction)) = (line, direction) else {
            return false;
        };
        let Some(end) = terminus(line, direction) else {
            return false;
        };
        self.arrivals
            .values()
            .any(|a| Station::parse(&a.station) == Some(end) && a.arrival_time.is_some())
    }
}

/// The most recent unresolved estimate for one run at one station, as
/// returned by the latest-estimates query.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LatestEstimate {
    pub run_identifier: String,
    pub arrival_identifier: String,
    pub station: String,
    pub corrected_line: Option<String>,
    pub corrected_direction: Option<String>,
    pub event_moment: String,
    pub estimated_arrival_moment: String,
}
