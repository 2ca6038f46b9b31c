//! Agency-local timestamps with string-based persistence.
//!
//! All MARTA feed times are wall-clock Eastern. They are persisted as
//! RFC3339 text (offset included) so the stored data stays unambiguous
//! regardless of the timezone of the database session reading it.

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::America::New_York;
use chrono_tz::Tz;

use crate::errors::AppError;

/// The timezone all feed times are interpreted in.
pub const EASTERN: Tz = New_York;

/// Datetime format used by the feed's `EVENT_TIME` field.
const FEED_DATETIME_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

/// Time-of-day format used by the feed's `NEXT_ARR` field.
const FEED_TIME_FORMAT: &str = "%I:%M:%S %p";

/// A moment in the Eastern timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EasternTime(DateTime<Tz>);

impl EasternTime {
    pub fn now() -> Self {
        EasternTime(Utc::now().with_timezone(&EASTERN))
    }

    /// Parse a feed event time (`M/D/YYYY h:mm:ss AM/PM`, wall-clock
    /// Eastern). Non-existent local times (spring-forward gap) are parse
    /// failures; ambiguous ones (fall-back hour) take the earlier offset.
    pub fn parse_feed_datetime(s: &str) -> Result<Self, AppError> {
        let naive = NaiveDateTime::parse_from_str(s.trim(), FEED_DATETIME_FORMAT)
            .map_err(|e| AppError::InputParse(format!("event time `{}`: {}", s, e)))?;
        EASTERN
            .from_local_datetime(&naive)
            .earliest()
            .map(EasternTime)
            .ok_or_else(|| AppError::InputParse(format!("event time `{}` does not exist", s)))
    }

    /// Parse a feed time-of-day (`h:mm:ss AM/PM`).
    pub fn parse_feed_time_of_day(s: &str) -> Result<NaiveTime, AppError> {
        NaiveTime::parse_from_str(s.trim(), FEED_TIME_FORMAT)
            .map_err(|e| AppError::InputParse(format!("time of day `{}`: {}", s, e)))
    }

    /// Parse the persisted RFC3339 representation.
    pub fn parse_rfc3339(s: &str) -> Result<Self, AppError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| EasternTime(dt.with_timezone(&EASTERN)))
            .map_err(|e| AppError::InputParse(format!("timestamp `{}`: {}", s, e)))
    }

    /// This moment's date combined with a different time of day, in
    /// Eastern. Used to turn a time-of-day arrival estimate into a full
    /// timestamp on the run's start date.
    pub fn with_time_of_day(self, time: NaiveTime) -> Result<Self, AppError> {
        let naive = self.0.date_naive().and_time(time);
        EASTERN
            .from_local_datetime(&naive)
            .earliest()
            .map(EasternTime)
            .ok_or_else(|| {
                AppError::InputParse(format!("local time `{}` does not exist", naive))
            })
    }
}

impl std::ops::Sub<Duration> for EasternTime {
    type Output = EasternTime;

    fn sub(self, rhs: Duration) -> EasternTime {
        EasternTime(self.0 - rhs)
    }
}

impl std::fmt::Display for EasternTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Secs, false))
    }
}
