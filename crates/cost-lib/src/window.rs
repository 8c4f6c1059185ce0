//! Batch window computation

use crate::error::{ExtractError, ExtractResult};
use chrono::{DateTime, Duration, DurationRound, Utc};
use std::fmt;

/// Timestamp format the Kubecost `window` parameter expects
const WINDOW_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Closed-open time range a batch run covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl BatchWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> ExtractResult<Self> {
        if start >= end {
            return Err(ExtractError::Window(format!(
                "start {} is not before end {}",
                start.format(WINDOW_FORMAT),
                end.format(WINDOW_FORMAT)
            )));
        }
        Ok(Self { start, end })
    }

    /// Window of `hours` completed hours ending one hour before the current hour
    ///
    /// At 10:30 with `hours = 1` this is 08:00..09:00, leaving Kubecost a full
    /// hour to settle the most recent data.
    pub fn completed_hours(now: DateTime<Utc>, hours: u32) -> ExtractResult<Self> {
        if hours == 0 {
            return Err(ExtractError::Window("window must span at least one hour".to_string()));
        }

        let end = now
            .checked_sub_signed(Duration::hours(1))
            .ok_or_else(|| ExtractError::Window(format!("{} is out of range", now)))?
            .duration_trunc(Duration::hours(1))
            .map_err(|e| ExtractError::Window(e.to_string()))?;
        let start = end
            .checked_sub_signed(Duration::hours(i64::from(hours)))
            .ok_or_else(|| {
                ExtractError::Window(format!("{} hours before {} is out of range", hours, end))
            })?;

        Self::new(start, end)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Value for the `window` query parameter
    pub fn to_query(&self) -> String {
        format!(
            "{},{}",
            self.start.format(WINDOW_FORMAT),
            self.end.format(WINDOW_FORMAT)
        )
    }
}

impl fmt::Display for BatchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query())
    }
}
