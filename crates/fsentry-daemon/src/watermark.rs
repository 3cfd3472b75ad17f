//! Recent-changes watermark.
//!
//! # Invariants
//!
//! - **Non-decreasing**: [`Watermark::advance`] never moves backwards.
//! - **Boundary skip**: after a scan the watermark sits
//!   [`WATERMARK_EPSILON_SECS`] seconds past the newest event seen, so the boundary event
//!   is not fetched again.
//! - **Empty scan is a no-op**: no events, same watermark.

use std::fmt;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use fsentry_wiki::ChangeEvent;

/// Resolution of remote timestamps.
pub const WATERMARK_EPSILON_SECS: i64 = 1;

/// Changes strictly at or after this instant have not been scanned yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Watermark(DateTime<Utc>);

impl Watermark {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// `lookback` before now.
    pub fn lookback(lookback: std::time::Duration) -> Self {
        let delta = TimeDelta::from_std(lookback).unwrap_or(TimeDelta::zero());
        Self(Utc::now() - delta)
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.0
    }

    /// Watermark after a successful scan returning `events`.
    pub fn after_events(self, events: &[ChangeEvent]) -> Self {
        match events.iter().map(|e| e.timestamp).max() {
            Some(newest) => self.max(Self(newest + TimeDelta::seconds(WATERMARK_EPSILON_SECS))),
            None => self,
        }
    }

    /// Move forward to `to`; returns whether it moved.
    pub fn advance(&mut self, to: Watermark) -> bool {
        if to > *self {
            *self = to;
            true
        } else {
            false
        }
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}
