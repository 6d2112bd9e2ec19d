//! Fulfillment batch identifiers.
//!
//! Orders accepted in the same ISO-8601 week share a batch id of the form
//! `"<week-year>-W<week>"`, e.g. `2026-W43`. The week is taken from the
//! calendar date in the civil timezone so the batch boundary lines up with the
//! schedule shown to members.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// An ISO-week batch identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    /// Batch id for a civil calendar date.
    #[must_use]
    pub fn for_date(date: NaiveDate) -> Self {
        let week = date.iso_week();
        Self(format!("{}-W{:02}", week.year(), week.week()))
    }

    /// Batch id for an instant, using its calendar date in `tz`.
    #[must_use]
    pub fn for_instant<Z: TimeZone>(now: DateTime<Utc>, tz: &Z) -> Self {
        Self::for_date(now.with_timezone(tz).date_naive())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<BatchId> for String {
    fn from(id: BatchId) -> Self {
        id.0
    }
}
