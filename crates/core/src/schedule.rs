//! Weekly ordering window.
//!
//! A schedule opens at `open_day`/`open_hour`:00 and closes at the end of
//! `close_day`/`close_hour` (minute 59 inclusive), evaluated in a fixed civil
//! timezone. Every point in the week maps to a single coordinate,
//! `weekday * 1440 + hour * 60 + minute`, with weekdays numbered from Sunday
//! (0) to Saturday (6). When the open coordinate is after the close
//! coordinate the window wraps across the Saturday/Sunday boundary.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MINUTES_PER_DAY: u32 = 24 * 60;
const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Errors from constructing a schedule out of stored values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("weekday out of range: {0} (expected 0-6)")]
    Weekday(i32),
    #[error("hour out of range: {0} (expected 0-23)")]
    Hour(i32),
}

/// The admin-defined weekly ordering window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    open_day: u8,
    open_hour: u8,
    close_day: u8,
    close_hour: u8,
    is_always_open: bool,
}

impl Schedule {
    /// Build a schedule, range-checking every field.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleError` if a weekday is outside 0-6 or an hour outside 0-23.
    pub fn new(
        open_day: i32,
        open_hour: i32,
        close_day: i32,
        close_hour: i32,
        is_always_open: bool,
    ) -> Result<Self, ScheduleError> {
        Ok(Self {
            open_day: weekday(open_day)?,
            open_hour: hour(open_hour)?,
            close_day: weekday(close_day)?,
            close_hour: hour(close_hour)?,
            is_always_open,
        })
    }

    /// A schedule that never closes.
    #[must_use]
    pub const fn always_open() -> Self {
        Self {
            open_day: 0,
            open_hour: 0,
            close_day: 6,
            close_hour: 23,
            is_always_open: true,
        }
    }

    #[must_use]
    pub const fn open_day(&self) -> u8 {
        self.open_day
    }

    #[must_use]
    pub const fn open_hour(&self) -> u8 {
        self.open_hour
    }

    #[must_use]
    pub const fn close_day(&self) -> u8 {
        self.close_day
    }

    #[must_use]
    pub const fn close_hour(&self) -> u8 {
        self.close_hour
    }

    #[must_use]
    pub const fn is_always_open(&self) -> bool {
        self.is_always_open
    }

    /// Week coordinate of the first open minute.
    #[must_use]
    pub fn open_minute(&self) -> u32 {
        week_minute(u32::from(self.open_day), u32::from(self.open_hour), 0)
    }

    /// Week coordinate of the last open minute.
    #[must_use]
    pub fn close_minute(&self) -> u32 {
        week_minute(u32::from(self.close_day), u32::from(self.close_hour), 59)
    }

    /// Whether the window contains the given week coordinate.
    #[must_use]
    pub fn is_open_at_minute(&self, now_minute: u32) -> bool {
        if self.is_always_open {
            return true;
        }

        let open = self.open_minute();
        let close = self.close_minute();
        if open <= close {
            (open..=close).contains(&now_minute)
        } else {
            now_minute >= open || now_minute <= close
        }
    }

    /// Whether ordering is open at `now`, read as civil time in `tz`.
    #[must_use]
    pub fn is_open_at<Z: TimeZone>(&self, now: DateTime<Utc>, tz: &Z) -> bool {
        self.is_open_at_minute(civil_week_minute(now, tz))
    }

    /// Display-path evaluation: a missing schedule counts as open.
    ///
    /// Not suitable for admission decisions, which must fail closed.
    #[must_use]
    pub fn display_open<Z: TimeZone>(schedule: Option<&Self>, now: DateTime<Utc>, tz: &Z) -> bool {
        schedule.is_none_or(|s| s.is_open_at(now, tz))
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_always_open {
            return write!(f, "always open");
        }
        write!(
            f,
            "{} {:02}:00 to {} {:02}:59",
            weekday_label(self.open_day),
            self.open_hour,
            weekday_label(self.close_day),
            self.close_hour
        )
    }
}

/// `weekday * 1440 + hour * 60 + minute`, weekday counted from Sunday.
#[must_use]
pub const fn week_minute(weekday: u32, hour: u32, minute: u32) -> u32 {
    weekday * MINUTES_PER_DAY + hour * 60 + minute
}

/// Week coordinate of `now` in the civil timezone `tz`.
#[must_use]
pub fn civil_week_minute<Z: TimeZone>(now: DateTime<Utc>, tz: &Z) -> u32 {
    let local = now.with_timezone(tz);
    week_minute(
        local.weekday().num_days_from_sunday(),
        local.hour(),
        local.minute(),
    )
}

fn weekday(value: i32) -> Result<u8, ScheduleError> {
    u8::try_from(value)
        .ok()
        .filter(|d| *d <= 6)
        .ok_or(ScheduleError::Weekday(value))
}

fn hour(value: i32) -> Result<u8, ScheduleError> {
    u8::try_from(value)
        .ok()
        .filter(|h| *h <= 23)
        .ok_or(ScheduleError::Hour(value))
}

fn weekday_label(day: u8) -> &'static str {
    WEEKDAY_LABELS.get(usize::from(day)).copied().unwrap_or("?")
}
