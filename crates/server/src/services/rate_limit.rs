//! Submission rate limiting.
//!
//! Each composite key (client address, device, profile phone, member) may have
//! one admitted submission per cooldown. Admission is decided by the
//! [`RateLimitRepository`] in a single atomic call; this module only builds the
//! key and turns a rejection into a whole-second `retry_after`.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use group_order_core::MemberId;

use crate::db::{RateLimitRepository, RepositoryError};

/// Default seconds between admitted submissions for one key.
pub const DEFAULT_COOLDOWN_SECS: i64 = 120;

/// Composite identity a submission is throttled under.
///
/// Members sharing a network address and device can collide on the same key;
/// that is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub ip: String,
    pub device_id: String,
    pub phone: String,
    pub member_id: MemberId,
}

impl RateLimitKey {
    /// The stored key, `"<ip>|<device>|<phone>|<member>"`.
    #[must_use]
    pub fn composite(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.ip, self.device_id, self.phone, self.member_id
        )
    }
}

/// Storage-level admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request was admitted and its instant recorded.
    Admitted,
    /// The key was admitted too recently.
    Rejected { last_accepted: DateTime<Utc> },
}

impl Admission {
    /// Decide admission from the last admitted instant.
    ///
    /// Repositories that can hold a lock around read and write use this to
    /// share the exact comparison the `PostgreSQL` statement performs.
    #[must_use]
    pub fn decide(
        last_accepted: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        cooldown: TimeDelta,
    ) -> Self {
        match last_accepted {
            Some(last) if now - last < cooldown => Self::Rejected {
                last_accepted: last,
            },
            _ => Self::Admitted,
        }
    }
}

/// Outcome reported to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitOutcome {
    Admitted,
    Limited { retry_after: u64 },
}

/// Seconds until `last_accepted + cooldown`, rounded up.
///
/// Elapsed time is clamped at zero so a stored instant slightly in the future
/// (clock skew between servers) never asks for more than one cooldown.
#[must_use]
pub fn retry_after_secs(
    last_accepted: DateTime<Utc>,
    now: DateTime<Utc>,
    cooldown: TimeDelta,
) -> u64 {
    let elapsed_ms = (now - last_accepted).num_milliseconds().max(0);
    let remaining_ms = cooldown.num_milliseconds() - elapsed_ms;
    if remaining_ms <= 0 {
        return 0;
    }
    u64::try_from((remaining_ms + 999) / 1000).unwrap_or(0)
}

/// Cooldown gate backed by a [`RateLimitRepository`].
#[derive(Clone)]
pub struct RateLimiter {
    repository: Arc<dyn RateLimitRepository>,
    cooldown: TimeDelta,
}

impl RateLimiter {
    #[must_use]
    pub fn new(repository: Arc<dyn RateLimitRepository>, cooldown: TimeDelta) -> Self {
        Self {
            repository,
            cooldown,
        }
    }

    /// Admit or reject `key` at `now`.
    ///
    /// An admission is recorded immediately and is not undone if a later
    /// pipeline step rejects the request.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store cannot be reached.
    pub async fn check(
        &self,
        key: &RateLimitKey,
        now: DateTime<Utc>,
    ) -> Result<RateLimitOutcome, RepositoryError> {
        match self.repository.try_acquire(key, now, self.cooldown).await? {
            Admission::Admitted => Ok(RateLimitOutcome::Admitted),
            Admission::Rejected { last_accepted } => Ok(RateLimitOutcome::Limited {
                retry_after: retry_after_secs(last_accepted, now, self.cooldown).max(1),
            }),
        }
    }
}
