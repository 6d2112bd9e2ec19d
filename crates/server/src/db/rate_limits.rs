//! Rate limit repository.
//!
//! Admission is one `INSERT ... ON CONFLICT (key) DO UPDATE ... WHERE` statement:
//! the row is only overwritten when the stored `last_request` is at least one
//! cooldown old, so two concurrent requests for the same key cannot both be
//! admitted. The loser of the race blocks on the row lock, re-evaluates the
//! `WHERE` against the winner's timestamp and is rejected.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use sqlx::PgPool;

use super::{RateLimitRepository, RepositoryError};
use crate::services::rate_limit::{Admission, RateLimitKey};

/// `PostgreSQL`-backed [`RateLimitRepository`].
#[derive(Clone)]
pub struct PgRateLimitRepository {
    pool: PgPool,
}

impl PgRateLimitRepository {
    /// Create a new rate limit repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateLimitRepository for PgRateLimitRepository {
    async fn try_acquire(
        &self,
        key: &RateLimitKey,
        now: DateTime<Utc>,
        cooldown: TimeDelta,
    ) -> Result<Admission, RepositoryError> {
        let admitted_before = now - cooldown;

        let admitted: Option<DateTime<Utc>> = sqlx::query_scalar(
            r"
            INSERT INTO rate_limits (key, ip, device_id, phone, user_id, last_request)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (key) DO UPDATE
               SET ip = EXCLUDED.ip,
                   device_id = EXCLUDED.device_id,
                   phone = EXCLUDED.phone,
                   user_id = EXCLUDED.user_id,
                   last_request = EXCLUDED.last_request
             WHERE rate_limits.last_request <= $7
            RETURNING last_request
            ",
        )
        .bind(key.composite())
        .bind(&key.ip)
        .bind(&key.device_id)
        .bind(&key.phone)
        .bind(key.member_id)
        .bind(now)
        .bind(admitted_before)
        .fetch_optional(&self.pool)
        .await?;

        if admitted.is_some() {
            return Ok(Admission::Admitted);
        }

        let last_accepted: Option<DateTime<Utc>> = sqlx::query_scalar(
            r"
            SELECT last_request
            FROM rate_limits
            WHERE key = $1
            ",
        )
        .bind(key.composite())
        .fetch_optional(&self.pool)
        .await?;

        Ok(Admission::Rejected {
            last_accepted: last_accepted.unwrap_or(now),
        })
    }
}
