//! Database operations for the ordering `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `orders` - Order headers, unique on `idempotency_key`
//! - `order_items` - Line items, written in the same transaction as the header
//! - `rate_limits` - Last admitted submission per composite key
//! - `ordering_schedule` - Singleton weekly ordering window (admin-owned)
//! - `member_profiles` - Member name and phone (profile flow-owned)
//!
//! # Repositories
//!
//! Each table is reached through a trait so the admission pipeline can run
//! against `PostgreSQL` in production and in-memory doubles in tests. Every
//! operation that must be linearizable (rate limit admission, idempotent
//! create) is a single repository call backed by a uniqueness constraint.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p group-order-cli -- migrate
//! ```

pub mod orders;
pub mod profiles;
pub mod rate_limits;
pub mod schedule;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use group_order_core::{MemberId, MemberProfile, NewOrder, Order, OrderId, Schedule};

pub use orders::PgOrderRepository;
pub use profiles::PgProfileRepository;
pub use rate_limits::PgRateLimitRepository;
pub use schedule::PgScheduleRepository;

use crate::services::rate_limit::{Admission, RateLimitKey};

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., idempotency key owned by another member).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The store refused a value the caller should have rejected earlier.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result of an idempotent order create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A new order was written.
    Created(OrderId),
    /// The idempotency key was already used by this member; nothing was written.
    Existing(OrderId),
}

impl CreateOutcome {
    /// The order id, new or pre-existing.
    #[must_use]
    pub const fn order_id(&self) -> OrderId {
        match self {
            Self::Created(id) | Self::Existing(id) => *id,
        }
    }
}

/// Read access to member profiles.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Get the profile for a member, if one has been completed.
    async fn get(&self, member_id: MemberId) -> Result<Option<MemberProfile>, RepositoryError>;
}

/// Read access to the singleton ordering schedule.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Get the stored schedule, or `None` if none has been configured.
    async fn get(&self) -> Result<Option<Schedule>, RepositoryError>;
}

/// Storage-enforced rate limit bookkeeping.
#[async_trait]
pub trait RateLimitRepository: Send + Sync {
    /// Atomically admit `key` at `now` if its last admission is at least
    /// `cooldown` old (or absent), recording `now` as the new last admission.
    ///
    /// Concurrent calls for the same key must never both be admitted within
    /// one cooldown.
    async fn try_acquire(
        &self,
        key: &RateLimitKey,
        now: DateTime<Utc>,
        cooldown: TimeDelta,
    ) -> Result<Admission, RepositoryError>;
}

/// Durable orders and their line items.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist the header and all line items atomically, computing the total
    /// from the items. A repeated `idempotency_key` returns the existing order
    /// instead of writing a new one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the key belongs to another member.
    async fn create(&self, order: &NewOrder) -> Result<CreateOutcome, RepositoryError>;

    /// The id of the member's order created with `idempotency_key`, if any.
    ///
    /// A key bound to another member's order reads as `None`.
    async fn find_by_idempotency_key(
        &self,
        member_id: MemberId,
        idempotency_key: &str,
    ) -> Result<Option<OrderId>, RepositoryError>;

    /// Get one order, only if it belongs to `member_id`.
    async fn get_for_member(
        &self,
        id: OrderId,
        member_id: MemberId,
    ) -> Result<Option<Order>, RepositoryError>;

    /// The member's most recent orders, newest first.
    async fn list_for_member(
        &self,
        member_id: MemberId,
        limit: i64,
    ) -> Result<Vec<Order>, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
