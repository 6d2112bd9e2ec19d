//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::OrderingConfig;
use crate::db::{PgOrderRepository, PgProfileRepository, PgRateLimitRepository, PgScheduleRepository};
use crate::services::{HttpIdentityVerifier, IdentityError, OrderService, Repositories, SystemClock};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the database pool and the order pipeline.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pool: PgPool,
    orders: OrderService,
}

impl AppState {
    /// Create application state from already-built parts.
    ///
    /// Tests use this to run the router against in-memory repositories.
    #[must_use]
    pub fn new(pool: PgPool, orders: OrderService) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                pool,
                orders,
            }),
        }
    }

    /// Wire the production pipeline: `PostgreSQL` repositories, the HTTP
    /// identity verifier and the system clock.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if the identity HTTP client cannot be built.
    pub fn from_config(config: &OrderingConfig, pool: PgPool) -> Result<Self, IdentityError> {
        let repositories = Repositories {
            identity: Arc::new(HttpIdentityVerifier::new(&config.identity)?),
            profiles: Arc::new(PgProfileRepository::new(pool.clone())),
            schedule: Arc::new(PgScheduleRepository::new(pool.clone())),
            rate_limits: Arc::new(PgRateLimitRepository::new(pool.clone())),
            orders: Arc::new(PgOrderRepository::new(pool.clone())),
            clock: Arc::new(SystemClock),
        };
        let orders = OrderService::new(repositories, config.timezone, config.cooldown);

        Ok(Self::new(pool, orders))
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the order pipeline.
    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }
}
