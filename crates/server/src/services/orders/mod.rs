//! Order admission pipeline and order read paths.
//!
//! A submission passes these gates in order, stopping at the first failure:
//!
//! 1. Verify the bearer credential
//! 2. Normalize and validate the request fields and items
//! 3. Load the member profile
//! 4. Rate limit on the composite client key (records the admission). A
//!    limited request whose idempotency token already has an order gets that
//!    order's id back instead of a rejection
//! 5. Check the ordering schedule in the civil timezone
//! 6. Compute the ISO-week batch id
//! 7. Create the order idempotently
//!
//! Nothing durable is written except by steps 4 and 7.

mod error;
mod input;

pub use error::OrderError;
pub use input::{
    ItemInput, MAX_DELIVERY_LOCATION_CHARS, MAX_DEVICE_ID_CHARS, MAX_IDEMPOTENCY_KEY_CHARS,
    MAX_NOTE_CHARS, MAX_PRODUCT_NAME_CHARS, OrderInput, lenient_items, lenient_text,
    sanitize_text,
};

use std::sync::{Arc, LazyLock};

use chrono::TimeDelta;
use chrono_tz::Tz;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use group_order_core::{BatchId, MemberId, NewOrder, Order, OrderId, Schedule};

use crate::db::{
    CreateOutcome, OrderRepository, ProfileRepository, RateLimitRepository, RepositoryError,
    ScheduleRepository,
};
use crate::services::clock::Clock;
use crate::services::identity::{IdentityVerifier, normalize_credential};
use crate::services::rate_limit::{RateLimitKey, RateLimitOutcome, RateLimiter};

/// Most orders returned by [`OrderService::list_orders`].
pub const HISTORY_LIMIT: i64 = 50;

/// Longest raw order id considered for lookup, in characters.
const MAX_ORDER_ID_CHARS: usize = 64;

static ORDER_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F-]{32,36}$").expect("Invalid regex"));

/// Collaborators the pipeline reads and writes through.
#[derive(Clone)]
pub struct Repositories {
    pub identity: Arc<dyn IdentityVerifier>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub schedule: Arc<dyn ScheduleRepository>,
    pub rate_limits: Arc<dyn RateLimitRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub clock: Arc<dyn Clock>,
}

/// A raw order submission.
#[derive(Debug, Clone, Default)]
pub struct SubmitOrder {
    /// Bearer credential, as received.
    pub credential: Option<String>,
    /// Client network address, `"unknown"` if it could not be determined.
    pub client_ip: String,
    pub delivery_location: String,
    pub note: String,
    pub items: Vec<ItemInput>,
    pub device_id: String,
    pub idempotency_key: String,
}

/// Whether ordering currently looks open, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleStatus {
    pub open: bool,
    pub always_open: bool,
    /// Human-readable window, `None` if no schedule is configured.
    pub window: Option<String>,
    /// Batch an order placed now would join.
    pub batch_id: BatchId,
    pub timezone: String,
}

/// The order admission pipeline.
///
/// Cheap to clone; all state is behind an `Arc`.
#[derive(Clone)]
pub struct OrderService {
    inner: Arc<OrderServiceInner>,
}

struct OrderServiceInner {
    repositories: Repositories,
    rate_limiter: RateLimiter,
    timezone: Tz,
}

impl OrderService {
    /// Create the pipeline with the civil timezone and per-key cooldown.
    #[must_use]
    pub fn new(repositories: Repositories, timezone: Tz, cooldown: TimeDelta) -> Self {
        let rate_limiter = RateLimiter::new(Arc::clone(&repositories.rate_limits), cooldown);
        Self {
            inner: Arc::new(OrderServiceInner {
                repositories,
                rate_limiter,
                timezone,
            }),
        }
    }

    fn repos(&self) -> &Repositories {
        &self.inner.repositories
    }

    /// Verify a raw credential. Every failure is reported as unauthenticated.
    async fn authenticate(&self, credential: Option<&str>) -> Result<MemberId, OrderError> {
        let Some(token) = normalize_credential(credential) else {
            debug!("No credential supplied");
            return Err(OrderError::Unauthenticated);
        };

        match self.repos().identity.verify(&token).await {
            Ok(member_id) => Ok(member_id),
            Err(e) if e.is_infrastructure() => {
                warn!(error = %e, "Identity provider unavailable");
                Err(OrderError::Unauthenticated)
            }
            Err(e) => {
                debug!(error = %e, "Credential rejected");
                Err(OrderError::Unauthenticated)
            }
        }
    }

    /// Run a submission through every admission gate and persist it.
    ///
    /// Returns the id of the created order, or of the order previously
    /// created with the same idempotency token by the same member.
    ///
    /// # Errors
    ///
    /// Returns the [`OrderError`] of the first gate that fails.
    #[instrument(skip(self, request), fields(client_ip = %request.client_ip))]
    pub async fn submit_order(&self, request: SubmitOrder) -> Result<OrderId, OrderError> {
        let member_id = self.authenticate(request.credential.as_deref()).await?;

        let input = OrderInput::normalize(
            &request.delivery_location,
            &request.note,
            &request.device_id,
            &request.idempotency_key,
            &request.items,
        )?;

        let profile = self
            .repos()
            .profiles
            .get(member_id)
            .await
            .map_err(OrderError::store("Profile lookup failed"))?
            .ok_or(OrderError::ProfileRequired)?;

        let now = self.repos().clock.now();

        let key = RateLimitKey {
            ip: request.client_ip,
            device_id: input.device_id.clone(),
            phone: profile.phone.clone(),
            member_id,
        };
        match self
            .inner
            .rate_limiter
            .check(&key, now)
            .await
            .map_err(OrderError::store("Rate limit check failed"))?
        {
            RateLimitOutcome::Admitted => {}
            RateLimitOutcome::Limited { retry_after } => {
                if let Some(order_id) = self
                    .repos()
                    .orders
                    .find_by_idempotency_key(member_id, &input.idempotency_key)
                    .await
                    .map_err(OrderError::store("Order lookup failed"))?
                {
                    info!(%order_id, %member_id, "Retry within cooldown, returning existing order");
                    return Ok(order_id);
                }
                info!(%member_id, retry_after, "Submission rate limited");
                return Err(OrderError::RateLimited { retry_after });
            }
        }

        let schedule = self
            .repos()
            .schedule
            .get()
            .await
            .map_err(OrderError::store("Schedule check failed"))?;
        let open = schedule
            .as_ref()
            .is_some_and(|s| s.is_open_at(now, &self.inner.timezone));
        if !open {
            info!(%member_id, configured = schedule.is_some(), "Ordering closed");
            return Err(OrderError::OrderingClosed);
        }

        let batch_id = BatchId::for_instant(now, &self.inner.timezone);

        let order = NewOrder {
            member_id,
            customer_name: profile.full_name,
            phone: profile.phone,
            delivery_location: input.delivery_location,
            note: input.note,
            items: input.items,
            idempotency_key: input.idempotency_key,
            batch_id,
        };

        let outcome = self
            .repos()
            .orders
            .create(&order)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => OrderError::DuplicateSubmission,
                other => OrderError::store("Failed to create order")(other),
            })?;

        match outcome {
            CreateOutcome::Created(id) => {
                info!(order_id = %id, %member_id, batch_id = %order.batch_id, "Order created");
            }
            CreateOutcome::Existing(id) => {
                info!(order_id = %id, %member_id, "Duplicate submission, returning existing order");
            }
        }

        Ok(outcome.order_id())
    }

    /// Fetch one of the caller's orders with its line items.
    ///
    /// # Errors
    ///
    /// Returns `InvalidId` for a malformed id and `NotFound` when the order
    /// does not exist or belongs to someone else.
    #[instrument(skip(self, credential, raw_id))]
    pub async fn lookup_order(
        &self,
        credential: Option<&str>,
        raw_id: &str,
    ) -> Result<Order, OrderError> {
        let member_id = self.authenticate(credential).await?;
        let order_id = parse_order_id(raw_id)?;

        self.repos()
            .orders
            .get_for_member(order_id, member_id)
            .await
            .map_err(OrderError::store("Lookup failed"))?
            .ok_or(OrderError::NotFound)
    }

    /// The caller's most recent orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` or a store failure.
    #[instrument(skip(self, credential))]
    pub async fn list_orders(&self, credential: Option<&str>) -> Result<Vec<Order>, OrderError> {
        let member_id = self.authenticate(credential).await?;

        self.repos()
            .orders
            .list_for_member(member_id, HISTORY_LIMIT)
            .await
            .map_err(OrderError::store("History lookup failed"))
    }

    /// Display status of the ordering window.
    ///
    /// This is advisory: a missing schedule or a store failure is shown as
    /// open, and submissions are still checked against the stored schedule.
    pub async fn schedule_status(&self) -> ScheduleStatus {
        let tz = self.inner.timezone;
        let now = self.repos().clock.now();

        let schedule = match self.repos().schedule.get().await {
            Ok(schedule) => schedule,
            Err(e) => {
                warn!(error = %e, "Schedule unavailable for display");
                None
            }
        };

        ScheduleStatus {
            open: Schedule::display_open(schedule.as_ref(), now, &tz),
            always_open: schedule.as_ref().is_some_and(Schedule::is_always_open),
            window: schedule.as_ref().map(ToString::to_string),
            batch_id: BatchId::for_instant(now, &tz),
            timezone: tz.name().to_owned(),
        }
    }
}

/// Parse a client-supplied order id.
///
/// # Errors
///
/// Returns `OrderError::InvalidId` unless the trimmed id is UUID-shaped.
pub fn parse_order_id(raw: &str) -> Result<OrderId, OrderError> {
    let candidate = sanitize_text(raw, MAX_ORDER_ID_CHARS);
    if !ORDER_ID_RE.is_match(&candidate) {
        return Err(OrderError::InvalidId);
    }
    candidate.parse().map_err(|_| OrderError::InvalidId)
}
