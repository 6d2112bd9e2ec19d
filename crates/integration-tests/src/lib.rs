//! Integration tests for Group Order.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory pipeline and HTTP tests
//! cargo test -p group-order-integration-tests
//!
//! # PostgreSQL repository tests (needs a scratch database)
//! ORDERING_TEST_DATABASE_URL=postgres://localhost/group_order_test \
//!     cargo test -p group-order-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `pipeline` - Order admission pipeline against in-memory repositories
//! - `http` - The axum router driven with `tower::ServiceExt::oneshot`
//! - `postgres` - `PostgreSQL` repositories (ignored unless a database is given)
//!
//! The in-memory repositories hold one mutex across each read-and-write, which
//! gives them the same per-key atomicity the `PostgreSQL` statements get from
//! their unique constraints.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use sqlx::postgres::PgPoolOptions;

use group_order_core::{
    MemberId, MemberProfile, NewOrder, Order, OrderId, OrderStatus, Schedule,
};
use group_order_server::config::DEFAULT_TIMEZONE;
use group_order_server::db::{
    CreateOutcome, OrderRepository, ProfileRepository, RateLimitRepository, RepositoryError,
    ScheduleRepository,
};
use group_order_server::services::orders::ItemInput;
use group_order_server::services::rate_limit::{Admission, DEFAULT_COOLDOWN_SECS, RateLimitKey};
use group_order_server::services::{
    Clock, IdentityError, IdentityVerifier, OrderService, Repositories, SubmitOrder,
};
use group_order_server::state::AppState;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Build a UTC instant from Taipei civil time (UTC+8, no DST).
///
/// # Panics
///
/// Panics if the civil time does not exist.
#[must_use]
pub fn taipei(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    chrono_tz::Asia::Taipei
        .with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("valid Taipei civil time")
        .with_timezone(&Utc)
}

// =============================================================================
// Clock
// =============================================================================

/// A clock tests move by hand.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *lock(&self.now) = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        *lock(&self.now) += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

// =============================================================================
// Identity
// =============================================================================

/// Identity provider double with a fixed token table.
#[derive(Debug, Default)]
pub struct StaticIdentityVerifier {
    tokens: Mutex<HashMap<String, MemberId>>,
    unavailable: AtomicBool,
}

impl StaticIdentityVerifier {
    pub fn register(&self, token: &str, member_id: MemberId) {
        lock(&self.tokens).insert(token.to_string(), member_id);
    }

    /// Make every verification fail as if the provider were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityVerifier for StaticIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<MemberId, IdentityError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IdentityError::Rejected(503));
        }
        lock(&self.tokens)
            .get(token)
            .copied()
            .ok_or(IdentityError::Rejected(401))
    }
}

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Default)]
struct StoreState {
    profiles: HashMap<MemberId, MemberProfile>,
    schedule: Option<Schedule>,
    rate_limits: HashMap<String, DateTime<Utc>>,
    /// Insertion order is creation order.
    orders: Vec<Order>,
    idempotency: HashMap<String, (OrderId, MemberId)>,
}

/// In-memory implementation of every repository the pipeline uses.
pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    state: Mutex<StoreState>,
    fail_creates: AtomicBool,
    fail_schedule: AtomicBool,
}

fn unavailable() -> RepositoryError {
    RepositoryError::Database(sqlx::Error::PoolTimedOut)
}

impl MemoryStore {
    /// An empty store that stamps orders with `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(StoreState::default()),
            fail_creates: AtomicBool::new(false),
            fail_schedule: AtomicBool::new(false),
        }
    }

    pub fn put_profile(&self, profile: MemberProfile) {
        lock(&self.state)
            .profiles
            .insert(profile.member_id, profile);
    }

    pub fn set_schedule(&self, schedule: Option<Schedule>) {
        lock(&self.state).schedule = schedule;
    }

    /// Make order creation fail as if the database were unreachable.
    pub fn set_fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// Make schedule reads fail as if the database were unreachable.
    pub fn set_fail_schedule(&self, fail: bool) {
        self.fail_schedule.store(fail, Ordering::SeqCst);
    }

    /// Every persisted order, oldest first.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        lock(&self.state).orders.clone()
    }

    #[must_use]
    pub fn order_count(&self) -> usize {
        lock(&self.state).orders.len()
    }

    /// Stored composite rate-limit keys.
    #[must_use]
    pub fn rate_limit_keys(&self) -> Vec<String> {
        lock(&self.state).rate_limits.keys().cloned().collect()
    }
}

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn get(&self, member_id: MemberId) -> Result<Option<MemberProfile>, RepositoryError> {
        Ok(lock(&self.state).profiles.get(&member_id).cloned())
    }
}

#[async_trait]
impl ScheduleRepository for MemoryStore {
    async fn get(&self) -> Result<Option<Schedule>, RepositoryError> {
        if self.fail_schedule.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(lock(&self.state).schedule)
    }
}

#[async_trait]
impl RateLimitRepository for MemoryStore {
    async fn try_acquire(
        &self,
        key: &RateLimitKey,
        now: DateTime<Utc>,
        cooldown: TimeDelta,
    ) -> Result<Admission, RepositoryError> {
        let composite = key.composite();
        let mut state = lock(&self.state);
        let admission = Admission::decide(state.rate_limits.get(&composite).copied(), now, cooldown);
        if admission == Admission::Admitted {
            state.rate_limits.insert(composite, now);
        }
        Ok(admission)
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn create(&self, order: &NewOrder) -> Result<CreateOutcome, RepositoryError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        if order.items.is_empty() {
            return Err(RepositoryError::InvalidInput(
                "order has no line items".to_owned(),
            ));
        }
        let total_amount = order
            .total()
            .ok_or_else(|| RepositoryError::InvalidInput("order total overflows".to_owned()))?;

        let mut state = lock(&self.state);
        if let Some(&(id, owner)) = state.idempotency.get(&order.idempotency_key) {
            return if owner == order.member_id {
                Ok(CreateOutcome::Existing(id))
            } else {
                Err(RepositoryError::Conflict(
                    "idempotency key belongs to another member".to_owned(),
                ))
            };
        }

        let id = OrderId::random();
        state
            .idempotency
            .insert(order.idempotency_key.clone(), (id, order.member_id));
        state.orders.push(Order {
            id,
            member_id: order.member_id,
            created_at: self.clock.now(),
            customer_name: order.customer_name.clone(),
            phone: order.phone.clone(),
            delivery_location: order.delivery_location.clone(),
            note: order.note.clone(),
            total_amount,
            status: OrderStatus::Open,
            admin_note: None,
            batch_id: order.batch_id.to_string(),
            order_items: order.items.clone(),
        });

        Ok(CreateOutcome::Created(id))
    }

    async fn find_by_idempotency_key(
        &self,
        member_id: MemberId,
        idempotency_key: &str,
    ) -> Result<Option<OrderId>, RepositoryError> {
        Ok(lock(&self.state)
            .idempotency
            .get(idempotency_key)
            .and_then(|&(id, owner)| (owner == member_id).then_some(id)))
    }

    async fn get_for_member(
        &self,
        id: OrderId,
        member_id: MemberId,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(lock(&self.state)
            .orders
            .iter()
            .find(|o| o.id == id && o.member_id == member_id)
            .cloned())
    }

    async fn list_for_member(
        &self,
        member_id: MemberId,
        limit: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(lock(&self.state)
            .orders
            .iter()
            .rev()
            .filter(|o| o.member_id == member_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

// =============================================================================
// Test Context
// =============================================================================

/// A wired pipeline over in-memory repositories.
pub struct TestContext {
    pub clock: Arc<ManualClock>,
    pub identity: Arc<StaticIdentityVerifier>,
    pub store: Arc<MemoryStore>,
    pub service: OrderService,
}

impl TestContext {
    /// Always-open schedule, Taipei time, default cooldown, clock at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_cooldown(now, TimeDelta::seconds(DEFAULT_COOLDOWN_SECS))
    }

    #[must_use]
    pub fn with_cooldown(now: DateTime<Utc>, cooldown: TimeDelta) -> Self {
        let clock = Arc::new(ManualClock::new(now));
        let identity = Arc::new(StaticIdentityVerifier::default());
        let store = Arc::new(MemoryStore::new(clock.clone()));
        store.set_schedule(Some(Schedule::always_open()));

        let service = OrderService::new(
            Repositories {
                identity: identity.clone(),
                profiles: store.clone(),
                schedule: store.clone(),
                rate_limits: store.clone(),
                orders: store.clone(),
                clock: clock.clone(),
            },
            DEFAULT_TIMEZONE,
            cooldown,
        );

        Self {
            clock,
            identity,
            store,
            service,
        }
    }

    /// Register a member with a completed profile, reachable via `token`.
    pub fn add_member(&self, token: &str, full_name: &str, phone: &str) -> MemberId {
        let member_id = self.add_member_without_profile(token);
        self.store.put_profile(MemberProfile {
            member_id,
            full_name: full_name.to_string(),
            phone: phone.to_string(),
        });
        member_id
    }

    /// Register a member who has not filled in a profile.
    pub fn add_member_without_profile(&self, token: &str) -> MemberId {
        let member_id = MemberId::random();
        self.identity.register(token, member_id);
        member_id
    }

    /// The full HTTP application over this context's pipeline.
    ///
    /// The database pool is lazy and never connected; only the readiness
    /// probe would touch it.
    ///
    /// # Panics
    ///
    /// Panics if the placeholder database URL cannot be parsed.
    #[must_use]
    pub fn app(&self) -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/group_order_unused")
            .expect("lazy pool");
        let state = AppState::new(pool, self.service.clone());
        group_order_server::routes::app(state)
    }
}

/// A cart line as a client would send it.
#[must_use]
pub fn item(name: &str, unit_price: i64, quantity: i64) -> ItemInput {
    ItemInput {
        product_name: name.to_string(),
        unit_price: Some(unit_price.into()),
        quantity: Some(quantity.into()),
    }
}

/// A valid submission: two teas at 45 and one cake at 120 (total 210).
#[must_use]
pub fn submission(token: &str, idempotency_key: &str) -> SubmitOrder {
    SubmitOrder {
        credential: Some(token.to_string()),
        client_ip: "203.0.113.7".to_string(),
        delivery_location: "Lobby B".to_string(),
        note: "Less ice".to_string(),
        items: vec![item("Oolong tea", 45, 2), item("Cheesecake", 120, 1)],
        device_id: "device-1".to_string(),
        idempotency_key: idempotency_key.to_string(),
    }
}
