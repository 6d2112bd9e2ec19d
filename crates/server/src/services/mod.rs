//! Business logic services for the ordering server.
//!
//! # Services
//!
//! - `identity` - Bearer credential verification against the identity provider
//! - `rate_limit` - Cooldown admission per composite client key
//! - `orders` - The order admission pipeline and order read paths
//! - `clock` - Injectable source of the current instant

pub mod clock;
pub mod identity;
pub mod orders;
pub mod rate_limit;

pub use clock::{Clock, SystemClock};
pub use identity::{HttpIdentityVerifier, IdentityError, IdentityVerifier};
pub use orders::{OrderError, OrderService, Repositories, ScheduleStatus, SubmitOrder};
pub use rate_limit::{RateLimitKey, RateLimitOutcome, RateLimiter};
