//! Core types for Group Order.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod member;
pub mod order;
pub mod status;

pub use id::*;
pub use member::MemberProfile;
pub use order::{LineItem, NewOrder, Order, order_total};
pub use status::*;
