//! Group Order Core - Shared domain types.
//!
//! This crate provides the types and pure calculations used across all Group
//! Order components:
//! - `server` - Order admission HTTP service
//! - `cli` - Command-line tools for migrations and schedule inspection
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients, no ambient clock reads. Every time-dependent
//! calculation takes the current instant and the civil timezone as arguments.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, orders, line items, member profiles, statuses
//! - [`schedule`] - Weekly ordering window evaluation
//! - [`batch`] - ISO-week batch identifiers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod batch;
pub mod schedule;
pub mod types;

pub use batch::BatchId;
pub use schedule::{Schedule, ScheduleError};
pub use types::*;
