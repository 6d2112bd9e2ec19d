//! Group order server library.
//!
//! This crate provides the ordering API as a library, allowing it to be
//! tested against in-memory repositories and reused by the CLI.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
