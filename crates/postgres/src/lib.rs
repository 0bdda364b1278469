//! # Postgres
//!
//! This crate provides the PostgreSQL persistence layer for the campsite
//! booking application: connection pooling, schema bootstrap, and the
//! database-backed booking store.

/// Connection pool creation and schema bootstrap.
pub mod database;
/// PostgreSQL implementation of the booking store contract.
pub mod store;
