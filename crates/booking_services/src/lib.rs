//! # Booking Services
//!
//! This crate implements the availability ledger for a single campsite: per-day
//! occupancy records, business-rule validation, calendar computation, and the
//! booking operations (create, edit, cancel) that mutate the ledger under
//! optimistic concurrency control.

/// Availability calendar computation and ledger write planning.
pub mod availability;
/// Business-rule configuration for the campsite.
pub mod config;
/// Booking operations: create, edit, cancel, get, and availability queries.
pub mod service;
/// Ledger and reservation persistence contract, plus an in-memory store.
pub mod storage;
/// Types and structures used by the booking services.
pub mod types;
/// Business-rule and capacity validation.
pub mod validator;
