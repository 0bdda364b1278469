//! # Web Handlers for the Campsite Booking API
//!
//! This crate provides the web handlers for the campsite booking application.

/// Handlers for the availability calendar endpoint
mod availability_handlers;
pub use availability_handlers::*;

/// Handlers for booking endpoints (create, get, edit, cancel)
mod booking_handlers;
pub use booking_handlers::*;

/// Request/response types and HTTP error mapping
mod types;
pub use types::*;
