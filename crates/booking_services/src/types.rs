use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Request structure for creating or editing a booking.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BookingRequest {
    /// Arrival date (the first occupied day).
    pub from_day: NaiveDate,

    /// Checkout date; the booking occupies `[from_day, to_day)`, so this day
    /// itself is not occupied.
    pub to_day: NaiveDate,

    /// Number of guests staying.
    #[validate(range(min = 1, message = "guests should be a positive number"))]
    pub guests: i32,

    /// First name of the guest making the booking.
    #[validate(length(min = 1, max = 255, message = "firstName is required"))]
    pub first_name: String,

    /// Last name of the guest making the booking.
    #[validate(length(min = 1, max = 255, message = "lastName is required"))]
    pub last_name: String,

    /// Contact email address of the guest.
    #[validate(email(message = "invalid email address"))]
    pub email: String,
}

/// A stored booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reservation {
    /// Unique identifier assigned at creation.
    pub id: Uuid,
    /// Arrival date.
    pub from_day: NaiveDate,
    /// Checkout date, not occupied.
    pub to_day: NaiveDate,
    /// Number of guests staying.
    pub guests: i32,
    /// First name of the guest.
    pub first_name: String,
    /// Last name of the guest.
    pub last_name: String,
    /// Contact email address.
    pub email: String,
}

impl Reservation {
    /// Builds a reservation from a booking request under the given id.
    pub fn from_request(id: Uuid, request: &BookingRequest) -> Self {
        Self {
            id,
            from_day: request.from_day,
            to_day: request.to_day,
            guests: request.guests,
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            email: request.email.clone(),
        }
    }

    /// Whether only contact fields differ between this reservation and the
    /// request (dates and guest count are compared by the caller).
    pub fn same_contact(&self, request: &BookingRequest) -> bool {
        self.first_name == request.first_name
            && self.last_name == request.last_name
            && self.email == request.email
    }
}

/// One ledger row: committed guest occupancy for a single calendar date.
///
/// The ledger is sparse; dates without a row have never been booked and are
/// fully free. The revision token changes on every committed write and is
/// used to detect concurrent modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayOccupancy {
    /// The calendar date this row covers. Unique within the ledger.
    pub date: NaiveDate,
    /// Total guests across all active bookings covering this date.
    pub guests: i32,
    /// Version token for optimistic-conflict detection.
    pub revision: i64,
}

/// Remaining capacity for a single calendar date, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyAvailability {
    /// The calendar date.
    pub date: NaiveDate,
    /// Guests that can still be accommodated on this date.
    pub availability: i32,
}

/// Outcome of an edit operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// The request matched the stored booking exactly; nothing was written.
    Unchanged,
    /// The booking was updated.
    Modified,
}

impl EditOutcome {
    /// Whether the edit wrote anything.
    pub fn changed(self) -> bool {
        matches!(self, EditOutcome::Modified)
    }
}

/// Errors reported by booking operations.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    /// The request violates a static business rule. Never retried.
    #[error("{0}")]
    RuleViolation(String),

    /// The requested dates cannot accommodate the requested guests.
    #[error(
        "There is no availability for the selected dates - From: {from}, To: {to} and {guests} \
         guest(s). Please try again with different dates."
    )]
    NoAvailability {
        /// Requested arrival date.
        from: NaiveDate,
        /// Requested checkout date.
        to: NaiveDate,
        /// Requested guest count.
        guests: i32,
    },

    /// No booking exists under the given id.
    #[error("Booking {0} not found.")]
    NotFound(Uuid),

    /// The booking's stay has already started; it can no longer be changed.
    #[error("It's too late to {0} this booking.")]
    Expired(&'static str),

    /// The ledger kept changing underneath the operation and every retry
    /// attempt conflicted. The caller may simply resubmit.
    #[error("The booking could not be completed due to concurrent updates. Please try again.")]
    ConcurrentModification,

    /// The underlying store failed.
    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),
}
