use std::collections::BTreeMap;

use chrono::{Days, Months, NaiveDate};

use crate::config::BookingRules;
use crate::types::BookingError;

/// Validates prospective bookings against the campsite's business rules and
/// against current ledger occupancy.
///
/// Rule checks run in a fixed order and the first failure wins.
pub struct BookingValidator {
    rules: BookingRules,
}

impl BookingValidator {
    /// Creates a validator for the given rules.
    pub fn new(rules: BookingRules) -> Self {
        Self { rules }
    }

    /// Checks a full booking request: date rules, then the guest-count limit.
    ///
    /// This does not consult the ledger; capacity is checked separately with
    /// [`check_capacity`](Self::check_capacity) against a consistent snapshot.
    pub fn validate_request(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        guests: i32,
        is_new_booking: bool,
        today: NaiveDate,
    ) -> Result<(), BookingError> {
        self.validate_dates(from, to, is_new_booking, today)?;
        self.validate_guests(guests)
    }

    /// Checks the date rules: lead time, booking horizon, date ordering, and
    /// (for new bookings) maximum stay length.
    pub fn validate_dates(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        is_new_booking: bool,
        today: NaiveDate,
    ) -> Result<(), BookingError> {
        if from < today {
            return Err(BookingError::RuleViolation(
                "Checkin date is a past day.".to_string(),
            ));
        }

        if from < today + Days::new(u64::from(self.rules.min_days_ahead_of_arrival)) {
            return Err(BookingError::RuleViolation(format!(
                "The campsite can be reserved minimum {} day(s) ahead of arrival.",
                self.rules.min_days_ahead_of_arrival
            )));
        }

        if today + Months::new(self.rules.months_up_to_booking) < from {
            return Err(BookingError::RuleViolation(format!(
                "The campsite can be reserved up to {} month(s) in advance. Please try again \
                 with closer dates.",
                self.rules.months_up_to_booking
            )));
        }

        if to <= from {
            return Err(BookingError::RuleViolation(
                "Checkin date should be prior to checkout date.".to_string(),
            ));
        }

        if is_new_booking && from + Days::new(u64::from(self.rules.max_booking_days)) < to {
            return Err(BookingError::RuleViolation(format!(
                "The campsite can be reserved for max {} days.",
                self.rules.max_booking_days
            )));
        }

        Ok(())
    }

    /// Checks the guest count against the campsite's maximum capacity.
    pub fn validate_guests(&self, guests: i32) -> Result<(), BookingError> {
        if guests > self.rules.max_capacity {
            return Err(BookingError::RuleViolation(format!(
                "The maximum capacity for the campsite is {}. Please try again with fewer guests.",
                self.rules.max_capacity
            )));
        }
        if guests < 1 {
            return Err(BookingError::RuleViolation(
                "Guests should be a positive number.".to_string(),
            ));
        }
        Ok(())
    }

    /// Rejects edits and cancellations of a booking whose stay has already
    /// started.
    pub fn validate_not_past(
        &self,
        from: NaiveDate,
        operation: &'static str,
        today: NaiveDate,
    ) -> Result<(), BookingError> {
        if from < today {
            return Err(BookingError::Expired(operation));
        }
        Ok(())
    }

    /// Checks that every date in `[from, to)` can take `guests` more guests
    /// given the supplied occupancy view.
    ///
    /// `occupancy` holds occupied guests per date; dates absent from it are
    /// fully free. The caller is responsible for deriving the view from the
    /// same snapshot the subsequent mutation will write, so that a stale read
    /// is caught as a commit conflict rather than an overcommit.
    pub fn check_capacity(
        &self,
        occupancy: &BTreeMap<NaiveDate, i32>,
        from: NaiveDate,
        to: NaiveDate,
        guests: i32,
    ) -> Result<(), BookingError> {
        let overcommitted = occupancy
            .range(from..to)
            .any(|(_, occupied)| occupied + guests > self.rules.max_capacity);
        if overcommitted {
            return Err(BookingError::NoAvailability { from, to, guests });
        }
        Ok(())
    }
}
