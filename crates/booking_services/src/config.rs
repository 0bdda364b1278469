/// Business rules for the campsite, injected into the services that need them.
///
/// Kept as plain values rather than process-wide globals so tests can vary
/// them per case.
#[derive(Debug, Clone, Copy)]
pub struct BookingRules {
    /// Maximum number of guests the campsite can host on any single day.
    pub max_capacity: i32,
    /// Minimum number of days between booking time and arrival.
    pub min_days_ahead_of_arrival: u32,
    /// How many months in advance the campsite can be reserved.
    pub months_up_to_booking: u32,
    /// Maximum length of a stay, in days.
    pub max_booking_days: u32,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            max_capacity: 10,
            min_days_ahead_of_arrival: 1,
            months_up_to_booking: 1,
            max_booking_days: 3,
        }
    }
}

impl BookingRules {
    /// Builds the rules from environment variables, falling back to the
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_capacity: env_or("CAMPSITE_MAX_CAPACITY", defaults.max_capacity),
            min_days_ahead_of_arrival: env_or(
                "CAMPSITE_MIN_DAYS_AHEAD_OF_ARRIVAL",
                defaults.min_days_ahead_of_arrival,
            ),
            months_up_to_booking: env_or(
                "CAMPSITE_MONTHS_UP_TO_BOOKING",
                defaults.months_up_to_booking,
            ),
            max_booking_days: env_or("CAMPSITE_MAX_BOOKING_DAYS", defaults.max_booking_days),
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
