use actix_web::HttpResponse;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use booking_services::types::BookingError;

/// Query parameters for the availability endpoint. Both bounds are optional;
/// missing bounds default to the bookable window.
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    /// First date of interest.
    pub from: Option<NaiveDate>,
    /// First date past the range of interest.
    pub to: Option<NaiveDate>,
}

/// Response body for a successfully created booking.
#[derive(Debug, Serialize, Deserialize)]
pub struct BookingCreatedResponse {
    /// Identifier of the new booking.
    pub id: Uuid,
}

/// Response body for an edit.
#[derive(Debug, Serialize)]
pub struct BookingEditedResponse {
    /// Identifier of the booking.
    pub id: Uuid,
    /// Whether the edit changed anything.
    pub changed: bool,
}

/// HTTP-facing wrapper around [`BookingError`].
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub BookingError);

impl actix_web::ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        match &self.0 {
            BookingError::RuleViolation(message) => {
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "rule_violation",
                    "message": message
                }))
            }
            BookingError::NoAvailability { .. } => {
                HttpResponse::Conflict().json(serde_json::json!({
                    "error": "no_availability",
                    "message": self.0.to_string()
                }))
            }
            BookingError::NotFound(_) => HttpResponse::NotFound().json(serde_json::json!({
                "error": "booking_not_found",
                "message": self.0.to_string()
            })),
            BookingError::Expired(_) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "booking_expired",
                "message": self.0.to_string()
            })),
            BookingError::ConcurrentModification => {
                HttpResponse::Conflict().json(serde_json::json!({
                    "error": "concurrent_modification",
                    "message": self.0.to_string()
                }))
            }
            BookingError::Storage(source) => {
                log::error!("storage failure: {source:#}");
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "internal_error",
                    "message": "An internal error occurred"
                }))
            }
        }
    }
}
