use actix_web::{HttpResponse, Result, web};
use validator::Validate;

use booking_services::service::BookingService;
use booking_services::types::{BookingError, BookingRequest};

use crate::types::{ApiError, BookingCreatedResponse, BookingEditedResponse};

/// Books the campsite. Returns 201 with the new booking's id.
pub async fn create_booking(
    service: web::Data<BookingService>,
    request: web::Json<BookingRequest>,
) -> Result<HttpResponse, ApiError> {
    request
        .validate()
        .map_err(|e| ApiError(BookingError::RuleViolation(e.to_string())))?;

    let id = service.create(&request).await?;
    Ok(HttpResponse::Created().json(BookingCreatedResponse { id }))
}

/// Fetches a stored booking by id.
pub async fn get_booking(
    service: web::Data<BookingService>,
    path: web::Path<uuid::Uuid>,
) -> Result<HttpResponse, ApiError> {
    let reservation = service.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(reservation))
}

/// Changes a booking's dates, guest count, or contact details.
pub async fn edit_booking(
    service: web::Data<BookingService>,
    path: web::Path<uuid::Uuid>,
    request: web::Json<BookingRequest>,
) -> Result<HttpResponse, ApiError> {
    request
        .validate()
        .map_err(|e| ApiError(BookingError::RuleViolation(e.to_string())))?;

    let id = path.into_inner();
    let outcome = service.edit(id, &request).await?;
    Ok(HttpResponse::Ok().json(BookingEditedResponse {
        id,
        changed: outcome.changed(),
    }))
}

/// Cancels a booking, freeing every day it occupied.
pub async fn cancel_booking(
    service: web::Data<BookingService>,
    path: web::Path<uuid::Uuid>,
) -> Result<HttpResponse, ApiError> {
    service.cancel(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, test};
    use chrono::{Days, NaiveDate, Utc};
    use serde_json::json;

    use booking_services::config::BookingRules;
    use booking_services::storage::MemoryStore;

    use super::*;
    use crate::availability_handlers::get_availability;

    fn day(offset: u64) -> NaiveDate {
        Utc::now().date_naive() + Days::new(offset)
    }

    fn service_data() -> web::Data<BookingService> {
        let store = Arc::new(MemoryStore::new());
        web::Data::new(BookingService::new(store, BookingRules::default()))
    }

    fn booking_body(from: NaiveDate, to: NaiveDate, guests: i32) -> serde_json::Value {
        json!({
            "from_day": from,
            "to_day": to,
            "guests": guests,
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": "ada@example.com"
        })
    }

    #[actix_web::test]
    async fn booking_lifecycle_over_http() {
        let app = test::init_service(
            App::new()
                .app_data(service_data())
                .route("/bookings", web::post().to(create_booking))
                .route("/bookings/{id}", web::get().to(get_booking))
                .route("/bookings/{id}", web::put().to(edit_booking))
                .route("/bookings/{id}", web::delete().to(cancel_booking)),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/bookings")
            .set_json(booking_body(day(2), day(4), 3))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), 201);
        let created: BookingCreatedResponse = test::read_body_json(response).await;

        let request = test::TestRequest::get()
            .uri(&format!("/bookings/{}", created.id))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), 200);

        let request = test::TestRequest::put()
            .uri(&format!("/bookings/{}", created.id))
            .set_json(booking_body(day(2), day(3), 3))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), 200);
        let edited: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(edited["changed"], json!(true));

        let request = test::TestRequest::delete()
            .uri(&format!("/bookings/{}", created.id))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), 204);

        let request = test::TestRequest::get()
            .uri(&format!("/bookings/{}", created.id))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), 404);
    }

    #[actix_web::test]
    async fn rule_violations_map_to_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(service_data())
                .route("/bookings", web::post().to(create_booking)),
        )
        .await;

        // Zero guests is rejected by the request DTO itself.
        let request = test::TestRequest::post()
            .uri("/bookings")
            .set_json(booking_body(day(2), day(4), 0))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), 400);

        // A four-night stay violates the stay-length rule.
        let request = test::TestRequest::post()
            .uri("/bookings")
            .set_json(booking_body(day(2), day(6), 2))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), 400);
        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["error"], json!("rule_violation"));
    }

    #[actix_web::test]
    async fn exhausted_capacity_maps_to_conflict() {
        let service = service_data();
        let app = test::init_service(
            App::new()
                .app_data(service.clone())
                .route("/bookings", web::post().to(create_booking))
                .route("/availability", web::get().to(get_availability)),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/bookings")
            .set_json(booking_body(day(2), day(3), 10))
            .to_request();
        assert_eq!(test::call_service(&app, request).await.status(), 201);

        let request = test::TestRequest::post()
            .uri("/bookings")
            .set_json(booking_body(day(2), day(3), 1))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), 409);
        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["error"], json!("no_availability"));

        let request = test::TestRequest::get()
            .uri(&format!("/availability?from={}&to={}", day(2), day(4)))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), 200);
        let calendar: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(calendar[0]["availability"], json!(0));
        assert_eq!(calendar[1]["availability"], json!(10));
    }
}
