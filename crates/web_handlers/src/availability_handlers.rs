use actix_web::{HttpResponse, Result, web};

use booking_services::service::BookingService;

use crate::types::{ApiError, AvailabilityQuery};

/// Reports remaining capacity per day over the requested range, or over the
/// whole bookable window when no range is given.
pub async fn get_availability(
    service: web::Data<BookingService>,
    query: web::Query<AvailabilityQuery>,
) -> Result<HttpResponse, ApiError> {
    let calendar = service.availability(query.from, query.to).await?;
    Ok(HttpResponse::Ok().json(calendar))
}
