//! Main entry point for the campsite booking server.
//! This crate wires the database, the booking service, and the REST API.

use std::sync::Arc;

use actix_web::{App, HttpResponse, HttpServer, middleware::Logger, web};
use booking_services::config::BookingRules;
use booking_services::service::BookingService;
use postgres::database::*;
use postgres::store::PgBookingStore;
use web_handlers::*;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    log::info!("🚀 Starting campsite booking server...");

    // Create database connection pool
    let pool = match create_connection_pool().await {
        Ok(pool) => {
            log::info!("🗃️ Database pool created successfully");

            if let Err(e) = test_connection(&pool).await {
                log::error!("❌ Database connection test failed: {}", e);
            }
            pool
        }
        Err(e) => {
            log::error!("❌ Failed to create database pool: {}", e);
            log::error!("💡 Make sure PostgreSQL is running and DATABASE_URL is set");
            std::process::exit(1);
        }
    };

    if let Err(e) = ensure_schema(&pool).await {
        log::error!("❌ Failed to create booking tables: {}", e);
        std::process::exit(1);
    }

    let rules = BookingRules::from_env();
    log::info!(
        "🏕️ Campsite rules: capacity {}, {} day(s) lead time, {} month(s) horizon, {} day stays",
        rules.max_capacity,
        rules.min_days_ahead_of_arrival,
        rules.months_up_to_booking,
        rules.max_booking_days
    );

    let service = web::Data::new(BookingService::new(
        Arc::new(PgBookingStore::new(pool)),
        rules,
    ));

    log::info!("🌐 Server will be available at: http://0.0.0.0:8080");

    HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .wrap(Logger::default())
            .service(
                web::scope("/api")
                    .route("/availability", web::get().to(get_availability))
                    .service(
                        web::scope("/bookings")
                            .route("", web::post().to(create_booking))
                            .route("/{booking_id}", web::get().to(get_booking))
                            .route("/{booking_id}", web::put().to(edit_booking))
                            .route("/{booking_id}", web::delete().to(cancel_booking)),
                    ),
            )
            .route(
                "/health",
                web::get().to(|| async { HttpResponse::Ok().body("OK") }),
            )
    })
    .bind("0.0.0.0:8080")?
    .run()
    .await
}
