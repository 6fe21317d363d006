pub mod customer_controller;

use actix_web::{web, HttpResponse};
use customer_controller::{config, create_customer, fields, health, test_connection};

/// Registers every route the bridge serves.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health))
            .route("/config", web::get().to(config))
            .route("/fields", web::get().to(fields))
            .route("/create-customer", web::post().to(create_customer))
            .route("/test", web::post().to(test_connection)),
    )
    .route(
        "/health",
        web::get().to(|| async { HttpResponse::Ok().body("Service is running") }),
    );
}
