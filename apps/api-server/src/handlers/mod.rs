//! API route handlers.

mod health;
pub mod metrics;
mod rate_limit;

use actix_web::web;

/// Configure all API routes. The metrics route is registered separately in
/// `main` because its path comes from configuration.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/v1")
            .route("/check", web::post().to(rate_limit::check))
            .route("/status/{key}", web::get().to(rate_limit::status))
            .route("/reset/{key}", web::post().to(rate_limit::reset)),
    )
    .route("/health", web::get().to(health::health_check));
}
