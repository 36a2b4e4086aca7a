//! Health check endpoint.

use actix_web::HttpResponse;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub time: String,
}

/// GET /health - liveness probe.
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}
