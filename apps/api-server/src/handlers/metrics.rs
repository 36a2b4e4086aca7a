//! Prometheus scrape endpoint.

use actix_web::{web, HttpResponse};

use crate::middleware::{AppError, AppResult};
use crate::state::AppState;

/// GET on the configured metrics path.
pub async fn scrape(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4; charset=utf-8")
        .body(body))
}
