//! Rate limit check, status, and reset endpoints.

use std::time::Instant;

use actix_web::{web, HttpResponse};
use chrono::SecondsFormat;
use serde::Deserialize;

use gatekeeper_core::dispatch::resource_prefix;
use gatekeeper_core::domain::Algorithm;
use gatekeeper_core::ports::Decision;
use gatekeeper_shared::dto::{CheckRequest, CheckResponse, MessageResponse};

use crate::middleware::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AlgorithmQuery {
    pub algorithm: Option<String>,
}

fn parse_algorithm(raw: Option<&str>) -> AppResult<Option<Algorithm>> {
    match raw {
        None | Some("") => Ok(None),
        Some(name) => name
            .parse()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("unknown algorithm: {name}"))),
    }
}

fn to_response(decision: &Decision) -> CheckResponse {
    CheckResponse {
        allowed: decision.allowed,
        limit: decision.info.limit,
        remaining: decision.info.remaining,
        reset_at: decision
            .info
            .reset_at
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        // Rounded up so a caller that waits the advertised time will succeed.
        retry_after: decision
            .info
            .retry_after
            .map(|d| d.as_secs_f64().ceil() as u64),
    }
}

/// POST /v1/check - decide whether the request is allowed.
pub async fn check(
    state: web::Data<AppState>,
    body: web::Json<CheckRequest>,
) -> AppResult<HttpResponse> {
    let started = Instant::now();
    let req = body.into_inner();

    if req.resource.is_empty() {
        return Err(AppError::BadRequest("resource is required".to_string()));
    }
    if req.identifier.is_empty() {
        return Err(AppError::BadRequest("identifier is required".to_string()));
    }

    let count = match req.count {
        None => 1,
        Some(c) if c < 0 => {
            return Err(AppError::BadRequest("count must not be negative".to_string()))
        }
        Some(c) => u32::try_from(c)
            .map_err(|_| AppError::BadRequest("count is too large".to_string()))?,
    };

    let algorithm = parse_algorithm(req.algorithm.as_deref())?;
    let key = format!("{}:{}", req.identifier, req.resource);

    let (algorithm, decision) = state.dispatcher.decide(algorithm, &key, count).await?;

    state.metrics.record_request(
        algorithm.as_str(),
        resource_prefix(&req.resource),
        decision.allowed,
        started.elapsed().as_secs_f64(),
    );

    let response = to_response(&decision);
    let mut builder = if decision.allowed {
        HttpResponse::Ok()
    } else {
        HttpResponse::TooManyRequests()
    };

    builder
        .insert_header(("X-RateLimit-Limit", decision.info.limit.to_string()))
        .insert_header(("X-RateLimit-Remaining", decision.info.remaining.to_string()))
        .insert_header(("X-RateLimit-Reset", decision.info.reset_at.timestamp().to_string()));

    if let Some(retry_after) = response.retry_after {
        builder.insert_header(("Retry-After", retry_after.to_string()));
    }

    Ok(builder.json(response))
}

/// GET /v1/status/{key} - report headroom without consuming budget.
pub async fn status(
    state: web::Data<AppState>,
    key: web::Path<String>,
    query: web::Query<AlgorithmQuery>,
) -> AppResult<HttpResponse> {
    let algorithm = parse_algorithm(query.algorithm.as_deref())?;
    let (_, decision) = state.dispatcher.status(algorithm, &key).await?;

    Ok(HttpResponse::Ok().json(to_response(&decision)))
}

/// POST /v1/reset/{key} - return a key to cold state.
pub async fn reset(
    state: web::Data<AppState>,
    key: web::Path<String>,
    query: web::Query<AlgorithmQuery>,
) -> AppResult<HttpResponse> {
    let algorithm = parse_algorithm(query.algorithm.as_deref())?;
    state.dispatcher.reset(algorithm, &key).await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "rate limit reset successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::handlers::configure_routes;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::json;

    async fn test_state(requests: u32) -> AppState {
        let mut config = AppConfig::default();
        config.limits.default.requests = requests;
        config.limits.default.window_secs = 60;
        AppState::new(&config).await.unwrap()
    }

    macro_rules! test_app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state))
                    .configure(configure_routes),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn check_allows_and_sets_quota_headers() {
        let app = test_app!(test_state(2).await);

        let req = test::TestRequest::post()
            .uri("/v1/check")
            .set_json(json!({"resource": "api.users", "identifier": "alice"}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let headers = resp.headers();
        assert_eq!(headers.get("X-RateLimit-Limit").unwrap(), "2");
        assert_eq!(headers.get("X-RateLimit-Remaining").unwrap(), "1");
        assert!(headers.contains_key("X-RateLimit-Reset"));

        let body: CheckResponse = test::read_body_json(resp).await;
        assert!(body.allowed);
        assert_eq!(body.limit, 2);
        assert_eq!(body.remaining, 1);
        assert_eq!(body.retry_after, None);
    }

    #[actix_web::test]
    async fn check_denies_with_429_and_retry_after() {
        let app = test_app!(test_state(1).await);
        let payload = json!({"resource": "api.users", "identifier": "alice"});

        let req = test::TestRequest::post()
            .uri("/v1/check")
            .set_json(&payload)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::post()
            .uri("/v1/check")
            .set_json(&payload)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(resp.headers().contains_key("Retry-After"));

        let body: CheckResponse = test::read_body_json(resp).await;
        assert!(!body.allowed);
        assert!(body.retry_after.is_some());
    }

    #[actix_web::test]
    async fn unknown_algorithm_is_a_bad_request() {
        let app = test_app!(test_state(10).await);

        let req = test::TestRequest::post()
            .uri("/v1/check")
            .set_json(json!({
                "resource": "api.users",
                "identifier": "alice",
                "algorithm": "leaky_bucket"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn negative_count_is_a_bad_request() {
        let app = test_app!(test_state(10).await);

        let req = test::TestRequest::post()
            .uri("/v1/check")
            .set_json(json!({
                "resource": "api.users",
                "identifier": "alice",
                "count": -1
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn explicit_algorithm_overrides_the_default() {
        let app = test_app!(test_state(3).await);

        let req = test::TestRequest::post()
            .uri("/v1/check")
            .set_json(json!({
                "resource": "api.users",
                "identifier": "alice",
                "algorithm": "fixed_window"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: CheckResponse = test::read_body_json(resp).await;
        assert_eq!(body.remaining, 2);
    }

    #[actix_web::test]
    async fn status_probe_does_not_consume_budget() {
        let app = test_app!(test_state(5).await);

        let req = test::TestRequest::post()
            .uri("/v1/check")
            .set_json(json!({"resource": "api.users", "identifier": "alice"}))
            .to_request();
        test::call_service(&app, req).await;

        for _ in 0..2 {
            let req = test::TestRequest::get()
                .uri("/v1/status/alice:api.users")
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);

            let body: CheckResponse = test::read_body_json(resp).await;
            assert!(body.allowed);
            assert_eq!(body.remaining, 4);
        }
    }

    #[actix_web::test]
    async fn reset_restores_a_drained_key() {
        let app = test_app!(test_state(1).await);
        let payload = json!({"resource": "api.users", "identifier": "alice"});

        let req = test::TestRequest::post()
            .uri("/v1/check")
            .set_json(&payload)
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::post()
            .uri("/v1/reset/alice:api.users")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::post()
            .uri("/v1/check")
            .set_json(&payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn resetting_an_unseen_key_succeeds() {
        let app = test_app!(test_state(1).await);

        let req = test::TestRequest::post()
            .uri("/v1/reset/ghost:api.users")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn health_reports_status_and_time() {
        let app = test_app!(test_state(1).await);

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "healthy");
        assert!(body["time"].is_string());
    }
}
