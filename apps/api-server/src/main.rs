//! # Gatekeeper API Server
//!
//! Rate limiting microservice: clients POST a (resource, identifier) pair
//! and receive an allow/deny decision with quota metadata.

use actix_web::{web, App, HttpServer};
use tracing_actix_web::TracingLogger;

mod config;
mod handlers;
mod metrics;
mod middleware;
mod state;
mod telemetry;

use config::AppConfig;
use middleware::AppError;
use state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&telemetry::TelemetryConfig::from_env());

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "refusing to start with invalid configuration");
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, err));
        }
    };

    let state = match AppState::new(&config).await {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(%err, "failed to initialize application state");
            return Err(std::io::Error::other(err));
        }
    };

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "starting Gatekeeper API server"
    );

    let app_state = state.clone();
    let metrics_enabled = config.metrics.enabled;
    let metrics_path = config.metrics.path.clone();

    HttpServer::new(move || {
        let mut app = App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(|err, _| {
                AppError::BadRequest(err.to_string()).into()
            }))
            .configure(handlers::configure_routes);

        if metrics_enabled {
            app = app.route(&metrics_path, web::get().to(handlers::metrics::scrape));
        }

        app
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    // Actix has already drained connections on SIGINT/SIGTERM.
    state.store.close().await;
    tracing::info!("server stopped");
    Ok(())
}
