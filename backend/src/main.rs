use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{App, HttpServer};
use anyhow::Context;
use log::{error, info};

use heart_api::config::ServiceConfig;
use heart_api::{inference, routes};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .format_module_path(false)
        .init();

    info!("🚀 starting heart disease prediction API");

    let config = ServiceConfig::from_env();

    // No model, no server.
    let model = match inference::load_model(&config.model_path) {
        Ok(model) => model,
        Err(e) => {
            error!("❌ {}", e);
            return Err(e).context("model artifact could not be loaded");
        }
    };

    let bind_address = config.bind_address();
    info!("🌐 listening on http://{}", bind_address);
    info!("👷 workers: {}", config.workers);
    if config.allowed_origins.is_empty() {
        info!("CORS: no cross-origin callers allowed");
    } else {
        info!("CORS: allowed origins {:?}", config.allowed_origins);
    }
    info!("   POST /predict     - score one patient");
    info!("   GET  /health      - readiness");
    info!("   GET  /model-info  - model description");

    let allowed_origins = config.allowed_origins.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(DefaultHeaders::new().add(("X-Content-Type-Options", "nosniff")))
            .wrap(routes::cors(&allowed_origins))
            .app_data(model.clone())
            .configure(routes::configure)
    })
    .workers(config.workers)
    .bind(&bind_address)
    .with_context(|| format!("failed to bind {}", bind_address))?
    .run()
    .await
    .context("server terminated abnormally")
}
