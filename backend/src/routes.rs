use actix_cors::Cors;
use actix_web::http::Uri;
use actix_web::{web, HttpResponse};
use heart_inference::{PatientRecord, PredictionResult, FEATURE_NAMES};
use log::{debug, error, warn};

use crate::error::{json_error_handler, ApiError};
use crate::inference::SharedModel;
use crate::models::{HealthResponse, ModelInfo};

const JSON_LIMIT: usize = 64 * 1024;

/// Registers the routes and the JSON extractor settings.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(JSON_LIMIT)
            .error_handler(json_error_handler),
    )
    .route("/predict", web::post().to(predict))
    .route("/health", web::get().to(health))
    .route("/model-info", web::get().to(model_info));
}

/// Cross-origin policy: only the listed origins, with credentials, any method and header.
pub fn cors(allowed_origins: &[String]) -> Cors {
    let mut cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
        .max_age(3600);

    for origin in allowed_origins {
        if origin == "*" || origin.parse::<Uri>().is_err() {
            warn!("ignoring invalid CORS origin {:?}", origin);
            continue;
        }
        cors = cors.allowed_origin(origin);
    }

    cors
}

async fn predict(
    model: SharedModel,
    record: web::Json<PatientRecord>,
) -> Result<web::Json<PredictionResult>, ApiError> {
    let record = record.into_inner();
    let model = model.into_inner();

    let result = web::block(move || heart_inference::predict(model.as_ref(), &record))
        .await
        .map_err(|e| {
            error!("prediction task failed to run: {}", e);
            ApiError::Cancelled
        })?
        .map_err(|e| {
            error!("prediction failed: {}", e);
            ApiError::from(e)
        })?;

    debug!(
        "prediction: probability={:.3} label={}",
        result.probability, result.label
    );
    Ok(web::Json(result))
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ready".to_string(),
    })
}

async fn model_info(model: SharedModel) -> HttpResponse {
    HttpResponse::Ok().json(ModelInfo {
        backend: model.describe(),
        features: FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
        positive_class: 1,
    })
}
