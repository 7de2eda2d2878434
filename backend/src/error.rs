use actix_web::error::JsonPayloadError;
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use heart_inference::ModelError;
use serde_json::error::Category;
use thiserror::Error;

use crate::models::ErrorBody;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The body is JSON but does not describe a valid patient record.
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    MalformedBody(String),

    #[error("request body must be application/json")]
    UnsupportedMediaType,

    #[error(transparent)]
    Prediction(#[from] ModelError),

    #[error("prediction task was cancelled")]
    Cancelled,
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "invalid_input",
            ApiError::MalformedBody(_) => "malformed_body",
            ApiError::UnsupportedMediaType => "unsupported_media_type",
            ApiError::Prediction(_) | ApiError::Cancelled => "prediction_failed",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ApiError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Prediction(_) | ApiError::Cancelled => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody::new(self.kind(), self.to_string()))
    }
}

impl From<JsonPayloadError> for ApiError {
    fn from(err: JsonPayloadError) -> Self {
        match err {
            JsonPayloadError::ContentType => ApiError::UnsupportedMediaType,
            JsonPayloadError::Deserialize(e) if e.classify() == Category::Data => {
                ApiError::InvalidInput(e.to_string())
            }
            other => ApiError::MalformedBody(other.to_string()),
        }
    }
}

/// Routes JSON extractor failures through [`ApiError`] so clients get the same body shape.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    log::debug!("rejected request body: {}", err);
    ApiError::from(err).into()
}
