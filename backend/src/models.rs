use serde::{Deserialize, Serialize};

/// Body of every error response produced by the service.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
    pub timestamp: String,
}

impl ErrorBody {
    pub fn new(error: &str, detail: impl Into<String>) -> Self {
        ErrorBody {
            error: error.to_string(),
            detail: detail.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub backend: String,
    pub features: Vec<String>,
    pub positive_class: i64,
}
