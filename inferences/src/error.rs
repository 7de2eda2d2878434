use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model artifact not found at {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to load model artifact {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The artifact loaded but its inputs or outputs are not the ones this service feeds.
    #[error("model artifact does not match the expected contract: {0}")]
    Contract(String),

    #[error("model evaluation failed: {0}")]
    Inference(#[source] anyhow::Error),

    #[error("model returned an invalid output: {0}")]
    InvalidOutput(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
