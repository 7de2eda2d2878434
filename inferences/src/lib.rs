//! Heart disease classifier: patient record types, the [`Classifier`] seam
//! and the ONNX-backed implementation loaded from the model artifact.

pub mod coerce;
pub mod error;
pub mod inference;
pub mod onnx;
pub mod types;

pub use error::{ModelError, ModelResult};
pub use inference::{predict, Classifier};
pub use onnx::OnnxClassifier;
pub use types::{FeatureRow, FeatureValue, PatientRecord, PredictionResult, FEATURE_NAMES};
