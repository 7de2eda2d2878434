use std::path::Path;
use std::sync::Arc;

use actix_web::web;
use heart_inference::{Classifier, ModelResult, OnnxClassifier};
use log::info;

/// Handle to the classifier shared by every worker.
pub type SharedModel = web::Data<dyn Classifier>;

/// Loads the artifact once at startup. Any error here must stop the process.
pub fn load_model(path: &Path) -> ModelResult<SharedModel> {
    info!("loading model artifact from {}", path.display());
    let model = OnnxClassifier::load(path)?;
    info!("✅ model ready: {}", model.describe());
    Ok(shared(Arc::new(model)))
}

pub fn shared(model: Arc<dyn Classifier>) -> SharedModel {
    web::Data::from(model)
}
