use crate::error::{ModelError, ModelResult};
use crate::types::{FeatureRow, PatientRecord, PredictionResult};

/// A loaded binary classifier.
///
/// Implementations are immutable once built: both methods take `&self` and
/// may be called from any number of threads at once.
pub trait Classifier: Send + Sync {
    /// Probability of the positive class for a single row.
    fn predict_proba(&self, row: &FeatureRow) -> ModelResult<f64>;

    /// Hard label for a single row.
    fn predict(&self, row: &FeatureRow) -> ModelResult<i64>;

    /// Short description of the backing model, for diagnostics.
    fn describe(&self) -> String {
        "classifier".to_string()
    }
}

/// Scores one patient.
///
/// Probability and label come from two independent calls into the model and
/// are reported as the model gives them, without reconciling one against the
/// other. Values outside `[0, 1]` or labels other than 0/1 are errors.
pub fn predict<C>(model: &C, record: &PatientRecord) -> ModelResult<PredictionResult>
where
    C: Classifier + ?Sized,
{
    let row = record.to_row();

    let probability = model.predict_proba(&row)?;
    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        return Err(ModelError::InvalidOutput(format!(
            "probability {probability} is outside [0, 1]"
        )));
    }

    let label = model.predict(&row)?;
    if label != 0 && label != 1 {
        return Err(ModelError::InvalidOutput(format!(
            "label {label} is not a binary class"
        )));
    }

    Ok(PredictionResult { probability, label })
}
