use serde::{Deserialize, Serialize};

use crate::coerce;

/// Column names of the tabular row the classifier was trained on, in training order.
pub const FEATURE_NAMES: [&str; 13] = [
    "age", "sex", "cp", "trestbps", "chol", "fbs", "restecg", "thalach", "exang", "oldpeak",
    "slope", "ca", "thal",
];

/// One patient as submitted to `/predict`.
///
/// Every field is required. Real-valued measurements are `f64`, coded
/// categoricals are `i64`; both go through the lenient coercion in
/// [`crate::coerce`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PatientRecord {
    /// Years.
    #[serde(deserialize_with = "coerce::real")]
    pub age: f64,
    #[serde(deserialize_with = "coerce::code")]
    pub sex: i64,
    /// Chest pain type.
    #[serde(deserialize_with = "coerce::code")]
    pub cp: i64,
    /// Resting blood pressure.
    #[serde(deserialize_with = "coerce::real")]
    pub trestbps: f64,
    /// Serum cholesterol.
    #[serde(deserialize_with = "coerce::real")]
    pub chol: f64,
    /// Fasting blood sugar flag.
    #[serde(deserialize_with = "coerce::code")]
    pub fbs: i64,
    /// Resting ECG category.
    #[serde(deserialize_with = "coerce::code")]
    pub restecg: i64,
    /// Max heart rate achieved.
    #[serde(deserialize_with = "coerce::real")]
    pub thalach: f64,
    /// Exercise-induced angina flag.
    #[serde(deserialize_with = "coerce::code")]
    pub exang: i64,
    /// ST depression.
    #[serde(deserialize_with = "coerce::real")]
    pub oldpeak: f64,
    #[serde(deserialize_with = "coerce::code")]
    pub slope: i64,
    /// Number of major vessels.
    #[serde(deserialize_with = "coerce::code")]
    pub ca: i64,
    #[serde(deserialize_with = "coerce::code")]
    pub thal: i64,
}

impl PatientRecord {
    /// Builds the single named-column row handed to the classifier.
    pub fn to_row(&self) -> FeatureRow {
        use FeatureValue::{Code, Real};

        FeatureRow {
            columns: vec![
                ("age", Real(self.age)),
                ("sex", Code(self.sex)),
                ("cp", Code(self.cp)),
                ("trestbps", Real(self.trestbps)),
                ("chol", Real(self.chol)),
                ("fbs", Code(self.fbs)),
                ("restecg", Code(self.restecg)),
                ("thalach", Real(self.thalach)),
                ("exang", Code(self.exang)),
                ("oldpeak", Real(self.oldpeak)),
                ("slope", Code(self.slope)),
                ("ca", Code(self.ca)),
                ("thal", Code(self.thal)),
            ],
        }
    }
}

/// A cell of the feature row, keeping the kind the field was declared with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue {
    Real(f64),
    Code(i64),
}

impl FeatureValue {
    pub fn as_f64(self) -> f64 {
        match self {
            FeatureValue::Real(v) => v,
            FeatureValue::Code(v) => v as f64,
        }
    }

    /// Integer view of the value; `None` for a real with a fractional part
    /// or outside the i64 range.
    pub fn as_i64(self) -> Option<i64> {
        match self {
            FeatureValue::Code(v) => Some(v),
            FeatureValue::Real(v)
                if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 =>
            {
                Some(v as i64)
            }
            FeatureValue::Real(_) => None,
        }
    }
}

/// Single-row table with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    columns: Vec<(&'static str, FeatureValue)>,
}

impl FeatureRow {
    pub fn get(&self, name: &str) -> Option<FeatureValue> {
        self.columns
            .iter()
            .find(|(column, _)| *column == name)
            .map(|(_, value)| *value)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&'static str, FeatureValue)> + '_ {
        self.columns.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// What `/predict` answers with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Probability of the positive (disease present) class.
    pub probability: f64,
    /// Hard classification reported by the model.
    pub label: i64,
}
