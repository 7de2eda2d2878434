use std::path::{Path, PathBuf};

use tract_onnx::prelude::*;
use tract_onnx::tract_hir::infer::Factoid;

use crate::error::{ModelError, ModelResult};
use crate::inference::Classifier;
use crate::types::{FeatureRow, FeatureValue, FEATURE_NAMES};

const LABEL_OUTPUT: &str = "label";
const PROBABILITY_OUTPUT: &str = "probabilities";

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// How the row is laid out on the graph inputs.
#[derive(Debug, Clone)]
enum InputLayout {
    /// One `[1, 1]` input per feature, matched by input name.
    Columns(Vec<(String, DatumType)>),
    /// A single `[1, 13]` f32 matrix in `FEATURE_NAMES` order.
    Matrix,
}

/// Classifier backed by an ONNX graph, typically a scikit-learn pipeline
/// exported with `skl2onnx` (zipmap disabled).
#[derive(Clone)]
pub struct OnnxClassifier {
    plan: Plan,
    layout: InputLayout,
    label_output: usize,
    probability_output: usize,
    path: PathBuf,
}

impl OnnxClassifier {
    pub fn load<P: AsRef<Path>>(model_path: P) -> ModelResult<Self> {
        let path = model_path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(ModelError::Missing(path));
        }

        let load_err = |source: anyhow::Error| ModelError::Load {
            path: path.clone(),
            source,
        };

        let mut model = tract_onnx::onnx().model_for_path(&path).map_err(load_err)?;

        let layout = input_layout(&model)?;
        match &layout {
            InputLayout::Columns(columns) => {
                for (ix, (_, datum_type)) in columns.iter().enumerate() {
                    model = model
                        .with_input_fact(ix, InferenceFact::dt_shape(*datum_type, tvec!(1, 1)))
                        .map_err(load_err)?;
                }
            }
            InputLayout::Matrix => {
                model = model
                    .with_input_fact(
                        0,
                        InferenceFact::dt_shape(f32::datum_type(), tvec!(1, FEATURE_NAMES.len())),
                    )
                    .map_err(load_err)?;
            }
        }

        let (label_output, probability_output) = output_indices(&model)?;

        let plan = model
            .into_optimized()
            .and_then(|optimized| optimized.into_runnable())
            .map_err(load_err)?;

        Ok(Self {
            plan,
            layout,
            label_output,
            probability_output,
            path,
        })
    }

    fn inputs(&self, row: &FeatureRow) -> ModelResult<TVec<TValue>> {
        match &self.layout {
            InputLayout::Columns(columns) => columns
                .iter()
                .map(|(name, datum_type)| {
                    let value = row.get(name).ok_or_else(|| {
                        ModelError::Contract(format!("row has no column named `{name}`"))
                    })?;
                    column_tensor(name, value, *datum_type).map(TValue::from)
                })
                .collect(),
            InputLayout::Matrix => {
                let features = FEATURE_NAMES
                    .iter()
                    .map(|name| {
                        row.get(name).map(|v| v.as_f64() as f32).ok_or_else(|| {
                            ModelError::Contract(format!("row has no column named `{name}`"))
                        })
                    })
                    .collect::<ModelResult<Vec<f32>>>()?;
                let tensor = Tensor::from_shape(&[1, features.len()], features.as_slice())
                    .map_err(ModelError::Inference)?;
                Ok(tvec!(tensor.into()))
            }
        }
    }

    fn run(&self, row: &FeatureRow) -> ModelResult<TVec<TValue>> {
        let inputs = self.inputs(row)?;
        self.plan.run(inputs).map_err(ModelError::Inference)
    }
}

impl Classifier for OnnxClassifier {
    fn predict_proba(&self, row: &FeatureRow) -> ModelResult<f64> {
        let outputs = self.run(row)?;
        let probabilities = outputs[self.probability_output]
            .cast_to::<f32>()
            .map_err(ModelError::Inference)?;
        let probabilities = probabilities.as_slice::<f32>().map_err(ModelError::Inference)?;

        match probabilities {
            [_, positive] => Ok(f64::from(*positive)),
            other => Err(ModelError::InvalidOutput(format!(
                "expected 2 class probabilities for one row, got {}",
                other.len()
            ))),
        }
    }

    fn predict(&self, row: &FeatureRow) -> ModelResult<i64> {
        let outputs = self.run(row)?;
        let labels = outputs[self.label_output]
            .cast_to::<i64>()
            .map_err(ModelError::Inference)?;
        let labels = labels.as_slice::<i64>().map_err(ModelError::Inference)?;

        labels
            .first()
            .copied()
            .ok_or_else(|| ModelError::InvalidOutput("empty label output".to_string()))
    }

    fn describe(&self) -> String {
        format!("onnx ({})", self.path.display())
    }
}

fn column_tensor(name: &str, value: FeatureValue, datum_type: DatumType) -> ModelResult<Tensor> {
    let tensor = match datum_type {
        DatumType::I64 => {
            let code = value.as_i64().ok_or_else(|| {
                ModelError::Contract(format!(
                    "input `{name}` is int64 but the value {} is not an integer",
                    value.as_f64()
                ))
            })?;
            Tensor::from_shape(&[1, 1], &[code])
        }
        DatumType::F64 => Tensor::from_shape(&[1, 1], &[value.as_f64()]),
        _ => Tensor::from_shape(&[1, 1], &[value.as_f64() as f32]),
    };
    tensor.map_err(ModelError::Inference)
}

fn input_layout(model: &InferenceModel) -> ModelResult<InputLayout> {
    let outlets = model
        .input_outlets()
        .map_err(|e| ModelError::Contract(e.to_string()))?;

    if outlets.len() == 1 {
        return Ok(InputLayout::Matrix);
    }

    if outlets.len() != FEATURE_NAMES.len() {
        return Err(ModelError::Contract(format!(
            "expected 1 or {} inputs, found {}",
            FEATURE_NAMES.len(),
            outlets.len()
        )));
    }

    let mut columns: Vec<(String, DatumType)> = Vec::with_capacity(outlets.len());
    for (ix, outlet) in outlets.iter().enumerate() {
        let name = model.node(outlet.node).name.clone();
        if !FEATURE_NAMES.contains(&name.as_str()) {
            return Err(ModelError::Contract(format!("unknown input column `{name}`")));
        }
        if columns.iter().any(|(seen, _)| *seen == name) {
            return Err(ModelError::Contract(format!("duplicate input column `{name}`")));
        }
        let datum_type = model
            .input_fact(ix)
            .ok()
            .and_then(|fact| fact.datum_type.concretize())
            .unwrap_or(DatumType::F32);
        columns.push((name, datum_type));
    }

    Ok(InputLayout::Columns(columns))
}

fn output_indices(model: &InferenceModel) -> ModelResult<(usize, usize)> {
    let outlets = model
        .output_outlets()
        .map_err(|e| ModelError::Contract(e.to_string()))?;

    if outlets.len() < 2 {
        return Err(ModelError::Contract(format!(
            "expected a label and a probability output, found {} output(s)",
            outlets.len()
        )));
    }

    let named = |wanted: &str| {
        outlets.iter().position(|outlet| {
            model.outlet_label(*outlet) == Some(wanted) || model.node(outlet.node).name == wanted
        })
    };

    let label = named(LABEL_OUTPUT).unwrap_or(0);
    let probability = named(PROBABILITY_OUTPUT).unwrap_or(1);
    if label == probability {
        return Err(ModelError::Contract(
            "label and probability resolve to the same output".to_string(),
        ));
    }

    Ok((label, probability))
}
