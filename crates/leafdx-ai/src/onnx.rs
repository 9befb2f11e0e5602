//! ONNX Runtime classifier backend.
//!
//! Loads an image classifier exported to ONNX (the Keras model is converted
//! offline) and runs a single-image forward pass.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor as OrtTensor;
use tracing::{debug, info};

use crate::classifier::{Classify, into_distribution};
use crate::error::{InferenceError, ModelLoadError};
use crate::preprocess::Tensor;

/// Image classifier backed by an ONNX Runtime session.
///
/// `Session::run` needs exclusive access, so the session sits behind a
/// mutex; concurrent requests are serialised on the forward pass.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_shape: [usize; 4],
    num_classes: usize,
}

impl OnnxClassifier {
    /// Load a classifier and determine its output dimension.
    ///
    /// The declared input shape must agree with `input_shape` on every static
    /// axis. The output dimension comes from the declared output shape; if that
    /// is dynamic, one pass over a zero tensor of `input_shape` decides it.
    pub fn load(model_path: &Path, input_shape: [usize; 4]) -> Result<Self, ModelLoadError> {
        if !model_path.exists() {
            return Err(ModelLoadError::ArtifactNotFound(model_path.to_path_buf()));
        }

        let session = Session::builder()?.commit_from_file(model_path)?;
        if let Some(dims) = session.inputs().first().and_then(|i| tensor_dims(i.dtype())) {
            if !input_shape_matches(&dims, input_shape) {
                return Err(ModelLoadError::InputShape {
                    expected: input_shape,
                    declared: dims,
                });
            }
        }
        let declared = session
            .outputs()
            .first()
            .and_then(|output| infer_dim(output.dtype()));

        let mut classifier = Self {
            session: Mutex::new(session),
            input_shape,
            num_classes: 0,
        };

        classifier.num_classes = match declared {
            Some(dim) => dim,
            None => {
                debug!("output dimension is dynamic; running a zero-input pass");
                classifier
                    .run(&Tensor::zeros(input_shape))
                    .map_err(|e| ModelLoadError::UnknownOutputDim(e.to_string()))?
                    .len()
            }
        };

        if classifier.num_classes == 0 {
            return Err(ModelLoadError::UnknownOutputDim(
                "model produced an empty output".to_string(),
            ));
        }

        info!(
            classes = classifier.num_classes,
            input = ?input_shape,
            model = %model_path.display(),
            "loaded classifier"
        );
        Ok(classifier)
    }

    /// Raw model output for one input tensor.
    fn run(&self, input: &Tensor) -> Result<Vec<f32>, InferenceError> {
        if input.shape() != self.input_shape {
            return Err(InferenceError::InputShape {
                expected: self.input_shape,
                actual: input.shape().to_vec(),
            });
        }

        let shape = self.input_shape.map(|d| d as i64);
        let data: Vec<f32> = input.iter().copied().collect();
        let tensor = OrtTensor::from_array((shape, data.into_boxed_slice()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::Backend("classifier session lock poisoned".into()))?;
        let outputs = session.run(ort::inputs![tensor])?;
        let (_, scores) = outputs[0].try_extract_tensor::<f32>()?;
        Ok(scores.to_vec())
    }
}

impl Classify for OnnxClassifier {
    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn infer(&self, input: &Tensor) -> Result<Vec<f32>, InferenceError> {
        let scores = self.run(input)?;
        if scores.len() != self.num_classes {
            return Err(InferenceError::OutputLength {
                expected: self.num_classes,
                actual: scores.len(),
            });
        }
        into_distribution(scores)
    }
}

/// Try to infer the class count from the ONNX model output type.
fn infer_dim(output_type: &ort::value::ValueType) -> Option<usize> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => {
            // Last dimension is the class axis.
            shape
                .last()
                .and_then(|&d| if d > 0 { Some(d as usize) } else { None })
        }
        _ => None,
    }
}

/// Declared dimensions of a tensor input or output; `None` for other types.
fn tensor_dims(value_type: &ort::value::ValueType) -> Option<Vec<i64>> {
    match value_type {
        ort::value::ValueType::Tensor { shape, .. } => Some(shape.iter().copied().collect()),
        _ => None,
    }
}

/// Same rank, and every static axis equals the expected size. Dynamic axes
/// (declared as -1 or 0) match anything.
fn input_shape_matches(declared: &[i64], expected: [usize; 4]) -> bool {
    declared.len() == expected.len()
        && declared
            .iter()
            .zip(expected)
            .all(|(&d, e)| d <= 0 || d as usize == e)
}
