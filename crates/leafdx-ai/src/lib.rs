//! Inference layer: image preprocessing, the classifier seam (ONNX Runtime
//! behind the `onnx` feature) and the diagnosis pipeline.

pub mod classifier;
pub mod context;
mod error;
pub mod labels;
pub mod preprocess;
pub mod service;

pub use classifier::{Classify, argmax, confidence_percent};
pub use context::{
    DEFAULT_LABELS_PATH, DEFAULT_MODEL_PATH, InferenceContext, ModelConfig, check_advisories,
};
pub use error::{DecodeError, ErrorKind, InferenceError, ModelLoadError, PredictError};
pub use labels::LabelSet;
pub use preprocess::{ImagePreprocessor, TensorLayout};
pub use service::{DiagnosisService, PredictionResult};

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use onnx::OnnxClassifier;
