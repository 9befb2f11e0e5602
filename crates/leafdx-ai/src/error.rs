use std::path::PathBuf;

use leafdx_core::KnowledgeError;
use thiserror::Error;

/// Fatal startup failure: the service must not accept requests.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model artifact not found: {0:?}")]
    ArtifactNotFound(PathBuf),

    #[error("label list not found: {0:?}")]
    LabelsNotFound(PathBuf),

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed label list: {0}")]
    MalformedLabels(String),

    #[error("label list is empty")]
    EmptyLabels,

    #[error("duplicate label {label:?} at positions {first} and {second}")]
    DuplicateLabel {
        label: String,
        first: usize,
        second: usize,
    },

    #[cfg(feature = "onnx")]
    #[error("onnx runtime error: {0}")]
    Onnx(#[from] ort::Error),

    #[error("model declares input shape {declared:?}, preprocessing produces {expected:?}")]
    InputShape {
        expected: [usize; 4],
        declared: Vec<i64>,
    },

    #[error("could not determine classifier output dimension: {0}")]
    UnknownOutputDim(String),

    #[error("label list has {labels} entries but classifier outputs {outputs} classes")]
    DimensionMismatch { labels: usize, outputs: usize },

    #[error("advisory data: {0}")]
    KnowledgeBase(#[from] KnowledgeError),

    #[error("no advisory for labels: {}", .0.join(", "))]
    AdvisoryCoverage(Vec<String>),
}

impl ModelLoadError {
    /// True when an artifact file is simply absent, as opposed to present but unusable.
    pub fn is_missing_artifact(&self) -> bool {
        matches!(self, Self::ArtifactNotFound(_) | Self::LabelsNotFound(_))
    }
}

/// Caller-supplied bytes are not a decodable image.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("image is empty")]
    Empty,

    #[error("image data is truncated")]
    Truncated,

    #[error("unsupported or corrupt image: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[cfg(feature = "onnx")]
    #[error("onnx runtime error: {0}")]
    Onnx(#[from] ort::Error),

    #[error("input tensor shape {actual:?} does not match model input {expected:?}")]
    InputShape {
        expected: [usize; 4],
        actual: Vec<usize>,
    },

    #[error("classifier returned {actual} scores, expected {expected}")]
    OutputLength { expected: usize, actual: usize },

    #[error("classifier returned a non-finite score at index {0}")]
    NonFinite(usize),

    #[error("{0}")]
    Backend(String),
}

/// Per-request failure surfaced by [`DiagnosisService`](crate::DiagnosisService).
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("model not loaded: {0}")]
    NotReady(String),

    #[error("could not decode image: {0}")]
    Decode(#[from] DecodeError),

    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),
}

/// Coarse error class a transport maps to a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Model absent; retry later.
    NotReady,
    /// Caller sent unusable data; retry with a different image.
    BadImage,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotReady => "not_ready",
            Self::BadImage => "bad_image",
            Self::Internal => "internal",
        }
    }
}

impl PredictError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotReady(_) => ErrorKind::NotReady,
            Self::Decode(_) => ErrorKind::BadImage,
            Self::Inference(_) => ErrorKind::Internal,
        }
    }

    /// Pipeline stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::NotReady(_) => "readiness",
            Self::Decode(_) => "preprocess",
            Self::Inference(_) => "inference",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_separate_client_from_server_failures() {
        let not_ready = PredictError::NotReady("no model".into());
        let bad_image = PredictError::Decode(DecodeError::Empty);
        let internal = PredictError::Inference(InferenceError::NonFinite(3));

        assert_eq!(not_ready.kind(), ErrorKind::NotReady);
        assert_eq!(bad_image.kind(), ErrorKind::BadImage);
        assert_eq!(internal.kind(), ErrorKind::Internal);

        assert_eq!(not_ready.stage(), "readiness");
        assert_eq!(bad_image.stage(), "preprocess");
        assert_eq!(internal.stage(), "inference");
    }

    #[test]
    fn kind_strings_are_stable() {
        assert_eq!(ErrorKind::NotReady.as_str(), "not_ready");
        assert_eq!(ErrorKind::BadImage.as_str(), "bad_image");
        assert_eq!(ErrorKind::Internal.as_str(), "internal");
    }

    #[test]
    fn only_absent_files_count_as_missing() {
        assert!(ModelLoadError::ArtifactNotFound("m.onnx".into()).is_missing_artifact());
        assert!(ModelLoadError::LabelsNotFound("l.json".into()).is_missing_artifact());
        assert!(
            !ModelLoadError::DimensionMismatch {
                labels: 3,
                outputs: 4
            }
            .is_missing_artifact()
        );
        assert!(!ModelLoadError::EmptyLabels.is_missing_artifact());
    }

    #[test]
    fn mismatch_message_names_both_sizes() {
        let msg = ModelLoadError::DimensionMismatch {
            labels: 17,
            outputs: 18,
        }
        .to_string();
        assert!(msg.contains("17") && msg.contains("18"), "{msg}");
    }
}
