//! Startup wiring: the immutable inference context and how it is loaded.

use std::path::PathBuf;

use leafdx_core::{Coverage, KnowledgeBase};
use tracing::{info, warn};

use crate::classifier::Classify;
use crate::error::ModelLoadError;
use crate::labels::LabelSet;
use crate::preprocess::{ImagePreprocessor, TensorLayout};
use crate::service::DiagnosisService;

/// Default model location relative to the working directory.
pub const DEFAULT_MODEL_PATH: &str = "models/best_plant_model.onnx";
/// Default label-list location relative to the working directory.
pub const DEFAULT_LABELS_PATH: &str = "models/class_names.json";

/// Artifact locations and load-time policy.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    /// Advisory JSON overriding the embedded knowledge base.
    pub advisories_path: Option<PathBuf>,
    pub layout: TensorLayout,
    /// Treat labels without a curated advisory as a load failure.
    pub strict_advisories: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            labels_path: PathBuf::from(DEFAULT_LABELS_PATH),
            advisories_path: None,
            layout: TensorLayout::default(),
            strict_advisories: false,
        }
    }
}

impl ModelConfig {
    /// Embedded advisories, or the configured override file.
    pub fn load_knowledge(&self) -> Result<KnowledgeBase, ModelLoadError> {
        let kb = match &self.advisories_path {
            Some(path) => KnowledgeBase::from_path(path)?,
            None => KnowledgeBase::embedded()?,
        };
        Ok(kb)
    }

    /// Load the ONNX classifier and label list into an [`InferenceContext`].
    #[cfg(feature = "onnx")]
    pub fn load_context(&self) -> Result<InferenceContext, ModelLoadError> {
        if !self.model_path.exists() {
            return Err(ModelLoadError::ArtifactNotFound(self.model_path.clone()));
        }
        let labels = LabelSet::from_path(&self.labels_path)?;
        let preprocessor = ImagePreprocessor::new(self.layout);
        let classifier =
            crate::onnx::OnnxClassifier::load(&self.model_path, preprocessor.input_shape())?;
        InferenceContext::new(Box::new(classifier), labels, preprocessor)
    }

    /// Load everything a [`DiagnosisService`] needs.
    ///
    /// With `allow_missing_model`, an absent model or label file yields a
    /// not-ready service instead of an error. Every other failure is returned.
    #[cfg(feature = "onnx")]
    pub fn load_service(
        &self,
        allow_missing_model: bool,
    ) -> Result<DiagnosisService, ModelLoadError> {
        let knowledge = self.load_knowledge()?;
        self.assemble_service(knowledge, self.load_context(), allow_missing_model)
    }

    /// Apply the startup policy to the outcome of loading the classifier.
    pub fn assemble_service(
        &self,
        knowledge: KnowledgeBase,
        loaded: Result<InferenceContext, ModelLoadError>,
        allow_missing_model: bool,
    ) -> Result<DiagnosisService, ModelLoadError> {
        match loaded {
            Ok(ctx) => {
                check_advisories(&knowledge, ctx.labels(), self.strict_advisories)?;
                Ok(DiagnosisService::new(ctx, knowledge))
            }
            Err(e) if allow_missing_model && e.is_missing_artifact() => {
                warn!(error = %e, "starting without a classifier; predictions will be refused");
                Ok(DiagnosisService::not_ready(knowledge, e.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}

/// Classifier, label list and preprocessor, validated against each other.
///
/// Built once at startup and shared read-only by every request.
pub struct InferenceContext {
    classifier: Box<dyn Classify>,
    labels: LabelSet,
    preprocessor: ImagePreprocessor,
}

impl InferenceContext {
    /// Fails with [`ModelLoadError::DimensionMismatch`] unless the label
    /// count equals the classifier's output dimension.
    pub fn new(
        classifier: Box<dyn Classify>,
        labels: LabelSet,
        preprocessor: ImagePreprocessor,
    ) -> Result<Self, ModelLoadError> {
        let outputs = classifier.num_classes();
        if outputs != labels.len() {
            return Err(ModelLoadError::DimensionMismatch {
                labels: labels.len(),
                outputs,
            });
        }
        info!(
            classes = outputs,
            layout = %preprocessor.layout,
            "inference context ready"
        );
        Ok(Self {
            classifier,
            labels,
            preprocessor,
        })
    }

    pub fn classifier(&self) -> &dyn Classify {
        self.classifier.as_ref()
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn preprocessor(&self) -> &ImagePreprocessor {
        &self.preprocessor
    }
}

/// Compare advisories with the label list, logging gaps.
///
/// With `strict`, any label lacking a curated advisory is an error.
pub fn check_advisories(
    knowledge: &KnowledgeBase,
    labels: &LabelSet,
    strict: bool,
) -> Result<Coverage, ModelLoadError> {
    let coverage = knowledge.report_coverage(labels.as_slice());
    if strict && !coverage.is_complete() {
        return Err(ModelLoadError::AdvisoryCoverage(coverage.missing));
    }
    Ok(coverage)
}
