//! Diagnosis pipeline: preprocess → classify → argmax → advisory lookup.

use std::time::Instant;

use leafdx_core::{AdvisoryRecord, Diagnosis, KnowledgeBase};
use tracing::{debug, error, warn};

use crate::classifier::{argmax, confidence_percent};
use crate::context::InferenceContext;
use crate::error::{InferenceError, PredictError};
use crate::labels::LabelSet;

/// Outcome of one prediction. Created per request and never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub label: String,
    /// Position of `label` in the model's output.
    pub index: usize,
    /// Raw probability at `index`.
    pub probability: f32,
    /// `100 × probability`, rounded to two decimals.
    pub confidence_percent: f64,
    pub advisory: AdvisoryRecord,
    /// False when `advisory` is the fallback record.
    pub curated: bool,
}

impl PredictionResult {
    pub fn to_diagnosis(&self) -> Diagnosis {
        Diagnosis::new(&self.label, self.confidence_percent, &self.advisory)
    }
}

impl From<PredictionResult> for Diagnosis {
    fn from(result: PredictionResult) -> Self {
        Diagnosis {
            disease_name: result.label,
            confidence_percent: result.confidence_percent,
            key_symptoms_observed: result.advisory.symptoms,
            impact_summary: result.advisory.impact,
            management_recommendations: result.advisory.management,
            citations: result.advisory.citations,
        }
    }
}

/// Stateless prediction service over a shared, read-only inference context.
///
/// A service built with [`not_ready`](Self::not_ready) has no classifier and
/// answers every request with [`PredictError::NotReady`].
pub struct DiagnosisService {
    context: Option<InferenceContext>,
    knowledge: KnowledgeBase,
    not_ready_reason: String,
}

impl DiagnosisService {
    pub fn new(context: InferenceContext, knowledge: KnowledgeBase) -> Self {
        Self {
            context: Some(context),
            knowledge,
            not_ready_reason: String::new(),
        }
    }

    /// A service with no classifier loaded.
    pub fn not_ready(knowledge: KnowledgeBase, reason: impl Into<String>) -> Self {
        Self {
            context: None,
            knowledge,
            not_ready_reason: reason.into(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.context.is_some()
    }

    /// Label list of the loaded model, if any.
    pub fn labels(&self) -> Option<&LabelSet> {
        self.context.as_ref().map(InferenceContext::labels)
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// `Err(NotReady)` when no classifier is loaded.
    pub fn ensure_ready(&self) -> Result<(), PredictError> {
        self.context().map(|_| ())
    }

    fn context(&self) -> Result<&InferenceContext, PredictError> {
        self.context.as_ref().ok_or_else(|| {
            PredictError::NotReady(format!(
                "classifier is not loaded ({})",
                self.not_ready_reason
            ))
        })
    }

    /// Classify one image and resolve its advisory.
    pub fn predict(&self, image: &[u8]) -> Result<PredictionResult, PredictError> {
        let ctx = self
            .context()
            .inspect_err(|e| warn!(stage = "readiness", error = %e, "prediction refused"))?;

        let start = Instant::now();

        let tensor = ctx.preprocessor().prepare(image).inspect_err(|e| {
            warn!(stage = "preprocess", bytes = image.len(), error = %e, "image rejected");
        })?;

        let probabilities = ctx
            .classifier()
            .infer(&tensor)
            .inspect_err(|e| error!(stage = "inference", error = %e, "forward pass failed"))?;

        let labels = ctx.labels();
        if probabilities.len() != labels.len() {
            let err = InferenceError::OutputLength {
                expected: labels.len(),
                actual: probabilities.len(),
            };
            error!(stage = "inference", error = %err, "classifier output rejected");
            return Err(err.into());
        }

        let (index, probability, label) = argmax(&probabilities)
            .and_then(|(i, p)| labels.get(i).map(|label| (i, p, label)))
            .ok_or_else(|| {
                error!(stage = "inference", "no selectable class in classifier output");
                InferenceError::Backend("classifier output has no selectable class".into())
            })?;

        let confidence = confidence_percent(probability);
        let curated = self.knowledge.contains(label);
        let advisory = self.knowledge.lookup(label).clone();

        debug!(
            label,
            index,
            confidence,
            curated,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "prediction complete"
        );

        Ok(PredictionResult {
            label: label.to_string(),
            index,
            probability,
            confidence_percent: confidence,
            advisory,
            curated,
        })
    }

    /// [`predict`](Self::predict), shaped as the outbound payload.
    pub fn diagnose(&self, image: &[u8]) -> Result<Diagnosis, PredictError> {
        self.predict(image).map(Diagnosis::from)
    }
}
