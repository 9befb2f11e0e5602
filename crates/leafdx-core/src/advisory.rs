//! Advisory and diagnosis types shared between the inference pipeline and the HTTP boundary.

use serde::{Deserialize, Serialize};

/// A reference backing an advisory record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub source: String,
}

impl Citation {
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source: source.into(),
        }
    }
}

/// Curated agronomic advisory for one category label.
///
/// Loaded once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryRecord {
    /// Short, observable symptoms in the order they should be shown.
    pub symptoms: Vec<String>,
    /// Free-text summary of yield or quality impact.
    pub impact: String,
    /// Recommended actions, most important first.
    pub management: Vec<String>,
    pub citations: Vec<Citation>,
}

impl AdvisoryRecord {
    /// Name of the first empty field, if any.
    ///
    /// A record served to a caller must have at least one symptom, one
    /// management action, one citation and a non-blank impact summary.
    pub fn first_empty_field(&self) -> Option<&'static str> {
        if self.symptoms.is_empty() {
            Some("symptoms")
        } else if self.impact.trim().is_empty() {
            Some("impact")
        } else if self.management.is_empty() {
            Some("management")
        } else if self.citations.is_empty() {
            Some("citations")
        } else {
            None
        }
    }
}

/// Outbound payload for a single diagnosed image.
///
/// Field names are part of the wire contract with existing clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub disease_name: String,
    /// Confidence in percent, `0.0..=100.0`, rounded to two decimals.
    pub confidence_percent: f64,
    pub key_symptoms_observed: Vec<String>,
    pub impact_summary: String,
    pub management_recommendations: Vec<String>,
    pub citations: Vec<Citation>,
}

impl Diagnosis {
    pub fn new(label: &str, confidence_percent: f64, advisory: &AdvisoryRecord) -> Self {
        Self {
            disease_name: label.to_string(),
            confidence_percent,
            key_symptoms_observed: advisory.symptoms.clone(),
            impact_summary: advisory.impact.clone(),
            management_recommendations: advisory.management.clone(),
            citations: advisory.citations.clone(),
        }
    }
}
