//! Curated advisory knowledge base keyed by category label.
//!
//! The curated set is a JSON data asset (`data/advisories.json`) embedded in
//! the binary, or an operator-supplied file with the same schema. Lookups
//! never fail: labels without a curated record resolve to a generic fallback.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::advisory::{AdvisoryRecord, Citation};

const EMBEDDED_ADVISORIES: &str = include_str!("../data/advisories.json");

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("failed to read advisory file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed advisory data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("advisory for {label:?} has an empty {field} field")]
    Incomplete { label: String, field: &'static str },
}

/// Result of comparing the curated set with a model's label list.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Coverage {
    /// Labels the model can predict that have no curated record.
    pub missing: Vec<String>,
    /// Curated records for labels the model cannot predict.
    pub unused: Vec<String>,
}

impl Coverage {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Immutable label → advisory mapping with a fallback for unknown labels.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    records: HashMap<String, AdvisoryRecord>,
    fallback: AdvisoryRecord,
}

impl KnowledgeBase {
    /// Parse the advisory set compiled into the crate.
    pub fn embedded() -> Result<Self, KnowledgeError> {
        Self::from_json(EMBEDDED_ADVISORIES)
    }

    /// Load an advisory set from a JSON file on disk.
    pub fn from_path(path: &Path) -> Result<Self, KnowledgeError> {
        let json = std::fs::read_to_string(path).map_err(|source| KnowledgeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let kb = Self::from_json(&json)?;
        info!(records = kb.len(), path = %path.display(), "loaded advisory file");
        Ok(kb)
    }

    /// Parse `{label: {symptoms, impact, management, citations}}`.
    ///
    /// Every record must be complete; see [`AdvisoryRecord::first_empty_field`].
    pub fn from_json(json: &str) -> Result<Self, KnowledgeError> {
        let records: HashMap<String, AdvisoryRecord> = serde_json::from_str(json)?;
        Self::from_records(records)
    }

    pub fn from_records(records: HashMap<String, AdvisoryRecord>) -> Result<Self, KnowledgeError> {
        for (label, record) in &records {
            if let Some(field) = record.first_empty_field() {
                return Err(KnowledgeError::Incomplete {
                    label: label.clone(),
                    field,
                });
            }
        }
        Ok(Self {
            records,
            fallback: fallback_record(),
        })
    }

    /// Advisory for `label`, or the fallback record if none is curated.
    pub fn lookup(&self, label: &str) -> &AdvisoryRecord {
        self.records.get(label).unwrap_or(&self.fallback)
    }

    /// Whether `label` has a curated record (as opposed to the fallback).
    pub fn contains(&self, label: &str) -> bool {
        self.records.contains_key(label)
    }

    pub fn fallback(&self) -> &AdvisoryRecord {
        &self.fallback
    }

    /// Number of curated records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Curated labels, sorted.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.records.keys().map(|s| s.as_str()).collect();
        labels.sort_unstable();
        labels
    }

    /// Compare curated labels against the model's label list.
    pub fn coverage<S: AsRef<str>>(&self, labels: &[S]) -> Coverage {
        let model: HashSet<&str> = labels.iter().map(|l| l.as_ref()).collect();

        let missing = labels
            .iter()
            .map(|l| l.as_ref())
            .filter(|l| !self.records.contains_key(*l))
            .map(str::to_string)
            .collect();

        let unused = self
            .labels()
            .into_iter()
            .filter(|l| !model.contains(l))
            .map(str::to_string)
            .collect();

        Coverage { missing, unused }
    }

    /// Log coverage gaps against the model's label list and return them.
    pub fn report_coverage<S: AsRef<str>>(&self, labels: &[S]) -> Coverage {
        let coverage = self.coverage(labels);
        for label in &coverage.missing {
            warn!(label = %label, "no advisory for label; fallback will be served");
        }
        for label in &coverage.unused {
            warn!(label = %label, "advisory has no matching model label");
        }
        info!(
            curated = self.len(),
            labels = labels.len(),
            missing = coverage.missing.len(),
            unused = coverage.unused.len(),
            "advisory coverage"
        );
        coverage
    }
}

/// Generic advisory served for labels without a curated record.
pub fn fallback_record() -> AdvisoryRecord {
    AdvisoryRecord {
        symptoms: vec!["Information not available".to_string()],
        impact: "No details available.".to_string(),
        management: vec!["Consult local agricultural extension office.".to_string()],
        citations: vec![Citation::new(
            "General Agricultural Guidance",
            "Local Extension Service",
        )],
    }
}
