//! Ordered category-label list loaded alongside the model.
//!
//! Position `i` in the list names output `i` of the classifier. The list is
//! either a JSON array of strings (`class_names.json` as written by the
//! training script) or plain text with one label per line.

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::error::ModelLoadError;

/// Ordered, duplicate-free category labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    /// Validate an ordered label list: non-empty, no blank or duplicate labels.
    pub fn new(labels: Vec<String>) -> Result<Self, ModelLoadError> {
        if labels.is_empty() {
            return Err(ModelLoadError::EmptyLabels);
        }

        let mut seen: HashMap<&str, usize> = HashMap::with_capacity(labels.len());
        for (i, label) in labels.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(ModelLoadError::MalformedLabels(format!(
                    "blank label at position {i}"
                )));
            }
            if let Some(&first) = seen.get(label.as_str()) {
                return Err(ModelLoadError::DuplicateLabel {
                    label: label.clone(),
                    first,
                    second: i,
                });
            }
            seen.insert(label.as_str(), i);
        }

        Ok(Self { labels })
    }

    /// Load a label list from disk.
    pub fn from_path(path: &Path) -> Result<Self, ModelLoadError> {
        if !path.exists() {
            return Err(ModelLoadError::LabelsNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let labels = Self::parse(&text).map_err(|e| match e {
            ModelLoadError::MalformedLabels(reason) => {
                ModelLoadError::MalformedLabels(format!("{}: {reason}", path.display()))
            }
            other => other,
        })?;
        info!(count = labels.len(), path = %path.display(), "loaded label list");
        Ok(labels)
    }

    /// Parse either a JSON array of strings or one label per line.
    pub fn parse(text: &str) -> Result<Self, ModelLoadError> {
        let trimmed = text.trim_start();
        let labels = if trimmed.starts_with('[') {
            serde_json::from_str::<Vec<String>>(trimmed)
                .map_err(|e| ModelLoadError::MalformedLabels(e.to_string()))?
        } else {
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        };
        Self::new(labels)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Always false for a constructed set.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label for classifier output `index`.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(|s| s.as_str())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }
}
