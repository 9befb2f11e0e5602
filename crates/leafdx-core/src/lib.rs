//! Core types and the curated advisory knowledge base for leafdx.

pub mod advisory;
pub mod knowledge;

pub use advisory::{AdvisoryRecord, Citation, Diagnosis};
pub use knowledge::{Coverage, KnowledgeBase, KnowledgeError, fallback_record};
