use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Lifecycle state of an uploaded requirements document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum DocumentStatus {
    /// Stored durably, not yet segmented into requirements
    Uploaded,
    /// Requirements extracted, ready for generation
    Extracted,
    /// Extraction failed; re-upload to retry
    Failed,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentStatus::Uploaded => write!(f, "uploaded"),
            DocumentStatus::Extracted => write!(f, "extracted"),
            DocumentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// An uploaded requirements document and its ingestion metadata
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RequirementsDocument {
    pub id: String,
    pub filename: String,
    pub media_type: String,
    pub size: u64,
    /// sha256 hex of the uploaded bytes, used for idempotent re-upload
    /// and prompt fingerprinting
    pub content_hash: String,
    pub storage_ref: String,
    pub status: DocumentStatus,
    pub created_at: i64,
}

/// An atomic extracted clause of a requirements document.
///
/// Immutable once extracted: the same document text always yields the
/// same requirement set and ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Requirement {
    /// Stable id of the form `REQ-n`, assigned in document order
    pub id: String,
    pub source_document_id: String,
    pub description: String,
    /// Compliance standard ids matched against the configured dictionary
    pub compliance_refs: Vec<String>,
}
