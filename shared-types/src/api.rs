use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::document::{DocumentStatus, Requirement};
use crate::run::ClarificationAnswer;
use crate::test_case::{CoverageStatus, TestCase, TestCaseStatus};

/// Response for a document upload
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UploadResponse {
    pub document_id: String,
    pub filename: String,
    pub status: DocumentStatus,
    pub content_hash: String,
    pub size: u64,
    /// True when the upload matched an existing document by content hash
    pub already_existed: bool,
    /// Set when the primary effect succeeded but its audit write failed
    pub audit_warning: Option<String>,
}

/// Request body for triggering generation
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GenerateRequest {
    pub actor: Option<String>,
    /// Regenerate even if the document already has a completed run
    #[serde(default)]
    pub force: bool,
}

/// Request body for regeneration with clarification answers
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RegenerateRequest {
    pub actor: Option<String>,
    pub answers: Vec<ClarificationAnswer>,
}

/// Result of a generation or regeneration run
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GenerationResponse {
    pub run_id: String,
    pub document_id: String,
    pub test_cases: Vec<TestCase>,
    /// Requirements that fell back to the deterministic template
    pub fallback_count: usize,
    /// Set when the primary effect succeeded but its audit write failed
    pub audit_warning: Option<String>,
}

/// One row of the traceability matrix
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TraceabilityRow {
    pub requirement: Requirement,
    /// Non-superseded test cases linked to the requirement, in id order
    pub test_cases: Vec<TestCase>,
    pub status: CoverageStatus,
    /// Union of the requirement's and its test cases' compliance refs
    pub compliance_refs: Vec<String>,
}

/// Optimistic status update: `expected_status` is the status the caller
/// last observed; the update is rejected on mismatch.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SetTestCaseStatusRequest {
    pub new_status: TestCaseStatus,
    pub expected_status: TestCaseStatus,
    pub actor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SetTestCaseStatusResponse {
    pub test_case: TestCase,
    /// Recomputed aggregate status of the owning requirement
    pub requirement_status: CoverageStatus,
    pub audit_warning: Option<String>,
}

/// Target format tag for export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ExportFormat {
    Csv,
    Json,
    Xlsx,
    Pdf,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            "xlsx" => Some(ExportFormat::Xlsx),
            "pdf" => Some(ExportFormat::Pdf),
            _ => None,
        }
    }
}

/// Query parameters for the audit trail endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    pub actor: Option<String>,
    pub action: Option<String>,
    pub target_id: Option<String>,
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}
