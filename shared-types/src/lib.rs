pub mod api;
pub mod audit;
pub mod document;
pub mod run;
pub mod test_case;

pub use api::{
    AuditQuery, ExportFormat, GenerateRequest, GenerationResponse, RegenerateRequest,
    SetTestCaseStatusRequest, SetTestCaseStatusResponse, TraceabilityRow, UploadResponse,
};
pub use audit::{AuditAction, AuditEntry, AuditFilter, AuditOutcome};
pub use document::{DocumentStatus, Requirement, RequirementsDocument};
pub use run::{ClarificationAnswer, GenerationRun};
pub use test_case::{CoverageStatus, TestCase, TestCasePriority, TestCaseStatus};
