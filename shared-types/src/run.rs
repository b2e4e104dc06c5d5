use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One execution of the AI synthesis step.
///
/// Runs form a chain per document: the root run has no parent and each
/// regeneration points at the run it refined.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GenerationRun {
    pub id: String,
    pub document_id: String,
    pub parent_run_id: Option<String>,
    /// sha256 hex of the rendered prompt, for idempotence checks and audit
    pub prompt_fingerprint: String,
    pub produced_test_case_ids: Vec<String>,
    pub created_at: i64,
}

impl GenerationRun {
    pub fn is_root(&self) -> bool {
        self.parent_run_id.is_none()
    }
}

/// A user's answer to one clarification question.
///
/// Answers are input to a regeneration run only; they are not persisted
/// independently of the run that consumed them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClarificationAnswer {
    pub question_id: String,
    pub values: Vec<String>,
}
