use serde::{Deserialize, Serialize};

/// State-changing action recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Upload,
    Extract,
    Generate,
    Regenerate,
    StatusChange,
    Export,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Upload => "upload",
            AuditAction::Extract => "extract",
            AuditAction::Generate => "generate",
            AuditAction::Regenerate => "regenerate",
            AuditAction::StatusChange => "status_change",
            AuditAction::Export => "export",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "upload" => Some(AuditAction::Upload),
            "extract" => Some(AuditAction::Extract),
            "generate" => Some(AuditAction::Generate),
            "regenerate" => Some(AuditAction::Regenerate),
            "status_change" => Some(AuditAction::StatusChange),
            "export" => Some(AuditAction::Export),
            _ => None,
        }
    }
}

/// Whether the recorded action succeeded; failed attempts are audited too
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Success => "success",
            AuditOutcome::Failure => "failure",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(AuditOutcome::Success),
            "failure" => Some(AuditOutcome::Failure),
            _ => None,
        }
    }
}

/// One immutable entry of the append-only audit trail.
///
/// Total order is (timestamp_ms, sequence); the sequence breaks ties
/// between entries recorded within the same millisecond.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub actor: String,
    pub action: AuditAction,
    pub target_id: String,
    pub outcome: AuditOutcome,
    pub detail: serde_json::Value,
    pub timestamp_ms: i64,
    pub sequence: u64,
}

/// Query filter for reading the audit trail
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    pub actor: Option<String>,
    pub action: Option<AuditAction>,
    pub target_id: Option<String>,
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
    /// Entries to skip, for restartable ascending iteration
    #[serde(default)]
    pub offset: usize,
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(actor) = &self.actor {
            if &entry.actor != actor {
                return false;
            }
        }
        if let Some(action) = &self.action {
            if &entry.action != action {
                return false;
            }
        }
        if let Some(target) = &self.target_id {
            if &entry.target_id != target {
                return false;
            }
        }
        if let Some(from) = self.from_ms {
            if entry.timestamp_ms < from {
                return false;
            }
        }
        if let Some(to) = self.to_ms {
            if entry.timestamp_ms > to {
                return false;
            }
        }
        true
    }
}
