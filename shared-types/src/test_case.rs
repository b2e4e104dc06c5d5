use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Priority of a test case, as produced by generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum TestCasePriority {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for TestCasePriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestCasePriority::Low => write!(f, "Low"),
            TestCasePriority::Medium => write!(f, "Medium"),
            TestCasePriority::High => write!(f, "High"),
            TestCasePriority::Critical => write!(f, "Critical"),
        }
    }
}

/// Execution status of a single test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TestCaseStatus {
    NotTested,
    Pass,
    Fail,
    InProgress,
    /// Replaced by a later regeneration; kept for lineage, never deleted
    Superseded,
}

impl std::fmt::Display for TestCaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestCaseStatus::NotTested => write!(f, "Not Tested"),
            TestCaseStatus::Pass => write!(f, "Pass"),
            TestCaseStatus::Fail => write!(f, "Fail"),
            TestCaseStatus::InProgress => write!(f, "In Progress"),
            TestCaseStatus::Superseded => write!(f, "Superseded"),
        }
    }
}

/// Aggregate coverage status of a requirement, derived from its
/// non-superseded test cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum CoverageStatus {
    NotTested,
    InProgress,
    Pass,
    Fail,
}

impl std::fmt::Display for CoverageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoverageStatus::NotTested => write!(f, "Not Tested"),
            CoverageStatus::InProgress => write!(f, "In Progress"),
            CoverageStatus::Pass => write!(f, "Pass"),
            CoverageStatus::Fail => write!(f, "Fail"),
        }
    }
}

/// A structured verification scenario linked to exactly one requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TestCase {
    /// Id of the form `TC-<requirement id>-m`, scoped per requirement
    pub id: String,
    pub requirement_id: String,
    pub title: String,
    pub steps: Vec<String>,
    pub expected_result: String,
    pub priority: TestCasePriority,
    pub compliance_refs: Vec<String>,
    pub status: TestCaseStatus,
    /// Generation run that produced this test case
    pub origin_run_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TestCase {
    /// Content identity used by the regeneration diff: two test cases
    /// with equal (title, steps, expected_result) are the same case.
    pub fn content_key(&self) -> (&str, &[String], &str) {
        (&self.title, &self.steps, &self.expected_result)
    }
}
