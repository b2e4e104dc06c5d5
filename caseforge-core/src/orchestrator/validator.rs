//! Strict schema validation of generated candidates.
//!
//! The generation capability returns raw text with no semantic
//! guarantee; everything here treats that text as untrusted.

use crate::compliance::ComplianceDictionary;
use serde::Deserialize;
use shared_types::TestCasePriority;
use std::sync::Arc;

/// One candidate test case as produced by generation, before ids and
/// lineage are assigned
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CandidateTestCase {
    pub title: String,
    pub steps: Vec<String>,
    pub expected_result: String,
    pub priority: TestCasePriority,
    #[serde(default)]
    pub compliance_refs: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CandidateEnvelope {
    test_cases: Vec<CandidateTestCase>,
}

#[derive(Debug)]
pub struct SchemaViolation {
    pub message: String,
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SchemaViolation {}

pub struct CandidateValidator {
    dictionary: Arc<ComplianceDictionary>,
}

impl CandidateValidator {
    pub fn new(dictionary: Arc<ComplianceDictionary>) -> Self {
        Self { dictionary }
    }

    /// Parse a raw response into validated candidates.
    ///
    /// Accepts the `{"test_cases": [...]}` envelope, optionally wrapped
    /// in a markdown code fence. Any schema violation is reported with
    /// enough detail for the reformulated retry prompt.
    pub fn parse(&self, raw: &str) -> Result<Vec<CandidateTestCase>, SchemaViolation> {
        let body = strip_code_fence(raw.trim());

        let envelope: CandidateEnvelope =
            serde_json::from_str(body).map_err(|e| SchemaViolation {
                message: format!("response is not a valid test_cases JSON object: {}", e),
            })?;

        if envelope.test_cases.is_empty() {
            return Err(SchemaViolation {
                message: "test_cases array is empty".to_string(),
            });
        }

        for (i, candidate) in envelope.test_cases.iter().enumerate() {
            self.validate(candidate)
                .map_err(|violation| SchemaViolation {
                    message: format!("test_cases[{}]: {}", i, violation.message),
                })?;
        }

        Ok(envelope.test_cases)
    }

    fn validate(&self, candidate: &CandidateTestCase) -> Result<(), SchemaViolation> {
        if candidate.title.trim().is_empty() {
            return Err(SchemaViolation {
                message: "title must be non-empty".to_string(),
            });
        }
        if candidate.steps.is_empty() {
            return Err(SchemaViolation {
                message: "steps must be a non-empty ordered list".to_string(),
            });
        }
        if candidate.steps.iter().any(|step| step.trim().is_empty()) {
            return Err(SchemaViolation {
                message: "every step must be non-empty".to_string(),
            });
        }
        if candidate.expected_result.trim().is_empty() {
            return Err(SchemaViolation {
                message: "expected_result must be non-empty".to_string(),
            });
        }
        for reference in &candidate.compliance_refs {
            if !self.dictionary.is_known(reference) {
                return Err(SchemaViolation {
                    message: format!("unknown compliance reference \"{}\"", reference),
                });
            }
        }
        Ok(())
    }
}

/// Strip a surrounding markdown code fence, with or without a language
/// tag; models wrap JSON this way even when told not to.
fn strip_code_fence(raw: &str) -> &str {
    let Some(rest) = raw.strip_prefix("```") else {
        return raw;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\r', '\n']);
    rest.strip_suffix("```").map(str::trim_end).unwrap_or(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> CandidateValidator {
        CandidateValidator::new(Arc::new(ComplianceDictionary::healthcare_default()))
    }

    const VALID: &str = r#"{
        "test_cases": [{
            "title": "Verify MFA login",
            "steps": ["Open login page", "Enter credentials", "Enter MFA code"],
            "expected_result": "User is authenticated",
            "priority": "High",
            "compliance_refs": ["HIPAA"]
        }]
    }"#;

    #[test]
    fn test_valid_envelope_parses() {
        let candidates = validator().parse(VALID).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "Verify MFA login");
        assert_eq!(candidates[0].priority, TestCasePriority::High);
    }

    #[test]
    fn test_code_fenced_response_parses() {
        let fenced = format!("```json\n{}\n```", VALID);
        assert!(validator().parse(&fenced).is_ok());
    }

    #[test]
    fn test_invalid_json_is_violation() {
        let result = validator().parse("not json at all");
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_array_is_violation() {
        let result = validator().parse(r#"{"test_cases": []}"#);
        assert!(result.unwrap_err().message.contains("empty"));
    }

    #[test]
    fn test_empty_title_is_violation() {
        let raw = r#"{"test_cases": [{
            "title": "  ",
            "steps": ["a"],
            "expected_result": "b",
            "priority": "Low"
        }]}"#;
        assert!(validator().parse(raw).unwrap_err().message.contains("title"));
    }

    #[test]
    fn test_empty_steps_is_violation() {
        let raw = r#"{"test_cases": [{
            "title": "t",
            "steps": [],
            "expected_result": "b",
            "priority": "Low"
        }]}"#;
        assert!(validator().parse(raw).unwrap_err().message.contains("steps"));
    }

    #[test]
    fn test_unknown_priority_is_violation() {
        let raw = r#"{"test_cases": [{
            "title": "t",
            "steps": ["a"],
            "expected_result": "b",
            "priority": "Urgent"
        }]}"#;
        assert!(validator().parse(raw).is_err());
    }

    #[test]
    fn test_unknown_compliance_ref_is_violation() {
        let raw = r#"{"test_cases": [{
            "title": "t",
            "steps": ["a"],
            "expected_result": "b",
            "priority": "Low",
            "compliance_refs": ["SOX"]
        }]}"#;
        assert!(validator()
            .parse(raw)
            .unwrap_err()
            .message
            .contains("compliance"));
    }

    #[test]
    fn test_unknown_field_is_violation() {
        let raw = r#"{"test_cases": [{
            "title": "t",
            "steps": ["a"],
            "expected_result": "b",
            "priority": "Low",
            "category": "Functional"
        }]}"#;
        assert!(validator().parse(raw).is_err());
    }
}
