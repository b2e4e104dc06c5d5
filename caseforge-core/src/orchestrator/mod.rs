//! Generation orchestration.
//!
//! For each requirement the orchestrator renders a prompt, invokes the
//! generation capability, validates the response against the strict
//! candidate schema, retries with a reformulated prompt on violations,
//! and finally falls back to a deterministic template so the pipeline
//! always terminates with at least one test case per requirement.

pub mod validator;

use crate::compliance::ComplianceDictionary;
use crate::retry::RetryPolicy;
use caseforge_llm_sdk::{CompletionRequest, LlmClient, Message, ResponseFormat};
use shared_types::{Requirement, TestCasePriority};
use std::sync::Arc;
use validator::{CandidateTestCase, CandidateValidator};

/// Shared context rendered into every requirement prompt of one run
#[derive(Debug, Clone)]
pub struct GenerationContext {
    /// Document-level context: filename and full requirement listing
    pub document_overview: String,
    /// Regeneration only: prior output plus clarification answers
    pub refinement: Option<String>,
}

/// Outcome of generating candidates for one requirement
#[derive(Debug)]
pub struct RequirementGeneration {
    pub candidates: Vec<CandidateTestCase>,
    pub used_fallback: bool,
    pub attempts: u32,
}

pub struct GenerationOrchestrator {
    llm: Arc<dyn LlmClient>,
    validator: CandidateValidator,
    dictionary: Arc<ComplianceDictionary>,
    retry: RetryPolicy,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl GenerationOrchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        dictionary: Arc<ComplianceDictionary>,
        retry: RetryPolicy,
        model: String,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            llm,
            validator: CandidateValidator::new(dictionary.clone()),
            dictionary,
            retry,
            model,
            max_tokens,
            temperature,
        }
    }

    fn system_prompt(&self) -> String {
        let standards = self
            .dictionary
            .standards()
            .iter()
            .map(|standard| format!("- {} ({})", standard.id, standard.name))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"You are a healthcare software testing expert with deep knowledge of medical
device regulations, patient data protection and clinical software quality.

You design test cases for requirements extracted from healthcare requirements
documents. Every response must be a single JSON object of this exact shape:

{{
  "test_cases": [
    {{
      "title": "Descriptive test case title",
      "steps": ["Step 1: action", "Step 2: next action", "Step 3: verification"],
      "expected_result": "Clear expected outcome",
      "priority": "Critical" | "High" | "Medium" | "Low",
      "compliance_refs": ["HIPAA"]
    }}
  ]
}}

Rules:
1. The entire response must be valid JSON with no text outside it.
2. title, steps and expected_result must be non-empty.
3. steps is an ordered list of concrete actions.
4. compliance_refs may only name these standards:
{standards}
5. Cover edge cases, negative scenarios and security where relevant.
6. Return the JSON object directly, not wrapped in markdown code blocks."#
        )
    }

    /// Prompt for one requirement: description, document context and
    /// compliance emphasis.
    pub fn requirement_prompt(&self, requirement: &Requirement, context: &GenerationContext) -> String {
        let compliance_emphasis = if requirement.compliance_refs.is_empty() {
            String::new()
        } else {
            format!(
                "\nThis requirement is subject to: {}. Include test cases that verify that compliance.",
                requirement.compliance_refs.join(", ")
            )
        };

        let refinement = context
            .refinement
            .as_deref()
            .map(|r| format!("\n\n{}", r))
            .unwrap_or_default();

        format!(
            "Document context:\n{overview}\n\nGenerate 1-3 test cases for this requirement:\n\n{id}: {description}{compliance}{refinement}",
            overview = context.document_overview,
            id = requirement.id,
            description = requirement.description,
            compliance = compliance_emphasis,
        )
    }

    fn reformulation(violation: &str) -> String {
        format!(
            "Your previous response was invalid: {}\n\nReturn ONLY a valid JSON object of the required test_cases shape, with every rule satisfied.",
            violation
        )
    }

    /// Generate validated candidates for one requirement.
    ///
    /// Schema violations, LLM timeouts and transient transport errors
    /// all count against the same bounded attempt budget; exhausting it
    /// yields the deterministic fallback instead of failing the run.
    pub async fn generate_for_requirement(
        &self,
        requirement: &Requirement,
        context: &GenerationContext,
    ) -> RequirementGeneration {
        let mut conversation = vec![Message::user(self.requirement_prompt(requirement, context))];
        let mut attempt = 0;

        loop {
            attempt += 1;

            let request = CompletionRequest {
                messages: conversation.clone(),
                max_tokens: self.max_tokens,
                model: self.model.clone(),
                system: Some(self.system_prompt()),
                temperature: Some(self.temperature),
                top_p: None,
                stop_sequences: None,
                response_format: Some(ResponseFormat::JsonObject),
            };

            match self.llm.complete(request).await {
                Ok(response) => match self.validator.parse(&response.content) {
                    Ok(candidates) => {
                        return RequirementGeneration {
                            candidates,
                            used_fallback: false,
                            attempts: attempt,
                        };
                    }
                    Err(violation) => {
                        tracing::warn!(
                            requirement_id = %requirement.id,
                            attempt,
                            error = %violation,
                            "Generated candidates violated the schema"
                        );
                        if !self.retry.should_retry(attempt) {
                            break;
                        }
                        conversation.push(Message::assistant(response.content));
                        conversation.push(Message::user(Self::reformulation(&violation.message)));
                    }
                },
                Err(e) if e.is_retryable() => {
                    tracing::warn!(
                        requirement_id = %requirement.id,
                        attempt,
                        error = %e,
                        "Generation attempt failed; retrying"
                    );
                    if !self.retry.should_retry(attempt) {
                        break;
                    }
                    self.retry.backoff(attempt).await;
                }
                Err(e) => {
                    tracing::error!(
                        requirement_id = %requirement.id,
                        attempt,
                        error = %e,
                        "Generation failed terminally; using fallback"
                    );
                    break;
                }
            }
        }

        RequirementGeneration {
            candidates: vec![fallback_candidate(requirement)],
            used_fallback: true,
            attempts: attempt,
        }
    }
}

/// Deterministic template test case built only from the requirement's
/// own text. This is the resilience contract: the pipeline terminates
/// with at least one test case per requirement no matter what the
/// generation capability returns.
pub fn fallback_candidate(requirement: &Requirement) -> CandidateTestCase {
    let priority = if requirement.compliance_refs.is_empty() {
        TestCasePriority::Medium
    } else {
        TestCasePriority::High
    };

    CandidateTestCase {
        title: format!("Verify {}: {}", requirement.id, truncate(&requirement.description, 80)),
        steps: vec![
            format!("Review requirement {} with the responsible analyst", requirement.id),
            format!(
                "Exercise the behavior described by the requirement: {}",
                requirement.description
            ),
            "Record the observed behavior and compare it against the requirement".to_string(),
        ],
        expected_result: format!(
            "Observed behavior conforms to {}: {}",
            requirement.id, requirement.description
        ),
        priority,
        compliance_refs: requirement.compliance_refs.clone(),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let prefix: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", prefix.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseforge_llm_sdk::mock::MockLlmClient;
    use caseforge_llm_sdk::LlmError;

    fn requirement() -> Requirement {
        Requirement {
            id: "REQ-1".to_string(),
            source_document_id: "doc-1".to_string(),
            description: "The system must authenticate users with MFA.".to_string(),
            compliance_refs: vec!["HIPAA".to_string()],
        }
    }

    fn context() -> GenerationContext {
        GenerationContext {
            document_overview: "reqs.txt with 1 requirement".to_string(),
            refinement: None,
        }
    }

    fn orchestrator(llm: Arc<dyn LlmClient>) -> GenerationOrchestrator {
        GenerationOrchestrator::new(
            llm,
            Arc::new(ComplianceDictionary::healthcare_default()),
            RetryPolicy::new(3, 1, 1),
            "mock-model".to_string(),
            4000,
            0.3,
        )
    }

    const VALID_RESPONSE: &str = r#"{"test_cases": [{
        "title": "Verify MFA",
        "steps": ["Login", "Enter code"],
        "expected_result": "Authenticated",
        "priority": "High",
        "compliance_refs": ["HIPAA"]
    }]}"#;

    #[tokio::test]
    async fn test_valid_response_first_attempt() {
        let llm = Arc::new(MockLlmClient::always(VALID_RESPONSE));
        let outcome = orchestrator(llm.clone())
            .generate_for_requirement(&requirement(), &context())
            .await;

        assert!(!outcome.used_fallback);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.candidates[0].title, "Verify MFA");
    }

    #[tokio::test]
    async fn test_schema_violation_retries_with_feedback() {
        let llm = Arc::new(MockLlmClient::scripted(vec![
            Ok(r#"{"wrong": true}"#.to_string()),
            Ok(VALID_RESPONSE.to_string()),
        ]));
        let outcome = orchestrator(llm.clone())
            .generate_for_requirement(&requirement(), &context())
            .await;

        assert!(!outcome.used_fallback);
        assert_eq!(outcome.attempts, 2);

        // Second request carries the invalid output and the correction
        let requests = llm.requests();
        assert_eq!(requests[1].messages.len(), 3);
        assert!(requests[1].messages[2].content.contains("invalid"));
    }

    #[tokio::test]
    async fn test_three_schema_failures_fall_back() {
        let llm = Arc::new(MockLlmClient::always(r#"{"wrong": true}"#));
        let outcome = orchestrator(llm.clone())
            .generate_for_requirement(&requirement(), &context())
            .await;

        assert!(outcome.used_fallback);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(llm.request_count(), 3);
        assert_eq!(outcome.candidates.len(), 1);
        assert!(outcome.candidates[0].title.starts_with("Verify REQ-1"));
    }

    #[tokio::test]
    async fn test_timeouts_count_against_budget() {
        let llm = Arc::new(MockLlmClient::scripted(vec![
            Err(LlmError::Timeout { seconds: 1 }),
            Err(LlmError::Timeout { seconds: 1 }),
            Ok(VALID_RESPONSE.to_string()),
        ]));
        let outcome = orchestrator(llm)
            .generate_for_requirement(&requirement(), &context())
            .await;

        assert!(!outcome.used_fallback);
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn test_terminal_llm_error_falls_back_immediately() {
        let llm = Arc::new(MockLlmClient::scripted(vec![Err(
            LlmError::authentication("bad key"),
        )]));
        let outcome = orchestrator(llm.clone())
            .generate_for_requirement(&requirement(), &context())
            .await;

        assert!(outcome.used_fallback);
        assert_eq!(llm.request_count(), 1);
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let first = fallback_candidate(&requirement());
        let second = fallback_candidate(&requirement());
        assert_eq!(first, second);
        assert_eq!(first.priority, TestCasePriority::High);
        assert_eq!(first.compliance_refs, vec!["HIPAA".to_string()]);
    }

    #[test]
    fn test_requirement_prompt_carries_compliance_emphasis() {
        let llm = Arc::new(MockLlmClient::always(VALID_RESPONSE));
        let orchestrator = orchestrator(llm);
        let prompt = orchestrator.requirement_prompt(&requirement(), &context());
        assert!(prompt.contains("REQ-1"));
        assert!(prompt.contains("HIPAA"));
        assert!(prompt.contains("subject to"));
    }
}
