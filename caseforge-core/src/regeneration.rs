//! Regeneration: re-invoking generation with clarification answers and
//! reconciling the result against the parent run through an
//! id-preserving diff.
//!
//! Diff policy, per requirement:
//! - a candidate whose (title, steps, expected_result) exactly matches
//!   a prior test case keeps the prior id and its current status;
//! - a candidate with new content gets a fresh id and starts NotTested;
//! - a prior test case with no matching candidate is marked Superseded,
//!   never deleted.

use crate::orchestrator::validator::CandidateTestCase;
use shared_types::{ClarificationAnswer, Requirement, TestCase, TestCaseStatus};

/// Result of reconciling one requirement's candidates against its
/// prior test cases
#[derive(Debug)]
pub struct ReconcileOutcome {
    /// Prior cases kept verbatim (id, status and lineage unchanged)
    pub kept: Vec<TestCase>,
    /// New cases to insert, already carrying their assigned ids
    pub fresh: Vec<TestCase>,
    /// Prior cases to mark superseded
    pub superseded_ids: Vec<String>,
}

pub fn reconcile_requirement(
    requirement: &Requirement,
    prior: &[TestCase],
    candidates: Vec<CandidateTestCase>,
    run_id: &str,
    first_free_number: u32,
    now_ms: i64,
) -> ReconcileOutcome {
    let mut matched = vec![false; prior.len()];
    let mut kept = Vec::new();
    let mut fresh = Vec::new();
    let mut next_number = first_free_number;

    for candidate in candidates {
        let existing = prior.iter().enumerate().find(|(i, case)| {
            !matched[*i]
                && case.title == candidate.title
                && case.steps == candidate.steps
                && case.expected_result == candidate.expected_result
        });

        match existing {
            Some((i, case)) => {
                matched[i] = true;
                kept.push(case.clone());
            }
            None => {
                let id = format!("TC-{}-{}", requirement.id, next_number);
                next_number += 1;
                fresh.push(TestCase {
                    id,
                    requirement_id: requirement.id.clone(),
                    title: candidate.title,
                    steps: candidate.steps,
                    expected_result: candidate.expected_result,
                    priority: candidate.priority,
                    compliance_refs: candidate.compliance_refs,
                    status: TestCaseStatus::NotTested,
                    origin_run_id: run_id.to_string(),
                    created_at: now_ms,
                    updated_at: now_ms,
                });
            }
        }
    }

    let superseded_ids = prior
        .iter()
        .zip(&matched)
        .filter(|(_, was_matched)| !**was_matched)
        .map(|(case, _)| case.id.clone())
        .collect();

    ReconcileOutcome {
        kept,
        fresh,
        superseded_ids,
    }
}

/// Render the refinement block of a regeneration prompt: the parent
/// run's output plus the user's clarification answers, in order.
pub fn build_refinement(
    prior_cases: &[TestCase],
    answers: &[ClarificationAnswer],
) -> Result<String, serde_json::Error> {
    let prior_json = serde_json::to_string_pretty(prior_cases)?;

    let answer_lines = answers
        .iter()
        .map(|answer| format!("- {}: {}", answer.question_id, answer.values.join("; ")))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!(
        r#"These test cases were generated previously:
{prior_json}

The user answered these clarification questions:
{answer_lines}

Regenerate the test cases for the requirement above:
1. Address every clarification answer.
2. Keep test cases that are still correct exactly as they are, with
   identical title, steps and expected_result.
3. Improve or add test cases where the answers call for it."#
    ))
}
