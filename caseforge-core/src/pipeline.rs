//! The pipeline facade: the surface the API layer calls.
//!
//! Wires the gateway, extractor, orchestrator, regeneration diff,
//! traceability index, audit logger and export service together, and
//! owns the per-document run slots.

use crate::audit::{AuditLogger, AuditStore};
use crate::compliance::ComplianceDictionary;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::export::exporter_for;
use crate::extractor::{RequirementExtractor, TextExtractor};
use crate::orchestrator::{GenerationContext, GenerationOrchestrator};
use crate::regeneration::{build_refinement, reconcile_requirement};
use crate::runs::RunSlots;
use crate::storage::ObjectStorage;
use crate::traceability::TraceabilityIndex;
use caseforge_llm_sdk::LlmClient;
use chrono::Utc;
use sha2::{Digest, Sha256};
use shared_types::{
    AuditAction, AuditEntry, AuditFilter, AuditOutcome, ClarificationAnswer, DocumentStatus,
    ExportFormat, GenerationResponse, GenerationRun, Requirement, RequirementsDocument,
    SetTestCaseStatusResponse, TestCaseStatus, TraceabilityRow, UploadResponse,
};
use std::sync::Arc;

/// A fully rendered export payload
pub struct ExportedDocument {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
    pub audit_warning: Option<String>,
}

pub struct Pipeline {
    config: PipelineConfig,
    index: TraceabilityIndex,
    slots: RunSlots,
    storage: Arc<dyn ObjectStorage>,
    text_extractor: Arc<dyn TextExtractor>,
    requirement_extractor: RequirementExtractor,
    orchestrator: GenerationOrchestrator,
    audit: AuditLogger,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        storage: Arc<dyn ObjectStorage>,
        text_extractor: Arc<dyn TextExtractor>,
        llm: Arc<dyn LlmClient>,
        audit_store: Arc<dyn AuditStore>,
        dictionary: Arc<ComplianceDictionary>,
    ) -> Self {
        let orchestrator = GenerationOrchestrator::new(
            llm,
            dictionary.clone(),
            config.generation_retry.clone(),
            config.model.clone(),
            config.max_tokens,
            config.temperature,
        );

        Self {
            slots: RunSlots::new(config.run_slot_policy),
            index: TraceabilityIndex::new(),
            storage,
            text_extractor,
            requirement_extractor: RequirementExtractor::new(dictionary),
            orchestrator,
            audit: AuditLogger::new(audit_store),
            config,
        }
    }

    fn resolve_actor<'a>(&'a self, actor: Option<&'a str>) -> &'a str {
        actor.unwrap_or(&self.config.default_actor)
    }

    async fn audit_failure(
        &self,
        actor: &str,
        action: AuditAction,
        target_id: &str,
        error: &PipelineError,
    ) {
        self.audit
            .record(
                actor,
                action,
                target_id,
                AuditOutcome::Failure,
                serde_json::json!({ "error": error.to_string() }),
            )
            .await;
    }

    /// Validate and ingest an uploaded document.
    ///
    /// Media type and size violations are not retried; storage writes
    /// go through the bounded retry policy and a terminal failure
    /// leaves no document behind. Re-uploading bytes already ingested
    /// under the same filename returns the existing document.
    pub async fn upload(
        &self,
        bytes: &[u8],
        filename: &str,
        media_type: &str,
        actor: Option<&str>,
    ) -> Result<UploadResponse, PipelineError> {
        let actor = self.resolve_actor(actor);

        if !self.config.media_type_allowed(media_type) {
            let error =
                PipelineError::validation(format!("media type {} is not allowed", media_type));
            self.audit_failure(actor, AuditAction::Upload, filename, &error)
                .await;
            return Err(error);
        }
        if bytes.len() as u64 > self.config.max_upload_bytes {
            let error = PipelineError::validation(format!(
                "payload of {} bytes exceeds the {} byte limit",
                bytes.len(),
                self.config.max_upload_bytes
            ));
            self.audit_failure(actor, AuditAction::Upload, filename, &error)
                .await;
            return Err(error);
        }

        let content_hash = sha256_hex(bytes);

        if let Some(existing) = self.index.find_by_content_hash(&content_hash) {
            if existing.filename == filename {
                tracing::info!(
                    document_id = %existing.id,
                    filename,
                    "Upload matched existing document by content hash"
                );
                let audit_warning = self
                    .audit
                    .record(
                        actor,
                        AuditAction::Upload,
                        &existing.id,
                        AuditOutcome::Success,
                        serde_json::json!({ "filename": filename, "idempotent": true }),
                    )
                    .await;
                return Ok(UploadResponse {
                    document_id: existing.id.clone(),
                    filename: existing.filename,
                    status: existing.status,
                    content_hash: existing.content_hash,
                    size: existing.size,
                    already_existed: true,
                    audit_warning,
                });
            }
        }

        let document_id = uuid::Uuid::new_v4().to_string();
        let key = format!("documents/{}/{}", document_id, filename);

        let mut attempt = 0;
        let storage_ref = loop {
            attempt += 1;
            match self.storage.put(bytes, &key).await {
                Ok(storage_ref) => break storage_ref,
                Err(e) if self.config.storage_retry.should_retry(attempt) => {
                    tracing::warn!(
                        filename,
                        attempt,
                        error = %e,
                        "Storage write failed; backing off"
                    );
                    self.config.storage_retry.backoff(attempt).await;
                }
                Err(e) => {
                    let error = PipelineError::from(e);
                    self.audit_failure(actor, AuditAction::Upload, filename, &error)
                        .await;
                    return Err(error);
                }
            }
        };

        let document = RequirementsDocument {
            id: document_id,
            filename: filename.to_string(),
            media_type: media_type.to_string(),
            size: bytes.len() as u64,
            content_hash: content_hash.clone(),
            storage_ref,
            status: DocumentStatus::Uploaded,
            created_at: Utc::now().timestamp_millis(),
        };
        self.index.insert_document(document.clone());

        tracing::info!(
            document_id = %document.id,
            filename,
            size = document.size,
            "Document ingested"
        );

        let audit_warning = self
            .audit
            .record(
                actor,
                AuditAction::Upload,
                &document.id,
                AuditOutcome::Success,
                serde_json::json!({
                    "filename": filename,
                    "media_type": media_type,
                    "size": document.size,
                }),
            )
            .await;

        Ok(UploadResponse {
            document_id: document.id,
            filename: document.filename,
            status: document.status,
            content_hash,
            size: document.size,
            already_existed: false,
            audit_warning,
        })
    }

    /// Extract requirements for a document still in Uploaded state
    async fn extract_document(
        &self,
        document: &RequirementsDocument,
        actor: &str,
    ) -> Result<(), PipelineError> {
        let text = match self.text_extractor.extract(&document.storage_ref).await {
            Ok(text) => text,
            Err(e) => {
                self.index
                    .set_document_status(&document.id, DocumentStatus::Failed)?;
                let error = PipelineError::from(e);
                self.audit_failure(actor, AuditAction::Extract, &document.id, &error)
                    .await;
                return Err(error);
            }
        };

        match self.requirement_extractor.extract(&document.id, &text) {
            Ok(requirements) => {
                let count = requirements.len();
                self.index.set_requirements(&document.id, requirements)?;
                self.index
                    .set_document_status(&document.id, DocumentStatus::Extracted)?;
                self.audit
                    .record(
                        actor,
                        AuditAction::Extract,
                        &document.id,
                        AuditOutcome::Success,
                        serde_json::json!({ "requirement_count": count }),
                    )
                    .await;
                Ok(())
            }
            Err(e) => {
                self.index
                    .set_document_status(&document.id, DocumentStatus::Failed)?;
                let error = PipelineError::from(e);
                self.audit_failure(actor, AuditAction::Extract, &document.id, &error)
                    .await;
                Err(error)
            }
        }
    }

    fn document_overview(document: &RequirementsDocument, requirements: &[Requirement]) -> String {
        let listing = requirements
            .iter()
            .map(|req| format!("{}: {}", req.id, req.description))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Healthcare requirements document \"{}\" with {} requirements:\n{}",
            document.filename,
            requirements.len(),
            listing
        )
    }

    /// Document made ready for generation: extract on first use, reject
    /// documents whose extraction already failed.
    async fn ready_document(
        &self,
        document_id: &str,
        actor: &str,
        action: AuditAction,
    ) -> Result<RequirementsDocument, PipelineError> {
        let Some(document) = self.index.document(document_id) else {
            let error = PipelineError::validation(format!("document {} not found", document_id));
            self.audit_failure(actor, action, document_id, &error).await;
            return Err(error);
        };

        match document.status {
            DocumentStatus::Failed => {
                let error = PipelineError::validation(format!(
                    "document {} failed extraction; upload it again to retry",
                    document_id
                ));
                self.audit_failure(actor, action, document_id, &error).await;
                Err(error)
            }
            DocumentStatus::Uploaded => {
                self.extract_document(&document, actor).await?;
                Ok(self
                    .index
                    .document(document_id)
                    .expect("document just extracted"))
            }
            DocumentStatus::Extracted => Ok(document),
        }
    }

    /// One synthesis run over every requirement of the document.
    ///
    /// Candidates are always reconciled against the current test case
    /// set through the id-preserving diff; for the root run the prior
    /// set is empty and everything comes out fresh. With `answers` the
    /// prompt carries the refinement block referencing the prior output.
    async fn execute_run(
        &self,
        document: &RequirementsDocument,
        actor: &str,
        action: AuditAction,
        answers: Option<&[ClarificationAnswer]>,
    ) -> Result<GenerationResponse, PipelineError> {
        let document_id = document.id.as_str();
        let parent = self.index.latest_run(document_id);
        let requirements = self.index.requirements(document_id)?;
        let overview = Self::document_overview(document, &requirements);

        let run_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().timestamp_millis();
        let mut kept_ids = Vec::new();
        let mut fresh_cases = Vec::new();
        let mut superseded_ids = Vec::new();
        let mut fallback_count = 0;
        let mut prompt_parts = Vec::with_capacity(requirements.len());

        for requirement in &requirements {
            let prior = self
                .index
                .current_cases_for_requirement(document_id, &requirement.id)?;

            let refinement = match answers {
                Some(answers) => Some(build_refinement(&prior, answers).map_err(|e| {
                    PipelineError::schema_violation(format!(
                        "failed to render prior output: {}",
                        e
                    ))
                })?),
                None => None,
            };
            let context = GenerationContext {
                document_overview: overview.clone(),
                refinement,
            };
            prompt_parts.push(self.orchestrator.requirement_prompt(requirement, &context));

            let outcome = self
                .orchestrator
                .generate_for_requirement(requirement, &context)
                .await;
            if outcome.used_fallback {
                fallback_count += 1;
            }

            let first_free = self.index.max_case_number(document_id, &requirement.id)? + 1;
            let reconciled = reconcile_requirement(
                requirement,
                &prior,
                outcome.candidates,
                &run_id,
                first_free,
                now,
            );

            kept_ids.extend(reconciled.kept.into_iter().map(|case| case.id));
            fresh_cases.extend(reconciled.fresh);
            superseded_ids.extend(reconciled.superseded_ids);
        }

        for test_case_id in &superseded_ids {
            self.index.supersede_test_case(document_id, test_case_id)?;
        }
        self.index
            .insert_test_cases(document_id, fresh_cases.clone())?;

        let kept_count = kept_ids.len();
        let mut produced_test_case_ids = kept_ids;
        produced_test_case_ids.extend(fresh_cases.iter().map(|case| case.id.clone()));

        self.index.record_run(GenerationRun {
            id: run_id.clone(),
            document_id: document_id.to_string(),
            parent_run_id: parent.as_ref().map(|run| run.id.clone()),
            prompt_fingerprint: sha256_hex(prompt_parts.join("\n---\n").as_bytes()),
            produced_test_case_ids: produced_test_case_ids.clone(),
            created_at: now,
        })?;

        tracing::info!(
            document_id,
            run_id = %run_id,
            kept = kept_count,
            new = fresh_cases.len(),
            superseded = superseded_ids.len(),
            fallback_count,
            "Synthesis run completed"
        );

        let mut detail = serde_json::json!({
            "run_id": run_id,
            "requirement_count": requirements.len(),
            "kept": kept_count,
            "new": fresh_cases.len(),
            "superseded": superseded_ids.len(),
            "fallback_count": fallback_count,
        });
        if let Some(parent) = &parent {
            detail["parent_run_id"] = serde_json::json!(parent.id);
        }
        if let Some(answers) = answers {
            detail["answer_count"] = serde_json::json!(answers.len());
        }
        let audit_warning = self
            .audit
            .record(actor, action, document_id, AuditOutcome::Success, detail)
            .await;

        let test_cases = self
            .index
            .test_cases_by_ids(document_id, &produced_test_case_ids)?;

        Ok(GenerationResponse {
            run_id,
            document_id: document_id.to_string(),
            test_cases,
            fallback_count,
            audit_warning,
        })
    }

    /// Generate test cases for every requirement of the document.
    ///
    /// Idempotent per document: with a completed run already recorded,
    /// the existing result is returned unless `force` is set.
    pub async fn generate(
        &self,
        document_id: &str,
        actor: Option<&str>,
        force: bool,
    ) -> Result<GenerationResponse, PipelineError> {
        let actor = self.resolve_actor(actor);

        let _guard = match self.slots.acquire(document_id).await {
            Ok(guard) => guard,
            Err(error) => {
                self.audit_failure(actor, AuditAction::Generate, document_id, &error)
                    .await;
                return Err(error);
            }
        };

        let document = self
            .ready_document(document_id, actor, AuditAction::Generate)
            .await?;

        if !force {
            if let Some(run) = self.index.latest_run(document_id) {
                tracing::info!(document_id, run_id = %run.id, "Returning existing generation run");
                let test_cases = self
                    .index
                    .test_cases_by_ids(document_id, &run.produced_test_case_ids)?;
                return Ok(GenerationResponse {
                    run_id: run.id,
                    document_id: document_id.to_string(),
                    test_cases,
                    fallback_count: 0,
                    audit_warning: None,
                });
            }
        }

        self.execute_run(&document, actor, AuditAction::Generate, None)
            .await
    }

    /// Regenerate with clarification answers, reconciling the new
    /// candidates against the parent run through the id-preserving diff
    pub async fn regenerate(
        &self,
        document_id: &str,
        answers: &[ClarificationAnswer],
        actor: Option<&str>,
    ) -> Result<GenerationResponse, PipelineError> {
        let actor = self.resolve_actor(actor);

        let _guard = match self.slots.acquire(document_id).await {
            Ok(guard) => guard,
            Err(error) => {
                self.audit_failure(actor, AuditAction::Regenerate, document_id, &error)
                    .await;
                return Err(error);
            }
        };

        let document = self
            .ready_document(document_id, actor, AuditAction::Regenerate)
            .await?;

        if self.index.latest_run(document_id).is_none() {
            let error = PipelineError::validation(format!(
                "document {} has no generation run to refine; call generate first",
                document_id
            ));
            self.audit_failure(actor, AuditAction::Regenerate, document_id, &error)
                .await;
            return Err(error);
        }

        self.execute_run(&document, actor, AuditAction::Regenerate, Some(answers))
            .await
    }

    /// Per-document traceability rows, in requirement order
    pub fn traceability(&self, document_id: &str) -> Result<Vec<TraceabilityRow>, PipelineError> {
        self.index.traceability(document_id)
    }

    /// Optimistic status edit; independent of run locking
    pub async fn set_test_case_status(
        &self,
        test_case_id: &str,
        new_status: TestCaseStatus,
        expected_status: TestCaseStatus,
        actor: Option<&str>,
    ) -> Result<SetTestCaseStatusResponse, PipelineError> {
        let actor = self.resolve_actor(actor);

        match self
            .index
            .set_test_case_status(test_case_id, new_status, expected_status)
        {
            Ok((test_case, requirement_status)) => {
                let audit_warning = self
                    .audit
                    .record(
                        actor,
                        AuditAction::StatusChange,
                        test_case_id,
                        AuditOutcome::Success,
                        serde_json::json!({
                            "from": expected_status,
                            "to": new_status,
                        }),
                    )
                    .await;
                Ok(SetTestCaseStatusResponse {
                    test_case,
                    requirement_status,
                    audit_warning,
                })
            }
            Err(error) => {
                self.audit_failure(actor, AuditAction::StatusChange, test_case_id, &error)
                    .await;
                Err(error)
            }
        }
    }

    /// Serialize a point-in-time snapshot of the document's
    /// traceability state
    pub async fn export(
        &self,
        document_id: &str,
        format: ExportFormat,
        actor: Option<&str>,
    ) -> Result<ExportedDocument, PipelineError> {
        let actor = self.resolve_actor(actor);

        let exporter = match exporter_for(format) {
            Ok(exporter) => exporter,
            Err(error) => {
                self.audit_failure(actor, AuditAction::Export, document_id, &error)
                    .await;
                return Err(error);
            }
        };

        let snapshot = match self.index.snapshot(document_id) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                self.audit_failure(actor, AuditAction::Export, document_id, &error)
                    .await;
                return Err(error);
            }
        };

        let bytes = exporter.export(&snapshot)?;

        let audit_warning = self
            .audit
            .record(
                actor,
                AuditAction::Export,
                document_id,
                AuditOutcome::Success,
                serde_json::json!({
                    "format": format.as_str(),
                    "size": bytes.len(),
                }),
            )
            .await;

        Ok(ExportedDocument {
            bytes,
            content_type: exporter.content_type(),
            filename: format!("{}-traceability.{}", document_id, format.as_str()),
            audit_warning,
        })
    }

    /// Read the audit trail, ascending, restartable via the filter's
    /// offset
    pub async fn audit_log(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, PipelineError> {
        Ok(self.audit.query(filter).await?)
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_is_stable() {
        let first = sha256_hex(b"caseforge");
        let second = sha256_hex(b"caseforge");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }
}
