//! HTTP surface tests against an app wired with in-memory
//! collaborators and a scripted LLM client.

use actix_web::{test, web, App};
use caseforge_api::storage::{migrations, SqliteAuditStore};
use caseforge_api::{handlers, AppState};
use caseforge_core::{
    ComplianceDictionary, InMemoryObjectStorage, Pipeline, PipelineConfig, PlainTextExtractor,
};
use caseforge_llm_sdk::mock::MockLlmClient;
use shared_types::{GenerationResponse, TraceabilityRow, UploadResponse};
use std::sync::{Arc, Mutex};

const DOC_TEXT: &str = "1. The system must authenticate users with MFA per HIPAA.";

const MFA_CASE: &str = r#"{"test_cases": [{
    "title": "Verify MFA",
    "steps": ["Open login page", "Enter MFA code"],
    "expected_result": "User is authenticated",
    "priority": "High",
    "compliance_refs": ["HIPAA"]
}]}"#;

fn app_state() -> AppState {
    let mut conn = rusqlite::Connection::open_in_memory().unwrap();
    migrations::run_migrations(&mut conn).unwrap();

    let storage = Arc::new(InMemoryObjectStorage::new());
    let pipeline = Pipeline::new(
        PipelineConfig::default(),
        storage.clone(),
        Arc::new(PlainTextExtractor::new(storage)),
        Arc::new(MockLlmClient::always(MFA_CASE)),
        Arc::new(SqliteAuditStore::new(Arc::new(Mutex::new(conn)))),
        Arc::new(ComplianceDictionary::healthcare_default()),
    );

    AppState {
        pipeline: Arc::new(pipeline),
    }
}

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .service(handlers::health::health)
                .service(handlers::documents::upload)
                .service(handlers::documents::generate)
                .service(handlers::documents::regenerate)
                .service(handlers::documents::traceability)
                .service(handlers::test_cases::set_status)
                .service(handlers::export::export)
                .service(handlers::audit::audit_log),
        )
        .await
    };
}

#[actix_web::test]
async fn test_health_endpoint() {
    let app = test_app!(app_state());
    let response = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert!(response.status().is_success());
}

#[actix_web::test]
async fn test_upload_generate_traceability_flow() {
    let app = test_app!(app_state());

    let upload: UploadResponse = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/documents?filename=reqs.txt")
            .insert_header(("content-type", "text/plain"))
            .set_payload(DOC_TEXT)
            .to_request(),
    )
    .await;
    assert!(!upload.already_existed);

    let generation: GenerationResponse = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri(&format!("/documents/{}/generate", upload.document_id))
            .set_json(serde_json::json!({}))
            .to_request(),
    )
    .await;
    assert_eq!(generation.test_cases.len(), 1);
    assert_eq!(generation.test_cases[0].id, "TC-REQ-1-1");

    let rows: Vec<TraceabilityRow> = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri(&format!("/documents/{}/traceability", upload.document_id))
            .to_request(),
    )
    .await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].test_cases.len(), 1);
}

#[actix_web::test]
async fn test_upload_rejects_bad_media_type() {
    let app = test_app!(app_state());

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/documents?filename=image.png")
            .insert_header(("content-type", "image/png"))
            .set_payload("bytes")
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), 400);
}

#[actix_web::test]
async fn test_status_conflict_maps_to_409() {
    let app = test_app!(app_state());

    let upload: UploadResponse = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/documents?filename=reqs.txt")
            .insert_header(("content-type", "text/plain"))
            .set_payload(DOC_TEXT)
            .to_request(),
    )
    .await;
    let _: GenerationResponse = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri(&format!("/documents/{}/generate", upload.document_id))
            .set_json(serde_json::json!({}))
            .to_request(),
    )
    .await;

    let ok = test::call_service(
        &app,
        test::TestRequest::put()
            .uri("/test-cases/TC-REQ-1-1/status")
            .set_json(serde_json::json!({
                "new_status": "pass",
                "expected_status": "not_tested"
            }))
            .to_request(),
    )
    .await;
    assert!(ok.status().is_success());

    let stale = test::call_service(
        &app,
        test::TestRequest::put()
            .uri("/test-cases/TC-REQ-1-1/status")
            .set_json(serde_json::json!({
                "new_status": "fail",
                "expected_status": "not_tested"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(stale.status(), 409);
}

#[actix_web::test]
async fn test_export_csv_and_unknown_format() {
    let app = test_app!(app_state());

    let upload: UploadResponse = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/documents?filename=reqs.txt")
            .insert_header(("content-type", "text/plain"))
            .set_payload(DOC_TEXT)
            .to_request(),
    )
    .await;
    let _: GenerationResponse = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri(&format!("/documents/{}/generate", upload.document_id))
            .set_json(serde_json::json!({}))
            .to_request(),
    )
    .await;

    let csv = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/documents/{}/export/csv", upload.document_id))
            .to_request(),
    )
    .await;
    assert!(csv.status().is_success());
    let body = test::read_body(csv).await;
    assert!(String::from_utf8_lossy(&body).contains("TRACEABILITY MATRIX"));

    let unknown = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/documents/{}/export/docx", upload.document_id))
            .to_request(),
    )
    .await;
    assert_eq!(unknown.status(), 400);
}

#[actix_web::test]
async fn test_audit_endpoint_returns_trail() {
    let app = test_app!(app_state());

    let upload: UploadResponse = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/documents?filename=reqs.txt")
            .insert_header(("content-type", "text/plain"))
            .set_payload(DOC_TEXT)
            .to_request(),
    )
    .await;

    let entries: Vec<serde_json::Value> = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/audit?action=upload")
            .to_request(),
    )
    .await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["target_id"], upload.document_id.as_str());

    let bad = test::call_service(
        &app,
        test::TestRequest::get().uri("/audit?action=view").to_request(),
    )
    .await;
    assert_eq!(bad.status(), 400);
}
