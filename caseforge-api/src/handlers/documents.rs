use crate::models::error_response;
use crate::AppState;
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use shared_types::{GenerateRequest, RegenerateRequest};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub filename: String,
}

/// Ingest a requirements document. The payload is the raw document
/// bytes; the declared media type travels in the Content-Type header.
#[post("/documents")]
pub async fn upload(
    params: web::Query<UploadParams>,
    request: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> impl Responder {
    let media_type = request
        .headers()
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(';').next().unwrap_or(value).trim().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    info!(filename = %params.filename, %media_type, size = body.len(), "Upload received");

    match state
        .pipeline
        .upload(&body, &params.filename, &media_type, None)
        .await
    {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => error_response(&e),
    }
}

#[post("/documents/{document_id}/generate")]
pub async fn generate(
    document_id: web::Path<String>,
    body: web::Json<GenerateRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    let document_id = document_id.into_inner();
    info!(%document_id, force = body.force, "Generation requested");

    match state
        .pipeline
        .generate(&document_id, body.actor.as_deref(), body.force)
        .await
    {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => error_response(&e),
    }
}

#[post("/documents/{document_id}/regenerate")]
pub async fn regenerate(
    document_id: web::Path<String>,
    body: web::Json<RegenerateRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    let document_id = document_id.into_inner();
    info!(
        %document_id,
        answer_count = body.answers.len(),
        "Regeneration requested"
    );

    match state
        .pipeline
        .regenerate(&document_id, &body.answers, body.actor.as_deref())
        .await
    {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => error_response(&e),
    }
}

#[get("/documents/{document_id}/traceability")]
pub async fn traceability(
    document_id: web::Path<String>,
    state: web::Data<AppState>,
) -> impl Responder {
    match state.pipeline.traceability(&document_id) {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(e) => error_response(&e),
    }
}
