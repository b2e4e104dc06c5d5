use crate::models::{error_response, ErrorResponse};
use crate::AppState;
use actix_web::{get, web, HttpResponse, Responder};
use shared_types::ExportFormat;
use tracing::info;

#[get("/documents/{document_id}/export/{format}")]
pub async fn export(
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
) -> impl Responder {
    let (document_id, format_tag) = path.into_inner();

    let Some(format) = ExportFormat::parse(&format_tag) else {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: format!("unknown export format: {}", format_tag),
            kind: "export".to_string(),
        });
    };

    info!(%document_id, format = format.as_str(), "Export requested");

    match state.pipeline.export(&document_id, format, None).await {
        Ok(exported) => HttpResponse::Ok()
            .content_type(exported.content_type)
            .insert_header((
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", exported.filename),
            ))
            .body(exported.bytes),
        Err(e) => error_response(&e),
    }
}
