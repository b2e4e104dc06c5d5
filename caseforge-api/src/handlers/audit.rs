use crate::models::{error_response, ErrorResponse};
use crate::AppState;
use actix_web::{get, web, HttpResponse, Responder};
use shared_types::{AuditAction, AuditFilter, AuditQuery};

/// Read the audit trail, ascending by (timestamp, sequence).
/// Restartable: pass the offset where the previous read stopped.
#[get("/audit")]
pub async fn audit_log(
    query: web::Query<AuditQuery>,
    state: web::Data<AppState>,
) -> impl Responder {
    let query = query.into_inner();

    let action = match query.action.as_deref() {
        Some(raw) => match AuditAction::parse(raw) {
            Some(action) => Some(action),
            None => {
                return HttpResponse::BadRequest().json(ErrorResponse {
                    error: format!("unknown audit action: {}", raw),
                    kind: "validation".to_string(),
                });
            }
        },
        None => None,
    };

    let filter = AuditFilter {
        actor: query.actor,
        action,
        target_id: query.target_id,
        from_ms: query.from_ms,
        to_ms: query.to_ms,
        offset: query.offset.unwrap_or(0),
        limit: query.limit,
    };

    match state.pipeline.audit_log(&filter).await {
        Ok(entries) => HttpResponse::Ok().json(entries),
        Err(e) => error_response(&e),
    }
}
