use actix_web::HttpResponse;
use caseforge_core::{ErrorKind, PipelineError};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

/// Map a pipeline error onto an HTTP response with a JSON envelope
pub fn error_response(error: &PipelineError) -> HttpResponse {
    let body = ErrorResponse {
        error: error.to_string(),
        kind: kind_name(error.kind()).to_string(),
    };

    match error.kind() {
        ErrorKind::Validation | ErrorKind::Export => HttpResponse::BadRequest().json(body),
        ErrorKind::Conflict | ErrorKind::RunLockConflict => HttpResponse::Conflict().json(body),
        ErrorKind::Extraction => HttpResponse::UnprocessableEntity().json(body),
        ErrorKind::SchemaViolation => HttpResponse::BadGateway().json(body),
        ErrorKind::Storage => HttpResponse::ServiceUnavailable().json(body),
    }
}

fn kind_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Validation => "validation",
        ErrorKind::Storage => "storage",
        ErrorKind::Extraction => "extraction",
        ErrorKind::SchemaViolation => "schema_violation",
        ErrorKind::RunLockConflict => "run_lock_conflict",
        ErrorKind::Conflict => "conflict",
        ErrorKind::Export => "export",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_map_to_statuses() {
        let conflict = PipelineError::conflict("stale status");
        assert_eq!(error_response(&conflict).status(), 409);

        let validation = PipelineError::validation("bad media type");
        assert_eq!(error_response(&validation).status(), 400);

        let lock = PipelineError::run_lock_conflict("run in flight");
        assert_eq!(error_response(&lock).status(), 409);

        let storage = PipelineError::storage("unavailable");
        assert_eq!(error_response(&storage).status(), 503);
    }
}
