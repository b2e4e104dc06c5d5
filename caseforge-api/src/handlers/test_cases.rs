use crate::models::error_response;
use crate::AppState;
use actix_web::{put, web, HttpResponse, Responder};
use shared_types::SetTestCaseStatusRequest;
use tracing::info;

/// Optimistic status edit: the request carries the status the caller
/// last observed and is rejected with 409 on a mismatch.
#[put("/test-cases/{test_case_id}/status")]
pub async fn set_status(
    test_case_id: web::Path<String>,
    body: web::Json<SetTestCaseStatusRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    let test_case_id = test_case_id.into_inner();
    info!(
        %test_case_id,
        new_status = %body.new_status,
        expected_status = %body.expected_status,
        "Status change requested"
    );

    match state
        .pipeline
        .set_test_case_status(
            &test_case_id,
            body.new_status,
            body.expected_status,
            body.actor.as_deref(),
        )
        .await
    {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => error_response(&e),
    }
}
