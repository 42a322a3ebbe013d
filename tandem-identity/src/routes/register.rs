use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use tandem_shared::errors::AppResult;
use tandem_shared::types::ApiResponse;

use super::validate_request;
use crate::services::identity::{SignupOutcome, SignupRequest};
use crate::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<SignupOutcome>>)> {
    validate_request(&req)?;
    let outcome = state.identity.signup(req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(outcome))))
}
