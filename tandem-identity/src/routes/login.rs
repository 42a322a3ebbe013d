use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use tandem_shared::errors::AppResult;
use tandem_shared::types::ApiResponse;

use super::validate_request;
use crate::services::identity::LoginOutcome;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginOutcome>>> {
    validate_request(&req)?;
    let outcome = state.identity.login(&req.email, &req.password).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}
