use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use tandem_shared::errors::AppResult;
use tandem_shared::types::ApiResponse;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
    pub repeat_password: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    state
        .identity
        .confirm_password_reset(&req.token, &req.new_password, &req.repeat_password)
        .await?;
    Ok(Json(ApiResponse::ok("password reset successful")))
}
