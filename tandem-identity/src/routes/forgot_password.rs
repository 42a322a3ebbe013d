use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use tandem_shared::errors::AppResult;
use tandem_shared::types::ApiResponse;

use crate::AppState;

pub const RESET_REQUESTED: &str = "if the email is registered, a reset link has been sent";

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ResetRequested {
    /// Only populated when the service runs with `expose_reset_tokens`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> AppResult<Json<ApiResponse<ResetRequested>>> {
    let token = state.identity.request_password_reset(&req.email).await?;
    let reset_token = token.filter(|_| state.config.expose_reset_tokens);

    Ok(Json(ApiResponse::ok_with_message(ResetRequested { reset_token }, RESET_REQUESTED)))
}
