use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use tandem_shared::errors::AppResult;
use tandem_shared::types::auth::AuthUser;
use tandem_shared::types::ApiResponse;

use super::validate_request;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "current password is required"))]
    pub old_password: String,
    pub new_password: String,
}

pub async fn change_password(
    user: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    validate_request(&req)?;
    state
        .identity
        .change_password(user.id, &req.old_password, &req.new_password)
        .await?;
    Ok(Json(ApiResponse::ok("password changed")))
}
