use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use tandem_shared::errors::AppResult;
use tandem_shared::types::ApiResponse;

use crate::services::identity::LoginOutcome;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<Json<ApiResponse<LoginOutcome>>> {
    let outcome = state.identity.refresh(req.refresh_token.trim()).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}
