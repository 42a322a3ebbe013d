use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use tandem_shared::errors::AppResult;
use tandem_shared::types::ApiResponse;

use crate::services::identity::FederatedOutcome;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct FederatedLoginRequest {
    pub code: String,
}

pub async fn federated_login(
    State(state): State<AppState>,
    Json(req): Json<FederatedLoginRequest>,
) -> AppResult<Json<ApiResponse<FederatedOutcome>>> {
    let outcome = state.identity.federated_login(&req.code).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}
