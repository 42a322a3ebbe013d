use axum::extract::State;
use axum::Json;
use serde::Serialize;

use tandem_shared::errors::AppResult;
use tandem_shared::types::auth::AuthUser;
use tandem_shared::types::ApiResponse;

use crate::services::patch::InterestsReplace;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct InterestsResponse {
    pub interest_ids: Vec<i32>,
}

pub async fn get_interests(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<InterestsResponse>>> {
    let interest_ids = state.identity.get_interests(user.id).await?;
    Ok(Json(ApiResponse::ok(InterestsResponse { interest_ids })))
}

pub async fn replace_interests(
    user: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<InterestsReplace>,
) -> AppResult<Json<ApiResponse<InterestsResponse>>> {
    let interest_ids = state.identity.replace_interests(user.id, req).await?;
    Ok(Json(ApiResponse::ok(InterestsResponse { interest_ids })))
}
