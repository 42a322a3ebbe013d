use axum::extract::State;
use axum::Json;

use tandem_shared::errors::AppResult;
use tandem_shared::types::auth::AuthUser;
use tandem_shared::types::ApiResponse;

use crate::models::Account;
use crate::services::patch::ProfilePatch;
use crate::AppState;

pub async fn me(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Account>>> {
    let account = state.identity.get_profile(user.id).await?;
    Ok(Json(ApiResponse::ok(account)))
}

pub async fn update_me(
    user: AuthUser,
    State(state): State<AppState>,
    Json(patch): Json<ProfilePatch>,
) -> AppResult<Json<ApiResponse<Account>>> {
    let account = state.identity.patch_profile(user.id, patch).await?;
    Ok(Json(ApiResponse::ok(account)))
}
