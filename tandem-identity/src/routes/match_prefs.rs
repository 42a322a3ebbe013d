use axum::extract::State;
use axum::Json;

use tandem_shared::errors::AppResult;
use tandem_shared::types::auth::AuthUser;
use tandem_shared::types::ApiResponse;

use crate::models::{MatchPreferences, Versioned};
use crate::services::patch::MatchPrefsPatch;
use crate::AppState;

pub async fn get_match_prefs(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Versioned<MatchPreferences>>>> {
    let prefs = state.identity.get_match_prefs(user.id).await?;
    Ok(Json(ApiResponse::ok(prefs)))
}

pub async fn update_match_prefs(
    user: AuthUser,
    State(state): State<AppState>,
    Json(patch): Json<MatchPrefsPatch>,
) -> AppResult<Json<ApiResponse<Versioned<MatchPreferences>>>> {
    let prefs = state.identity.patch_match_prefs(user.id, patch).await?;
    Ok(Json(ApiResponse::ok(prefs)))
}
