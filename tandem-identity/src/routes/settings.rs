use axum::extract::State;
use axum::Json;

use tandem_shared::errors::AppResult;
use tandem_shared::types::auth::AuthUser;
use tandem_shared::types::ApiResponse;

use crate::models::{UserSettings, Versioned};
use crate::services::patch::SettingsPatch;
use crate::AppState;

pub async fn get_settings(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Versioned<UserSettings>>>> {
    let settings = state.identity.get_settings(user.id).await?;
    Ok(Json(ApiResponse::ok(settings)))
}

pub async fn update_settings(
    user: AuthUser,
    State(state): State<AppState>,
    Json(patch): Json<SettingsPatch>,
) -> AppResult<Json<ApiResponse<Versioned<UserSettings>>>> {
    let settings = state.identity.patch_settings(user.id, patch).await?;
    Ok(Json(ApiResponse::ok(settings)))
}
