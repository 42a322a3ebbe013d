use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use tandem_shared::middleware::extract_bearer_token;
use tandem_shared::types::ApiResponse;

use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// Revokes the bearer access token and the refresh token in the body, when given.
/// Succeeds whatever was presented.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<LogoutRequest>>,
) -> Json<ApiResponse<&'static str>> {
    let access_token = extract_bearer_token(&headers).ok();
    let req = body.map(|Json(req)| req).unwrap_or_default();

    state
        .identity
        .logout(access_token.as_deref(), req.refresh_token.as_deref())
        .await;

    Json(ApiResponse::ok("logged out"))
}
