use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use validator::Validate;

use tandem_shared::errors::{AppError, AppResult, ErrorCode};
use tandem_shared::middleware::metrics_middleware;

use crate::AppState;

pub mod change_password;
pub mod federated;
pub mod forgot_password;
pub mod health;
pub mod interests;
pub mod login;
pub mod logout;
pub mod match_prefs;
pub mod me;
pub mod refresh;
pub mod register;
pub mod reset_password;
pub mod settings;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route("/auth/signup", post(register::register))
        .route("/auth/login", post(login::login))
        .route("/auth/refresh", post(refresh::refresh_token))
        .route("/auth/logout", post(logout::logout))
        .route("/auth/change-password", post(change_password::change_password))
        .route("/auth/federated-login", post(federated::federated_login))
        .route("/auth/request-password-reset", post(forgot_password::forgot_password))
        .route("/auth/confirm-password-reset", post(reset_password::reset_password))
        .route("/users/me", get(me::me).patch(me::update_me))
        .route("/users/me/settings", get(settings::get_settings).patch(settings::update_settings))
        .route("/users/me/match-prefs", get(match_prefs::get_match_prefs).patch(match_prefs::update_match_prefs))
        .route("/users/me/interests", get(interests::get_interests).put(interests::replace_interests))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Runs derive-based request checks, reporting every failing field.
pub(crate) fn validate_request<T: Validate>(req: &T) -> AppResult<()> {
    req.validate().map_err(|errors| {
        AppError::with_details(
            ErrorCode::ValidationError,
            "request validation failed",
            serde_json::to_value(&errors).unwrap_or_default(),
        )
    })
}
