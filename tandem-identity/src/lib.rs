pub mod cache;
pub mod config;
pub mod models;
pub mod notify;
pub mod routes;
pub mod schema;
pub mod services;
pub mod store;

use std::sync::Arc;

use axum::extract::FromRef;
use metrics_exporter_prometheus::PrometheusHandle;

use tandem_shared::middleware::SharedAuthenticator;

use config::AppConfig;
use services::IdentityService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub identity: Arc<IdentityService>,
    /// Absent when the global recorder could not be installed (e.g. in tests).
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: AppConfig, identity: IdentityService, metrics_handle: Option<PrometheusHandle>) -> Self {
        Self {
            config: Arc::new(config),
            identity: Arc::new(identity),
            metrics_handle,
        }
    }
}

impl FromRef<AppState> for SharedAuthenticator {
    fn from_ref(state: &AppState) -> Self {
        state.identity.clone()
    }
}
