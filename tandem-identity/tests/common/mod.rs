//! Common test utilities for identity integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use tandem_identity::cache::{Cache, MemoryCache};
use tandem_identity::config::{AppConfig, CacheBackend, StorageBackend};
use tandem_identity::notify::Notifier;
use tandem_identity::routes;
use tandem_identity::services::federation::{ExternalIdentity, IdentityProvider};
use tandem_identity::services::{Collaborators, IdentityService};
use tandem_identity::models::{Account, NewAccount, NewPasswordResetToken, PasswordResetToken, Profile};
use tandem_identity::store::{AccountStore, MemoryStore};
use tandem_identity::AppState;
use tandem_shared::errors::{AppError, AppResult, ErrorCode};

pub const PASSWORD: &str = "Sup3r-secret";
pub const NEW_PASSWORD: &str = "N3w-password!";

/// Mock notifier that captures every message
#[derive(Default, Clone)]
pub struct MockNotifier {
    /// Captured (recipient, body) pairs
    pub sent: Arc<RwLock<Vec<(String, String)>>>,
}

impl MockNotifier {
    pub fn count(&self) -> usize {
        self.sent.read().unwrap().len()
    }

    /// Get the reset token from the last message sent to an address
    pub fn get_token(&self, email: &str) -> Option<String> {
        let sent = self.sent.read().unwrap();
        let (_, body) = sent.iter().rev().find(|(to, _)| to == email)?;
        let start = body.find("token=")? + "token=".len();
        let token: String = body[start..].chars().take_while(|c| c.is_ascii_hexdigit()).collect();
        Some(token)
    }
}

#[axum::async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, to: &str, _subject: &str, html: &str) -> Result<(), String> {
        self.sent.write().unwrap().push((to.to_string(), html.to_string()));
        Ok(())
    }
}

/// Provider that accepts codes of the form `{external_id}|{email}|{name}`
pub struct MockProvider;

#[axum::async_trait]
impl IdentityProvider for MockProvider {
    async fn exchange_code(&self, code: &str) -> AppResult<ExternalIdentity> {
        let mut parts = code.split('|');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(external_id), Some(email), name) => Ok(ExternalIdentity {
                external_id: external_id.to_string(),
                email: email.to_string(),
                display_name: name.map(str::to_string),
            }),
            _ => Err(AppError::new(ErrorCode::OAuthError, "provider rejected the code")),
        }
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        storage: StorageBackend::Memory,
        cache: CacheBackend::Memory,
        jwt_secret: "integration-test-secret".into(),
        reset_link_base: "https://app.test/reset".into(),
        expose_reset_tokens: true,
        ..AppConfig::default()
    }
}

/// A service wired to in-memory collaborators
pub struct TestContext {
    pub service: Arc<IdentityService>,
    pub store: Arc<MemoryStore>,
    pub notifier: MockNotifier,
    pub app: Router,
}

pub fn setup() -> TestContext {
    setup_with(test_config())
}

pub fn setup_with(config: AppConfig) -> TestContext {
    let store = Arc::new(MemoryStore::new());
    build(config, store.clone(), store, Arc::new(MemoryCache::new()))
}

/// Same wiring, with a caller-supplied revocation cache
pub fn setup_with_cache(cache: Arc<dyn Cache>) -> TestContext {
    let store = Arc::new(MemoryStore::new());
    build(test_config(), store.clone(), store, cache)
}

/// Same wiring, with account calls routed through a `ScriptedStore`
pub fn setup_scripted() -> (TestContext, Arc<ScriptedStore>) {
    let store = Arc::new(MemoryStore::new());
    let scripted = Arc::new(ScriptedStore::new(store.clone()));
    let ctx = build(test_config(), store, scripted.clone(), Arc::new(MemoryCache::new()));
    (ctx, scripted)
}

fn build(config: AppConfig, store: Arc<MemoryStore>, accounts: Arc<dyn AccountStore>, cache: Arc<dyn Cache>) -> TestContext {
    let notifier = MockNotifier::default();

    let service = IdentityService::new(
        &config,
        Collaborators {
            accounts,
            resources: store.clone(),
            cache,
            notifier: Arc::new(notifier.clone()),
            provider: Arc::new(MockProvider),
        },
    );

    let state = AppState::new(config, service, None);
    let service = state.identity.clone();
    let app = routes::router(state);

    TestContext { service, store, notifier, app }
}

/// Decrements `counter` if it is positive; true when it did.
fn take(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Account store that delegates to a `MemoryStore` but can be told to misbehave
pub struct ScriptedStore {
    pub inner: Arc<MemoryStore>,
    /// Number of upcoming token-backed password resets that fail as unavailable
    pub failing_resets: AtomicUsize,
    /// Number of upcoming email or external id lookups that report nothing
    pub hidden_lookups: AtomicUsize,
}

impl ScriptedStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self { inner, failing_resets: AtomicUsize::new(0), hidden_lookups: AtomicUsize::new(0) }
    }
}

#[axum::async_trait]
impl AccountStore for ScriptedStore {
    async fn create_account(&self, account: NewAccount) -> AppResult<Account> {
        self.inner.create_account(account).await
    }

    async fn get_account(&self, id: Uuid) -> AppResult<Option<Account>> {
        self.inner.get_account(id).await
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        if take(&self.hidden_lookups) {
            return Ok(None);
        }
        self.inner.find_by_email(email).await
    }

    async fn find_by_external_id(&self, external_id: &str) -> AppResult<Option<Account>> {
        if take(&self.hidden_lookups) {
            return Ok(None);
        }
        self.inner.find_by_external_id(external_id).await
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> AppResult<()> {
        self.inner.set_password_hash(id, password_hash).await
    }

    async fn bind_external_id(&self, id: Uuid, external_id: &str) -> AppResult<()> {
        self.inner.bind_external_id(id, external_id).await
    }

    async fn save_profile(&self, id: Uuid, profile: &Profile, expected_version: i64) -> AppResult<i64> {
        self.inner.save_profile(id, profile, expected_version).await
    }

    async fn insert_reset_token(&self, token: NewPasswordResetToken) -> AppResult<()> {
        self.inner.insert_reset_token(token).await
    }

    async fn find_reset_token(&self, token: &str, now: DateTime<Utc>) -> AppResult<Option<PasswordResetToken>> {
        self.inner.find_reset_token(token, now).await
    }

    async fn reset_password_with_token(&self, token_id: Uuid, password_hash: &str, now: DateTime<Utc>) -> AppResult<bool> {
        if take(&self.failing_resets) {
            return Err(AppError::unavailable("database pool: timed out"));
        }
        self.inner.reset_password_with_token(token_id, password_hash, now).await
    }
}

/// Memory cache that pauses before every call, widening any check-then-act window
pub struct SlowCache {
    inner: MemoryCache,
    delay: Duration,
}

impl SlowCache {
    pub fn new(delay: Duration) -> Self {
        Self { inner: MemoryCache::new(), delay }
    }
}

#[axum::async_trait]
impl Cache for SlowCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.set(key, value, ttl).await
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        tokio::time::sleep(self.delay).await;
        self.inner.set_if_absent(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete(key).await
    }
}

impl TestContext {
    /// Send a request and return the status with the decoded JSON body
    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, None, Some(body)).await
    }

    pub async fn get_authed(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(token), None).await
    }

    pub async fn patch_authed(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PATCH, uri, Some(token), Some(body)).await
    }

    /// Sign up through the API and return (access_token, refresh_token)
    pub async fn signup(&self, email: &str) -> (String, String) {
        let (status, body) = self
            .post(
                "/auth/signup",
                serde_json::json!({
                    "email": email,
                    "password": PASSWORD,
                    "display_name": "Test User",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
        tokens(&body)
    }
}

/// Pull the token pair out of a success envelope
pub fn tokens(body: &Value) -> (String, String) {
    let data = &body["data"];
    (
        data["access_token"].as_str().unwrap().to_string(),
        data["refresh_token"].as_str().unwrap().to_string(),
    )
}

pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}
