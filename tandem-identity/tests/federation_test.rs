//! Integration tests for federated login

mod common;

use std::sync::atomic::Ordering;

use axum::http::StatusCode;
use serde_json::json;
use tandem_identity::models::{NewAccount, Profile};
use tandem_identity::services::credentials;
use tandem_identity::store::AccountStore;
use tandem_shared::types::auth::UserRole;

use common::{error_code, setup, setup_scripted, tokens, PASSWORD};

/// Test: first federated login creates a passwordless account
#[tokio::test]
async fn test_federated_login_creates_account() {
    let ctx = setup();

    let (status, body) = ctx
        .post("/auth/federated-login", json!({ "code": "g-100|New@Example.com|New Person" }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_new_user"], true);
    let (access, _) = tokens(&body);

    let (status, me) = ctx.get_authed("/users/me", &access).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["email"], "new@example.com");
    assert_eq!(me["data"]["display_name"], "New Person");

    let (status, _) = ctx
        .post("/auth/login", json!({ "email": "new@example.com", "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

/// Test: repeated logins with the same external id reuse the account
#[tokio::test]
async fn test_federated_login_is_stable() {
    let ctx = setup();

    let (_, first) = ctx
        .post("/auth/federated-login", json!({ "code": "g-7|seven@example.com|Seven" }))
        .await;
    let (_, second) = ctx
        .post("/auth/federated-login", json!({ "code": "g-7|renamed@example.com|Seven" }))
        .await;

    assert_eq!(first["data"]["account_id"], second["data"]["account_id"]);
    assert_eq!(second["data"]["is_new_user"], false);
}

/// Test: an existing email account keeps its id and role when linked
#[tokio::test]
async fn test_federated_login_links_existing_email() {
    let ctx = setup();
    let existing = ctx
        .store
        .create_account(NewAccount {
            email: "admin@example.com".into(),
            password_hash: Some(credentials::hash_password(PASSWORD).unwrap()),
            external_id: None,
            role: UserRole::Admin,
            profile: Profile { display_name: "Test User".into(), ..Profile::default() },
        })
        .await
        .unwrap();

    let (status, body) = ctx
        .post("/auth/federated-login", json!({ "code": "g-admin|ADMIN@example.com|Someone" }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_new_user"], false);
    assert_eq!(body["data"]["account_id"], existing.id.to_string());
    assert_eq!(body["data"]["role"], "admin");

    let linked = ctx.store.find_by_external_id("g-admin").await.unwrap().unwrap();
    assert_eq!(linked.id, existing.id);
    assert_eq!(linked.profile.display_name, "Test User");

    let (status, _) = ctx
        .post("/auth/login", json!({ "email": "admin@example.com", "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::OK);
}

/// Test: losing a first-login race to a concurrent create still logs in
#[tokio::test]
async fn test_federated_login_recovers_from_concurrent_create() {
    let (ctx, scripted) = setup_scripted();
    let (_, first) = ctx
        .post("/auth/federated-login", json!({ "code": "g-race|race@example.com|Racer" }))
        .await;
    assert_eq!(first["data"]["is_new_user"], true);

    // Both lookups miss, as if the other login had not committed yet.
    scripted.hidden_lookups.store(2, Ordering::SeqCst);
    let (status, second) = ctx
        .post("/auth/federated-login", json!({ "code": "g-race|race@example.com|Racer" }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["is_new_user"], false);
    assert_eq!(second["data"]["account_id"], first["data"]["account_id"]);
    assert_eq!(scripted.hidden_lookups.load(Ordering::SeqCst), 0);
}

/// Test: provider rejection surfaces as an OAuth error
#[tokio::test]
async fn test_federated_login_provider_failure() {
    let ctx = setup();

    let (status, body) = ctx.post("/auth/federated-login", json!({ "code": "garbage" })).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(error_code(&body), "E1007");

    let (status, _) = ctx.post("/auth/federated-login", json!({ "code": "   " })).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}
