//! Integration tests for profile, settings, match preferences and interests

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;
use tandem_identity::models::UserSettings;
use tandem_identity::store::{AccountStore, ResourceStore};
use tandem_shared::errors::ErrorCode;

use common::{error_code, setup};

/// Test: profile patch normalizes values and bumps the version
#[tokio::test]
async fn test_patch_profile() {
    let ctx = setup();
    let (access, _) = ctx.signup("profile@example.com").await;

    let (_, before) = ctx.get_authed("/users/me", &access).await;
    assert_eq!(before["data"]["version"], 1);

    let (status, body) = ctx
        .patch_authed(
            "/users/me",
            &access,
            json!({ "display_name": "  Renamed  ", "gender": "Female", "country_code": "de", "about": null }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["display_name"], "Renamed");
    assert_eq!(body["data"]["gender"], "female");
    assert_eq!(body["data"]["country_code"], "DE");
    assert_eq!(body["data"]["version"], 2);
}

/// Test: an empty patch changes nothing, including the version
#[tokio::test]
async fn test_empty_profile_patch_is_noop() {
    let ctx = setup();
    let (access, _) = ctx.signup("noop@example.com").await;

    let (status, body) = ctx.patch_authed("/users/me", &access, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["version"], 1);

    let (_, body) = ctx
        .patch_authed("/users/me", &access, json!({ "display_name": "Test User" }))
        .await;
    assert_eq!(body["data"]["version"], 1);
}

/// Test: an invalid field rejects the whole patch
#[tokio::test]
async fn test_invalid_profile_patch_leaves_record_unchanged() {
    let ctx = setup();
    let (access, _) = ctx.signup("invalid@example.com").await;

    let (status, body) = ctx
        .patch_authed("/users/me", &access, json!({ "display_name": "Fine", "age": 5 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "E0002");
    assert_eq!(body["error"]["details"]["field"], "age");

    let (_, me) = ctx.get_authed("/users/me", &access).await;
    assert_eq!(me["data"]["display_name"], "Test User");
    assert_eq!(me["data"]["version"], 1);
}

/// Test: settings start from defaults and are created on first write
#[tokio::test]
async fn test_settings_defaults_and_patch() {
    let ctx = setup();
    let (access, _) = ctx.signup("settings@example.com").await;

    let (status, body) = ctx.get_authed("/users/me/settings", &access).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["version"], 0);
    assert_eq!(body["data"]["discoverable"], true);
    assert_eq!(body["data"]["notify_email"], false);

    let (status, body) = ctx
        .patch_authed("/users/me/settings", &access, json!({ "discoverable": false }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["discoverable"], false);
    assert_eq!(body["data"]["allow_messages"], true);
    assert_eq!(body["data"]["version"], 1);

    let (_, body) = ctx
        .patch_authed("/users/me/settings", &access, json!({ "discoverable": false }))
        .await;
    assert_eq!(body["data"]["version"], 1);
}

/// Test: min_level above max_level is rejected and nothing is stored
#[tokio::test]
async fn test_match_prefs_level_range() {
    let ctx = setup();
    let (access, _) = ctx.signup("prefs@example.com").await;

    let (status, body) = ctx
        .patch_authed("/users/me/match-prefs", &access, json!({ "min_level": 5, "max_level": 2 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "E0002");

    let (_, body) = ctx.get_authed("/users/me/match-prefs", &access).await;
    assert_eq!(body["data"]["version"], 0);
    assert!(body["data"]["min_level"].is_null());

    let (status, _) = ctx
        .patch_authed("/users/me/match-prefs", &access, json!({ "min_level": 2, "max_level": 5 }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx
        .patch_authed("/users/me/match-prefs", &access, json!({ "min_level": 6 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Test: country lists are upper-cased, deduplicated and sorted
#[tokio::test]
async fn test_match_prefs_country_list() {
    let ctx = setup();
    let (access, _) = ctx.signup("countries@example.com").await;

    let (status, body) = ctx
        .patch_authed(
            "/users/me/match-prefs",
            &access,
            json!({ "countries_allow": ["us", "US", "gb", "zzz"], "gender_filter": "any", "target_lang": "es" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["countries_allow"], json!(["GB", "US"]));
    assert_eq!(body["data"]["gender_filter"], "any");
}

/// Test: interests are replaced as a deduplicated, sorted set
#[tokio::test]
async fn test_replace_interests() {
    let ctx = setup();
    let (access, _) = ctx.signup("interests@example.com").await;

    let (status, body) = ctx
        .call(Method::PUT, "/users/me/interests", Some(&access), Some(json!({ "interest_ids": [3, 1, 3, 2] })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["interest_ids"], json!([1, 2, 3]));

    let (_, body) = ctx.get_authed("/users/me/interests", &access).await;
    assert_eq!(body["data"]["interest_ids"], json!([1, 2, 3]));

    let (status, _) = ctx
        .call(Method::PUT, "/users/me/interests", Some(&access), Some(json!({ "interest_ids": [] })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = ctx.get_authed("/users/me/interests", &access).await;
    assert_eq!(body["data"]["interest_ids"], json!([1, 2, 3]));
}

/// Test: a write against an old version is refused
#[tokio::test]
async fn test_stale_writes_are_rejected() {
    let ctx = setup();
    ctx.signup("stale@example.com").await;
    let account = ctx.store.find_by_email("stale@example.com").await.unwrap().unwrap();

    let settings = UserSettings { discoverable: false, ..UserSettings::default() };
    let version = ctx.store.save_settings(account.id, &settings, 0).await.unwrap();
    assert_eq!(version, 1);

    let err = ctx.store.save_settings(account.id, &settings, 0).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::StaleWrite);

    let err = ctx
        .store
        .save_profile(account.id, &account.profile, account.version + 1)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::StaleWrite);
}

/// Test: health reports both dependencies; metrics are absent without a recorder
#[tokio::test]
async fn test_health_and_metrics() {
    let ctx = setup();

    let (status, body) = ctx.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"].as_array().unwrap().len(), 2);

    let (status, _) = ctx.call(Method::GET, "/metrics", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
