//! End-to-end tests for the profile updater against a mock profile API.

use chrono::{TimeZone, Utc};
use httpmock::prelude::*;
use profile_sync::{
    AppConfig, AppUser, ClientConfig, HttpProfileClient, InMemoryUserStore, ManualClock,
    ProfileConfig, ProfileSyncError, ProfileUpdater, UserProps, UserState, UserStore,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn setup(server: &MockServer) -> (ProfileUpdater, InMemoryUserStore, ManualClock) {
    let config = AppConfig {
        app_id: "app_1".to_string(),
        profile: ProfileConfig {
            enabled: true,
            upload_interval: 60,
        },
    };
    let user: AppUser = serde_json::from_value(json!({
        "_id": "u1",
        "givenName": "Ada",
        "properties": { "plan": "free" }
    }))
    .unwrap();

    let store = InMemoryUserStore::new(UserState::new(config, user));
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
    let client = HttpProfileClient::new(&ClientConfig::new(&server.base_url())).unwrap();
    let updater = ProfileUpdater::new(
        Arc::new(store.clone()),
        Arc::new(client),
        Arc::new(clock.clone()),
    );
    (updater, store, clock)
}

#[tokio::test]
async fn first_update_is_uploaded_and_committed() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/apps/app_1/appusers/u1")
                .json_body(json!({ "surname": "Lovelace", "properties": { "seats": 2 } }));
            then.status(200).json_body(json!({}));
        })
        .await;
    let (updater, store, _clock) = setup(&server);

    let props = UserProps::from_value(json!({
        "surname": "Lovelace",
        "properties": { "seats": 2 },
        "password": "never sent"
    }))
    .unwrap();
    let user = updater.update(props).await.unwrap().unwrap();

    mock.assert_async().await;
    assert_eq!(user.surname.as_deref(), Some("Lovelace"));
    assert_eq!(
        serde_json::Value::Object(user.properties.clone()),
        json!({ "plan": "free", "seats": 2 })
    );
    assert_eq!(store.state().user, user);
    assert!(store.state().pending_user_props.is_empty());
}

#[tokio::test]
async fn coalesced_changes_are_sent_once_when_forced() {
    let server = MockServer::start_async().await;
    let first = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/apps/app_1/appusers/u1")
                .json_body(json!({ "surname": "Lovelace" }));
            then.status(200);
        })
        .await;
    let second = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/apps/app_1/appusers/u1")
                .json_body(json!({ "givenName": "Augusta", "email": "ada@example.com" }));
            then.status(200);
        })
        .await;
    let (updater, store, clock) = setup(&server);

    updater
        .update(UserProps::new().surname("Lovelace"))
        .await
        .unwrap();
    clock.advance(Duration::from_secs(20));

    let a = updater.update(UserProps::new().given_name("Grace"));
    let b = updater.update(UserProps::new().email("ada@example.com"));
    let c = updater.update(UserProps::new().given_name("Augusta"));
    assert!(a.ptr_eq(&b) && a.ptr_eq(&c));
    assert!(updater.has_scheduled_flush());

    let forced = updater.immediate_update(UserProps::new()).await.unwrap();
    let shared = a.await.unwrap();

    first.assert_async().await;
    second.assert_async().await;
    assert_eq!(forced, shared);
    assert_eq!(store.state().user.given_name.as_deref(), Some("Augusta"));
    assert!(!updater.has_scheduled_flush());
}

#[tokio::test]
async fn api_failure_is_reported_and_changes_stay_pending() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(PUT).path("/apps/app_1/appusers/u1");
            then.status(500)
                .json_body(json!({ "error": { "code": "unexpected_error", "description": "try again" } }));
        })
        .await;
    let (updater, store, _clock) = setup(&server);

    let result = updater.update(UserProps::new().email("ada@example.com")).await;

    assert_eq!(
        result,
        Err(ProfileSyncError::api(500, "unexpected_error: try again"))
    );
    assert_eq!(
        serde_json::to_value(store.state().pending_user_props).unwrap(),
        json!({ "email": "ada@example.com" })
    );
    assert_eq!(store.state().user.email, None);
}
