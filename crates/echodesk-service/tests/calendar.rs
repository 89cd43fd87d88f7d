//! Calendar OAuth, voice server prompt and health endpoints.

mod common;

use std::sync::atomic::Ordering;

use axum::http::StatusCode;
use axum_test::TestResponse;
use common::{header, RequestExt, TestHarness, VOICE_SERVER_KEY};
use serde_json::Value;

use echodesk_core::{ReceptionistId, UserId};
use echodesk_service::crypto::sign_value;
use echodesk_store::Store;

fn location(response: &TestResponse) -> String {
    response
        .headers()
        .get("location")
        .expect("redirect location")
        .to_str()
        .unwrap()
        .to_string()
}

async fn connect_state(harness: &TestHarness, return_to: &str) -> String {
    let response = harness
        .server
        .get("/v1/calendar/connect")
        .add_query_param("return_to", return_to)
        .with(harness.auth())
        .await;
    response.assert_status_ok();

    let url = response.json::<Value>()["url"].as_str().unwrap().to_string();
    url.split_once("state=").unwrap().1.to_string()
}

async fn callback(harness: &TestHarness, code: Option<&str>, state: &str) -> TestResponse {
    let mut request = harness
        .server
        .get("/oauth/google/callback")
        .add_query_param("state", state);
    if let Some(code) = code {
        request = request.add_query_param("code", code);
    }
    request.await
}

// ============================================================================
// Connect
// ============================================================================

#[tokio::test]
async fn connect_requires_auth() {
    let harness = TestHarness::new();

    harness
        .server
        .get("/v1/calendar/connect")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn connect_signs_user_and_destination() {
    let harness = TestHarness::new();

    let state = connect_state(&harness, "onboarding").await;
    assert_eq!(
        state,
        sign_value(common::JWT_SECRET, &format!("{}:onboarding", harness.user_id))
    );

    let state = connect_state(&harness, "somewhere-else").await;
    assert!(state.starts_with(&format!("{}:dashboard.", harness.user_id)));
}

// ============================================================================
// Callback
// ============================================================================

#[tokio::test]
async fn callback_stores_refresh_token_and_account_email() {
    let harness = TestHarness::new();
    harness
        .store
        .ensure_user(&harness.user_id, Some("owner@example.com"))
        .await
        .unwrap();
    let state = connect_state(&harness, "onboarding").await;

    let response = callback(&harness, Some("auth-code"), &state).await;

    assert!(response.status_code().is_redirection());
    assert_eq!(
        location(&response),
        "http://localhost:3000/onboarding?calendar=connected"
    );
    let user = harness.store.get_user(&harness.user_id).await.unwrap().unwrap();
    assert_eq!(user.calendar_refresh_token.as_deref(), Some("refresh-token"));
    assert_eq!(user.calendar_id.as_deref(), Some("owner@example.com"));
}

#[tokio::test]
async fn callback_falls_back_to_primary_calendar() {
    let harness = TestHarness::new();
    harness.store.ensure_user(&harness.user_id, None).await.unwrap();
    *harness.calendar.email.lock().unwrap() = None;
    let state = connect_state(&harness, "dashboard").await;

    let response = callback(&harness, Some("auth-code"), &state).await;

    assert_eq!(
        location(&response),
        "http://localhost:3000/dashboard?calendar=connected"
    );
    let user = harness.store.get_user(&harness.user_id).await.unwrap().unwrap();
    assert_eq!(user.calendar_id.as_deref(), Some("primary"));
}

#[tokio::test]
async fn callback_without_refresh_token_reports_error() {
    let harness = TestHarness::new();
    harness.store.ensure_user(&harness.user_id, None).await.unwrap();
    *harness.calendar.refresh_token.lock().unwrap() = None;
    let state = connect_state(&harness, "onboarding").await;

    let response = callback(&harness, Some("auth-code"), &state).await;

    let target = location(&response);
    assert!(target.starts_with("http://localhost:3000/onboarding?calendar=error&message=No+refresh+token"));
    let user = harness.store.get_user(&harness.user_id).await.unwrap().unwrap();
    assert!(user.calendar_refresh_token.is_none());
}

#[tokio::test]
async fn callback_rejects_forged_state() {
    let harness = TestHarness::new();
    harness.store.ensure_user(&harness.user_id, None).await.unwrap();
    let forged = sign_value("other-secret", &format!("{}:onboarding", harness.user_id));

    let response = callback(&harness, Some("auth-code"), &forged).await;

    assert_eq!(
        location(&response),
        "http://localhost:3000/dashboard?calendar=error&message=Invalid+user"
    );
    let user = harness.store.get_user(&harness.user_id).await.unwrap().unwrap();
    assert!(user.calendar_refresh_token.is_none());
}

#[tokio::test]
async fn callback_reports_missing_code_and_provider_errors() {
    let harness = TestHarness::new();
    harness.store.ensure_user(&harness.user_id, None).await.unwrap();
    let state = connect_state(&harness, "onboarding").await;

    let response = callback(&harness, None, &state).await;
    assert_eq!(
        location(&response),
        "http://localhost:3000/onboarding?calendar=error&message=Missing+authorization+code"
    );

    let response = harness
        .server
        .get("/oauth/google/callback")
        .add_query_param("state", &state)
        .add_query_param("error", "access_denied")
        .await;
    assert_eq!(
        location(&response),
        "http://localhost:3000/onboarding?calendar=error&message=OAuth+error%3A+access_denied"
    );

    harness.calendar.fail_exchange.store(true, Ordering::SeqCst);
    let response = callback(&harness, Some("auth-code"), &state).await;
    assert!(location(&response).contains("calendar=error"));
}

#[tokio::test]
async fn callback_for_unknown_user_is_rejected() {
    let harness = TestHarness::new();
    let stranger = UserId::generate();
    let state = sign_value(common::JWT_SECRET, &format!("{stranger}:dashboard"));

    let response = callback(&harness, Some("auth-code"), &state).await;

    assert_eq!(
        location(&response),
        "http://localhost:3000/dashboard?calendar=error&message=Invalid+user"
    );
    assert!(harness.store.get_user(&stranger).await.unwrap().is_none());
}

#[tokio::test]
async fn callback_reports_store_failure_separately() {
    let harness = TestHarness::new();
    harness.store.ensure_user(&harness.user_id, None).await.unwrap();
    let state = connect_state(&harness, "onboarding").await;
    harness.faults.fail_user_reads.store(true, Ordering::SeqCst);

    let response = callback(&harness, Some("auth-code"), &state).await;

    assert_eq!(
        location(&response),
        "http://localhost:3000/onboarding?calendar=error&message=Failed+to+load+account"
    );
    let user = harness.store.get_user(&harness.user_id).await.unwrap().unwrap();
    assert!(user.calendar_refresh_token.is_none());
}

// ============================================================================
// Voice server prompt
// ============================================================================

#[tokio::test]
async fn voice_prompt_returns_compact_prompt() {
    let harness = TestHarness::new();
    let receptionist = harness.seed_receptionist(&harness.user_id).await;

    let response = harness
        .server
        .get("/v1/voice/prompt")
        .add_query_param("receptionist_id", receptionist.id.to_string())
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["name"], "Front Desk");
    assert!(body["prompt"].as_str().unwrap().contains("Front Desk"));
}

#[tokio::test]
async fn voice_prompt_validates_id() {
    let harness = TestHarness::new();

    harness
        .server
        .get("/v1/voice/prompt")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    harness
        .server
        .get("/v1/voice/prompt")
        .add_query_param("receptionist_id", "not-an-id")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    harness
        .server
        .get("/v1/voice/prompt")
        .add_query_param("receptionist_id", ReceptionistId::generate().to_string())
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn voice_prompt_requires_server_key_when_configured() {
    let harness =
        TestHarness::with_config(|c| c.voice_server_api_key = Some(VOICE_SERVER_KEY.into()));
    let receptionist = harness.seed_receptionist(&harness.user_id).await;
    let id = receptionist.id.to_string();

    harness
        .server
        .get("/v1/voice/prompt")
        .add_query_param("receptionist_id", &id)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    harness
        .server
        .get("/v1/voice/prompt")
        .add_query_param("receptionist_id", &id)
        .with(header("x-voice-server-key", "wrong"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    harness
        .server
        .get("/v1/voice/prompt")
        .add_query_param("receptionist_id", &id)
        .with(header("x-voice-server-key", VOICE_SERVER_KEY))
        .await
        .assert_status_ok();
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn health_reports_service() {
    let harness = TestHarness::new();

    let response = harness.server.get("/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "echodesk");
    assert!(body["version"].is_string());
}
