//! Receptionist lifecycle, ownership and configuration tests.

mod common;

use std::sync::atomic::Ordering;

use axum::http::StatusCode;
use common::{RequestExt, TestHarness};
use serde_json::{json, Value};

use echodesk_core::UserId;
use echodesk_store::Store;

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let harness = TestHarness::new();

    let response = harness.server.get("/v1/receptionists").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_signed_with_other_secret_is_rejected() {
    let harness = TestHarness::new();
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &echodesk_service::auth::JwtClaims {
            sub: harness.user_id.to_string(),
            email: None,
            aud: Some(json!("authenticated")),
            exp: chrono::Utc::now().timestamp() + 3600,
        },
        &jsonwebtoken::EncodingKey::from_secret(b"someone-else"),
    )
    .unwrap();

    let response = harness
        .server
        .get("/v1/receptionists")
        .with(common::bearer(&token))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn first_request_creates_the_user_row() {
    let harness = TestHarness::new();
    assert!(harness.store.get_user(&harness.user_id).await.unwrap().is_none());

    let response = harness.server.get("/v1/me").with(harness.auth()).await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["id"], harness.user_id.to_string());
    assert_eq!(body["subscription_status"], "none");
    assert!(harness.store.get_user(&harness.user_id).await.unwrap().is_some());
}

// ============================================================================
// Provisioning
// ============================================================================

#[tokio::test]
async fn create_requires_active_subscription() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/receptionists")
        .with(harness.auth())
        .json(&json!({ "name": "Front Desk", "phone_number": "(555) 123-4567" }))
        .await;

    response.assert_status(StatusCode::PAYMENT_REQUIRED);
    assert!(harness.voice.assistants_created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn create_requires_connected_calendar() {
    let harness = TestHarness::new();
    let mut user = harness.activate_user().await;
    user.calendar_refresh_token = None;
    harness.store.put_user(&user).await.unwrap();

    let response = harness
        .server
        .post("/v1/receptionists")
        .with(harness.auth())
        .json(&json!({ "name": "Front Desk", "phone_number": "5551234567" }))
        .await;

    response.assert_status(StatusCode::PAYMENT_REQUIRED);
    let body: Value = response.json();
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Google Calendar"));
}

#[tokio::test]
async fn create_rejects_short_phone_number() {
    let harness = TestHarness::new();
    harness.activate_user().await;

    let response = harness
        .server
        .post("/v1/receptionists")
        .with(harness.auth())
        .json(&json!({ "name": "Front Desk", "phone_number": "555-1234" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_provisions_assistant_and_number() {
    let harness = TestHarness::new();
    harness.activate_user().await;

    let response = harness
        .server
        .post("/v1/receptionists")
        .with(harness.auth())
        .json(&json!({ "name": "Front Desk", "phone_number": "(555) 123-4567" }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["name"], "Front Desk");
    assert_eq!(body["phone_number"], "+15551234567");
    assert_eq!(body["inbound_phone_number"], "+15550009999");
    assert_eq!(body["calendar_id"], "owner@example.com");
    assert_eq!(body["status"], "active");

    let assistants = harness.voice.assistants_created.lock().unwrap().clone();
    let phones = harness.voice.phones_created.lock().unwrap().clone();
    assert_eq!(body["vapi_assistant_id"], assistants[0]);
    assert_eq!(
        harness.voice.attached.lock().unwrap().as_slice(),
        &[(phones[0].clone(), assistants[0].clone())]
    );

    let user = harness.store.get_user(&harness.user_id).await.unwrap().unwrap();
    assert!(user.onboarding_completed_at.is_some());
}

#[tokio::test]
async fn phone_failure_rolls_back_assistant_and_tools() {
    let harness = TestHarness::new();
    harness.activate_user().await;
    harness.voice.fail_phone.store(true, Ordering::SeqCst);

    let response = harness
        .server
        .post("/v1/receptionists")
        .with(harness.auth())
        .json(&json!({ "name": "Front Desk", "phone_number": "5551234567" }))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);

    let created = harness.voice.assistants_created.lock().unwrap().clone();
    let deleted = harness.voice.assistants_deleted.lock().unwrap().clone();
    assert_eq!(created, deleted);

    let mut tools_created = harness.voice.tools_created.lock().unwrap().clone();
    let mut tools_deleted = harness.voice.tools_deleted.lock().unwrap().clone();
    tools_created.sort();
    tools_deleted.sort();
    assert_eq!(tools_created, tools_deleted);

    assert!(harness
        .store
        .list_receptionists(&harness.user_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn phone_limit_reports_limit_message() {
    let harness = TestHarness::new();
    harness.activate_user().await;
    harness.voice.phone_limit.store(true, Ordering::SeqCst);

    let response = harness
        .server
        .post("/v1/receptionists")
        .with(harness.auth())
        .json(&json!({ "name": "Front Desk", "phone_number": "5551234567" }))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Phone number limit"));
    assert_eq!(harness.voice.assistants_deleted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn tool_failure_creates_no_assistant() {
    let harness = TestHarness::new();
    harness.activate_user().await;
    harness.voice.fail_tools.store(true, Ordering::SeqCst);

    let response = harness
        .server
        .post("/v1/receptionists")
        .with(harness.auth())
        .json(&json!({ "name": "Front Desk", "phone_number": "5551234567" }))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    assert!(harness.voice.assistants_created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn delete_removes_remote_resources() {
    let harness = TestHarness::new();
    let receptionist = harness.seed_receptionist(&harness.user_id).await;

    harness
        .server
        .delete(&format!("/v1/receptionists/{}", receptionist.id))
        .with(harness.auth())
        .await
        .assert_status(StatusCode::NO_CONTENT);

    assert_eq!(
        harness.voice.assistants_deleted.lock().unwrap().as_slice(),
        &[receptionist.vapi_assistant_id.clone().unwrap()]
    );
    assert_eq!(
        harness.voice.phones_deleted.lock().unwrap().as_slice(),
        &[receptionist.vapi_phone_number_id.clone().unwrap()]
    );
    assert!(harness
        .store
        .get_receptionist(&receptionist.id)
        .await
        .unwrap()
        .is_none());
}

// ============================================================================
// Ownership
// ============================================================================

#[tokio::test]
async fn list_only_shows_own_receptionists() {
    let harness = TestHarness::new();
    let mine = harness.seed_receptionist(&harness.user_id).await;
    harness.seed_receptionist(&UserId::generate()).await;

    let response = harness
        .server
        .get("/v1/receptionists")
        .with(harness.auth())
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let list = body["receptionists"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], mine.id.to_string());
}

#[tokio::test]
async fn other_users_receptionist_is_forbidden() {
    let harness = TestHarness::new();
    let theirs = harness.seed_receptionist(&UserId::generate()).await;

    for path in [
        format!("/v1/receptionists/{}", theirs.id),
        format!("/v1/receptionists/{}/prompt", theirs.id),
        format!("/v1/receptionists/{}/config/staff", theirs.id),
        format!("/v1/receptionists/{}/usage", theirs.id),
    ] {
        harness
            .server
            .get(&path)
            .with(harness.auth())
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    harness
        .server
        .delete(&format!("/v1/receptionists/{}", theirs.id))
        .with(harness.auth())
        .await
        .assert_status(StatusCode::FORBIDDEN);
    assert!(harness
        .store
        .get_receptionist(&theirs.id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn unknown_receptionist_is_not_found() {
    let harness = TestHarness::new();

    harness
        .server
        .get(&format!(
            "/v1/receptionists/{}",
            echodesk_core::ReceptionistId::generate()
        ))
        .with(harness.auth())
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_receptionist_id_is_bad_request() {
    let harness = TestHarness::new();

    harness
        .server
        .get("/v1/receptionists/not-an-id")
        .with(harness.auth())
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Settings
// ============================================================================

#[tokio::test]
async fn payment_settings_are_normalized() {
    let harness = TestHarness::new();
    let receptionist = harness.seed_receptionist(&harness.user_id).await;

    let response = harness
        .server
        .put(&format!("/v1/receptionists/{}/payment-settings", receptionist.id))
        .with(harness.auth())
        .json(&json!({
            "accept_deposit": true,
            "deposit_amount_cents": 2500,
            "payment_methods": [" card ", "", "cash"],
            "refund_policy": "   "
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["payment_settings"]["payment_methods"], json!(["card", "cash"]));
    assert_eq!(body["payment_settings"]["refund_policy"], Value::Null);
}

#[tokio::test]
async fn negative_deposit_is_rejected() {
    let harness = TestHarness::new();
    let receptionist = harness.seed_receptionist(&harness.user_id).await;

    harness
        .server
        .put(&format!("/v1/receptionists/{}/payment-settings", receptionist.id))
        .with(harness.auth())
        .json(&json!({ "accept_deposit": true, "deposit_amount_cents": -1 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn blank_extra_instructions_clear_the_field() {
    let harness = TestHarness::new();
    let receptionist = harness.seed_receptionist(&harness.user_id).await;
    let path = format!("/v1/receptionists/{}/extra-instructions", receptionist.id);

    let response = harness
        .server
        .put(&path)
        .with(harness.auth())
        .json(&json!({ "extra_instructions": "Always offer a callback." }))
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>()["extra_instructions"],
        "Always offer a callback."
    );

    let response = harness
        .server
        .put(&path)
        .with(harness.auth())
        .json(&json!({ "extra_instructions": "  " }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["extra_instructions"], Value::Null);
}

// ============================================================================
// Configuration rows
// ============================================================================

#[tokio::test]
async fn staff_rows_round_trip_through_the_api() {
    let harness = TestHarness::new();
    let receptionist = harness.seed_receptionist(&harness.user_id).await;
    let base = format!("/v1/receptionists/{}/config/staff", receptionist.id);

    let response = harness
        .server
        .post(&base)
        .with(harness.auth())
        .json(&json!({ "name": "Jo", "role": "stylist" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created: Value = response.json();
    let entry_id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["is_active"], true);

    let response = harness
        .server
        .put(&format!("{base}/{entry_id}"))
        .with(harness.auth())
        .json(&json!({ "name": "Jo", "role": "manager", "is_active": false }))
        .await;
    response.assert_status_ok();
    let updated: Value = response.json();
    assert_eq!(updated["role"], "manager");
    assert_eq!(updated["created_at"], created["created_at"]);

    let list: Value = harness
        .server
        .get(&base)
        .with(harness.auth())
        .await
        .json();
    assert_eq!(list["kind"], "staff");
    assert_eq!(list["items"].as_array().unwrap().len(), 1);

    harness
        .server
        .delete(&format!("{base}/{entry_id}"))
        .with(harness.auth())
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let list: Value = harness
        .server
        .get(&base)
        .with(harness.auth())
        .await
        .json();
    assert!(list["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn updating_missing_row_is_not_found() {
    let harness = TestHarness::new();
    let receptionist = harness.seed_receptionist(&harness.user_id).await;

    harness
        .server
        .put(&format!(
            "/v1/receptionists/{}/config/services/{}",
            receptionist.id,
            echodesk_core::EntryId::generate()
        ))
        .with(harness.auth())
        .json(&json!({ "name": "Haircut", "price_cents": 3000, "duration_minutes": 30 }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_kind_and_invalid_rows_are_rejected() {
    let harness = TestHarness::new();
    let receptionist = harness.seed_receptionist(&harness.user_id).await;

    harness
        .server
        .get(&format!("/v1/receptionists/{}/config/pets", receptionist.id))
        .with(harness.auth())
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    harness
        .server
        .post(&format!("/v1/receptionists/{}/config/services", receptionist.id))
        .with(harness.auth())
        .json(&json!({ "name": "Haircut", "price_cents": -5 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    harness
        .server
        .post(&format!("/v1/receptionists/{}/config/staff", receptionist.id))
        .with(harness.auth())
        .json(&json!({ "name": "  " }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Prompt
// ============================================================================

#[tokio::test]
async fn preview_includes_configured_services() {
    let harness = TestHarness::new();
    let receptionist = harness.seed_receptionist(&harness.user_id).await;

    harness
        .server
        .post(&format!("/v1/receptionists/{}/config/services", receptionist.id))
        .with(harness.auth())
        .json(&json!({ "name": "Haircut", "price_cents": 3000, "duration_minutes": 30 }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = harness
        .server
        .get(&format!("/v1/receptionists/{}/prompt", receptionist.id))
        .with(harness.auth())
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let prompt = body["prompt"].as_str().unwrap();
    assert!(prompt.contains("Front Desk"));
    assert!(prompt.contains("Haircut: $30.00, 30 min"));
    assert_eq!(
        body["charCount"].as_u64().unwrap(),
        prompt.chars().count() as u64
    );
}

#[tokio::test]
async fn apply_pushes_once_then_reports_unchanged() {
    let harness = TestHarness::new();
    let receptionist = harness.seed_receptionist(&harness.user_id).await;
    let path = format!("/v1/receptionists/{}/prompt/apply", receptionist.id);

    let first: Value = harness.server.post(&path).with(harness.auth()).await.json();
    assert_eq!(first["applied"], true);

    let second: Value = harness.server.post(&path).with(harness.auth()).await.json();
    assert_eq!(second["applied"], false);

    let updates = harness.voice.prompt_updates.lock().unwrap().clone();
    assert_eq!(updates.len(), 1);
    assert_eq!(Some(updates[0].0.clone()), receptionist.vapi_assistant_id);
    assert_eq!(
        first["charCount"].as_u64().unwrap(),
        updates[0].1.chars().count() as u64
    );
}

#[tokio::test]
async fn apply_without_assistant_is_bad_request() {
    let harness = TestHarness::new();
    let mut receptionist = harness.seed_receptionist(&harness.user_id).await;
    receptionist.vapi_assistant_id = None;
    harness.store.update_receptionist(&receptionist).await.unwrap();

    harness
        .server
        .post(&format!("/v1/receptionists/{}/prompt/apply", receptionist.id))
        .with(harness.auth())
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Twilio numbers
// ============================================================================

#[tokio::test]
async fn twilio_number_is_bought_once() {
    let harness = TestHarness::new();
    let receptionist = harness.seed_receptionist(&harness.user_id).await;
    *harness.telephony.available.lock().unwrap() = Some("+14155550100".into());
    let path = format!("/v1/receptionists/{}/twilio-number", receptionist.id);

    let response = harness
        .server
        .post(&path)
        .with(harness.auth())
        .json(&json!({ "area_code": "415" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["twilio_phone_number"], "+14155550100");
    assert_eq!(
        harness.telephony.purchased.lock().unwrap()[0].1,
        format!("{}/webhooks/twilio/voice", common::TWILIO_BASE_URL)
    );

    harness
        .server
        .post(&path)
        .with(harness.auth())
        .json(&json!({ "area_code": "415" }))
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn twilio_number_needs_valid_area_code_and_stock() {
    let harness = TestHarness::new();
    let receptionist = harness.seed_receptionist(&harness.user_id).await;
    let path = format!("/v1/receptionists/{}/twilio-number", receptionist.id);

    harness
        .server
        .post(&path)
        .with(harness.auth())
        .json(&json!({ "area_code": "41" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let response = harness
        .server
        .post(&path)
        .with(harness.auth())
        .json(&json!({ "area_code": "415" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["error"]["message"]
        .as_str()
        .unwrap()
        .contains("415"));
}
