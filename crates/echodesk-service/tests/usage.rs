mod common;

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{RequestExt, TestHarness};
use serde_json::{json, Value};

use echodesk_core::{BillingPeriod, PlanMetadata, Receptionist, UserId};
use echodesk_store::Store;

fn month_start() -> DateTime<Utc> {
    let period = BillingPeriod::current_month(Utc::now());
    Utc.from_utc_datetime(&period.start.and_hms_opt(0, 0, 0).unwrap())
}

async fn report_call(harness: &TestHarness, receptionist: &Receptionist, call_id: &str, seconds: i64) {
    let start = month_start();
    let body = json!({
        "message": {
            "type": "end-of-call-report",
            "call": {
                "id": call_id,
                "assistantId": receptionist.vapi_assistant_id,
                "startedAt": start.to_rfc3339(),
                "endedAt": (start + Duration::seconds(seconds)).to_rfc3339()
            }
        }
    });
    harness
        .server
        .post("/webhooks/vapi")
        .json(&body)
        .await
        .assert_status_ok();
}

async fn usage(harness: &TestHarness, receptionist: &Receptionist) -> Value {
    let response = harness
        .server
        .get(&format!("/v1/receptionists/{}/usage", receptionist.id))
        .with(harness.auth())
        .await;
    response.assert_status_ok();
    response.json()
}

#[tokio::test]
async fn reports_current_month_for_subscriber() {
    let harness = TestHarness::new();
    harness.activate_user().await;
    let receptionist = harness.seed_receptionist(&harness.user_id).await;

    report_call(&harness, &receptionist, "call_a", 601).await;

    let usage = usage(&harness, &receptionist).await;
    let period = BillingPeriod::current_month(Utc::now());
    assert_eq!(usage["receptionist_id"], receptionist.id.to_string());
    assert_eq!(usage["period_start"], period.start.to_string());
    assert_eq!(usage["period_end"], period.end.to_string());
    assert_eq!(usage["total_seconds"], 601);
    assert_eq!(usage["minutes"], 11);
    assert_eq!(usage["included_minutes"], 300);
    assert_eq!(usage["overage_minutes"], 0);
    assert_eq!(usage["billing_plan"], "subscription_starter");
}

#[tokio::test]
async fn overage_counts_started_minutes_beyond_allowance() {
    let harness = TestHarness::new();
    let mut user = harness.activate_user().await;
    user.billing_plan_metadata = Some(PlanMetadata::capped(5));
    harness.store.put_user(&user).await.unwrap();
    let receptionist = harness.seed_receptionist(&harness.user_id).await;

    report_call(&harness, &receptionist, "call_a", 240).await;
    report_call(&harness, &receptionist, "call_b", 121).await;

    let usage = usage(&harness, &receptionist).await;
    assert_eq!(usage["total_seconds"], 361);
    assert_eq!(usage["minutes"], 7);
    assert_eq!(usage["overage_minutes"], 2);
}

#[tokio::test]
async fn pay_as_you_go_has_no_allowance() {
    let harness = TestHarness::new();
    let mut user = harness.activate_user().await;
    user.billing_plan = Some("per_minute".into());
    user.billing_plan_metadata = Some(PlanMetadata::per_minute(500, 35));
    harness.store.put_user(&user).await.unwrap();
    let receptionist = harness.seed_receptionist(&harness.user_id).await;

    report_call(&harness, &receptionist, "call_a", 3000).await;

    let usage = usage(&harness, &receptionist).await;
    assert_eq!(usage["minutes"], 50);
    assert!(usage["included_minutes"].is_null());
    assert_eq!(usage["overage_minutes"], 0);
    assert_eq!(usage["billing_plan"], "per_minute");
}

#[tokio::test]
async fn empty_month_reports_zero() {
    let harness = TestHarness::new();
    let receptionist = harness.seed_receptionist(&harness.user_id).await;

    let usage = usage(&harness, &receptionist).await;
    assert_eq!(usage["total_seconds"], 0);
    assert_eq!(usage["minutes"], 0);
    assert!(usage["billing_plan"].is_null());
}

#[tokio::test]
async fn cron_refreshes_every_receptionist() {
    let harness = TestHarness::new();
    harness.activate_user().await;
    let mine = harness.seed_receptionist(&harness.user_id).await;
    harness.seed_receptionist(&UserId::generate()).await;
    report_call(&harness, &mine, "call_a", 90).await;

    let response = harness.server.get("/cron/usage").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["ok"], true);
    assert_eq!(body["updated"], 2);
    assert_eq!(body["errors"], 0);

    let snapshot = harness
        .store
        .get_usage_snapshot(&mine.id, BillingPeriod::current_month(Utc::now()).start)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.total_seconds, 90);
    assert_eq!(snapshot.included_minutes, Some(300));
}

#[tokio::test]
async fn cron_requires_secret_when_configured() {
    let harness = TestHarness::with_config(|c| c.cron_secret = Some(common::CRON_SECRET.into()));

    harness
        .server
        .get("/cron/usage")
        .await
        .assert_status(axum::http::StatusCode::UNAUTHORIZED);

    harness
        .server
        .get("/cron/usage")
        .with(common::bearer(common::CRON_SECRET))
        .await
        .assert_status_ok();
}
