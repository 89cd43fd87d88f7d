//! Common test utilities: in-process platform fakes and a router harness.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use axum_test::{TestRequest, TestServer};
use chrono::{DateTime, NaiveDate, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

use echodesk_core::{
    BillingInvoiceRecord, BillingPeriod, CallUsageEvent, ConfigEntry, ConfigKind, EntryId, PlanId,
    Receptionist, ReceptionistConfig, ReceptionistId, ReceptionistStatus, SubscriptionStatus,
    UsageSnapshot, User, UserId,
};
use echodesk_service::auth::JwtClaims;
use echodesk_service::google::{GoogleError, TokenGrant};
use echodesk_service::stripe::{
    CheckoutRequest, CheckoutSession, Invoice, InvoiceItem, InvoiceItemRequest, InvoiceRequest,
    PortalSession, StripeError, Subscription,
};
use echodesk_service::twilio::{IncomingNumber, TwilioError};
use echodesk_service::vapi::{Assistant, AssistantRequest, PhoneNumber, Tool, ToolRequest, VapiError};
use echodesk_service::{
    create_router, AppState, BillingPlatform, CalendarOAuth, ServiceConfig, TelephonyPlatform,
    VoicePlatform,
};
use echodesk_store::{MemoryStore, Store, StoreError};

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const STRIPE_WEBHOOK_SECRET: &str = "whsec_test";
pub const TWILIO_AUTH_TOKEN: &str = "twilio-test-token";
pub const TWILIO_BASE_URL: &str = "https://hooks.example.com";
pub const VOICE_WS_URL: &str = "wss://voice.example.com/stream";
pub const CRON_SECRET: &str = "cron-test-secret";
pub const VOICE_SERVER_KEY: &str = "voice-server-key";

pub const STARTER_PRICE: &str = "price_starter";
pub const PER_MINUTE_PRICE: &str = "price_ppm1";

// ============================================================================
// Billing fake
// ============================================================================

#[derive(Default)]
pub struct FakeBilling {
    pub sessions: Mutex<HashMap<String, CheckoutSession>>,
    pub subscriptions: Mutex<HashMap<String, Subscription>>,
    pub checkout_requests: Mutex<Vec<CheckoutRequest>>,
    pub invoices: Mutex<Vec<InvoiceRequest>>,
    pub invoice_items: Mutex<Vec<InvoiceItemRequest>>,
    pub finalized: Mutex<Vec<String>>,
    pub fail_finalize: AtomicBool,
    /// Invoices and items already created, by idempotency key.
    pub invoice_keys: Mutex<HashMap<String, Invoice>>,
    pub item_keys: Mutex<HashMap<String, InvoiceItem>>,
    /// Latency injected into `create_invoice`.
    pub create_delay: Mutex<Option<Duration>>,
}

impl FakeBilling {
    pub fn add_session(&self, session: CheckoutSession) {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session);
    }

    pub fn add_subscription(&self, subscription: Subscription) {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(subscription.id.clone(), subscription);
    }

    pub fn invoice_count(&self) -> usize {
        self.invoices.lock().unwrap().len()
    }
}

fn not_found(what: &str) -> StripeError {
    StripeError::Api {
        error_type: "invalid_request_error".into(),
        message: format!("No such {what}"),
        code: Some("resource_missing".into()),
    }
}

#[async_trait]
impl BillingPlatform for FakeBilling {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, StripeError> {
        let mut requests = self.checkout_requests.lock().unwrap();
        requests.push(request.clone());
        let id = format!("cs_test_{}", requests.len());
        Ok(CheckoutSession {
            url: Some(format!("https://checkout.stripe.test/{id}")),
            id,
            ..CheckoutSession::default()
        })
    }

    async fn get_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, StripeError> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| not_found("checkout session"))
    }

    async fn get_subscription(&self, subscription_id: &str) -> Result<Subscription, StripeError> {
        self.subscriptions
            .lock()
            .unwrap()
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| not_found("subscription"))
    }

    async fn list_active_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<Subscription>, StripeError> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.customer.as_deref() == Some(customer_id) && s.status == "active")
            .cloned()
            .collect())
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        _return_url: &str,
    ) -> Result<PortalSession, StripeError> {
        Ok(PortalSession {
            id: "bps_test".into(),
            url: format!("https://billing.stripe.test/{customer_id}"),
        })
    }

    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, StripeError> {
        let delay = *self.create_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(key) = &request.idempotency_key {
            if let Some(invoice) = self.invoice_keys.lock().unwrap().get(key) {
                return Ok(invoice.clone());
            }
        }

        let mut invoices = self.invoices.lock().unwrap();
        invoices.push(request.clone());
        let invoice = Invoice {
            id: format!("in_test_{}", invoices.len()),
            status: Some("draft".into()),
            hosted_invoice_url: None,
        };
        if let Some(key) = &request.idempotency_key {
            self.invoice_keys
                .lock()
                .unwrap()
                .insert(key.clone(), invoice.clone());
        }
        Ok(invoice)
    }

    async fn create_invoice_item(
        &self,
        request: &InvoiceItemRequest,
    ) -> Result<InvoiceItem, StripeError> {
        if let Some(key) = &request.idempotency_key {
            if let Some(item) = self.item_keys.lock().unwrap().get(key) {
                return Ok(item.clone());
            }
        }

        let mut items = self.invoice_items.lock().unwrap();
        items.push(request.clone());
        let item = InvoiceItem {
            id: format!("ii_test_{}", items.len()),
        };
        if let Some(key) = &request.idempotency_key {
            self.item_keys
                .lock()
                .unwrap()
                .insert(key.clone(), item.clone());
        }
        Ok(item)
    }

    async fn finalize_invoice(&self, invoice_id: &str) -> Result<Invoice, StripeError> {
        if self.fail_finalize.load(Ordering::SeqCst) {
            return Err(StripeError::Api {
                error_type: "api_error".into(),
                message: "finalize failed".into(),
                code: None,
            });
        }
        self.finalized.lock().unwrap().push(invoice_id.to_string());
        Ok(Invoice {
            id: invoice_id.to_string(),
            status: Some("open".into()),
            hosted_invoice_url: Some(format!("https://invoice.stripe.test/{invoice_id}")),
        })
    }
}

// ============================================================================
// Store faults
// ============================================================================

/// Wraps the harness memory store so individual operations can be made to fail.
pub struct FaultyStore {
    inner: Arc<MemoryStore>,
    pub fail_user_reads: AtomicBool,
    pub fail_invoice_completion: AtomicBool,
}

impl FaultyStore {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_user_reads: AtomicBool::new(false),
            fail_invoice_completion: AtomicBool::new(false),
        }
    }
}

fn injected_failure() -> StoreError {
    StoreError::Database("connection reset".into())
}

#[async_trait]
impl Store for FaultyStore {
    async fn get_user(&self, user_id: &UserId) -> echodesk_store::Result<Option<User>> {
        if self.fail_user_reads.load(Ordering::SeqCst) {
            return Err(injected_failure());
        }
        self.inner.get_user(user_id).await
    }

    async fn find_user_by_email(&self, email: &str) -> echodesk_store::Result<Option<User>> {
        self.inner.find_user_by_email(email).await
    }

    async fn find_user_by_customer(
        &self,
        customer_id: &str,
    ) -> echodesk_store::Result<Option<User>> {
        self.inner.find_user_by_customer(customer_id).await
    }

    async fn put_user(&self, user: &User) -> echodesk_store::Result<()> {
        self.inner.put_user(user).await
    }

    async fn ensure_user(
        &self,
        user_id: &UserId,
        email: Option<&str>,
    ) -> echodesk_store::Result<User> {
        self.inner.ensure_user(user_id, email).await
    }

    async fn list_per_minute_users(&self) -> echodesk_store::Result<Vec<User>> {
        self.inner.list_per_minute_users().await
    }

    async fn mark_onboarding_complete(
        &self,
        user_id: &UserId,
        at: DateTime<Utc>,
    ) -> echodesk_store::Result<bool> {
        self.inner.mark_onboarding_complete(user_id, at).await
    }

    async fn insert_receptionist(&self, receptionist: &Receptionist) -> echodesk_store::Result<()> {
        self.inner.insert_receptionist(receptionist).await
    }

    async fn get_receptionist(
        &self,
        id: &ReceptionistId,
    ) -> echodesk_store::Result<Option<Receptionist>> {
        self.inner.get_receptionist(id).await
    }

    async fn list_receptionists(&self, user_id: &UserId) -> echodesk_store::Result<Vec<Receptionist>> {
        self.inner.list_receptionists(user_id).await
    }

    async fn list_receptionist_ids(&self) -> echodesk_store::Result<Vec<ReceptionistId>> {
        self.inner.list_receptionist_ids().await
    }

    async fn update_receptionist(&self, receptionist: &Receptionist) -> echodesk_store::Result<()> {
        self.inner.update_receptionist(receptionist).await
    }

    async fn delete_receptionist(&self, id: &ReceptionistId) -> echodesk_store::Result<()> {
        self.inner.delete_receptionist(id).await
    }

    async fn find_receptionist_by_assistant(
        &self,
        assistant_id: &str,
    ) -> echodesk_store::Result<Option<Receptionist>> {
        self.inner.find_receptionist_by_assistant(assistant_id).await
    }

    async fn find_receptionist_by_vapi_phone(
        &self,
        phone_number_id: &str,
    ) -> echodesk_store::Result<Option<Receptionist>> {
        self.inner.find_receptionist_by_vapi_phone(phone_number_id).await
    }

    async fn find_active_receptionist_by_number(
        &self,
        number: &str,
    ) -> echodesk_store::Result<Option<Receptionist>> {
        self.inner.find_active_receptionist_by_number(number).await
    }

    async fn get_config(
        &self,
        receptionist_id: &ReceptionistId,
    ) -> echodesk_store::Result<ReceptionistConfig> {
        self.inner.get_config(receptionist_id).await
    }

    async fn put_config_entry(&self, entry: &ConfigEntry) -> echodesk_store::Result<()> {
        self.inner.put_config_entry(entry).await
    }

    async fn get_config_entry(
        &self,
        receptionist_id: &ReceptionistId,
        kind: ConfigKind,
        entry_id: &EntryId,
    ) -> echodesk_store::Result<Option<ConfigEntry>> {
        self.inner.get_config_entry(receptionist_id, kind, entry_id).await
    }

    async fn delete_config_entry(
        &self,
        receptionist_id: &ReceptionistId,
        kind: ConfigKind,
        entry_id: &EntryId,
    ) -> echodesk_store::Result<()> {
        self.inner.delete_config_entry(receptionist_id, kind, entry_id).await
    }

    async fn insert_call_usage(&self, event: &CallUsageEvent) -> echodesk_store::Result<()> {
        self.inner.insert_call_usage(event).await
    }

    async fn count_call_usage(&self, receptionist_id: &ReceptionistId) -> echodesk_store::Result<u64> {
        self.inner.count_call_usage(receptionist_id).await
    }

    async fn sum_call_seconds(
        &self,
        receptionist_id: &ReceptionistId,
        period: &BillingPeriod,
    ) -> echodesk_store::Result<i64> {
        self.inner.sum_call_seconds(receptionist_id, period).await
    }

    async fn get_usage_snapshot(
        &self,
        receptionist_id: &ReceptionistId,
        period_start: NaiveDate,
    ) -> echodesk_store::Result<Option<UsageSnapshot>> {
        self.inner.get_usage_snapshot(receptionist_id, period_start).await
    }

    async fn put_usage_snapshot(&self, snapshot: &UsageSnapshot) -> echodesk_store::Result<()> {
        self.inner.put_usage_snapshot(snapshot).await
    }

    async fn sum_user_snapshot_seconds(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
    ) -> echodesk_store::Result<i64> {
        self.inner.sum_user_snapshot_seconds(user_id, period_start).await
    }

    async fn get_invoice_record(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
    ) -> echodesk_store::Result<Option<BillingInvoiceRecord>> {
        self.inner.get_invoice_record(user_id, period_start).await
    }

    async fn reserve_invoice_record(
        &self,
        record: &BillingInvoiceRecord,
    ) -> echodesk_store::Result<bool> {
        self.inner.reserve_invoice_record(record).await
    }

    async fn complete_invoice_record(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
        stripe_invoice_id: &str,
    ) -> echodesk_store::Result<()> {
        if self.fail_invoice_completion.load(Ordering::SeqCst) {
            return Err(injected_failure());
        }
        self.inner
            .complete_invoice_record(user_id, period_start, stripe_invoice_id)
            .await
    }

    async fn release_invoice_record(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
    ) -> echodesk_store::Result<()> {
        self.inner.release_invoice_record(user_id, period_start).await
    }
}

// ============================================================================
// Voice fake
// ============================================================================

#[derive(Default)]
pub struct FakeVoice {
    counter: AtomicUsize,
    pub tools_created: Mutex<Vec<String>>,
    pub tools_deleted: Mutex<Vec<String>>,
    pub assistants_created: Mutex<Vec<String>>,
    pub assistants_deleted: Mutex<Vec<String>>,
    pub phones_created: Mutex<Vec<String>>,
    pub phones_deleted: Mutex<Vec<String>>,
    pub attached: Mutex<Vec<(String, String)>>,
    pub prompt_updates: Mutex<Vec<(String, String)>>,
    pub fail_tools: AtomicBool,
    pub fail_phone: AtomicBool,
    pub phone_limit: AtomicBool,
}

impl FakeVoice {
    fn next_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}_{n}")
    }
}

fn vapi_error(status: u16, message: &str) -> VapiError {
    VapiError::Api {
        status,
        message: message.into(),
    }
}

#[async_trait]
impl VoicePlatform for FakeVoice {
    async fn create_tool(&self, request: &ToolRequest) -> Result<Tool, VapiError> {
        if self.fail_tools.load(Ordering::SeqCst) {
            return Err(vapi_error(400, "Google Calendar credential missing"));
        }
        let id = self.next_id("tool");
        self.tools_created.lock().unwrap().push(id.clone());
        Ok(Tool {
            id,
            tool_type: request.tool_type.clone(),
        })
    }

    async fn delete_tool(&self, tool_id: &str) -> Result<(), VapiError> {
        self.tools_deleted.lock().unwrap().push(tool_id.to_string());
        Ok(())
    }

    async fn create_assistant(&self, request: &AssistantRequest) -> Result<Assistant, VapiError> {
        let id = self.next_id("asst");
        self.assistants_created.lock().unwrap().push(id.clone());
        Ok(Assistant {
            id,
            name: Some(request.name.clone()),
        })
    }

    async fn update_assistant_prompt(
        &self,
        assistant_id: &str,
        prompt: &str,
    ) -> Result<(), VapiError> {
        self.prompt_updates
            .lock()
            .unwrap()
            .push((assistant_id.to_string(), prompt.to_string()));
        Ok(())
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<(), VapiError> {
        self.assistants_deleted
            .lock()
            .unwrap()
            .push(assistant_id.to_string());
        Ok(())
    }

    async fn create_phone_number(&self, _area_code: Option<&str>) -> Result<PhoneNumber, VapiError> {
        if self.phone_limit.load(Ordering::SeqCst) {
            return Err(vapi_error(400, "Free phone number limit reached"));
        }
        if self.fail_phone.load(Ordering::SeqCst) {
            return Err(vapi_error(500, "upstream unavailable"));
        }
        let id = self.next_id("pn");
        self.phones_created.lock().unwrap().push(id.clone());
        Ok(PhoneNumber {
            id,
            number: Some("+15550009999".into()),
            status: Some("active".into()),
            assistant_id: None,
        })
    }

    async fn get_phone_number(&self, phone_number_id: &str) -> Result<PhoneNumber, VapiError> {
        Ok(PhoneNumber {
            id: phone_number_id.to_string(),
            number: Some("+15550009999".into()),
            status: Some("active".into()),
            assistant_id: None,
        })
    }

    async fn attach_phone_number(
        &self,
        phone_number_id: &str,
        assistant_id: &str,
    ) -> Result<(), VapiError> {
        self.attached
            .lock()
            .unwrap()
            .push((phone_number_id.to_string(), assistant_id.to_string()));
        Ok(())
    }

    async fn delete_phone_number(&self, phone_number_id: &str) -> Result<(), VapiError> {
        self.phones_deleted
            .lock()
            .unwrap()
            .push(phone_number_id.to_string());
        Ok(())
    }
}

// ============================================================================
// Telephony fake
// ============================================================================

#[derive(Default)]
pub struct FakeTelephony {
    pub available: Mutex<Option<String>>,
    pub purchased: Mutex<Vec<(String, String)>>,
    pub released: Mutex<Vec<String>>,
    pub call_started_at: Mutex<Option<DateTime<Utc>>>,
}

#[async_trait]
impl TelephonyPlatform for FakeTelephony {
    async fn search_local_number(&self, _area_code: &str) -> Result<Option<String>, TwilioError> {
        Ok(self.available.lock().unwrap().clone())
    }

    async fn purchase_number(
        &self,
        phone_number: &str,
        voice_url: &str,
    ) -> Result<IncomingNumber, TwilioError> {
        let mut purchased = self.purchased.lock().unwrap();
        purchased.push((phone_number.to_string(), voice_url.to_string()));
        Ok(IncomingNumber {
            sid: format!("PN{}", purchased.len()),
            phone_number: phone_number.to_string(),
        })
    }

    async fn release_number(&self, number_sid: &str) -> Result<(), TwilioError> {
        self.released.lock().unwrap().push(number_sid.to_string());
        Ok(())
    }

    async fn fetch_call_started_at(
        &self,
        _call_sid: &str,
    ) -> Result<Option<DateTime<Utc>>, TwilioError> {
        Ok(*self.call_started_at.lock().unwrap())
    }
}

// ============================================================================
// Calendar fake
// ============================================================================

pub struct FakeCalendar {
    pub refresh_token: Mutex<Option<String>>,
    pub email: Mutex<Option<String>>,
    pub fail_exchange: AtomicBool,
}

impl Default for FakeCalendar {
    fn default() -> Self {
        Self {
            refresh_token: Mutex::new(Some("refresh-token".into())),
            email: Mutex::new(Some("owner@example.com".into())),
            fail_exchange: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl CalendarOAuth for FakeCalendar {
    fn authorization_url(&self, state: &str) -> Result<String, GoogleError> {
        Ok(format!("https://accounts.google.test/auth?state={state}"))
    }

    async fn exchange_code(&self, _code: &str) -> Result<TokenGrant, GoogleError> {
        if self.fail_exchange.load(Ordering::SeqCst) {
            return Err(GoogleError::Api {
                status: 400,
                message: "invalid_grant".into(),
            });
        }
        Ok(TokenGrant {
            access_token: "access-token".into(),
            refresh_token: self.refresh_token.lock().unwrap().clone(),
        })
    }

    async fn fetch_email(&self, _access_token: &str) -> Result<Option<String>, GoogleError> {
        Ok(self.email.lock().unwrap().clone())
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Router wired to a memory store and the fakes above.
pub struct TestHarness {
    pub server: TestServer,
    pub store: Arc<MemoryStore>,
    /// The store the router sees; reads and writes reach `store`.
    pub faults: Arc<FaultyStore>,
    pub billing: Arc<FakeBilling>,
    pub voice: Arc<FakeVoice>,
    pub telephony: Arc<FakeTelephony>,
    pub calendar: Arc<FakeCalendar>,
    pub user_id: UserId,
    pub config: ServiceConfig,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(customize: impl FnOnce(&mut ServiceConfig)) -> Self {
        let mut config = ServiceConfig {
            auth_jwt_secret: JWT_SECRET.into(),
            stripe_webhook_secret: Some(STRIPE_WEBHOOK_SECRET.into()),
            stripe_prices: vec![
                (PlanId::Starter, STARTER_PRICE.into()),
                (PlanId::PerMinute1, PER_MINUTE_PRICE.into()),
            ],
            voice_server_ws_url: Some(VOICE_WS_URL.into()),
            twilio_webhook_base_url: Some(TWILIO_BASE_URL.into()),
            ..ServiceConfig::default()
        };
        customize(&mut config);

        let store = Arc::new(MemoryStore::new());
        let faults = Arc::new(FaultyStore::new(Arc::clone(&store)));
        let billing = Arc::new(FakeBilling::default());
        let voice = Arc::new(FakeVoice::default());
        let telephony = Arc::new(FakeTelephony::default());
        let calendar = Arc::new(FakeCalendar::default());

        let state = AppState::new(Arc::clone(&faults) as Arc<dyn Store>, config.clone())
            .with_billing(Arc::clone(&billing) as Arc<dyn BillingPlatform>)
            .with_voice(Arc::clone(&voice) as Arc<dyn VoicePlatform>)
            .with_telephony(Arc::clone(&telephony) as Arc<dyn TelephonyPlatform>)
            .with_calendar(Arc::clone(&calendar) as Arc<dyn CalendarOAuth>);

        let server = TestServer::new(create_router(state)).expect("test server");

        Self {
            server,
            store,
            faults,
            billing,
            voice,
            telephony,
            calendar,
            user_id: UserId::generate(),
            config,
        }
    }

    /// Bearer token for `user_id`.
    pub fn token_for(user_id: &UserId) -> String {
        let claims = JwtClaims {
            sub: user_id.to_string(),
            email: Some("owner@example.com".into()),
            aud: Some(serde_json::json!("authenticated")),
            exp: Utc::now().timestamp() + 3600,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .expect("token")
    }

    pub fn auth_header_for(user_id: &UserId) -> (HeaderName, HeaderValue) {
        bearer(&Self::token_for(user_id))
    }

    /// Authorization header for the harness user.
    pub fn auth(&self) -> (HeaderName, HeaderValue) {
        Self::auth_header_for(&self.user_id)
    }

    /// Make the harness user an active, calendar-connected subscriber.
    pub async fn activate_user(&self) -> User {
        let mut user = User::new(self.user_id, Some("owner@example.com".into()), Utc::now());
        user.subscription_status = SubscriptionStatus::Active;
        user.calendar_id = Some("owner@example.com".into());
        user.calendar_refresh_token = Some("refresh-token".into());
        user.stripe_customer_id = Some("cus_test".into());
        user.stripe_subscription_id = Some("sub_test".into());
        user.billing_plan = Some("subscription_starter".into());
        user.billing_plan_metadata = Some(echodesk_core::PlanMetadata::capped(300));
        self.store.put_user(&user).await.unwrap();
        user
    }

    /// Store an active receptionist owned by `owner`.
    pub async fn seed_receptionist(&self, owner: &UserId) -> Receptionist {
        let mut receptionist =
            Receptionist::new(*owner, "Front Desk", "+15551234567", Utc::now());
        receptionist.calendar_id = Some("owner@example.com".into());
        receptionist.vapi_assistant_id = Some(format!("asst_seed_{}", receptionist.id));
        receptionist.vapi_phone_number_id = Some(format!("pn_seed_{}", receptionist.id));
        receptionist.inbound_phone_number = Some("+15550001111".into());
        receptionist.status = ReceptionistStatus::Active;
        self.store.insert_receptionist(&receptionist).await.unwrap();
        receptionist
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        axum::http::header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    )
}

pub fn header(name: &'static str, value: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static(name),
        HeaderValue::from_str(value).unwrap(),
    )
}

/// Attach a prebuilt header pair.
pub trait RequestExt {
    fn with(self, header: (HeaderName, HeaderValue)) -> Self;
}

impl RequestExt for TestRequest {
    fn with(self, (name, value): (HeaderName, HeaderValue)) -> Self {
        self.add_header(name, value)
    }
}
