//! Application state.

use std::sync::Arc;
use std::time::Duration;

use echodesk_core::PlanCatalog;
use echodesk_store::Store;

use crate::config::ServiceConfig;
use crate::error::ApiError;
use crate::google::GoogleClient;
use crate::platform::{BillingPlatform, CalendarOAuth, TelephonyPlatform, VoicePlatform};
use crate::stripe::StripeClient;
use crate::twilio::TwilioClient;
use crate::vapi::VapiClient;

/// Timeout of the shared HTTP client (website fetches).
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Price-to-plan table built from configuration.
    pub plans: PlanCatalog,

    /// Plain HTTP client for fetching business websites.
    pub http: reqwest::Client,

    /// Subscription and invoicing platform (optional).
    pub billing: Option<Arc<dyn BillingPlatform>>,

    /// Voice assistant platform (optional).
    pub voice: Option<Arc<dyn VoicePlatform>>,

    /// Telephony platform for self-provisioned numbers (optional).
    pub telephony: Option<Arc<dyn TelephonyPlatform>>,

    /// Calendar OAuth provider (optional).
    pub calendar: Option<Arc<dyn CalendarOAuth>>,
}

impl AppState {
    /// Create a new application state, building every configured client.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let billing = config.stripe_api_key.as_ref().and_then(|key| {
            match StripeClient::new(key) {
                Ok(client) => {
                    tracing::info!("Stripe integration enabled");
                    Some(Arc::new(client) as Arc<dyn BillingPlatform>)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Stripe client");
                    None
                }
            }
        });

        if billing.is_none() {
            tracing::warn!("Stripe not configured - checkout and invoicing will not be available");
        }

        let voice = config.vapi_api_key.as_ref().and_then(|key| {
            match VapiClient::new(key) {
                Ok(client) => {
                    tracing::info!("Vapi integration enabled");
                    Some(Arc::new(client) as Arc<dyn VoicePlatform>)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Vapi client");
                    None
                }
            }
        });

        if voice.is_none() {
            tracing::warn!("Vapi not configured - receptionists cannot be provisioned");
        }

        let telephony = config
            .twilio_account_sid
            .as_ref()
            .zip(config.twilio_auth_token.as_ref())
            .and_then(|(sid, token)| match TwilioClient::new(sid, token) {
                Ok(client) => {
                    tracing::info!("Twilio integration enabled");
                    Some(Arc::new(client) as Arc<dyn TelephonyPlatform>)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Twilio client");
                    None
                }
            });

        if telephony.is_none() {
            tracing::warn!("Twilio not configured - self-provisioned numbers will not be available");
        }

        let redirect = config.google_redirect();
        let calendar = config
            .google_client_id
            .as_ref()
            .zip(config.google_client_secret.as_ref())
            .and_then(|(id, secret)| match GoogleClient::new(id, secret, &redirect) {
                Ok(client) => {
                    tracing::info!(redirect_uri = %redirect, "Google Calendar OAuth enabled");
                    Some(Arc::new(client) as Arc<dyn CalendarOAuth>)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Google OAuth client");
                    None
                }
            });

        if calendar.is_none() {
            tracing::warn!("Google OAuth not configured - calendars cannot be connected");
        }

        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            store,
            plans: config.plan_catalog(),
            config,
            http,
            billing,
            voice,
            telephony,
            calendar,
        }
    }

    /// Replace the billing platform.
    #[must_use]
    pub fn with_billing(mut self, billing: Arc<dyn BillingPlatform>) -> Self {
        self.billing = Some(billing);
        self
    }

    /// Replace the voice platform.
    #[must_use]
    pub fn with_voice(mut self, voice: Arc<dyn VoicePlatform>) -> Self {
        self.voice = Some(voice);
        self
    }

    /// Replace the telephony platform.
    #[must_use]
    pub fn with_telephony(mut self, telephony: Arc<dyn TelephonyPlatform>) -> Self {
        self.telephony = Some(telephony);
        self
    }

    /// Replace the calendar OAuth provider.
    #[must_use]
    pub fn with_calendar(mut self, calendar: Arc<dyn CalendarOAuth>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    /// Check if Stripe is configured.
    #[must_use]
    pub fn has_billing(&self) -> bool {
        self.billing.is_some()
    }

    /// Check if Vapi is configured.
    #[must_use]
    pub fn has_voice(&self) -> bool {
        self.voice.is_some()
    }

    /// The billing platform, or a 502 when it is not configured.
    pub fn billing(&self) -> Result<&Arc<dyn BillingPlatform>, ApiError> {
        self.billing
            .as_ref()
            .ok_or_else(|| ApiError::ExternalService("Stripe not configured".into()))
    }

    /// The voice platform, or a 502 when it is not configured.
    pub fn voice(&self) -> Result<&Arc<dyn VoicePlatform>, ApiError> {
        self.voice
            .as_ref()
            .ok_or_else(|| ApiError::ExternalService("Vapi not configured".into()))
    }

    /// The telephony platform, or a 502 when it is not configured.
    pub fn telephony(&self) -> Result<&Arc<dyn TelephonyPlatform>, ApiError> {
        self.telephony
            .as_ref()
            .ok_or_else(|| ApiError::ExternalService("Twilio not configured".into()))
    }

    /// The calendar OAuth provider, or a 502 when it is not configured.
    pub fn calendar(&self) -> Result<&Arc<dyn CalendarOAuth>, ApiError> {
        self.calendar
            .as_ref()
            .ok_or_else(|| ApiError::ExternalService("Google OAuth not configured".into()))
    }
}
