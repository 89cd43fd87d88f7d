//! Seams to the external platforms.
//!
//! Handlers and workflows depend on these traits rather than on the HTTP
//! clients so tests can substitute in-process fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::google::{GoogleError, TokenGrant};
use crate::stripe::{
    CheckoutRequest, CheckoutSession, Invoice, InvoiceItem, InvoiceItemRequest, InvoiceRequest,
    PortalSession, StripeError, Subscription,
};
use crate::twilio::{IncomingNumber, TwilioError};
use crate::vapi::{Assistant, AssistantRequest, PhoneNumber, Tool, ToolRequest, VapiError};

/// Subscription and invoicing platform (Stripe).
#[async_trait]
pub trait BillingPlatform: Send + Sync {
    /// Start a subscription checkout.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform rejects the request.
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, StripeError>;

    /// Fetch a checkout session with its subscription expanded.
    ///
    /// # Errors
    ///
    /// Returns an error if the session does not exist or the call fails.
    async fn get_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, StripeError>;

    /// Fetch a subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription does not exist or the call fails.
    async fn get_subscription(&self, subscription_id: &str) -> Result<Subscription, StripeError>;

    /// Active subscriptions of a customer, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    async fn list_active_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<Subscription>, StripeError>;

    /// Open a customer billing portal session.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, StripeError>;

    /// Create a draft invoice.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, StripeError>;

    /// Add a line item to a draft invoice.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    async fn create_invoice_item(
        &self,
        request: &InvoiceItemRequest,
    ) -> Result<InvoiceItem, StripeError>;

    /// Finalize a draft invoice so it is charged.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    async fn finalize_invoice(&self, invoice_id: &str) -> Result<Invoice, StripeError>;
}

/// Voice assistant platform (Vapi).
#[async_trait]
pub trait VoicePlatform: Send + Sync {
    /// Create a tool the assistant can call.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform rejects the tool.
    async fn create_tool(&self, request: &ToolRequest) -> Result<Tool, VapiError>;

    /// Delete a tool.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    async fn delete_tool(&self, tool_id: &str) -> Result<(), VapiError>;

    /// Create an assistant.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform rejects the assistant.
    async fn create_assistant(&self, request: &AssistantRequest) -> Result<Assistant, VapiError>;

    /// Replace an assistant's system prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    async fn update_assistant_prompt(&self, assistant_id: &str, prompt: &str)
        -> Result<(), VapiError>;

    /// Delete an assistant.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    async fn delete_assistant(&self, assistant_id: &str) -> Result<(), VapiError>;

    /// Provision a free phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform refuses, including at the account limit.
    async fn create_phone_number(&self, area_code: Option<&str>) -> Result<PhoneNumber, VapiError>;

    /// Fetch a phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    async fn get_phone_number(&self, phone_number_id: &str) -> Result<PhoneNumber, VapiError>;

    /// Route a phone number to an assistant.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    async fn attach_phone_number(
        &self,
        phone_number_id: &str,
        assistant_id: &str,
    ) -> Result<(), VapiError>;

    /// Release a phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    async fn delete_phone_number(&self, phone_number_id: &str) -> Result<(), VapiError>;
}

/// Telephony platform for self-provisioned numbers (Twilio).
#[async_trait]
pub trait TelephonyPlatform: Send + Sync {
    /// First available local number in an area code.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    async fn search_local_number(&self, area_code: &str) -> Result<Option<String>, TwilioError>;

    /// Buy a number and point its voice webhook at `voice_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the purchase fails.
    async fn purchase_number(
        &self,
        phone_number: &str,
        voice_url: &str,
    ) -> Result<IncomingNumber, TwilioError>;

    /// Release a purchased number.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    async fn release_number(&self, number_sid: &str) -> Result<(), TwilioError>;

    /// When a call started, if the platform knows.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    async fn fetch_call_started_at(
        &self,
        call_sid: &str,
    ) -> Result<Option<DateTime<Utc>>, TwilioError>;
}

/// Calendar OAuth provider (Google).
#[async_trait]
pub trait CalendarOAuth: Send + Sync {
    /// Consent screen URL carrying `state`.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider endpoint is misconfigured.
    fn authorization_url(&self, state: &str) -> Result<String, GoogleError>;

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is invalid or the call fails.
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, GoogleError>;

    /// Email of the account that granted access.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    async fn fetch_email(&self, access_token: &str) -> Result<Option<String>, GoogleError>;
}
