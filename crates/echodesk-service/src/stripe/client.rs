//! Stripe API client.
//!
//! Stripe's API is form-encoded on the way in and JSON on the way out.
//! Requests authenticate with the secret key as the basic-auth username.

use std::time::Duration;

use async_trait::async_trait;

use super::types::{
    CheckoutRequest, CheckoutSession, Invoice, InvoiceItem, InvoiceItemRequest, InvoiceRequest,
    PortalSession, StripeErrorResponse, StripeList, Subscription,
};
use crate::platform::BillingPlatform;

/// Timeout applied to every Stripe request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Stripe API errors.
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe API returned an error.
    #[error("Stripe API error ({error_type}): {message}")]
    Api {
        /// Error type.
        error_type: String,
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
    },

    /// Failed to parse response.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Client configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl StripeClient {
    /// Production API base URL.
    pub const BASE_URL: &'static str = "https://api.stripe.com/v1";

    /// Create a client for the production API.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty or the HTTP client can't be built.
    pub fn new(api_key: &str) -> Result<Self, StripeError> {
        Self::with_base_url(api_key, Self::BASE_URL)
    }

    /// Create a client against another base URL (tests, proxies).
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty or the HTTP client can't be built.
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self, StripeError> {
        if api_key.trim().is_empty() {
            return Err(StripeError::Configuration("API key is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<T, StripeError> {
        self.post_form_with_key(path, params, None).await
    }

    /// POST with an optional `Idempotency-Key`. Stripe replays the first
    /// response for a repeated key instead of creating a second object.
    async fn post_form_with_key<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, StripeError> {
        tracing::debug!(path = %path, idempotent = idempotency_key.is_some(), "Stripe POST");
        let mut request = self
            .client
            .post(self.url(path))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(params);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }
        let response = request.send().await?;

        self.handle_response(response).await
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, StripeError> {
        tracing::debug!(path = %path, "Stripe GET");
        let response = self
            .client
            .get(self.url(path))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .query(query)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            return Ok(serde_json::from_str(&body)?);
        }

        let error_body: Result<StripeErrorResponse, _> = response.json().await;

        match error_body {
            Ok(stripe_error) => Err(StripeError::Api {
                error_type: stripe_error.error.error_type,
                message: stripe_error.error.message,
                code: stripe_error.error.code,
            }),
            Err(_) => Err(StripeError::Api {
                error_type: "unknown".to_string(),
                message: format!("HTTP {status}"),
                code: None,
            }),
        }
    }
}

/// Form parameters for a subscription checkout session.
fn checkout_params(request: &CheckoutRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("mode".to_string(), "subscription".to_string()),
        ("line_items[0][price]".to_string(), request.price_id.clone()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("client_reference_id".to_string(), request.user_id.clone()),
        ("metadata[userId]".to_string(), request.user_id.clone()),
        (
            "subscription_data[metadata][userId]".to_string(),
            request.user_id.clone(),
        ),
    ];

    if let Some(email) = &request.email {
        params.push(("metadata[email]".to_string(), email.clone()));
    }

    match (&request.customer_id, &request.email) {
        (Some(customer), _) => params.push(("customer".to_string(), customer.clone())),
        (None, Some(email)) => params.push(("customer_email".to_string(), email.clone())),
        (None, None) => {}
    }

    params
}

#[async_trait]
impl BillingPlatform for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, StripeError> {
        self.post_form("/checkout/sessions", &checkout_params(request))
            .await
    }

    async fn get_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, StripeError> {
        self.get(
            &format!("/checkout/sessions/{session_id}"),
            &[("expand[]", "subscription")],
        )
        .await
    }

    async fn get_subscription(&self, subscription_id: &str) -> Result<Subscription, StripeError> {
        self.get(&format!("/subscriptions/{subscription_id}"), &[])
            .await
    }

    async fn list_active_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<Subscription>, StripeError> {
        let list: StripeList<Subscription> = self
            .get(
                "/subscriptions",
                &[("customer", customer_id), ("status", "active"), ("limit", "1")],
            )
            .await?;
        Ok(list.data)
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, StripeError> {
        self.post_form(
            "/billing_portal/sessions",
            &[
                ("customer".to_string(), customer_id.to_string()),
                ("return_url".to_string(), return_url.to_string()),
            ],
        )
        .await
    }

    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, StripeError> {
        let mut params = vec![
            ("customer".to_string(), request.customer_id.clone()),
            (
                "collection_method".to_string(),
                "charge_automatically".to_string(),
            ),
            ("description".to_string(), request.description.clone()),
        ];
        for (key, value) in &request.metadata {
            params.push((format!("metadata[{key}]"), value.clone()));
        }

        tracing::debug!(customer_id = %request.customer_id, "Creating Stripe invoice");
        self.post_form_with_key("/invoices", &params, request.idempotency_key.as_deref())
            .await
    }

    async fn create_invoice_item(
        &self,
        request: &InvoiceItemRequest,
    ) -> Result<InvoiceItem, StripeError> {
        self.post_form_with_key(
            "/invoiceitems",
            &[
                ("customer".to_string(), request.customer_id.clone()),
                ("invoice".to_string(), request.invoice_id.clone()),
                ("amount".to_string(), request.amount_cents.to_string()),
                ("currency".to_string(), request.currency.clone()),
                ("description".to_string(), request.description.clone()),
            ],
            request.idempotency_key.as_deref(),
        )
        .await
    }

    async fn finalize_invoice(&self, invoice_id: &str) -> Result<Invoice, StripeError> {
        self.post_form(&format!("/invoices/{invoice_id}/finalize"), &[])
            .await
    }
}
