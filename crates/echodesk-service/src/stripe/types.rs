//! Stripe API types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use echodesk_core::{PriceRef, SubscriptionSnapshot, SubscriptionStatus};

/// Stripe Checkout session object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutSession {
    /// Session ID.
    pub id: String,
    /// Checkout URL to redirect the user to.
    #[serde(default)]
    pub url: Option<String>,
    /// Payment status (`paid`, `unpaid`, `no_payment_required`).
    #[serde(default)]
    pub payment_status: Option<String>,
    /// Session status (`open`, `complete`, `expired`).
    #[serde(default)]
    pub status: Option<String>,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<String>,
    /// Email the session was created with.
    #[serde(default)]
    pub customer_email: Option<String>,
    /// Details the customer entered.
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    /// Client reference ID (our `user_id`).
    #[serde(default)]
    pub client_reference_id: Option<String>,
    /// Subscription, expanded when requested.
    #[serde(default)]
    pub subscription: Option<Expandable<Subscription>>,
    /// Metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    /// Whether the session finished successfully.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.payment_status.as_deref() == Some("paid") || self.status.as_deref() == Some("complete")
    }

    /// Our user ID: `metadata.userId`, then `client_reference_id`.
    #[must_use]
    pub fn user_reference(&self) -> Option<&str> {
        self.metadata
            .get("userId")
            .map(String::as_str)
            .or(self.client_reference_id.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Email from metadata, the session, or the customer's input.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.metadata
            .get("email")
            .map(String::as_str)
            .or(self.customer_email.as_deref())
            .or_else(|| {
                self.customer_details
                    .as_ref()
                    .and_then(|d| d.email.as_deref())
            })
            .filter(|s| !s.is_empty())
    }

    /// The expanded subscription, if present.
    #[must_use]
    pub fn expanded_subscription(&self) -> Option<&Subscription> {
        match &self.subscription {
            Some(Expandable::Object(sub)) => Some(sub),
            _ => None,
        }
    }

    /// The subscription ID, expanded or not.
    #[must_use]
    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription.as_ref().map(Expandable::id)
    }
}

/// Customer details entered during checkout.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDetails {
    /// Email.
    #[serde(default)]
    pub email: Option<String>,
}

/// A field that is either an ID or the expanded object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    /// Expanded object.
    Object(Box<T>),
    /// Bare ID.
    Id(String),
}

impl Expandable<Subscription> {
    /// The referenced object's ID.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Object(sub) => &sub.id,
        }
    }
}

/// Stripe subscription object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Subscription {
    /// Subscription ID.
    pub id: String,
    /// Status (`active`, `trialing`, `past_due`, ...).
    #[serde(default)]
    pub status: String,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<String>,
    /// Subscription items.
    #[serde(default)]
    pub items: Option<StripeList<SubscriptionItem>>,
    /// Metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Subscription {
    /// Price of the first item.
    #[must_use]
    pub fn price(&self) -> Option<&Price> {
        self.items
            .as_ref()
            .and_then(|items| items.data.first())
            .map(|item| &item.price)
    }

    /// Describe this subscription for reconciliation.
    #[must_use]
    pub fn snapshot(&self) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            status: SubscriptionStatus::from_stripe(&self.status),
            customer_id: self.customer.clone(),
            subscription_id: Some(self.id.clone()),
            price: self.price().map(Price::price_ref),
            deleted: false,
        }
    }
}

/// Stripe subscription item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionItem {
    /// Item ID.
    #[serde(default)]
    pub id: String,
    /// Item price.
    pub price: Price,
}

/// Stripe price object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Price {
    /// Price ID.
    pub id: String,
    /// Metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Price {
    /// Reference used for plan resolution.
    #[must_use]
    pub fn price_ref(&self) -> PriceRef {
        PriceRef {
            id: self.id.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Billing portal session.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortalSession {
    /// Session ID.
    pub id: String,
    /// Portal URL.
    pub url: String,
}

/// Stripe invoice object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Invoice {
    /// Invoice ID.
    pub id: String,
    /// Status (`draft`, `open`, `paid`, ...).
    #[serde(default)]
    pub status: Option<String>,
    /// Hosted invoice page.
    #[serde(default)]
    pub hosted_invoice_url: Option<String>,
}

/// Stripe invoice item object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceItem {
    /// Invoice item ID.
    pub id: String,
}

/// Stripe list response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    /// Data items.
    pub data: Vec<T>,
    /// Whether there are more items.
    #[serde(default)]
    pub has_more: bool,
}

impl<T> Default for StripeList<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            has_more: false,
        }
    }
}

/// Stripe webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event ID.
    pub id: String,
    /// Event type (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data.
    pub data: WebhookEventData,
}

/// Webhook event data container.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    /// The event object.
    pub object: serde_json::Value,
}

/// Stripe error response.
#[derive(Debug, Deserialize)]
pub struct StripeErrorResponse {
    /// Error details.
    pub error: StripeErrorBody,
}

/// Stripe error body.
#[derive(Debug, Deserialize)]
pub struct StripeErrorBody {
    /// Error type.
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
}

// ============================================================================
// Requests
// ============================================================================

/// Subscription checkout request.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest {
    /// Price to subscribe to.
    pub price_id: String,
    /// Our user ID (metadata and `client_reference_id`).
    pub user_id: String,
    /// Prefilled email.
    pub email: Option<String>,
    /// Existing Stripe customer, if any.
    pub customer_id: Option<String>,
    /// Redirect after payment.
    pub success_url: String,
    /// Redirect on cancel.
    pub cancel_url: String,
}

/// Draft invoice request.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceRequest {
    /// Customer to charge.
    pub customer_id: String,
    /// Invoice description.
    pub description: String,
    /// Metadata.
    pub metadata: Vec<(String, String)>,
    /// Sent as the `Idempotency-Key` header.
    pub idempotency_key: Option<String>,
}

/// Invoice line item request.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceItemRequest {
    /// Customer to charge.
    pub customer_id: String,
    /// Draft invoice to attach to.
    pub invoice_id: String,
    /// Amount in cents.
    pub amount_cents: i64,
    /// ISO currency.
    pub currency: String,
    /// Line description.
    pub description: String,
    /// Sent as the `Idempotency-Key` header.
    pub idempotency_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_with_expanded_subscription_parses() {
        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_1",
            "payment_status": "paid",
            "status": "complete",
            "customer": "cus_1",
            "metadata": { "userId": "u1" },
            "subscription": {
                "id": "sub_1",
                "status": "active",
                "customer": "cus_1",
                "items": { "data": [ { "id": "si_1", "price": { "id": "price_pro" } } ] }
            }
        }))
        .unwrap();

        assert!(session.is_settled());
        assert_eq!(session.user_reference(), Some("u1"));
        assert_eq!(session.subscription_id(), Some("sub_1"));
        let snapshot = session.expanded_subscription().unwrap().snapshot();
        assert_eq!(snapshot.status, SubscriptionStatus::Active);
        assert_eq!(snapshot.price.unwrap().id, "price_pro");
    }

    #[test]
    fn session_with_subscription_id_parses() {
        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_2",
            "client_reference_id": "u2",
            "customer_details": { "email": "owner@example.com" },
            "subscription": "sub_2"
        }))
        .unwrap();

        assert!(!session.is_settled());
        assert_eq!(session.user_reference(), Some("u2"));
        assert_eq!(session.email(), Some("owner@example.com"));
        assert_eq!(session.subscription_id(), Some("sub_2"));
        assert!(session.expanded_subscription().is_none());
    }

    #[test]
    fn subscription_without_items_has_no_price() {
        let sub = Subscription {
            id: "sub_1".into(),
            status: "past_due".into(),
            ..Subscription::default()
        };
        let snapshot = sub.snapshot();
        assert_eq!(snapshot.status, SubscriptionStatus::PastDue);
        assert!(snapshot.price.is_none());
    }
}
