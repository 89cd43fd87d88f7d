//! Stripe integration for subscriptions and usage invoices.
//!
//! Stripe handles:
//! - Subscription checkout and the customer billing portal
//! - Subscription lookups for plan reconciliation
//! - Pay-as-you-go invoices (draft, line items, finalize)
//! - Webhooks (verified in [`crate::crypto`])

pub mod client;
pub mod types;

pub use client::StripeClient;
pub use client::StripeError;
pub use types::*;
