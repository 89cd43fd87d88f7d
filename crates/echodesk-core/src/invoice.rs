//! Pay-as-you-go invoice amounts and the invoice ledger row.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::account::PlanMetadata;
use crate::plans::per_minute_rates;
use crate::usage::{billable_minutes, BillingPeriod};
use crate::UserId;

/// Currency every invoice item is billed in.
pub const INVOICE_CURRENCY: &str = "usd";

/// Ledger row recording that a user was invoiced for a period.
///
/// At most one row exists per (`user_id`, `period_start`). The row is
/// reserved before any Stripe call and holds no invoice ID until the
/// invoice is finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingInvoiceRecord {
    /// Invoiced user.
    pub user_id: UserId,
    /// First day of the invoiced period.
    pub period_start: NaiveDate,
    /// Stripe invoice ID, `None` while the run that reserved the row is in flight.
    pub stripe_invoice_id: Option<String>,
    /// When the row was written.
    pub created_at: DateTime<Utc>,
}

impl BillingInvoiceRecord {
    /// A reservation row with no invoice yet.
    #[must_use]
    pub fn reserved(user_id: UserId, period_start: NaiveDate, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            period_start,
            stripe_invoice_id: None,
            created_at,
        }
    }

    /// Whether the invoice was finalized and recorded.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.stripe_invoice_id.is_some()
    }
}

/// Stripe idempotency key for a user's invoice in a period.
///
/// Line items and retries derive their keys from this one, so a repeated
/// request for the same period returns the same Stripe objects.
#[must_use]
pub fn invoice_idempotency_key(user_id: &UserId, period: &BillingPeriod) -> String {
    format!("invoice-{user_id}-{}", period.start)
}

/// Amounts for one pay-as-you-go invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InvoiceAmounts {
    /// Billable minutes.
    pub minutes: i64,
    /// Monthly base fee in cents.
    pub monthly_fee_cents: i64,
    /// Rate per minute in cents.
    pub per_minute_cents: i64,
    /// Usage charge in cents.
    pub usage_cents: i64,
}

impl InvoiceAmounts {
    /// Compute amounts for `total_seconds` under the user's plan metadata.
    #[must_use]
    pub fn compute(total_seconds: i64, metadata: Option<&PlanMetadata>) -> Self {
        let (monthly_fee_cents, per_minute_cents) = per_minute_rates(metadata);
        let minutes = billable_minutes(total_seconds);
        Self {
            minutes,
            monthly_fee_cents,
            per_minute_cents,
            usage_cents: minutes * per_minute_cents,
        }
    }

    /// Whether a usage line item is needed.
    #[must_use]
    pub const fn has_usage(&self) -> bool {
        self.usage_cents > 0
    }
}

/// Invoice description.
#[must_use]
pub fn invoice_description(period: &BillingPeriod) -> String {
    format!("Voice usage {} to {}", period.start, period.end)
}

/// Base fee line item description.
pub const BASE_FEE_DESCRIPTION: &str = "Monthly base fee";

/// Usage line item description.
#[must_use]
pub fn usage_item_description(minutes: i64) -> String {
    format!("Voice minutes ({minutes} min)")
}
