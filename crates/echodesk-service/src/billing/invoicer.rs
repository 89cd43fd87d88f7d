//! Monthly pay-as-you-go invoicing.
//!
//! For every per-minute subscriber, bill the previous month's usage once.
//! The invoice ledger keyed by (user, period start) is reserved before any
//! Stripe call, so overlapping runs and re-runs skip users already claimed.
//! A run that fails before finalizing releases its reservation; Stripe
//! idempotency keys make the retry reuse the same draft invoice.

use chrono::{DateTime, Utc};
use serde::Serialize;

use echodesk_core::invoice::{
    invoice_description, invoice_idempotency_key, usage_item_description, BASE_FEE_DESCRIPTION,
    INVOICE_CURRENCY,
};
use echodesk_core::{BillingInvoiceRecord, BillingPeriod, InvoiceAmounts, User};
use echodesk_store::{Store, StoreError};

use crate::platform::BillingPlatform;
use crate::stripe::{InvoiceItemRequest, InvoiceRequest, StripeError};

/// Counts from an invoicing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InvoiceRunSummary {
    /// Users invoiced in this run.
    pub invoiced: u64,
    /// Users already invoiced or with nothing to bill.
    pub skipped: u64,
    /// Users that failed.
    pub errors: u64,
}

#[derive(Debug, thiserror::Error)]
enum InvoiceUserError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("billing error: {0}")]
    Billing(#[from] StripeError),
    #[error("invoice {invoice_id} finalized but ledger write failed: {source}")]
    Ledger {
        invoice_id: String,
        source: StoreError,
    },
}

enum UserOutcome {
    Invoiced,
    Skipped,
}

/// Invoice every per-minute user for the month before `now`.
///
/// # Errors
///
/// Returns an error only if the eligible users cannot be listed.
pub async fn invoice_previous_month(
    store: &dyn Store,
    billing: &dyn BillingPlatform,
    now: DateTime<Utc>,
) -> Result<InvoiceRunSummary, StoreError> {
    let period = BillingPeriod::previous_month(now);
    let users = store.list_per_minute_users().await?;
    let mut summary = InvoiceRunSummary::default();

    for user in &users {
        match invoice_user(store, billing, user, &period, now).await {
            Ok(UserOutcome::Invoiced) => summary.invoiced += 1,
            Ok(UserOutcome::Skipped) => summary.skipped += 1,
            Err(e @ InvoiceUserError::Ledger { .. }) => {
                tracing::error!(user_id = %user.id, period_start = %period.start, error = %e, "Invoice ledger write failed");
                summary.errors += 1;
            }
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Invoicing failed");
                summary.errors += 1;
            }
        }
    }

    tracing::info!(
        period_start = %period.start,
        invoiced = summary.invoiced,
        skipped = summary.skipped,
        errors = summary.errors,
        "Invoicing run finished"
    );
    Ok(summary)
}

async fn invoice_user(
    store: &dyn Store,
    billing: &dyn BillingPlatform,
    user: &User,
    period: &BillingPeriod,
    now: DateTime<Utc>,
) -> Result<UserOutcome, InvoiceUserError> {
    let Some(customer_id) = user.stripe_customer_id.as_deref() else {
        return Ok(UserOutcome::Skipped);
    };

    if store
        .get_invoice_record(&user.id, period.start)
        .await?
        .is_some()
    {
        tracing::debug!(user_id = %user.id, period_start = %period.start, "Already invoiced");
        return Ok(UserOutcome::Skipped);
    }

    let total_seconds = store
        .sum_user_snapshot_seconds(&user.id, period.start)
        .await?;
    let amounts = InvoiceAmounts::compute(total_seconds, user.billing_plan_metadata.as_ref());
    if amounts.monthly_fee_cents <= 0 && !amounts.has_usage() {
        return Ok(UserOutcome::Skipped);
    }

    let reservation = BillingInvoiceRecord::reserved(user.id, period.start, now);
    if !store.reserve_invoice_record(&reservation).await? {
        tracing::debug!(user_id = %user.id, period_start = %period.start, "Invoice claimed by another run");
        return Ok(UserOutcome::Skipped);
    }

    let invoice_id = match bill(billing, user, customer_id, period, &amounts).await {
        Ok(invoice_id) => invoice_id,
        Err(e) => {
            if let Err(release) = store.release_invoice_record(&user.id, period.start).await {
                tracing::error!(user_id = %user.id, period_start = %period.start, error = %release, "Failed to release invoice reservation");
            }
            return Err(e.into());
        }
    };

    store
        .complete_invoice_record(&user.id, period.start, &invoice_id)
        .await
        .map_err(|source| InvoiceUserError::Ledger {
            invoice_id: invoice_id.clone(),
            source,
        })?;

    tracing::info!(
        user_id = %user.id,
        invoice_id = %invoice_id,
        minutes = amounts.minutes,
        usage_cents = amounts.usage_cents,
        "Usage invoiced"
    );
    Ok(UserOutcome::Invoiced)
}

/// Create, fill and finalize the Stripe invoice. Returns its ID.
async fn bill(
    billing: &dyn BillingPlatform,
    user: &User,
    customer_id: &str,
    period: &BillingPeriod,
    amounts: &InvoiceAmounts,
) -> Result<String, StripeError> {
    let key = invoice_idempotency_key(&user.id, period);

    let invoice = billing
        .create_invoice(&InvoiceRequest {
            customer_id: customer_id.to_string(),
            description: invoice_description(period),
            metadata: vec![
                ("userId".to_string(), user.id.to_string()),
                ("period_start".to_string(), period.start.to_string()),
            ],
            idempotency_key: Some(key.clone()),
        })
        .await?;

    if amounts.monthly_fee_cents > 0 {
        billing
            .create_invoice_item(&InvoiceItemRequest {
                customer_id: customer_id.to_string(),
                invoice_id: invoice.id.clone(),
                amount_cents: amounts.monthly_fee_cents,
                currency: INVOICE_CURRENCY.to_string(),
                description: BASE_FEE_DESCRIPTION.to_string(),
                idempotency_key: Some(format!("{key}-base")),
            })
            .await?;
    }

    if amounts.has_usage() {
        billing
            .create_invoice_item(&InvoiceItemRequest {
                customer_id: customer_id.to_string(),
                invoice_id: invoice.id.clone(),
                amount_cents: amounts.usage_cents,
                currency: INVOICE_CURRENCY.to_string(),
                description: usage_item_description(amounts.minutes),
                idempotency_key: Some(format!("{key}-usage")),
            })
            .await?;
    }

    billing.finalize_invoice(&invoice.id).await?;
    Ok(invoice.id)
}
