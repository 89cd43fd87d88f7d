//! Subscription state and usage billing.
//!
//! - [`reconciler`]: keeps each user's subscription status and plan in line
//!   with the billing platform
//! - [`invoicer`]: bills pay-as-you-go users for the previous month

pub mod invoicer;
pub mod reconciler;

pub use invoicer::{invoice_previous_month, InvoiceRunSummary};
pub use reconciler::{
    apply_snapshot, backfill_plan, checkout_snapshot, handle_event, sync_checkout_session,
    EventOutcome, SyncOutcome,
};
