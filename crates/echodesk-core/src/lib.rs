//! Core types and rules for EchoDesk.
//!
//! This crate holds the domain model shared by the store and the service:
//!
//! - **Identifiers**: `UserId`, `ReceptionistId`, `EntryId`, `CallUsageId`
//! - **Accounts**: `User`, `SubscriptionStatus`, `PlanMetadata`
//! - **Plans**: `PlanId`, `PlanCatalog`, price-to-plan resolution
//! - **Reconciliation**: `SubscriptionSnapshot`, `reconcile`
//! - **Receptionists**: `Receptionist`, `PaymentSettings`, business configuration rows
//! - **Usage**: `CallUsageEvent`, `BillingPeriod`, `UsageSnapshot`
//! - **Invoicing**: `InvoiceAmounts`, `BillingInvoiceRecord`
//! - **Prompts**: `build_prompt`
//!
//! # Money
//!
//! All amounts are integer cents (`i64`). Rendering to dollars happens only at
//! the edges (prompt text, plan labels).

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod business;
pub mod error;
pub mod ids;
pub mod invoice;
pub mod money;
pub mod plans;
pub mod prompt;
pub mod receptionist;
pub mod reconcile;
pub mod usage;

pub use account::{PlanMetadata, SubscriptionStatus, User};
pub use business::{
    ConfigEntry, ConfigKind, Location, Promo, ReceptionistConfig, ReminderRule, RuleKind,
    ServiceOffering, Specialties, StaffMember,
};
pub use error::{DeskError, Result};
pub use ids::{CallUsageId, EntryId, IdError, ReceptionistId, UserId};
pub use invoice::{BillingInvoiceRecord, InvoiceAmounts};
pub use plans::{
    PlanCatalog, PlanDefinition, PlanId, PriceRef, ResolvedPlan, PER_MINUTE_BILLING_PLAN,
};
pub use prompt::{build_prompt, PromptInput, MAX_PROMPT_CHARS};
pub use receptionist::{normalize_phone, PaymentSettings, Receptionist, ReceptionistStatus};
pub use reconcile::{reconcile, PlanResolution, ReconcileOutcome, SubscriptionSnapshot};
pub use usage::{BillingPeriod, CallUsageEvent, UsageSnapshot, UsageTotals};
