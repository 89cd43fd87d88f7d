//! Storage layer for EchoDesk.
//!
//! This crate persists tenants, receptionists, their business configuration,
//! call usage, usage snapshots and the invoice ledger.
//!
//! # Backends
//!
//! - [`PgStore`]: PostgreSQL via `sqlx`, with embedded migrations
//! - [`MemoryStore`]: in-process maps, for tests and local runs
//!
//! # Idempotency
//!
//! Three natural keys make retries safe:
//!
//! - `call_usage.external_call_id` is unique; a repeat insert returns
//!   [`StoreError::DuplicateEvent`]
//! - usage snapshots are upserted by (`receptionist_id`, `period_start`)
//! - the invoice ledger holds one row per (`user_id`, `period_start`),
//!   reserved before Stripe is called so a concurrent run sees it
//!
//! # Example
//!
//! ```no_run
//! use echodesk_store::{MemoryStore, Store};
//! use echodesk_core::UserId;
//!
//! # async fn run() -> echodesk_store::Result<()> {
//! let store = MemoryStore::new();
//! let user = store.ensure_user(&UserId::generate(), Some("owner@example.com")).await?;
//! assert!(store.get_user(&user.id).await?.is_some());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod postgres;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use echodesk_core::{
    BillingInvoiceRecord, BillingPeriod, CallUsageEvent, ConfigEntry, ConfigKind, EntryId,
    Receptionist, ReceptionistConfig, ReceptionistId, UsageSnapshot, User, UserId,
};

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (PostgreSQL, in-memory for testing).
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // User Operations
    // =========================================================================

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>>;

    /// Find a user by email, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Find a user by Stripe customer ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_user_by_customer(&self, customer_id: &str) -> Result<Option<User>>;

    /// Insert or update a user record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn put_user(&self, user: &User) -> Result<()>;

    /// Return the user, creating an empty account on first sight.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn ensure_user(&self, user_id: &UserId, email: Option<&str>) -> Result<User>;

    /// Users on the pay-as-you-go plan that have a Stripe customer.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_per_minute_users(&self) -> Result<Vec<User>>;

    /// Stamp `onboarding_completed_at` unless it is already set.
    ///
    /// Returns whether the stamp was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn mark_onboarding_complete(&self, user_id: &UserId, at: DateTime<Utc>) -> Result<bool>;

    // =========================================================================
    // Receptionist Operations
    // =========================================================================

    /// Insert a new receptionist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the ID is taken.
    async fn insert_receptionist(&self, receptionist: &Receptionist) -> Result<()>;

    /// Get a receptionist by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_receptionist(&self, id: &ReceptionistId) -> Result<Option<Receptionist>>;

    /// List a user's receptionists, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_receptionists(&self, user_id: &UserId) -> Result<Vec<Receptionist>>;

    /// IDs of every receptionist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_receptionist_ids(&self) -> Result<Vec<ReceptionistId>>;

    /// Replace a receptionist record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the receptionist doesn't exist.
    async fn update_receptionist(&self, receptionist: &Receptionist) -> Result<()>;

    /// Delete a receptionist with its configuration, calls and snapshots.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the receptionist doesn't exist.
    async fn delete_receptionist(&self, id: &ReceptionistId) -> Result<()>;

    /// Find the receptionist backed by a voice platform assistant.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_receptionist_by_assistant(&self, assistant_id: &str)
        -> Result<Option<Receptionist>>;

    /// Find the receptionist holding a voice platform phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_receptionist_by_vapi_phone(
        &self,
        phone_number_id: &str,
    ) -> Result<Option<Receptionist>>;

    /// Find the active receptionist answering `number`.
    ///
    /// Matches the Twilio number first, then the inbound number.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_active_receptionist_by_number(
        &self,
        number: &str,
    ) -> Result<Option<Receptionist>>;

    // =========================================================================
    // Configuration Operations
    // =========================================================================

    /// All configuration of a receptionist, each list in display order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_config(&self, receptionist_id: &ReceptionistId) -> Result<ReceptionistConfig>;

    /// Insert or replace a configuration row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn put_config_entry(&self, entry: &ConfigEntry) -> Result<()>;

    /// Get one configuration row scoped to its receptionist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_config_entry(
        &self,
        receptionist_id: &ReceptionistId,
        kind: ConfigKind,
        entry_id: &EntryId,
    ) -> Result<Option<ConfigEntry>>;

    /// Delete one configuration row scoped to its receptionist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the row doesn't exist.
    async fn delete_config_entry(
        &self,
        receptionist_id: &ReceptionistId,
        kind: ConfigKind,
        entry_id: &EntryId,
    ) -> Result<()>;

    // =========================================================================
    // Usage Operations
    // =========================================================================

    /// Record a completed call.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateEvent` if `external_call_id` was already recorded.
    async fn insert_call_usage(&self, event: &CallUsageEvent) -> Result<()>;

    /// Number of call rows recorded for a receptionist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn count_call_usage(&self, receptionist_id: &ReceptionistId) -> Result<u64>;

    /// Sum of call durations started within `period`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn sum_call_seconds(
        &self,
        receptionist_id: &ReceptionistId,
        period: &BillingPeriod,
    ) -> Result<i64>;

    /// Get the snapshot for a receptionist and period.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_usage_snapshot(
        &self,
        receptionist_id: &ReceptionistId,
        period_start: NaiveDate,
    ) -> Result<Option<UsageSnapshot>>;

    /// Insert or replace the snapshot for its (`receptionist_id`, `period_start`).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn put_usage_snapshot(&self, snapshot: &UsageSnapshot) -> Result<()>;

    /// Sum of `total_seconds` across a user's snapshots for a period.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn sum_user_snapshot_seconds(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
    ) -> Result<i64>;

    // =========================================================================
    // Invoice Ledger
    // =========================================================================

    /// Get the ledger row for a user and period.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_invoice_record(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
    ) -> Result<Option<BillingInvoiceRecord>>;

    /// Claim the ledger row for a user and period before billing.
    ///
    /// Returns `false` when a row already exists, finalized or in flight.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn reserve_invoice_record(&self, record: &BillingInvoiceRecord) -> Result<bool>;

    /// Record the finalized Stripe invoice on a reserved row.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no reservation exists and
    /// `StoreError::Conflict` if the row already holds an invoice.
    async fn complete_invoice_record(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
        stripe_invoice_id: &str,
    ) -> Result<()>;

    /// Drop a reservation that never reached a finalized invoice.
    ///
    /// Completed rows are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn release_invoice_record(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
    ) -> Result<()>;
}
