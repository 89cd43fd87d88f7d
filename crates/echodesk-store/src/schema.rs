//! Database schema definitions.
//!
//! Table names shared by the migrations and the queries in
//! [`crate::postgres`]. The DDL itself lives in `migrations/`.

/// Table names for the PostgreSQL database.
pub mod table {
    /// Tenant accounts, keyed by `id`.
    pub const USERS: &str = "users";

    /// Receptionists, keyed by `id`, owned by a user.
    pub const RECEPTIONISTS: &str = "receptionists";

    /// Staff rows per receptionist.
    pub const STAFF: &str = "staff";

    /// Service rows per receptionist.
    pub const SERVICES: &str = "services";

    /// Location rows per receptionist.
    pub const LOCATIONS: &str = "locations";

    /// Promo rows per receptionist.
    pub const PROMOS: &str = "promos";

    /// Reminder and policy rows per receptionist.
    pub const REMINDER_RULES: &str = "reminder_rules";

    /// Completed calls, unique on `external_call_id`.
    pub const CALL_USAGE: &str = "call_usage";

    /// Aggregated usage, keyed by (`receptionist_id`, `period_start`).
    pub const USAGE_SNAPSHOTS: &str = "usage_snapshots";

    /// Invoice ledger, keyed by (`user_id`, `period_start`).
    pub const BILLING_INVOICES: &str = "billing_invoices";
}

/// Returns all table names in creation order.
#[must_use]
pub fn all_tables() -> Vec<&'static str> {
    vec![
        table::USERS,
        table::RECEPTIONISTS,
        table::STAFF,
        table::SERVICES,
        table::LOCATIONS,
        table::PROMOS,
        table::REMINDER_RULES,
        table::CALL_USAGE,
        table::USAGE_SNAPSHOTS,
        table::BILLING_INVOICES,
    ]
}

/// PostgreSQL `unique_violation` SQLSTATE.
pub const UNIQUE_VIOLATION: &str = "23505";
