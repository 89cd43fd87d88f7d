//! API handlers.

pub mod billing;
pub mod calendar;
pub mod config_entries;
pub mod cron;
pub mod health;
pub mod me;
pub mod prompt;
pub mod receptionists;
pub mod usage;
pub mod voice;
pub mod webhooks;

use serde::Serialize;

/// Acknowledgement returned by webhooks once the payload is understood.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Always `true`.
    pub received: bool,
}

impl WebhookResponse {
    /// The acknowledgement.
    #[must_use]
    pub const fn received() -> Self {
        Self { received: true }
    }
}
