//! EchoDesk HTTP API Service.
//!
//! This crate provides the HTTP API behind the AI receptionist product:
//!
//! - Receptionist provisioning on the voice platform, with compensation
//! - Business configuration and prompt assembly
//! - Call usage ingestion from Vapi and Twilio webhooks
//! - Subscription state from Stripe, by webhook and on checkout return
//! - Monthly pay-as-you-go invoicing
//!
//! # Authentication
//!
//! The service accepts three kinds of callers:
//!
//! 1. **Hosted auth provider JWTs** - For end-user requests (dashboard, onboarding)
//! 2. **Shared secrets** - For the scheduler (`CRON_SECRET`) and the voice server
//! 3. **Webhook signatures** - For Stripe, Vapi and Twilio callbacks

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers need async for the router

pub mod auth;
pub mod billing;
pub mod config;
pub mod crypto;
pub mod error;
pub mod google;
pub mod handlers;
pub mod ownership;
pub mod platform;
pub mod provisioning;
pub mod routes;
pub mod state;
pub mod stripe;
pub mod twilio;
pub mod usage;
pub mod vapi;
pub mod website;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use google::{GoogleClient, GoogleError};
pub use platform::{BillingPlatform, CalendarOAuth, TelephonyPlatform, VoicePlatform};
pub use provisioning::{Provisioner, ProvisionError};
pub use routes::create_router;
pub use state::AppState;
pub use stripe::{StripeClient, StripeError};
pub use twilio::{TwilioClient, TwilioError};
pub use usage::UsageAggregator;
pub use vapi::{VapiClient, VapiError};
