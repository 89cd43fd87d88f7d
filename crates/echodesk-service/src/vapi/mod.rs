//! Vapi integration for the voice assistant.
//!
//! Vapi hosts:
//! - The assistant (model, voice, greeting, system prompt)
//! - Google Calendar tools the assistant calls
//! - Free phone numbers routed to an assistant
//! - End-of-call webhooks that feed usage

pub mod client;
pub mod types;

pub use client::VapiClient;
pub use client::VapiError;
pub use types::*;
