//! Twilio integration for self-provisioned numbers.
//!
//! Twilio handles:
//! - Buying and releasing local numbers
//! - Incoming calls, answered with TwiML that streams audio to the voice server
//! - Stream status callbacks that feed usage

pub mod client;
pub mod twiml;
pub mod types;

pub use client::TwilioClient;
pub use client::TwilioError;
pub use types::{IncomingNumber, StreamStatusWebhook, VoiceWebhook};
