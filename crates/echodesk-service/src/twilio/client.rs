//! Twilio REST client.
//!
//! Form-encoded requests, JSON responses, account SID and auth token as
//! basic-auth credentials.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use super::types::{AvailableNumbers, CallResource, IncomingNumber, TwilioErrorBody};
use crate::platform::TelephonyPlatform;

/// Timeout applied to every Twilio request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Twilio API errors.
#[derive(Debug, thiserror::Error)]
pub enum TwilioError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Twilio API returned an error.
    #[error("Twilio API error ({status}): {message}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Twilio error code.
        code: Option<i64>,
        /// Error message.
        message: String,
    },

    /// Failed to parse response.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Client configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Twilio REST client.
#[derive(Debug, Clone)]
pub struct TwilioClient {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    base_url: String,
}

impl TwilioClient {
    /// Production API base URL.
    pub const BASE_URL: &'static str = "https://api.twilio.com/2010-04-01";

    /// Create a client for the production API.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are empty or the HTTP client can't be built.
    pub fn new(account_sid: &str, auth_token: &str) -> Result<Self, TwilioError> {
        Self::with_base_url(account_sid, auth_token, Self::BASE_URL)
    }

    /// Create a client against another base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are empty or the HTTP client can't be built.
    pub fn with_base_url(
        account_sid: &str,
        auth_token: &str,
        base_url: &str,
    ) -> Result<Self, TwilioError> {
        if account_sid.trim().is_empty() || auth_token.trim().is_empty() {
            return Err(TwilioError::Configuration(
                "account SID and auth token are required".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn account_url(&self, path: &str) -> String {
        format!("{}/Accounts/{}{path}", self.base_url, self.account_sid)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, TwilioError> {
        tracing::debug!(path = %path, "Twilio GET");
        let response = self
            .client
            .get(self.account_url(path))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .query(query)
            .send()
            .await?;

        let body = Self::check(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, TwilioError> {
        tracing::debug!(path = %path, "Twilio POST");
        let response = self
            .client
            .post(self.account_url(path))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(params)
            .send()
            .await?;

        let body = Self::check(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, TwilioError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: Option<TwilioErrorBody> = response.json().await.ok();
        Err(match body {
            Some(body) => TwilioError::Api {
                status: status.as_u16(),
                code: body.code,
                message: body.message,
            },
            None => TwilioError::Api {
                status: status.as_u16(),
                code: None,
                message: format!("HTTP {status}"),
            },
        })
    }
}

#[async_trait]
impl TelephonyPlatform for TwilioClient {
    async fn search_local_number(&self, area_code: &str) -> Result<Option<String>, TwilioError> {
        let found: AvailableNumbers = self
            .get(
                "/AvailablePhoneNumbers/US/Local.json",
                &[("AreaCode", area_code), ("PageSize", "1")],
            )
            .await?;
        Ok(found
            .available_phone_numbers
            .into_iter()
            .next()
            .map(|n| n.phone_number))
    }

    async fn purchase_number(
        &self,
        phone_number: &str,
        voice_url: &str,
    ) -> Result<IncomingNumber, TwilioError> {
        self.post_form(
            "/IncomingPhoneNumbers.json",
            &[
                ("PhoneNumber", phone_number),
                ("VoiceUrl", voice_url),
                ("VoiceMethod", "POST"),
            ],
        )
        .await
    }

    async fn release_number(&self, number_sid: &str) -> Result<(), TwilioError> {
        let path = format!("/IncomingPhoneNumbers/{number_sid}.json");
        tracing::debug!(path = %path, "Twilio DELETE");
        let response = self
            .client
            .delete(self.account_url(&path))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn fetch_call_started_at(
        &self,
        call_sid: &str,
    ) -> Result<Option<DateTime<Utc>>, TwilioError> {
        let call: CallResource = self.get(&format!("/Calls/{call_sid}.json"), &[]).await?;
        Ok(call.started_at())
    }
}
