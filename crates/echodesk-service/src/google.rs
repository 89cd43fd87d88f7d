//! Google OAuth client for calendar connection.
//!
//! Only the authorization-code flow is used: we need a refresh token (so the
//! consent screen is always shown) and the account email, which doubles as
//! the calendar ID.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::platform::CalendarOAuth;

/// Timeout applied to every Google request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Scopes requested on the consent screen.
pub const SCOPES: [&str; 4] = [
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/calendar.events",
    "email",
    "profile",
];

/// Google API errors.
#[derive(Debug, thiserror::Error)]
pub enum GoogleError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Google returned an error.
    #[error("Google API error ({status}): {message}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Error description.
        message: String,
    },

    /// Failed to parse response.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Client configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Tokens returned by the code exchange.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenGrant {
    /// Short-lived access token.
    pub access_token: String,
    /// Refresh token; only sent on first consent or with `prompt=consent`.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Google endpoints; overridable for tests.
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    /// Consent screen.
    pub auth_url: String,
    /// Code exchange.
    pub token_url: String,
    /// Profile lookup.
    pub userinfo_url: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".into(),
            token_url: "https://oauth2.googleapis.com/token".into(),
            userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".into(),
        }
    }
}

/// Google OAuth client.
#[derive(Debug, Clone)]
pub struct GoogleClient {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    endpoints: GoogleEndpoints,
}

impl GoogleClient {
    /// Create a client for Google's production endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are empty or the HTTP client can't be built.
    pub fn new(
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
    ) -> Result<Self, GoogleError> {
        Self::with_endpoints(
            client_id,
            client_secret,
            redirect_uri,
            GoogleEndpoints::default(),
        )
    }

    /// Create a client against other endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are empty or the HTTP client can't be built.
    pub fn with_endpoints(
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
        endpoints: GoogleEndpoints,
    ) -> Result<Self, GoogleError> {
        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            return Err(GoogleError::Configuration(
                "client ID and secret are required".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            endpoints,
        })
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, GoogleError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<OAuthErrorBody>().await {
            Ok(body) => body.error_description.unwrap_or(body.error),
            Err(_) => format!("HTTP {status}"),
        };
        Err(GoogleError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl CalendarOAuth for GoogleClient {
    fn authorization_url(&self, state: &str) -> Result<String, GoogleError> {
        let mut url = reqwest::Url::parse(&self.endpoints.auth_url)
            .map_err(|e| GoogleError::Configuration(format!("invalid auth URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state);
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, GoogleError> {
        tracing::debug!("Exchanging Google authorization code");
        let response = self
            .client
            .post(&self.endpoints.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        let body = Self::check(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch_email(&self, access_token: &str) -> Result<Option<String>, GoogleError> {
        let response = self
            .client
            .get(&self.endpoints.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let body = Self::check(response).await?.text().await?;
        let info: UserInfo = serde_json::from_str(&body)?;
        Ok(info.email.filter(|e| !e.is_empty()))
    }
}
