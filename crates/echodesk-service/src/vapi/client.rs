//! Vapi API client.
//!
//! JSON in both directions, bearer-token authentication.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::types::{
    Assistant, AssistantPromptUpdate, AssistantRequest, ModelConfig, PhoneNumber,
    PhoneNumberAttach, PhoneNumberRequest, Tool, ToolRequest,
};
use crate::platform::VoicePlatform;

/// Timeout applied to every Vapi request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Vapi API errors.
#[derive(Debug, thiserror::Error)]
pub enum VapiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Vapi API returned an error.
    #[error("Vapi API error ({status}): {message}")]
    Api {
        /// HTTP status.
        status: u16,
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

impl VapiError {
    /// Whether the account ran out of free phone numbers.
    #[must_use]
    pub fn is_number_limit(&self) -> bool {
        match self {
            Self::Api { message, .. } => message.to_lowercase().contains("limit"),
            _ => false,
        }
    }
}

/// Vapi API client.
#[derive(Debug, Clone)]
pub struct VapiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl VapiClient {
    /// Production API base URL.
    pub const BASE_URL: &'static str = "https://api.vapi.ai";

    /// Create a client for the production API.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty or the HTTP client can't be built.
    pub fn new(api_key: &str) -> Result<Self, VapiError> {
        Self::with_base_url(api_key, Self::BASE_URL)
    }

    /// Create a client against another base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty or the HTTP client can't be built.
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self, VapiError> {
        if api_key.trim().is_empty() {
            return Err(VapiError::Configuration("API key is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<T, VapiError> {
        tracing::debug!(method = %method, path = %path, "Vapi request");
        let response = self
            .client
            .request(method, self.url(path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let body = Self::check(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, VapiError> {
        tracing::debug!(path = %path, "Vapi GET");
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let body = Self::check(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn delete(&self, path: &str) -> Result<(), VapiError> {
        tracing::debug!(path = %path, "Vapi DELETE");
        let response = self
            .client
            .delete(self.url(path))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    /// Pass successful responses through, turn the rest into [`VapiError::Api`].
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, VapiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(VapiError::Api {
            status: status.as_u16(),
            message: error_message(&text).unwrap_or_else(|| format!("HTTP {status}")),
        })
    }
}

/// Extract `message` from an error body; Vapi sends a string or a list of strings.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("message")? {
        serde_json::Value::String(message) => Some(message.clone()),
        serde_json::Value::Array(items) => Some(
            items
                .iter()
                .filter_map(serde_json::Value::as_str)
                .collect::<Vec<_>>()
                .join("; "),
        ),
        _ => None,
    }
}

#[async_trait]
impl VoicePlatform for VapiClient {
    async fn create_tool(&self, request: &ToolRequest) -> Result<Tool, VapiError> {
        self.send_json(reqwest::Method::POST, "/tool", request).await
    }

    async fn delete_tool(&self, tool_id: &str) -> Result<(), VapiError> {
        self.delete(&format!("/tool/{tool_id}")).await
    }

    async fn create_assistant(&self, request: &AssistantRequest) -> Result<Assistant, VapiError> {
        self.send_json(reqwest::Method::POST, "/assistant", request)
            .await
    }

    async fn update_assistant_prompt(
        &self,
        assistant_id: &str,
        prompt: &str,
    ) -> Result<(), VapiError> {
        let update = AssistantPromptUpdate {
            model: ModelConfig::with_prompt(prompt, Vec::new()),
        };
        let _: serde_json::Value = self
            .send_json(
                reqwest::Method::PATCH,
                &format!("/assistant/{assistant_id}"),
                &update,
            )
            .await?;
        Ok(())
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<(), VapiError> {
        self.delete(&format!("/assistant/{assistant_id}")).await
    }

    async fn create_phone_number(&self, area_code: Option<&str>) -> Result<PhoneNumber, VapiError> {
        let request = PhoneNumberRequest {
            provider: "vapi".into(),
            area_code: area_code.map(str::to_string),
        };
        self.send_json(reqwest::Method::POST, "/phone-number", &request)
            .await
    }

    async fn get_phone_number(&self, phone_number_id: &str) -> Result<PhoneNumber, VapiError> {
        self.get(&format!("/phone-number/{phone_number_id}")).await
    }

    async fn attach_phone_number(
        &self,
        phone_number_id: &str,
        assistant_id: &str,
    ) -> Result<(), VapiError> {
        let attach = PhoneNumberAttach {
            assistant_id: assistant_id.to_string(),
        };
        let _: serde_json::Value = self
            .send_json(
                reqwest::Method::PATCH,
                &format!("/phone-number/{phone_number_id}"),
                &attach,
            )
            .await?;
        Ok(())
    }

    async fn delete_phone_number(&self, phone_number_id: &str) -> Result<(), VapiError> {
        self.delete(&format!("/phone-number/{phone_number_id}"))
            .await
    }
}
