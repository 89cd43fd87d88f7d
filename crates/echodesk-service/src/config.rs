//! Service configuration.

use serde::Deserialize;
use std::path::Path;

use echodesk_core::{PlanCatalog, PlanId};

/// Default IANA time zone for calendar tools.
pub const DEFAULT_CALENDAR_TIMEZONE: &str = "America/New_York";

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// PostgreSQL connection string. The in-memory store is used when unset.
    pub database_url: Option<String>,

    /// Connection pool size (default: 10).
    pub database_max_connections: u32,

    /// HS256 secret of the hosted auth provider's JWTs. Also keys OAuth state.
    pub auth_jwt_secret: String,

    /// Expected JWT audience (default: "authenticated").
    pub auth_audience: String,

    /// Frontend URL for checkout and OAuth redirects.
    pub app_url: String,

    /// Public URL of this service, used for webhook and OAuth callbacks.
    pub public_url: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Bearer token required by the cron endpoints, when set.
    pub cron_secret: Option<String>,

    /// `x-voice-server-key` required by the voice prompt endpoint, when set.
    pub voice_server_api_key: Option<String>,

    /// WebSocket URL of the self-hosted voice server (Twilio Media Streams).
    pub voice_server_ws_url: Option<String>,

    /// Stripe secret key (optional).
    pub stripe_api_key: Option<String>,

    /// Stripe webhook signing secret (optional).
    pub stripe_webhook_secret: Option<String>,

    /// Stripe price ID per plan.
    pub stripe_prices: Vec<(PlanId, String)>,

    /// Single-price deployments: this price is treated as Starter.
    pub stripe_legacy_price_id: Option<String>,

    /// Vapi private API key (optional).
    pub vapi_api_key: Option<String>,

    /// `x-vapi-secret` expected on voice platform webhooks, when set.
    pub vapi_webhook_secret: Option<String>,

    /// Time zone of the calendar tools.
    pub vapi_calendar_timezone: String,

    /// Twilio account SID (optional).
    pub twilio_account_sid: Option<String>,

    /// Twilio auth token (optional). Also validates Twilio webhooks.
    pub twilio_auth_token: Option<String>,

    /// Public base URL Twilio calls back into.
    pub twilio_webhook_base_url: Option<String>,

    /// Google OAuth client ID (optional).
    pub google_client_id: Option<String>,

    /// Google OAuth client secret (optional).
    pub google_client_secret: Option<String>,

    /// Google OAuth redirect URI (default: `{public_url}/oauth/google/callback`).
    pub google_redirect_uri: Option<String>,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    api_key: String,
    #[serde(default)]
    webhook_secret: Option<String>,
}

/// Vapi secrets file structure.
#[derive(Debug, Deserialize)]
struct VapiSecrets {
    api_key: String,
    #[serde(default)]
    webhook_secret: Option<String>,
}

/// Twilio secrets file structure.
#[derive(Debug, Deserialize)]
struct TwilioSecrets {
    account_sid: String,
    auth_token: String,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let (stripe_api_key, stripe_webhook_secret) = load_stripe_secrets();
        let (vapi_api_key, vapi_webhook_secret) = load_vapi_secrets();
        let (twilio_account_sid, twilio_auth_token) = load_twilio_secrets();

        let stripe_prices = PlanId::ALL
            .into_iter()
            .filter_map(|plan| env_opt(plan.env_key()).map(|price| (plan, price)))
            .collect();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            database_url: env_opt("DATABASE_URL"),
            database_max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            auth_jwt_secret: std::env::var("AUTH_JWT_SECRET").unwrap_or_default(),
            auth_audience: std::env::var("AUTH_AUDIENCE")
                .unwrap_or_else(|_| "authenticated".into()),
            app_url: std::env::var("APP_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into())
                .trim_end_matches('/')
                .to_string(),
            public_url: std::env::var("PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into())
                .trim_end_matches('/')
                .to_string(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: std::env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            cron_secret: env_opt("CRON_SECRET"),
            voice_server_api_key: env_opt("VOICE_SERVER_API_KEY"),
            voice_server_ws_url: env_opt("VOICE_SERVER_WS_URL"),
            stripe_api_key,
            stripe_webhook_secret,
            stripe_prices,
            stripe_legacy_price_id: env_opt("STRIPE_PRICE_ID"),
            vapi_api_key,
            vapi_webhook_secret,
            vapi_calendar_timezone: env_opt("VAPI_CALENDAR_TIMEZONE")
                .unwrap_or_else(|| DEFAULT_CALENDAR_TIMEZONE.into()),
            twilio_account_sid,
            twilio_auth_token,
            twilio_webhook_base_url: env_opt("TWILIO_WEBHOOK_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string()),
            google_client_id: env_opt("GOOGLE_CLIENT_ID"),
            google_client_secret: env_opt("GOOGLE_CLIENT_SECRET"),
            google_redirect_uri: env_opt("GOOGLE_REDIRECT_URI"),
        }
    }

    /// Build the price-to-plan table.
    #[must_use]
    pub fn plan_catalog(&self) -> PlanCatalog {
        PlanCatalog::new(
            self.stripe_prices.iter().cloned(),
            self.stripe_legacy_price_id.clone(),
        )
    }

    /// Callback URL registered on assistants.
    #[must_use]
    pub fn vapi_webhook_url(&self) -> String {
        format!("{}/webhooks/vapi", self.public_url)
    }

    /// Google OAuth redirect URI.
    #[must_use]
    pub fn google_redirect(&self) -> String {
        self.google_redirect_uri
            .clone()
            .unwrap_or_else(|| format!("{}/oauth/google/callback", self.public_url))
    }

    /// Where Twilio posts incoming calls.
    #[must_use]
    pub fn twilio_voice_url(&self) -> Option<String> {
        self.twilio_webhook_base_url
            .as_ref()
            .map(|base| format!("{base}/webhooks/twilio/voice"))
    }

    /// Where Twilio posts stream status events.
    #[must_use]
    pub fn twilio_status_url(&self) -> Option<String> {
        self.twilio_webhook_base_url
            .as_ref()
            .map(|base| format!("{base}/webhooks/twilio/status"))
    }
}

/// Read a non-empty environment variable.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Load Stripe secrets from file or environment.
fn load_stripe_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/stripe.json",
        "echodesk/.secrets/stripe.json",
        "../.secrets/stripe.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<StripeSecrets>(path) {
            tracing::info!(path = %path, "Loaded Stripe secrets from file");
            return (Some(secrets.api_key), secrets.webhook_secret);
        }
    }

    tracing::debug!("Stripe secrets file not found, using environment variables");
    (env_opt("STRIPE_SECRET_KEY"), env_opt("STRIPE_WEBHOOK_SECRET"))
}

/// Load Vapi secrets from file or environment.
fn load_vapi_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/vapi.json",
        "echodesk/.secrets/vapi.json",
        "../.secrets/vapi.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<VapiSecrets>(path) {
            tracing::info!(path = %path, "Loaded Vapi secrets from file");
            return (Some(secrets.api_key), secrets.webhook_secret);
        }
    }

    tracing::debug!("Vapi secrets file not found, using environment variables");
    (env_opt("VAPI_API_KEY"), env_opt("VAPI_WEBHOOK_SECRET"))
}

/// Load Twilio secrets from file or environment.
fn load_twilio_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/twilio.json",
        "echodesk/.secrets/twilio.json",
        "../.secrets/twilio.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<TwilioSecrets>(path) {
            tracing::info!(path = %path, "Loaded Twilio secrets from file");
            return (Some(secrets.account_sid), Some(secrets.auth_token));
        }
    }

    tracing::debug!("Twilio secrets file not found, using environment variables");
    (env_opt("TWILIO_ACCOUNT_SID"), env_opt("TWILIO_AUTH_TOKEN"))
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            database_url: None,
            database_max_connections: 10,
            auth_jwt_secret: String::new(),
            auth_audience: "authenticated".into(),
            app_url: "http://localhost:3000".into(),
            public_url: "http://localhost:8080".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            cron_secret: None,
            voice_server_api_key: None,
            voice_server_ws_url: None,
            stripe_api_key: None,
            stripe_webhook_secret: None,
            stripe_prices: Vec::new(),
            stripe_legacy_price_id: None,
            vapi_api_key: None,
            vapi_webhook_secret: None,
            vapi_calendar_timezone: DEFAULT_CALENDAR_TIMEZONE.into(),
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_webhook_base_url: None,
            google_client_id: None,
            google_client_secret: None,
            google_redirect_uri: None,
        }
    }
}
