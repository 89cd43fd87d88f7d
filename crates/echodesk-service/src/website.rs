//! Business website import.
//!
//! Fetches a page and reduces it to plain text for the prompt.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::error::ApiError;

/// Maximum characters kept from a page.
pub const MAX_CONTENT_CHARS: usize = 15_000;

/// Appended when a page was cut short.
pub const TRUNCATION_SUFFIX: &str = "\n\n[Content truncated for length.]";

/// Per-request timeout of website fetches.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = "Mozilla/5.0 (compatible; AIReceptionist/1.0; +https://example.com)";

/// Website import errors.
#[derive(Debug, thiserror::Error)]
pub enum WebsiteError {
    /// Blank input.
    #[error("Please enter a website URL.")]
    MissingUrl,

    /// Not a URL.
    #[error("Invalid URL.")]
    InvalidUrl,

    /// Not http or https.
    #[error("URL must be http or https.")]
    UnsupportedScheme,

    /// The site answered with an error status.
    #[error("Could not fetch: {0}")]
    Status(reqwest::StatusCode),

    /// The site did not answer in time.
    #[error("Request timed out.")]
    Timeout,

    /// Any other transport failure.
    #[error("Could not fetch website: {0}")]
    Http(#[source] reqwest::Error),

    /// Nothing but markup.
    #[error("No text content could be extracted from the page.")]
    Empty,
}

impl From<WebsiteError> for ApiError {
    fn from(err: WebsiteError) -> Self {
        match err {
            WebsiteError::MissingUrl
            | WebsiteError::InvalidUrl
            | WebsiteError::UnsupportedScheme
            | WebsiteError::Empty => Self::BadRequest(err.to_string()),
            WebsiteError::Status(_) | WebsiteError::Timeout | WebsiteError::Http(_) => {
                tracing::warn!(error = %err, "Website fetch failed");
                Self::ExternalService(err.to_string())
            }
        }
    }
}

/// Validate a user-supplied website URL.
///
/// # Errors
///
/// Returns an error for blank input, unparseable URLs and non-HTTP schemes.
pub fn parse_url(raw: &str) -> Result<reqwest::Url, WebsiteError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(WebsiteError::MissingUrl);
    }
    let url = reqwest::Url::parse(trimmed).map_err(|_| WebsiteError::InvalidUrl)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(WebsiteError::UnsupportedScheme),
    }
}

/// Fetch `url` and return its visible text.
///
/// # Errors
///
/// Returns an error when the request fails, the status is not a success,
/// or no text remains after stripping markup.
pub async fn fetch_website_text(
    client: &reqwest::Client,
    url: &reqwest::Url,
) -> Result<String, WebsiteError> {
    tracing::debug!(url = %url, "Fetching website");
    let response = client
        .get(url.clone())
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .map_err(classify)?;

    let status = response.status();
    if !status.is_success() {
        return Err(WebsiteError::Status(status));
    }

    let html = response.text().await.map_err(classify)?;
    let text = html_to_text(&html);
    if text.is_empty() {
        return Err(WebsiteError::Empty);
    }
    Ok(text)
}

fn classify(err: reqwest::Error) -> WebsiteError {
    if err.is_timeout() {
        WebsiteError::Timeout
    } else {
        WebsiteError::Http(err)
    }
}

struct Patterns {
    blocks: [Regex; 3],
    tags: Regex,
    whitespace: Regex,
}

// Literal patterns; compilation cannot fail.
fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        blocks: [
            Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("script pattern"),
            Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("style pattern"),
            Regex::new(r"(?is)<head[^>]*>.*?</head>").expect("head pattern"),
        ],
        tags: Regex::new(r"<[^>]+>").expect("tag pattern"),
        whitespace: Regex::new(r"\s+").expect("whitespace pattern"),
    })
}

/// Strip markup, decode common entities, collapse whitespace and cap length.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let patterns = patterns();
    let mut text = html.to_string();
    for block in &patterns.blocks {
        text = block.replace_all(&text, "").into_owned();
    }
    let text = patterns.tags.replace_all(&text, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    let text = patterns.whitespace.replace_all(&text, " ");
    let text = text.trim();

    if text.chars().count() > MAX_CONTENT_CHARS {
        let mut cut: String = text.chars().take(MAX_CONTENT_CHARS).collect();
        cut.push_str(TRUNCATION_SUFFIX);
        cut
    } else {
        text.to_string()
    }
}
