//! HTTP nutrition sources for the calorie logger.
//!
//! - [`FdcClient`]: USDA FoodData Central free-text search
//! - [`OffClient`]: Open Food Facts product lookup by barcode
//!
//! Both implement the collaborator traits from `cal-core` and map every
//! failure onto [`LookupError`], which the session treats as recoverable.

use std::time::Duration;

use cal_core::LookupError;
use serde::Deserialize;
use thiserror::Error;

mod fdc;
mod off;

pub use fdc::{DEFAULT_SEARCH_URL, FdcClient};
pub use off::{DEFAULT_PRODUCT_URL, OffClient, ProductResult};

/// Default request timeout for API calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// API client errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The provided API key was invalid.
    #[error("invalid API key: {reason}")]
    InvalidApiKey { reason: &'static str },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed. The URL is stripped, since it may carry the API key.
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
    /// API returned an error response.
    #[error("API error: {message}")]
    Api { message: String },
    /// Failed to parse response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.without_url())
    }
}

impl From<ApiError> for LookupError {
    fn from(err: ApiError) -> Self {
        Self::Failed {
            message: err.to_string(),
        }
    }
}

fn build_http(timeout: Duration) -> Result<reqwest::Client, ApiError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("cal/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ApiError::ClientBuild)
}

/// Sends a request and returns the body of a successful response.
async fn get_text(request: reqwest::RequestBuilder) -> Result<String, ApiError> {
    read_body(request.send().await?).await
}

async fn read_body(response: reqwest::Response) -> Result<String, ApiError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(parse_api_error(&body).unwrap_or_else(|| ApiError::Api {
            message: format!("status {status}: {}", truncate(&body, 200)),
        }));
    }
    Ok(body)
}

fn parse_api_error(body: &str) -> Option<ApiError> {
    #[derive(Deserialize)]
    struct ErrorPayload {
        error: ErrorDetails,
    }

    #[derive(Deserialize)]
    struct ErrorDetails {
        message: String,
    }

    serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .map(|payload| ApiError::Api {
            message: payload.error.message,
        })
}

fn truncate(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(idx, _)| &text[..idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_api_error_reads_message() {
        let err = parse_api_error(r#"{"error":{"code":"API_KEY_INVALID","message":"An invalid api_key was supplied"}}"#)
            .unwrap();
        assert_eq!(err.to_string(), "API error: An invalid api_key was supplied");
    }

    #[test]
    fn parse_api_error_ignores_other_bodies() {
        assert!(parse_api_error("<html>502</html>").is_none());
    }

    #[test]
    fn api_error_maps_to_recoverable_lookup_error() {
        let err = LookupError::from(ApiError::InvalidResponse("missing foods".to_string()));
        assert_eq!(
            err,
            LookupError::Failed {
                message: "invalid response: missing foods".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn request_error_does_not_expose_api_key() {
        // Nothing listens on the discard port.
        let client = FdcClient::new("secret-key", "http://127.0.0.1:9/fdc", DEFAULT_TIMEOUT).unwrap();
        let err = client.search_foods("apple").await.unwrap_err();
        assert!(matches!(err, ApiError::Request(_)));

        let message = LookupError::from(err).to_string();
        assert!(!message.contains("secret-key"), "key leaked: {message}");
        assert!(!message.contains("api_key"), "query leaked: {message}");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("crème brûlée", 4), "crèm");
        assert_eq!(truncate("short", 10), "short");
    }
}
