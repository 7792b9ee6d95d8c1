//! Shared HTTP plumbing for provider clients

use crate::error::BackendError;
use reqwest::{StatusCode, Url};
use std::time::Duration;

/// Longest response body excerpt carried in an error message (in chars)
const MAX_ERROR_BODY: usize = 500;

/// Resolved connection settings for one provider
///
/// The `reqwest::Client` is shared by every capability the dispatcher hands
/// out, so all calls draw from one connection pool while each call still
/// sends its own request.
#[derive(Clone)]
pub struct Connection {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) timeout: Duration,
}

impl Connection {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build `base_url/segment/...`, percent-encoding each segment
    pub(crate) fn url(&self, provider: &str, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            BackendError::Other(format!(
                "{} base_url '{}' is invalid: {}",
                provider, self.base_url, e
            ))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                BackendError::Other(format!(
                    "{} base_url '{}' cannot carry a path",
                    provider, self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// POST a JSON body and decode a JSON response
    ///
    /// HTTP 429 maps to `Throttled`; other non-success statuses map to
    /// `Http` with a body excerpt so the keyword classifier can still spot
    /// throttling reported under another status.
    pub(crate) async fn post_json(
        &self,
        provider: &str,
        request: reqwest::RequestBuilder,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, BackendError> {
        let response = request
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Transport {
                provider: provider.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Transport {
                provider: provider.to_string(),
                message: format!("failed to read response body: {}", e),
            })?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(BackendError::Throttled {
                provider: provider.to_string(),
                message: excerpt(&text),
            });
        }
        if !status.is_success() {
            return Err(BackendError::Http {
                provider: provider.to_string(),
                status: status.as_u16(),
                message: excerpt(&text),
            });
        }

        serde_json::from_str(&text).map_err(|e| BackendError::InvalidResponse {
            provider: provider.to_string(),
            message: format!("response body is not JSON: {}", e),
        })
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn excerpt(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY {
        body.to_string()
    } else {
        let head: String = body.chars().take(MAX_ERROR_BODY).collect();
        format!("{}...", head)
    }
}
