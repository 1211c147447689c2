use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{FetchError, FetchResult};

pub const DEFAULT_BASE_URL: &str = "https://mixo-fe-backend-task.vercel.app";

/// Builds the resource keys (absolute URLs) for every remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl Endpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn campaigns(&self) -> String {
        format!("{}/campaigns", self.base_url)
    }

    pub fn campaign(&self, id: &str) -> String {
        format!("{}/campaigns/{}", self.base_url, id)
    }

    pub fn overview_insights(&self) -> String {
        format!("{}/campaigns/insights", self.base_url)
    }

    pub fn campaign_insights(&self, id: &str) -> String {
        format!("{}/campaigns/{}/insights", self.base_url, id)
    }

    pub fn insights_stream(&self, id: &str) -> String {
        format!("{}/campaigns/{}/insights/stream", self.base_url, id)
    }
}

/// Request/response JSON source behind the snapshot store.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn get_json(&self, url: &str) -> FetchResult<Value>;
}

/// `reqwest`-backed snapshot source.
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(request_timeout: Duration) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SnapshotSource for HttpSource {
    async fn get_json(&self, url: &str) -> FetchResult<Value> {
        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_response(
                status.as_u16(),
                status.canonical_reason(),
                &body,
                retry_after,
            ));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<u16>,
    error: Option<String>,
    retry_after: Option<u64>,
}

/// Classify a non-2xx response.
///
/// A JSON body contributes `message`, `status`, `error` and `retry_after`.
/// Anything else falls back to "Failed to fetch: {status} {reason}".
pub fn error_from_response(
    status: u16,
    reason: Option<&str>,
    body: &str,
    retry_after_header: Option<u64>,
) -> FetchError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => {
            let status = parsed.status.unwrap_or(status);
            let message = parsed
                .message
                .unwrap_or_else(|| "Failed to fetch".to_string());
            let rate_limited =
                status == 429 || parsed.error.as_deref() == Some("Too Many Requests");
            if rate_limited {
                FetchError::RateLimited {
                    message,
                    retry_after: parsed.retry_after.or(retry_after_header),
                }
            } else {
                FetchError::Http { status, message }
            }
        }
        Err(_) => {
            let message = format!("Failed to fetch: {} {}", status, reason.unwrap_or(""))
                .trim_end()
                .to_string();
            if status == 429 {
                FetchError::RateLimited {
                    message,
                    retry_after: retry_after_header,
                }
            } else {
                FetchError::Http { status, message }
            }
        }
    }
}
