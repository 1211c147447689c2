use serde::Serialize;

use crate::error::FetchError;

const GENERIC_MESSAGE: &str = "An unexpected error occurred while loading the dashboard";

/// Inline error panel shown in place of a screen whose data failed to load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPanel {
    pub title: String,
    pub message: String,
    pub status: Option<u16>,
    /// Seconds to wait, shown only for rate limits.
    pub retry_after: Option<u64>,
    /// Offer a "Try Again" action. Rate limits retry on their own instead.
    pub can_retry: bool,
}

impl From<&FetchError> for ErrorPanel {
    fn from(error: &FetchError) -> Self {
        let rate_limited = error.is_rate_limited();
        let message = error.to_string();
        Self {
            title: if rate_limited {
                "Rate Limit Exceeded".to_string()
            } else {
                "Something went wrong".to_string()
            },
            message: if message.trim().is_empty() {
                GENERIC_MESSAGE.to_string()
            } else {
                message
            },
            status: error.status(),
            retry_after: match error {
                FetchError::RateLimited { retry_after, .. } => *retry_after,
                _ => None,
            },
            can_retry: !rate_limited,
        }
    }
}
