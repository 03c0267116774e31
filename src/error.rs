//! Error types shared by the relay components.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors produced while fetching, notifying or persisting.
///
/// None of these are fatal to the relay: the engine logs them and carries on
/// with the next article or the next cycle.
#[derive(Debug, Error)]
pub enum RelayError {
    /// HTTP transport failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Feed server answered with a non-success status
    #[error("feed returned HTTP {0}")]
    FeedStatus(StatusCode),

    /// Feed body could not be parsed
    #[error("failed to parse feed: {0}")]
    Parse(#[from] feed_rs::parser::ParseFeedError),

    /// Webhook answered with a non-success status
    #[error("webhook returned HTTP {status}: {body}")]
    WebhookStatus { status: StatusCode, body: String },

    /// Storage read or write failed
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
