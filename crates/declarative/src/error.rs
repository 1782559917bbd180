//! Error types for action execution

use crate::types::Verb;
use thiserror::Error;

/// Result type for action operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while talking to the remote system
#[derive(Debug, Error)]
pub enum Error {
    /// The transport could not complete the request
    #[error("transport error on {url}: {message}")]
    Transport { url: String, message: String },

    /// The remote answered with an unexpected status
    #[error("{verb} {url} returned HTTP {status}{}", .detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    Status {
        verb: Verb,
        url: String,
        status: u16,
        detail: Option<String>,
    },

    /// A server restart did not complete
    #[error("server restart did not complete: {0}")]
    Restart(String),

    /// A replayed request had no scripted response
    #[error("no scripted response for {verb} {url}")]
    Unscripted { verb: Verb, url: String },

    /// An action list could not be (de)serialized
    #[error("invalid action record: {0}")]
    Record(#[from] serde_json::Error),
}

impl Error {
    /// Create a transport error
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
