//! Voice provider failure reasons.

use std::time::Duration;

/// Why a provider could not render or play a reply.
///
/// The orchestrator treats every variant except [`ProviderError::Cancelled`]
/// the same way: the provider failed and the chain moves on.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Provider is not configured or its assets are missing.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// No result within the provider's time budget.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Cloud API answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Synthesis subprocess exited unsuccessfully.
    #[error("process exited with {code:?}: {stderr}")]
    Process { code: Option<i32>, stderr: String },

    /// Transport-level failure (connect, TLS, body read).
    #[error("request failed: {0}")]
    Request(String),

    /// Audio output failed.
    #[error("playback failed: {0}")]
    Playback(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Superseded or explicitly stopped. Not a failure.
    #[error("cancelled")]
    Cancelled,
}

impl ProviderError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Request(format!("timeout: {e}"))
        } else if e.is_connect() {
            Self::Request(format!("connect: {e}"))
        } else {
            Self::Request(e.to_string())
        }
    }
}

/// Truncate diagnostic text (response bodies, stderr) for logs and errors.
pub(crate) fn truncate_detail(text: &str) -> String {
    text.trim().chars().take(500).collect()
}
