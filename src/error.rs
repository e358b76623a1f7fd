//! Error types for the chadgpt companion.

use crate::voice::ProviderError;

/// Top-level error type for the chat companion.
///
/// Voice failures rarely surface here: the orchestrator folds them into a
/// [`crate::voice::RenderOutcome`] instead. Callers that need sound opt in
/// with [`crate::voice::RenderOutcome::require_audio`].
#[derive(Debug, thiserror::Error)]
pub enum ChadError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Completion service returned an error or an unreadable body.
    #[error("completion error: {0}")]
    Completion(String),

    /// The user message was empty after trimming.
    #[error("message is required")]
    EmptyMessage,

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Voice provider error.
    #[error("voice error: {0}")]
    Voice(#[from] ProviderError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ChadError>;
