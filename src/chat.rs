//! One request/reply exchange with Chad.

use std::sync::Arc;

use tracing::{debug, info};

use crate::completion::CompletionService;
use crate::constrain::ResponseConstrainer;
use crate::error::{ChadError, Result};
use crate::mood::Mood;
use crate::personality::build_prompt;
use crate::response::Response;

/// Chad's answer to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub response: Response,
    pub mood: Mood,
    /// Completion text before constraining.
    pub raw: String,
    /// The completion did not match and a fallback was used.
    pub substituted: bool,
}

/// Prompts the completion service and constrains what comes back.
pub struct ChatSession {
    completion: Arc<dyn CompletionService>,
    constrainer: ResponseConstrainer,
}

impl ChatSession {
    pub fn new(completion: Arc<dyn CompletionService>, constrainer: ResponseConstrainer) -> Self {
        Self {
            completion,
            constrainer,
        }
    }

    pub fn constrainer(&self) -> &ResponseConstrainer {
        &self.constrainer
    }

    /// Ask Chad about `message`.
    ///
    /// # Errors
    ///
    /// [`ChadError::EmptyMessage`] for a blank message, or whatever the
    /// completion service failed with.
    pub async fn reply(&self, message: &str) -> Result<Reply> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChadError::EmptyMessage);
        }

        let raw = self.completion.complete(&build_prompt(message)).await?;
        let constrained = self.constrainer.constrain(&raw);
        if constrained.substituted {
            info!(response = %constrained.response, "completion outside vocabulary, substituted");
        }
        debug!(raw = %raw.trim(), response = %constrained.response, mood = %constrained.mood, "reply");

        Ok(Reply {
            response: constrained.response,
            mood: constrained.mood,
            raw,
            substituted: constrained.substituted,
        })
    }
}
