//! A conversation turn: reply, present, speak.
//!
//! The companion glues the chat session to the voice orchestrator and to
//! whatever is showing Chad to the user. Audio and completion failures never
//! end the conversation: a failed completion shows Chad looking apathetic,
//! a failed utterance is simply silent.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::chat::{ChatSession, Reply};
use crate::error::{ChadError, Result};
use crate::mood::Mood;
use crate::voice::{RenderOutcome, SynthesisOrchestrator};

/// How long a mood stays on screen before Chad relaxes to neutral.
pub const MOOD_DISPLAY_WINDOW: Duration = Duration::from_secs(3);

/// Receives what Chad says and how he looks.
pub trait Presenter: Send + Sync {
    /// A reply is ready to show.
    fn show_reply(&self, reply: &Reply);

    /// Chad's expression changed.
    fn set_mood(&self, mood: Mood);

    /// A completion is in progress.
    fn set_busy(&self, _busy: bool) {}

    /// Audio for the last reply ended, one way or another.
    fn audio_finished(&self, _outcome: &RenderOutcome) {}
}

/// Result of one turn.
#[derive(Debug)]
pub enum Turn {
    /// Chad replied. `audio` is `None` when voice is disabled.
    Replied {
        reply: Reply,
        audio: Option<RenderOutcome>,
    },
    /// The completion failed; Chad shows `mood` and says nothing.
    Failed { error: ChadError, mood: Mood },
}

impl Turn {
    pub fn reply(&self) -> Option<&Reply> {
        match self {
            Self::Replied { reply, .. } => Some(reply),
            Self::Failed { .. } => None,
        }
    }
}

pub struct Companion {
    chat: ChatSession,
    voice: Option<Arc<SynthesisOrchestrator>>,
    presenter: Arc<dyn Presenter>,
    display_window: Duration,
    mood_reset: Mutex<Option<JoinHandle<()>>>,
}

impl Companion {
    pub fn new(
        chat: ChatSession,
        voice: Option<Arc<SynthesisOrchestrator>>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        Self {
            chat,
            voice,
            presenter,
            display_window: MOOD_DISPLAY_WINDOW,
            mood_reset: Mutex::new(None),
        }
    }

    pub fn with_display_window(mut self, window: Duration) -> Self {
        self.display_window = window;
        self
    }

    pub fn voice(&self) -> Option<&Arc<SynthesisOrchestrator>> {
        self.voice.as_ref()
    }

    /// Run one turn for `message`.
    ///
    /// # Errors
    ///
    /// Only [`ChadError::EmptyMessage`]; every other failure is reported
    /// through [`Turn::Failed`].
    pub async fn turn(&self, message: &str) -> Result<Turn> {
        if message.trim().is_empty() {
            return Err(ChadError::EmptyMessage);
        }

        self.presenter.set_busy(true);
        let result = self.chat.reply(message).await;
        self.presenter.set_busy(false);

        let reply = match result {
            Ok(reply) => reply,
            Err(error) => {
                warn!(error = %error, "completion failed");
                self.show_mood(Mood::Apathetic);
                return Ok(Turn::Failed {
                    error,
                    mood: Mood::Apathetic,
                });
            }
        };

        self.presenter.show_reply(&reply);
        self.show_mood(reply.mood);

        let audio = match &self.voice {
            Some(voice) => {
                let outcome = voice.speak(reply.response, reply.mood).await;
                self.presenter.audio_finished(&outcome);
                Some(outcome)
            }
            None => None,
        };

        Ok(Turn::Replied { reply, audio })
    }

    /// Silence Chad mid-utterance.
    pub fn stop(&self) {
        if let Some(voice) = &self.voice {
            voice.stop();
        }
    }

    /// Show `mood`, then relax to neutral after the display window.
    /// A newer mood cancels the pending reset.
    fn show_mood(&self, mood: Mood) {
        self.presenter.set_mood(mood);

        let presenter = Arc::clone(&self.presenter);
        let window = self.display_window;
        let reset = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            presenter.set_mood(Mood::Neutral);
        });

        let previous = self
            .mood_reset
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(reset);
        if let Some(handle) = previous {
            handle.abort();
        }
    }
}

impl Drop for Companion {
    fn drop(&mut self) {
        let pending = self
            .mood_reset
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = pending {
            handle.abort();
        }
    }
}
