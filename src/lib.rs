//! ChadGPT: a chat companion with a six-word vocabulary and a voice.
//!
//! A turn runs:
//! message → completion service → response constrainer → {response, mood}
//! → synthesis orchestrator → first capable voice provider → speaker
//!
//! # Architecture
//!
//! - **Completion**: an opaque prompt-in, text-out service (Ollama by default)
//! - **Constrainer**: cleans the completion and closes it over the
//!   [`Response`] vocabulary, deriving a [`Mood`]
//! - **Voice**: a fixed-priority provider chain (pre-recorded clips, local
//!   neural model, two cloud voice clones, system speech) with per-provider
//!   cooldown, mood-driven parameters and single-flight cancellation
//! - **Companion**: glues the above to a presenter and keeps the
//!   conversation going through completion and audio failures

pub mod app_dirs;
pub mod chat;
pub mod companion;
pub mod completion;
pub mod config;
pub mod constrain;
pub mod error;
pub mod eval;
pub mod mood;
pub mod personality;
pub mod response;
pub mod voice;

pub use chat::{ChatSession, Reply};
pub use companion::{Companion, Presenter, Turn};
pub use config::ChadConfig;
pub use error::{ChadError, Result};
pub use mood::Mood;
pub use response::Response;
pub use voice::{RenderOutcome, SynthesisOrchestrator};
