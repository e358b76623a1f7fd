//! Voice synthesis: providers, parameter mapping and the fallback orchestrator.
//!
//! A reply reaches the speaker through the first provider in the chain that
//! can voice it:
//!
//! 1. [`clips::PrerecordedClipProvider`] plays a recorded clip.
//! 2. [`local_neural::LocalNeuralProvider`] runs a local neural model.
//! 3. [`cloud::CloudCloneProvider`] calls a cloud voice clone (two vendors).
//! 4. [`system_speech::SystemSpeechProvider`] uses the platform speech engine.
//!
//! Providers only render. Audio output goes through the orchestrator-owned
//! [`playback::AudioSink`], and availability bookkeeping lives in
//! [`breaker::ProviderState`], which providers never see.

pub mod breaker;
pub mod clips;
pub mod cloud;
pub mod error;
pub mod local_neural;
pub mod orchestrator;
pub mod params;
pub mod playback;
pub mod system_speech;
pub mod variation;

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::mood::Mood;
use crate::response::Response;

pub use breaker::{CircuitState, ProviderState};
pub use error::ProviderError;
pub use orchestrator::{
    FailureStage, OrchestratorState, ProviderFailure, RenderOutcome, SynthesisOrchestrator,
};
pub use params::{ProviderFamily, RenderParameters, Tuning, params_for};
pub use playback::AudioSink;
pub use variation::NaturalVariationInjector;

/// Identifies a provider in the chain and in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Clips,
    LocalNeural,
    #[serde(rename = "elevenlabs")]
    ElevenLabs,
    Jammable,
    SystemSpeech,
}

impl ProviderKind {
    /// Highest fidelity first.
    pub const DEFAULT_CHAIN: [ProviderKind; 5] = [
        ProviderKind::Clips,
        ProviderKind::LocalNeural,
        ProviderKind::ElevenLabs,
        ProviderKind::Jammable,
        ProviderKind::SystemSpeech,
    ];

    pub fn family(self) -> ProviderFamily {
        match self {
            Self::Clips => ProviderFamily::Clip,
            Self::LocalNeural => ProviderFamily::LocalNeural,
            Self::ElevenLabs | Self::Jammable => ProviderFamily::Cloud,
            Self::SystemSpeech => ProviderFamily::SystemSpeech,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clips => "clips",
            Self::LocalNeural => "local_neural",
            Self::ElevenLabs => "elevenlabs",
            Self::Jammable => "jammable",
            Self::SystemSpeech => "system_speech",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One utterance, created by the orchestrator and handed to a provider.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub id: Uuid,
    pub response: Response,
    pub mood: Mood,
    /// Mood-mapped, jittered and clamped for the provider's family.
    pub params: RenderParameters,
    /// Cancelled when the utterance is superseded or stopped.
    pub cancel: CancellationToken,
}

impl RenderRequest {
    /// Text to voice.
    pub fn text(&self) -> &'static str {
        self.response.text()
    }
}

/// Encoded audio container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }

    /// Guess from a file extension.
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "mp3" => Some(Self::Mp3),
            "wav" => Some(Self::Wav),
            _ => None,
        }
    }
}

/// Where the rendered audio lives.
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// A file the provider does not own (recorded clips).
    File(PathBuf),
    /// An in-memory payload (synthesized audio).
    Encoded { data: Bytes, format: AudioFormat },
}

/// Output-side adjustments applied by the sink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSettings {
    /// Playback speed multiplier.
    pub rate: f32,
    /// Linear gain, `0.0..=1.0`.
    pub volume: f32,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            rate: 1.0,
            volume: 1.0,
        }
    }
}

/// Rendered audio, ready for the sink.
#[derive(Debug, Clone)]
pub struct AudioHandle {
    pub source: AudioSource,
    pub settings: PlaybackSettings,
}

/// A mechanism that turns a reply into playable audio.
#[async_trait]
pub trait VoiceProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Upper bound on one [`VoiceProvider::render`] call.
    fn render_timeout(&self) -> Duration;

    /// Cheap check that this provider can voice `response` right now.
    ///
    /// The orchestrator bounds the call with a short timeout.
    async fn probe(&self, response: Response, mood: Mood) -> bool;

    /// Render the reply. Must return promptly once `request.cancel` fires and
    /// release any scratch files or child processes on every exit path.
    async fn render(&self, request: &RenderRequest) -> Result<AudioHandle, ProviderError>;

    /// Abort any in-flight render. Idempotent.
    fn stop(&self);
}

/// Tracks the cancellation token of a provider's in-flight work so that
/// [`VoiceProvider::stop`] can reach it.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    current: Mutex<Option<CancellationToken>>,
}

impl InFlight {
    /// Start tracking work tied to `parent`. The returned token fires when
    /// either `parent` is cancelled or [`InFlight::cancel`] is called.
    pub(crate) fn begin(&self, parent: &CancellationToken) -> CancellationToken {
        let token = parent.child_token();
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());
        token
    }

    pub(crate) fn cancel(&self) {
        if let Some(token) = self
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            token.cancel();
        }
    }
}
