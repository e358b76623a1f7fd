//! Platform speech engine, the last resort of the chain.
//!
//! Lowest fidelity but needs no assets, credentials or network. The voice is
//! picked once, on first use, by name heuristic over the installed voices.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::error::truncate_detail;
use super::params::RenderParameters;
use super::{
    AudioFormat, AudioHandle, AudioSource, InFlight, PlaybackSettings, ProviderError,
    ProviderKind, RenderRequest, VoiceProvider,
};
use crate::config::SystemSpeechConfig;
use crate::mood::Mood;
use crate::response::Response;

/// A voice the engine reports as installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledVoice {
    /// Identifier passed back to the engine.
    pub id: String,
    /// Human-readable name, matched by the heuristics.
    pub name: String,
    /// BCP-47-ish language tag, e.g. `en-us`.
    pub language: String,
    pub male: bool,
}

impl InstalledVoice {
    fn is_english(&self) -> bool {
        self.language.to_ascii_lowercase().starts_with("en")
    }
}

/// Speech synthesis backend.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn voices(&self) -> Result<Vec<InstalledVoice>, ProviderError>;

    /// Synthesize `text` to an encoded WAV.
    async fn synthesize(
        &self,
        text: &str,
        voice: Option<&InstalledVoice>,
        params: &RenderParameters,
        cancel: &CancellationToken,
    ) -> Result<Bytes, ProviderError>;
}

/// Pick the installed voice closest to Chad.
///
/// Order: first `preferred` name fragment matching an English voice, then
/// any English male voice, then any English voice, then the first voice.
pub fn select_voice<'a>(
    voices: &'a [InstalledVoice],
    preferred: &[String],
) -> Option<&'a InstalledVoice> {
    for fragment in preferred {
        let fragment = fragment.to_lowercase();
        if let Some(v) = voices
            .iter()
            .find(|v| v.is_english() && v.name.to_lowercase().contains(&fragment))
        {
            return Some(v);
        }
    }
    voices
        .iter()
        .find(|v| v.is_english() && (v.male || v.name.to_lowercase().contains("male")))
        .or_else(|| voices.iter().find(|v| v.is_english()))
        .or_else(|| voices.first())
}

// ── espeak-ng ───────────────────────────────────────────────────────────

/// `espeak-ng` (or classic `espeak`) driven as a subprocess.
#[derive(Debug, Clone)]
pub struct EspeakEngine {
    program: PathBuf,
}

impl EspeakEngine {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    /// Use the configured binary, else `espeak-ng` or `espeak` from `PATH`.
    pub fn detect(config: &SystemSpeechConfig) -> Option<Self> {
        if let Some(program) = &config.engine {
            return which::which(program).ok().map(Self::new);
        }
        which::which("espeak-ng")
            .or_else(|_| which::which("espeak"))
            .ok()
            .map(Self::new)
    }

    fn args(text: &str, voice: Option<&InstalledVoice>, params: &RenderParameters) -> Vec<String> {
        let wpm = (175.0 * params.rate).round().clamp(80.0, 450.0) as i32;
        let pitch = (50.0 * params.pitch).round().clamp(0.0, 99.0) as i32;
        let amplitude = (100.0 * params.volume).round().clamp(0.0, 200.0) as i32;
        let mut args = Vec::with_capacity(10);
        if let Some(v) = voice {
            args.extend(["-v".to_owned(), v.id.clone()]);
        }
        args.extend([
            "-s".to_owned(),
            wpm.to_string(),
            "-p".to_owned(),
            pitch.to_string(),
            "-a".to_owned(),
            amplitude.to_string(),
            "--stdout".to_owned(),
            text.to_owned(),
        ]);
        args
    }
}

/// Parse `espeak-ng --voices` output.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  en-us           --/M      English_(America)  gmw/en-US            (en 10)
/// ```
pub fn parse_espeak_voices(listing: &str) -> Vec<InstalledVoice> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let _priority = cols.next()?;
            let language = cols.next()?;
            let age_gender = cols.next()?;
            let name = cols.next()?;
            Some(InstalledVoice {
                id: language.to_owned(),
                name: name.replace('_', " "),
                language: language.to_owned(),
                male: age_gender.ends_with('M'),
            })
        })
        .collect()
}

#[async_trait]
impl SpeechEngine for EspeakEngine {
    async fn voices(&self) -> Result<Vec<InstalledVoice>, ProviderError> {
        let output = Command::new(&self.program)
            .arg("--voices")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;
        if !output.status.success() {
            return Err(ProviderError::Process {
                code: output.status.code(),
                stderr: truncate_detail(&String::from_utf8_lossy(&output.stderr)),
            });
        }
        Ok(parse_espeak_voices(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn synthesize(
        &self,
        text: &str,
        voice: Option<&InstalledVoice>,
        params: &RenderParameters,
        cancel: &CancellationToken,
    ) -> Result<Bytes, ProviderError> {
        let mut command = Command::new(&self.program);
        command
            .args(Self::args(text, voice, params))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        debug!(command = ?command, "running speech engine");

        // Dropping the output future kills the child.
        let output = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ProviderError::Cancelled),
            output = command.output() => output?,
        };
        if !output.status.success() {
            return Err(ProviderError::Process {
                code: output.status.code(),
                stderr: truncate_detail(&String::from_utf8_lossy(&output.stderr)),
            });
        }
        if output.stdout.is_empty() {
            return Err(ProviderError::Process {
                code: output.status.code(),
                stderr: "no audio on stdout".to_owned(),
            });
        }
        Ok(Bytes::from(output.stdout))
    }
}

// ── Provider ────────────────────────────────────────────────────────────

pub struct SystemSpeechProvider {
    engine: Option<Arc<dyn SpeechEngine>>,
    preferred: Vec<String>,
    voice: OnceCell<Option<InstalledVoice>>,
    timeout: Duration,
    in_flight: InFlight,
}

impl SystemSpeechProvider {
    /// Provider over the detected platform engine. With no engine installed
    /// the provider stays in the chain but never succeeds.
    pub fn new(config: &SystemSpeechConfig) -> Self {
        let engine = EspeakEngine::detect(config).map(|e| Arc::new(e) as Arc<dyn SpeechEngine>);
        Self::with_engine(engine, config)
    }

    pub fn with_engine(engine: Option<Arc<dyn SpeechEngine>>, config: &SystemSpeechConfig) -> Self {
        Self {
            engine,
            preferred: config.preferred_voices.clone(),
            voice: OnceCell::new(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            in_flight: InFlight::default(),
        }
    }

    /// Voice for this render. A failed listing is not cached, so the next
    /// render asks the engine again.
    async fn voice(&self, engine: &dyn SpeechEngine) -> Option<InstalledVoice> {
        let preferred = &self.preferred;
        let chosen = self
            .voice
            .get_or_try_init(|| async move {
                let voices = engine.voices().await?;
                let chosen = select_voice(&voices, preferred).cloned();
                if let Some(v) = &chosen {
                    info!(voice = %v.name, language = %v.language, "selected system voice");
                }
                Ok::<_, ProviderError>(chosen)
            })
            .await;
        match chosen {
            Ok(voice) => voice.clone(),
            Err(e) => {
                debug!(error = %e, "voice listing failed, using engine default");
                None
            }
        }
    }
}

#[async_trait]
impl VoiceProvider for SystemSpeechProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::SystemSpeech
    }

    fn render_timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self, _response: Response, _mood: Mood) -> bool {
        self.engine.is_some()
    }

    async fn render(&self, request: &RenderRequest) -> Result<AudioHandle, ProviderError> {
        let engine = self
            .engine
            .as_deref()
            .ok_or_else(|| ProviderError::Unavailable("no speech engine installed".to_owned()))?;
        let token = self.in_flight.begin(&request.cancel);
        let voice = self.voice(engine).await;
        let data = engine
            .synthesize(request.text(), voice.as_ref(), &request.params, &token)
            .await?;
        Ok(AudioHandle {
            source: AudioSource::Encoded {
                data,
                format: AudioFormat::Wav,
            },
            // Rate, pitch and volume are applied by the engine.
            settings: PlaybackSettings::default(),
        })
    }

    fn stop(&self) {
        self.in_flight.cancel();
    }
}
