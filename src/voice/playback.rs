//! Audio output.
//!
//! The orchestrator owns one [`AudioSink`] and routes every rendered reply
//! through it. The default sink, [`CommandPlayer`], shells out to whichever
//! command-line player is installed.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{AudioFormat, AudioHandle, AudioSource, InFlight, ProviderError};
use crate::config::PlayerConfig;

/// Plays rendered audio.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play `handle` to completion, or until `cancel` fires.
    async fn play(&self, handle: AudioHandle, cancel: &CancellationToken)
    -> Result<(), ProviderError>;

    /// Cut off whatever is playing. Idempotent.
    fn stop(&self);
}

/// Supported command-line players.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerKind {
    /// ffmpeg's player: any format, rate and volume via filters.
    Ffplay,
    /// macOS: any format, rate and volume flags.
    Afplay,
    /// PulseAudio: WAV only, volume flag.
    Paplay,
    /// ALSA: WAV only.
    Aplay,
}

impl PlayerKind {
    /// Discovery order.
    const SEARCH: [(&'static str, PlayerKind); 4] = [
        ("ffplay", PlayerKind::Ffplay),
        ("afplay", PlayerKind::Afplay),
        ("paplay", PlayerKind::Paplay),
        ("aplay", PlayerKind::Aplay),
    ];

    fn from_program(path: &Path) -> Option<Self> {
        let name = path.file_stem()?.to_str()?;
        Self::SEARCH
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, kind)| *kind)
    }

    fn decodes(self, format: AudioFormat) -> bool {
        match self {
            Self::Ffplay | Self::Afplay => true,
            Self::Paplay | Self::Aplay => format == AudioFormat::Wav,
        }
    }
}

/// Plays audio by spawning a player process per utterance.
#[derive(Debug)]
pub struct CommandPlayer {
    program: PathBuf,
    kind: PlayerKind,
    in_flight: InFlight,
}

impl CommandPlayer {
    pub fn new(program: PathBuf, kind: PlayerKind) -> Self {
        Self {
            program,
            kind,
            in_flight: InFlight::default(),
        }
    }

    /// Use the configured player, or the first known player on `PATH`.
    pub fn detect(config: &PlayerConfig) -> Option<Self> {
        if let Some(program) = &config.command {
            let kind = PlayerKind::from_program(program)?;
            let program = which::which(program).ok()?;
            return Some(Self::new(program, kind));
        }
        PlayerKind::SEARCH.iter().find_map(|(name, kind)| {
            which::which(name)
                .ok()
                .map(|program| Self::new(program, *kind))
        })
    }

    pub fn kind(&self) -> PlayerKind {
        self.kind
    }

    fn args(&self, file: &Path, rate: f32, volume: f32) -> Vec<String> {
        let file = file.to_string_lossy().into_owned();
        match self.kind {
            PlayerKind::Ffplay => vec![
                "-nodisp".into(),
                "-autoexit".into(),
                "-loglevel".into(),
                "quiet".into(),
                "-af".into(),
                format!("atempo={:.3},volume={:.3}", rate.clamp(0.5, 2.0), volume),
                file,
            ],
            PlayerKind::Afplay => vec![
                "-r".into(),
                format!("{rate:.3}"),
                "-v".into(),
                format!("{volume:.3}"),
                file,
            ],
            PlayerKind::Paplay => {
                let pa_volume = (volume.clamp(0.0, 1.0) * 65_536.0).round() as u32;
                vec![format!("--volume={pa_volume}"), file]
            }
            PlayerKind::Aplay => vec!["-q".into(), file],
        }
    }
}

#[async_trait]
impl AudioSink for CommandPlayer {
    async fn play(
        &self,
        handle: AudioHandle,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        // Scratch file for in-memory payloads; removed when dropped.
        let mut scratch = None;
        let (path, format) = match &handle.source {
            AudioSource::File(path) => (
                path.clone(),
                AudioFormat::from_path(path).unwrap_or(AudioFormat::Mp3),
            ),
            AudioSource::Encoded { data, format } => {
                let file = tempfile::Builder::new()
                    .prefix("chadgpt-")
                    .suffix(&format!(".{}", format.extension()))
                    .tempfile()?;
                tokio::fs::write(file.path(), data).await?;
                let path = file.path().to_path_buf();
                scratch = Some(file);
                (path, *format)
            }
        };

        if !self.kind.decodes(format) {
            return Err(ProviderError::Playback(format!(
                "{:?} cannot play {}",
                self.kind,
                format.extension()
            )));
        }

        let args = self.args(&path, handle.settings.rate, handle.settings.volume);
        debug!(player = ?self.kind, file = %path.display(), "starting playback");
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let token = self.in_flight.begin(cancel);
        let result = tokio::select! {
            biased;
            () = token.cancelled() => {
                let _ = child.kill().await;
                Err(ProviderError::Cancelled)
            }
            status = child.wait() => match status? {
                s if s.success() => Ok(()),
                s => Err(ProviderError::Playback(format!("player exited with {s}"))),
            },
        };
        drop(scratch);
        result
    }

    fn stop(&self) {
        self.in_flight.cancel();
    }
}
