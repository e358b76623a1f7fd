//! Local neural voice model, driven as a Python subprocess.
//!
//! Each render gets a private scratch directory holding the generated
//! script, the subprocess's stderr log and the output WAV. The directory is
//! a [`tempfile::TempDir`], so it is removed on success, failure, timeout and
//! cancellation alike. The reply text travels as JSON on stdin and is never
//! spliced into the script source.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use super::error::truncate_detail;
use super::params::Tuning;
use super::{
    AudioFormat, AudioHandle, AudioSource, InFlight, PlaybackSettings, ProviderError,
    ProviderKind, RenderRequest, VoiceProvider,
};
use crate::config::LocalNeuralConfig;
use crate::mood::Mood;
use crate::response::Response;

/// Bark synthesis script. Reads a JSON job from stdin, writes a WAV to argv[1].
const BARK_SCRIPT: &str = r#"import json
import sys

import soundfile as sf
from bark import SAMPLE_RATE, generate_audio

job = json.load(sys.stdin)
audio = generate_audio(
    job["text"],
    history_prompt=job["history_prompt"],
    text_temp=job["text_temp"],
    waveform_temp=job["waveform_temp"],
)
sf.write(sys.argv[1], audio, SAMPLE_RATE)
"#;

/// Default sampling temperature when the parameters carry none.
const DEFAULT_TEMPERATURE: f32 = 0.7;

pub struct LocalNeuralProvider {
    python: String,
    model_dir: PathBuf,
    history_prompt: String,
    scratch_dir: Option<PathBuf>,
    script: String,
    timeout: Duration,
    in_flight: InFlight,
}

impl LocalNeuralProvider {
    pub fn new(config: &LocalNeuralConfig) -> Self {
        Self {
            python: config.python.clone(),
            model_dir: config.model_dir.clone(),
            history_prompt: config.history_prompt.clone(),
            scratch_dir: config.scratch_dir.clone(),
            script: BARK_SCRIPT.to_owned(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            in_flight: InFlight::default(),
        }
    }

    /// Replace the synthesis script. The interpreter receives the script
    /// path and the output path as arguments.
    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = script.into();
        self
    }

    fn scratch(&self) -> std::io::Result<tempfile::TempDir> {
        let builder = {
            let mut b = tempfile::Builder::new();
            b.prefix("chadgpt-neural-");
            b
        };
        match &self.scratch_dir {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
    }

    fn model_present(&self) -> bool {
        self.model_dir.join("config.json").is_file()
    }

    async fn read_stderr(path: &Path) -> String {
        tokio::fs::read_to_string(path)
            .await
            .map(|s| truncate_detail(&s))
            .unwrap_or_default()
    }
}

#[async_trait]
impl VoiceProvider for LocalNeuralProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::LocalNeural
    }

    fn render_timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self, _response: Response, _mood: Mood) -> bool {
        self.model_present() && which::which(&self.python).is_ok()
    }

    async fn render(&self, request: &RenderRequest) -> Result<AudioHandle, ProviderError> {
        if !self.model_present() {
            return Err(ProviderError::Unavailable(format!(
                "no model at {}",
                self.model_dir.display()
            )));
        }

        let scratch = self.scratch()?;
        let script_path = scratch.path().join("synthesize.py");
        let output_path = scratch.path().join("speech.wav");
        let stderr_path = scratch.path().join("stderr.log");
        tokio::fs::write(&script_path, &self.script).await?;

        let temperature = match request.params.tuning {
            Tuning::Neural { temperature } => temperature,
            _ => DEFAULT_TEMPERATURE,
        };
        let job = serde_json::json!({
            "text": request.text(),
            "history_prompt": self.history_prompt,
            "text_temp": temperature,
            "waveform_temp": temperature,
        });

        let token = self.in_flight.begin(&request.cancel);
        let mut child = Command::new(&self.python)
            .arg(&script_path)
            .arg(&output_path)
            .current_dir(&self.model_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(std::fs::File::create(&stderr_path)?)
            .kill_on_drop(true)
            .spawn()?;
        debug!(request_id = %request.id, python = %self.python, "neural synthesis started");

        if let Some(mut stdin) = child.stdin.take() {
            let payload = job.to_string();
            // A script that exits without reading stdin surfaces through its
            // exit status below.
            let _ = stdin.write_all(payload.as_bytes()).await;
        }

        let status = tokio::select! {
            biased;
            () = token.cancelled() => {
                let _ = child.kill().await;
                return Err(ProviderError::Cancelled);
            }
            status = child.wait() => status?,
        };

        if !status.success() {
            return Err(ProviderError::Process {
                code: status.code(),
                stderr: Self::read_stderr(&stderr_path).await,
            });
        }

        let data = tokio::fs::read(&output_path).await.map_err(|e| {
            ProviderError::Process {
                code: status.code(),
                stderr: format!("no audio written: {e}"),
            }
        })?;
        if data.is_empty() {
            return Err(ProviderError::Process {
                code: status.code(),
                stderr: "empty audio file".to_owned(),
            });
        }

        info!(request_id = %request.id, bytes = data.len(), "neural synthesis finished");
        Ok(AudioHandle {
            source: AudioSource::Encoded {
                data: Bytes::from(data),
                format: AudioFormat::Wav,
            },
            settings: PlaybackSettings {
                rate: 1.0,
                volume: request.params.volume,
            },
        })
    }

    fn stop(&self) {
        self.in_flight.cancel();
    }
}
