//! Configuration types for the chat companion and its voice chain.
//!
//! Every section is `#[serde(default)]`, so a partial `config.toml` only needs
//! the keys it changes. Credentials may also come from the environment via
//! [`ChadConfig::apply_env_overrides`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::mood::Mood;
use crate::response::Response;
use crate::voice::ProviderKind;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChadConfig {
    /// Completion service settings.
    pub completion: CompletionConfig,
    /// Reply vocabulary enforcement.
    pub constraint: ConstraintConfig,
    /// Voice synthesis chain.
    pub voice: VoiceConfig,
}

// ── Completion ──────────────────────────────────────────────────────────

/// Completion service (Ollama `/api/generate`) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Base URL of the Ollama server.
    pub api_url: String,
    /// Model tag to request.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Top-p (nucleus) sampling threshold.
    pub top_p: f64,
    /// Maximum tokens to generate. Replies are one or two words.
    pub max_tokens: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:11434".to_owned(),
            model: "phi3:mini".to_owned(),
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 50,
            timeout_secs: 30,
        }
    }
}

// ── Constraint ──────────────────────────────────────────────────────────

/// What to say when the model's text is not in the vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Uniformly random member of the vocabulary.
    #[default]
    Random,
    /// Always the given reply.
    Fixed(Response),
}

/// Reply vocabulary enforcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintConfig {
    /// Cleaned text longer than this (in characters) is never matched.
    pub max_len: usize,
    /// Substitution policy on mismatch.
    pub fallback: FallbackPolicy,
}

impl Default for ConstraintConfig {
    fn default() -> Self {
        Self {
            max_len: 50,
            fallback: FallbackPolicy::Random,
        }
    }
}

// ── Voice ───────────────────────────────────────────────────────────────

/// Voice chain and orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Speak replies at all.
    pub enabled: bool,
    /// Providers in fallback priority order.
    pub chain: Vec<ProviderKind>,
    /// How long a failed provider is skipped before it is retried.
    pub cooldown_secs: u64,
    /// Consecutive render failures before a provider enters cooldown.
    pub failure_threshold: u32,
    /// Upper bound on a provider availability probe.
    pub probe_timeout_ms: u64,
    /// Upper bound on playing one rendered reply.
    pub playback_timeout_secs: u64,
    /// Symmetric jitter applied to rate, pitch and volume (0.05 = ±5%).
    pub jitter_magnitude: f32,
    /// Upper bound on the random pre-playback delay.
    pub max_delay_ms: u64,
    pub clips: ClipConfig,
    pub local_neural: LocalNeuralConfig,
    pub elevenlabs: ElevenLabsConfig,
    pub jammable: JammableConfig,
    pub system_speech: SystemSpeechConfig,
    pub player: PlayerConfig,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chain: ProviderKind::DEFAULT_CHAIN.to_vec(),
            cooldown_secs: 30,
            failure_threshold: 1,
            probe_timeout_ms: 1_500,
            playback_timeout_secs: 30,
            jitter_magnitude: 0.05,
            max_delay_ms: 100,
            clips: ClipConfig::default(),
            local_neural: LocalNeuralConfig::default(),
            elevenlabs: ElevenLabsConfig::default(),
            jammable: JammableConfig::default(),
            system_speech: SystemSpeechConfig::default(),
            player: PlayerConfig::default(),
        }
    }
}

/// A recorded clip tagged with the reply and mood it voices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipEntry {
    pub response: Response,
    #[serde(default)]
    pub mood: Mood,
    /// File name relative to [`ClipConfig::dir`].
    pub file: String,
}

/// Recorded clip provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipConfig {
    /// Directory holding the clip files.
    pub dir: PathBuf,
    /// Extra mood-tagged clips. Each reply's default asset is always
    /// catalogued as its neutral clip.
    pub entries: Vec<ClipEntry>,
    pub timeout_secs: u64,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            dir: crate::app_dirs::clips_dir(),
            entries: Vec::new(),
            timeout_secs: 5,
        }
    }
}

/// Local neural voice model run as a Python subprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalNeuralConfig {
    /// Python interpreter name or path.
    pub python: String,
    /// Model directory. Must contain `config.json` to be considered present.
    pub model_dir: PathBuf,
    /// Speaker preset passed to the model.
    pub history_prompt: String,
    /// Parent for the per-request scratch directory. System temp when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for LocalNeuralConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_owned(),
            model_dir: crate::app_dirs::neural_model_dir(),
            history_prompt: "v2/en_speaker_9".to_owned(),
            scratch_dir: None,
            timeout_secs: 60,
        }
    }
}

/// ElevenLabs voice clone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevenLabsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub voice_id: String,
    pub model_id: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            voice_id: "EXAVITQu4vr4xnSDxMaL".to_owned(),
            model_id: "eleven_multilingual_v2".to_owned(),
            base_url: "https://api.elevenlabs.io".to_owned(),
            timeout_secs: 15,
        }
    }
}

/// Jammable voice clone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JammableConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub voice_id: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for JammableConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            voice_id: "pete-davidson".to_owned(),
            base_url: "https://api.jammable.com".to_owned(),
            timeout_secs: 15,
        }
    }
}

/// System speech engine (`espeak-ng`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSpeechConfig {
    /// Engine binary. Searched on `PATH` (`espeak-ng`, then `espeak`) when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<PathBuf>,
    /// Voice name fragments tried in order before the generic heuristics.
    pub preferred_voices: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for SystemSpeechConfig {
    fn default() -> Self {
        Self {
            engine: None,
            preferred_voices: [
                "alex",
                "daniel",
                "david",
                "mark",
                "tom",
                "fred",
                "ralph",
                "google us english male",
                "microsoft david",
                "microsoft mark",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
            timeout_secs: 10,
        }
    }
}

/// Audio output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Player binary. Searched on `PATH` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<PathBuf>,
}

// ── Loading ─────────────────────────────────────────────────────────────

impl ChadConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::ChadError::Config(e.to_string()))
    }

    /// Load from `path` when it exists, defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_or_default(path: &std::path::Path) -> crate::error::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ChadError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `config_dir()/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::app_dirs::config_dir().join("config.toml")
    }

    /// Fill credentials and endpoints from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Override source is injectable so tests need not touch the process env.
    pub(crate) fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("OLLAMA_HOST") {
            self.completion.api_url = if host.starts_with("http") {
                host
            } else {
                format!("http://{host}")
            };
        }
        if let Some(key) = get("ELEVENLABS_API_KEY") {
            self.voice.elevenlabs.api_key = Some(key);
        }
        if let Some(id) = get("ELEVENLABS_VOICE_ID") {
            self.voice.elevenlabs.voice_id = id;
        }
        if let Some(key) = get("JAMMABLE_API_KEY") {
            self.voice.jammable.api_key = Some(key);
        }
        if let Some(id) = get("JAMMABLE_VOICE_ID") {
            self.voice.jammable.voice_id = id;
        }
    }
}
