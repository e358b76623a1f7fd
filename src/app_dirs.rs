//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Data (clips, models) | `~/Library/Application Support/chadgpt/` | `~/.local/share/chadgpt/` |
//! | Config | `~/Library/Application Support/chadgpt/` | `~/.config/chadgpt/` |
//!
//! # Environment Overrides
//!
//! - `CHADGPT_DATA_DIR` overrides [`data_dir`]
//! - `CHADGPT_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root: recorded clips and local voice models.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("CHADGPT_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("chadgpt"))
        .unwrap_or_else(|| PathBuf::from("/tmp/chadgpt-data"))
}

/// Application config directory, holding `config.toml`.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("CHADGPT_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("chadgpt"))
        .unwrap_or_else(|| PathBuf::from("/tmp/chadgpt-config"))
}

/// Recorded reply clips: `data_dir()/clips/`.
#[must_use]
pub fn clips_dir() -> PathBuf {
    data_dir().join("clips")
}

/// Local neural voice model: `data_dir()/models/pete_davidson_bark/`.
#[must_use]
pub fn neural_model_dir() -> PathBuf {
    data_dir().join("models").join("pete_davidson_bark")
}
