//! Recorded clip provider.
//!
//! Genuine recordings beat any synthesis, so this provider heads the chain.
//! Every reply has a default clip (its [`Response::default_asset`]) tagged
//! neutral; config may add extra clips tagged with other moods. Selection
//! prefers clips tagged with the request's mood and falls back to the neutral
//! ones, picking at random among the matches.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;

use super::{
    AudioHandle, AudioSource, PlaybackSettings, ProviderError, ProviderKind, RenderRequest,
    VoiceProvider,
};
use crate::config::{ClipConfig, ClipEntry};
use crate::mood::Mood;
use crate::response::Response;

pub struct PrerecordedClipProvider {
    dir: PathBuf,
    catalog: Vec<ClipEntry>,
    timeout: Duration,
}

impl PrerecordedClipProvider {
    pub fn new(config: &ClipConfig) -> Self {
        let mut catalog: Vec<ClipEntry> = Response::ALL
            .into_iter()
            .map(|response| ClipEntry {
                response,
                mood: Mood::Neutral,
                file: response.default_asset().to_owned(),
            })
            .collect();
        for entry in &config.entries {
            if !catalog.contains(entry) {
                catalog.push(entry.clone());
            }
        }
        Self {
            dir: config.dir.clone(),
            catalog,
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }

    /// Existing clip files for `response` tagged `mood`, falling back to the
    /// neutral-tagged ones.
    async fn candidates(&self, response: Response, mood: Mood) -> Vec<PathBuf> {
        let tagged = self.existing(response, mood).await;
        if !tagged.is_empty() || mood == Mood::Neutral {
            return tagged;
        }
        self.existing(response, Mood::Neutral).await
    }

    async fn existing(&self, response: Response, mood: Mood) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for entry in self
            .catalog
            .iter()
            .filter(|e| e.response == response && e.mood == mood)
        {
            let path = self.dir.join(&entry.file);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                found.push(path);
            }
        }
        found
    }
}

#[async_trait]
impl VoiceProvider for PrerecordedClipProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Clips
    }

    fn render_timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self, response: Response, mood: Mood) -> bool {
        !self.candidates(response, mood).await.is_empty()
    }

    async fn render(&self, request: &RenderRequest) -> Result<AudioHandle, ProviderError> {
        if request.cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        let candidates = self.candidates(request.response, request.mood).await;
        let path = candidates
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| {
                ProviderError::Unavailable(format!("no clip for {:?}", request.response.text()))
            })?;

        // Clip pitch is realised as a playback-speed multiplier.
        let bounds = request.params.family.bounds();
        let rate = (request.params.rate * request.params.pitch)
            .clamp(*bounds.rate.start(), *bounds.rate.end());

        tracing::debug!(clip = %path.display(), rate, "selected clip");
        Ok(AudioHandle {
            source: AudioSource::File(path),
            settings: PlaybackSettings {
                rate,
                volume: request.params.volume,
            },
        })
    }

    fn stop(&self) {
        // Rendering is a lookup; playback is stopped through the sink.
    }
}
