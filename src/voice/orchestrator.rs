//! Fallback chain across voice providers.
//!
//! ```text
//! Idle ─speak─▶ Rendering(i) ─ok─▶ Playing ─done─▶ Idle
//!                   │  ▲
//!                   └──┘ failure: Rendering(i + 1)
//! any ─stop / newer speak─▶ Idle (active provider's stop() invoked)
//! ```
//!
//! At most one utterance is in flight per orchestrator. A newer
//! [`SynthesisOrchestrator::speak`] cancels the older one; there is no queue.
//!
//! Providers that fail to render are put in cooldown by their
//! [`ProviderState`] and skipped until it expires. Audio is best effort:
//! `speak` never errors, it resolves to a [`RenderOutcome`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::breaker::ProviderState;
use super::clips::PrerecordedClipProvider;
use super::cloud::{CloudCloneProvider, ElevenLabs, Jammable};
use super::local_neural::LocalNeuralProvider;
use super::params::params_for;
use super::playback::AudioSink;
use super::system_speech::SystemSpeechProvider;
use super::variation::NaturalVariationInjector;
use super::{ProviderError, ProviderKind, RenderRequest, VoiceProvider};
use crate::config::VoiceConfig;
use crate::mood::Mood;
use crate::response::Response;

/// Where in the chain a provider dropped out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Skipped without an attempt: still cooling down.
    Cooldown,
    /// Availability probe said no or timed out.
    Probe,
    /// Render failed or timed out. The provider was demoted.
    Render,
    /// Rendered audio could not be played.
    Playback,
}

/// One provider's contribution to a failed or partially failed utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub provider: ProviderKind,
    pub stage: FailureStage,
    pub detail: String,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:?}): {}", self.provider, self.stage, self.detail)
    }
}

/// How an utterance ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Audio played to completion.
    Played {
        request_id: Uuid,
        provider: ProviderKind,
        /// Providers tried before the one that played.
        skipped: Vec<ProviderFailure>,
    },
    /// Every provider failed or was cooling down. The conversation goes on
    /// without sound.
    NoAudio {
        request_id: Uuid,
        failures: Vec<ProviderFailure>,
    },
    /// Superseded by a newer utterance or stopped.
    Cancelled { request_id: Uuid },
}

impl RenderOutcome {
    pub fn request_id(&self) -> Uuid {
        match self {
            Self::Played { request_id, .. }
            | Self::NoAudio { request_id, .. }
            | Self::Cancelled { request_id } => *request_id,
        }
    }

    pub fn played_by(&self) -> Option<ProviderKind> {
        match self {
            Self::Played { provider, .. } => Some(*provider),
            _ => None,
        }
    }

    /// For callers that need sound: an exhausted chain becomes an error
    /// listing every provider's failure.
    pub fn require_audio(self) -> crate::error::Result<Self> {
        match self {
            Self::NoAudio { failures, .. } => {
                let detail = failures
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                let reason = format!("no voice provider could speak: {detail}");
                Err(ProviderError::Unavailable(reason).into())
            }
            other => Ok(other),
        }
    }
}

/// Observable orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Rendering(ProviderKind),
    Playing(ProviderKind),
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Selecting,
    Rendering(usize),
    Playing(usize),
}

/// The single in-flight utterance.
struct Active {
    id: Uuid,
    cancel: CancellationToken,
    phase: Phase,
}

impl Active {
    fn provider_index(&self) -> Option<usize> {
        match self.phase {
            Phase::Selecting => None,
            Phase::Rendering(i) | Phase::Playing(i) => Some(i),
        }
    }
}

/// Retires a request when `speak` returns or its future is dropped.
struct RequestGuard<'a> {
    orchestrator: &'a SynthesisOrchestrator,
    id: Uuid,
    cancel: CancellationToken,
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.orchestrator.finish(self.id);
    }
}

/// Orchestrates the provider chain and owns the audio sink.
pub struct SynthesisOrchestrator {
    providers: Vec<Arc<dyn VoiceProvider>>,
    states: Mutex<Vec<ProviderState>>,
    sink: Arc<dyn AudioSink>,
    injector: NaturalVariationInjector,
    rng: Mutex<StdRng>,
    probe_timeout: Duration,
    playback_timeout: Duration,
    active: Mutex<Option<Active>>,
}

impl std::fmt::Debug for SynthesisOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisOrchestrator")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.kind()).collect::<Vec<_>>(),
            )
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Build the configured provider chain, in priority order.
pub fn build_chain(config: &VoiceConfig) -> Vec<Arc<dyn VoiceProvider>> {
    config
        .chain
        .iter()
        .map(|kind| -> Arc<dyn VoiceProvider> {
            match kind {
                ProviderKind::Clips => Arc::new(PrerecordedClipProvider::new(&config.clips)),
                ProviderKind::LocalNeural => {
                    Arc::new(LocalNeuralProvider::new(&config.local_neural))
                }
                ProviderKind::ElevenLabs => Arc::new(CloudCloneProvider::new(
                    ElevenLabs::new(&config.elevenlabs),
                    Duration::from_secs(config.elevenlabs.timeout_secs.max(1)),
                )),
                ProviderKind::Jammable => Arc::new(CloudCloneProvider::new(
                    Jammable::new(&config.jammable),
                    Duration::from_secs(config.jammable.timeout_secs.max(1)),
                )),
                ProviderKind::SystemSpeech => {
                    Arc::new(SystemSpeechProvider::new(&config.system_speech))
                }
            }
        })
        .collect()
}

impl SynthesisOrchestrator {
    /// Orchestrate `providers` (highest priority first) into `sink`.
    pub fn new(
        providers: Vec<Arc<dyn VoiceProvider>>,
        sink: Arc<dyn AudioSink>,
        config: &VoiceConfig,
    ) -> Self {
        let cooldown = Duration::from_secs(config.cooldown_secs);
        let states = providers
            .iter()
            .map(|_| ProviderState::new(config.failure_threshold, cooldown))
            .collect();
        Self {
            providers,
            states: Mutex::new(states),
            sink,
            injector: NaturalVariationInjector::new(
                config.jitter_magnitude,
                Duration::from_millis(config.max_delay_ms),
            ),
            rng: Mutex::new(StdRng::from_entropy()),
            probe_timeout: Duration::from_millis(config.probe_timeout_ms.max(1)),
            playback_timeout: Duration::from_secs(config.playback_timeout_secs.max(1)),
            active: Mutex::new(None),
        }
    }

    /// Orchestrator over the chain described by `config`.
    pub fn from_config(config: &VoiceConfig, sink: Arc<dyn AudioSink>) -> Self {
        Self::new(build_chain(config), sink, config)
    }

    /// Seed the jitter source for reproducible runs.
    pub fn with_seed(self, seed: u64) -> Self {
        *self.rng.lock().unwrap_or_else(|e| e.into_inner()) = StdRng::seed_from_u64(seed);
        self
    }

    /// Current phase. Probing a provider counts as rendering with it.
    pub fn state(&self) -> OrchestratorState {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        match active.as_ref().map(|a| a.phase) {
            None | Some(Phase::Selecting) => OrchestratorState::Idle,
            Some(Phase::Rendering(i)) => OrchestratorState::Rendering(self.providers[i].kind()),
            Some(Phase::Playing(i)) => OrchestratorState::Playing(self.providers[i].kind()),
        }
    }

    /// Snapshot of every provider's availability, in chain order.
    pub fn provider_states(&self) -> Vec<(ProviderKind, ProviderState)> {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        self.providers
            .iter()
            .map(|p| p.kind())
            .zip(states.iter().cloned())
            .collect()
    }

    /// Speak `response` with `mood`, superseding anything in flight.
    pub async fn speak(&self, response: Response, mood: Mood) -> RenderOutcome {
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        self.supersede(id, cancel.clone());
        debug!(request_id = %id, response = %response, mood = %mood, "speak");

        let guard = RequestGuard {
            orchestrator: self,
            id,
            cancel: cancel.clone(),
        };
        let outcome = self.run_chain(id, response, mood, &cancel).await;
        drop(guard);
        outcome
    }

    /// Cancel the in-flight utterance, if any. Idempotent.
    pub fn stop(&self) {
        let previous = self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(active) = previous {
            debug!(request_id = %active.id, "stopping utterance");
            self.halt(&active);
        }
    }

    fn supersede(&self, id: Uuid, cancel: CancellationToken) {
        let previous = self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(Active {
                id,
                cancel,
                phase: Phase::Selecting,
            });
        if let Some(active) = previous {
            debug!(request_id = %active.id, superseded_by = %id, "superseding utterance");
            self.halt(&active);
        }
    }

    fn halt(&self, active: &Active) {
        active.cancel.cancel();
        if let Some(i) = active.provider_index() {
            self.providers[i].stop();
        }
        if matches!(active.phase, Phase::Playing(_)) {
            self.sink.stop();
        }
    }

    fn set_phase(&self, id: Uuid, phase: Phase) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(a) = active.as_mut().filter(|a| a.id == id) {
            a.phase = phase;
        }
    }

    fn finish(&self, id: Uuid) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.as_ref().is_some_and(|a| a.id == id) {
            *active = None;
        }
    }

    /// Admit provider `index` at `now`, or report its remaining cooldown.
    fn admit(&self, index: usize) -> Result<(), Duration> {
        let now = Instant::now();
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        let state = &mut states[index];
        if state.admit(now) {
            Ok(())
        } else {
            Err(state.cooldown_remaining(now).unwrap_or_default())
        }
    }

    fn demote(&self, index: usize, reason: &str) {
        let kind = self.providers[index].kind();
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        let state = &mut states[index];
        state.record_failure(Instant::now(), reason);
        if !state.is_available() {
            warn!(provider = %kind, error = %reason, "provider failed, cooling down");
        }
    }

    fn promote(&self, index: usize) {
        let kind = self.providers[index].kind();
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        let state = &mut states[index];
        if state.consecutive_failures() > 0 {
            info!(provider = %kind, "provider recovered");
        }
        state.record_success();
    }

    async fn run_chain(
        &self,
        id: Uuid,
        response: Response,
        mood: Mood,
        cancel: &CancellationToken,
    ) -> RenderOutcome {
        let cancelled = || RenderOutcome::Cancelled { request_id: id };
        let mut failures = Vec::new();

        for (index, provider) in self.providers.iter().enumerate() {
            let kind = provider.kind();
            if cancel.is_cancelled() {
                return cancelled();
            }

            if let Err(remaining) = self.admit(index) {
                failures.push(ProviderFailure {
                    provider: kind,
                    stage: FailureStage::Cooldown,
                    detail: format!("cooling down for {remaining:?}"),
                });
                continue;
            }

            self.set_phase(id, Phase::Rendering(index));
            let probed = tokio::select! {
                biased;
                () = cancel.cancelled() => return cancelled(),
                probed = timeout(self.probe_timeout, provider.probe(response, mood)) => probed,
            };
            match probed {
                Ok(true) => {}
                Ok(false) => {
                    failures.push(ProviderFailure {
                        provider: kind,
                        stage: FailureStage::Probe,
                        detail: "not available".to_owned(),
                    });
                    continue;
                }
                Err(_) => {
                    failures.push(ProviderFailure {
                        provider: kind,
                        stage: FailureStage::Probe,
                        detail: format!("probe timed out after {:?}", self.probe_timeout),
                    });
                    continue;
                }
            }

            let jittered = {
                let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
                self.injector
                    .apply(&params_for(mood, kind.family()), &mut *rng)
            };
            let request = RenderRequest {
                id,
                response,
                mood,
                params: jittered.params,
                cancel: cancel.clone(),
            };

            let render_timeout = provider.render_timeout();
            let rendered = tokio::select! {
                biased;
                () = cancel.cancelled() => return cancelled(),
                rendered = timeout(render_timeout, provider.render(&request)) => rendered,
            };
            let handle = match rendered {
                Ok(Ok(handle)) => handle,
                Ok(Err(ProviderError::Cancelled)) => return cancelled(),
                Ok(Err(e)) => {
                    let detail = e.to_string();
                    self.demote(index, &detail);
                    failures.push(ProviderFailure {
                        provider: kind,
                        stage: FailureStage::Render,
                        detail,
                    });
                    continue;
                }
                Err(_) => {
                    let detail = ProviderError::Timeout(render_timeout).to_string();
                    self.demote(index, &detail);
                    failures.push(ProviderFailure {
                        provider: kind,
                        stage: FailureStage::Render,
                        detail,
                    });
                    continue;
                }
            };
            self.promote(index);

            tokio::select! {
                biased;
                () = cancel.cancelled() => return cancelled(),
                () = tokio::time::sleep(jittered.delay) => {}
            }

            self.set_phase(id, Phase::Playing(index));
            let played = tokio::select! {
                biased;
                () = cancel.cancelled() => return cancelled(),
                played = timeout(self.playback_timeout, self.sink.play(handle, cancel)) => played,
            };
            match played {
                Ok(Ok(())) => {
                    debug!(request_id = %id, provider = %kind, "utterance played");
                    return RenderOutcome::Played {
                        request_id: id,
                        provider: kind,
                        skipped: failures,
                    };
                }
                Ok(Err(ProviderError::Cancelled)) => return cancelled(),
                // The sink is shared, so a playback failure does not demote
                // the provider; another provider's format may still play.
                Ok(Err(e)) => failures.push(ProviderFailure {
                    provider: kind,
                    stage: FailureStage::Playback,
                    detail: e.to_string(),
                }),
                Err(_) => {
                    self.sink.stop();
                    failures.push(ProviderFailure {
                        provider: kind,
                        stage: FailureStage::Playback,
                        detail: format!("playback timed out after {:?}", self.playback_timeout),
                    });
                }
            }
        }

        warn!(
            request_id = %id,
            failures = failures.len(),
            "no voice provider could speak; continuing without audio"
        );
        RenderOutcome::NoAudio {
            request_id: id,
            failures,
        }
    }
}
