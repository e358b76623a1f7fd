//! Shared stubs for integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chadgpt::config::VoiceConfig;
use chadgpt::voice::{
    AudioFormat, AudioHandle, AudioSink, AudioSource, PlaybackSettings, ProviderError,
    ProviderKind, RenderParameters, RenderRequest, SynthesisOrchestrator, VoiceProvider,
};
use chadgpt::{Mood, Response};
use tokio_util::sync::CancellationToken;

/// What a [`StubProvider`] does when asked to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behavior {
    /// Render instantly.
    Succeed,
    /// Fail with HTTP 500.
    Fail,
    /// Never finish on its own.
    Hang,
    /// Probe reports unavailable.
    Unavailable,
}

pub(crate) struct StubProvider {
    kind: ProviderKind,
    behavior: Mutex<Behavior>,
    timeout: Duration,
    probes: AtomicUsize,
    renders: AtomicUsize,
    stops: AtomicUsize,
    params: Mutex<Vec<RenderParameters>>,
}

impl StubProvider {
    pub(crate) fn new(kind: ProviderKind, behavior: Behavior) -> Arc<Self> {
        Self::with_timeout(kind, behavior, Duration::from_secs(5))
    }

    pub(crate) fn with_timeout(
        kind: ProviderKind,
        behavior: Behavior,
        timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            kind,
            behavior: Mutex::new(behavior),
            timeout,
            probes: AtomicUsize::new(0),
            renders: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            params: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub(crate) fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub(crate) fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Parameters of every render request received, in order.
    pub(crate) fn params(&self) -> Vec<RenderParameters> {
        self.params.lock().unwrap().clone()
    }

    fn behavior(&self) -> Behavior {
        *self.behavior.lock().unwrap()
    }
}

#[async_trait]
impl VoiceProvider for StubProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn render_timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self, _response: Response, _mood: Mood) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.behavior() != Behavior::Unavailable
    }

    async fn render(&self, request: &RenderRequest) -> Result<AudioHandle, ProviderError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        self.params.lock().unwrap().push(request.params);
        match self.behavior() {
            Behavior::Succeed => Ok(AudioHandle {
                // Tag the payload so the sink can tell utterances apart.
                source: AudioSource::Encoded {
                    data: Bytes::from(format!("{}:{}", self.kind, request.text())),
                    format: AudioFormat::Wav,
                },
                settings: PlaybackSettings::default(),
            }),
            Behavior::Fail => Err(ProviderError::Http {
                status: 500,
                message: "stub failure".into(),
            }),
            Behavior::Hang => {
                request.cancel.cancelled().await;
                Err(ProviderError::Cancelled)
            }
            Behavior::Unavailable => Err(ProviderError::Unavailable("stub".into())),
        }
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sink that "plays" for a fixed duration and records what it played.
pub(crate) struct RecordingSink {
    play_time: Duration,
    started: Mutex<Vec<String>>,
    completed: Mutex<Vec<String>>,
    stops: AtomicUsize,
}

impl RecordingSink {
    pub(crate) fn new(play_time: Duration) -> Arc<Self> {
        Arc::new(Self {
            play_time,
            started: Mutex::new(Vec::new()),
            completed: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
        })
    }

    pub(crate) fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    pub(crate) fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

fn label(handle: &AudioHandle) -> String {
    match &handle.source {
        AudioSource::Encoded { data, .. } => String::from_utf8_lossy(data).into_owned(),
        AudioSource::File(path) => path.display().to_string(),
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn play(
        &self,
        handle: AudioHandle,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        let label = label(&handle);
        self.started.lock().unwrap().push(label.clone());
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ProviderError::Cancelled),
            () = tokio::time::sleep(self.play_time) => {
                self.completed.lock().unwrap().push(label);
                Ok(())
            }
        }
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Voice config with the default single-strike, 30 s cooldown policy.
pub(crate) fn voice_config() -> VoiceConfig {
    VoiceConfig::default()
}

/// Orchestrate `providers` into `sink`, seeded for reproducible jitter.
pub(crate) fn orchestrator(
    providers: &[Arc<StubProvider>],
    sink: Arc<RecordingSink>,
) -> SynthesisOrchestrator {
    let chain: Vec<Arc<dyn VoiceProvider>> = providers
        .iter()
        .map(|p| Arc::clone(p) as Arc<dyn VoiceProvider>)
        .collect();
    SynthesisOrchestrator::new(chain, sink, &voice_config()).with_seed(7)
}
