//! Cloud voice-clone providers.
//!
//! Both vendors share one provider, [`CloudCloneProvider`], parameterised by
//! a [`CloudVendor`] that knows how to phrase the request. Any non-2xx status
//! or transport error is a plain provider failure, whatever error shape the
//! vendor uses.

pub mod elevenlabs;
pub mod jammable;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::error::truncate_detail;
use super::params::{ProviderFamily, Tuning, params_for};
use super::{
    AudioFormat, AudioHandle, AudioSource, InFlight, PlaybackSettings, ProviderError,
    ProviderKind, RenderRequest, VoiceProvider,
};
use crate::mood::Mood;
use crate::response::Response;

pub use elevenlabs::ElevenLabs;
pub use jammable::Jammable;

/// Vendor-specific request shaping.
pub trait CloudVendor: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Credentials are present.
    fn is_configured(&self) -> bool;

    /// Root URL, used for the reachability probe.
    fn base_url(&self) -> &str;

    /// Build the synthesis request for `request`.
    fn synthesis_request(
        &self,
        client: &reqwest::Client,
        request: &RenderRequest,
    ) -> reqwest::RequestBuilder;
}

/// A cloud voice clone behind an HTTP API.
pub struct CloudCloneProvider<V> {
    vendor: V,
    client: reqwest::Client,
    timeout: Duration,
    in_flight: InFlight,
}

impl<V: CloudVendor> CloudCloneProvider<V> {
    pub fn new(vendor: V, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            vendor,
            client,
            timeout,
            in_flight: InFlight::default(),
        }
    }

    pub fn vendor(&self) -> &V {
        &self.vendor
    }

    async fn fetch(&self, request: &RenderRequest) -> Result<AudioHandle, ProviderError> {
        let response = self
            .vendor
            .synthesis_request(&self.client, request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message: truncate_detail(&body),
            });
        }

        let format = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(AudioFormat::Mp3, |ct| {
                if ct.contains("wav") {
                    AudioFormat::Wav
                } else {
                    AudioFormat::Mp3
                }
            });
        let data = response.bytes().await?;
        if data.is_empty() {
            return Err(ProviderError::Request("empty audio body".to_owned()));
        }

        debug!(provider = %self.vendor.kind(), bytes = data.len(), "cloud synthesis finished");
        Ok(AudioHandle {
            source: AudioSource::Encoded { data, format },
            settings: PlaybackSettings {
                rate: 1.0,
                volume: request.params.volume,
            },
        })
    }
}

#[async_trait]
impl<V: CloudVendor> VoiceProvider for CloudCloneProvider<V> {
    fn kind(&self) -> ProviderKind {
        self.vendor.kind()
    }

    fn render_timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self, _response: Response, _mood: Mood) -> bool {
        if !self.vendor.is_configured() {
            return false;
        }
        // Any HTTP answer means the host is reachable.
        match self.client.get(self.vendor.base_url()).send().await {
            Ok(_) => true,
            Err(e) => {
                debug!(provider = %self.vendor.kind(), error = %e, "cloud probe failed");
                false
            }
        }
    }

    async fn render(&self, request: &RenderRequest) -> Result<AudioHandle, ProviderError> {
        if !self.vendor.is_configured() {
            return Err(ProviderError::Unavailable("no API key configured".to_owned()));
        }
        let token = self.in_flight.begin(&request.cancel);
        tokio::select! {
            biased;
            () = token.cancelled() => Err(ProviderError::Cancelled),
            result = self.fetch(request) => {
                if let Err(e) = &result {
                    warn!(provider = %self.vendor.kind(), error = %e, "cloud synthesis failed");
                }
                result
            }
        }
    }

    fn stop(&self) {
        self.in_flight.cancel();
    }
}

/// Mood settings understood by the cloud vendors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CloudTuning {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub emotion: &'static str,
}

/// Cloud tuning for `request`, re-derived from its mood when the parameters
/// were mapped for another family.
pub(crate) fn cloud_tuning(request: &RenderRequest) -> CloudTuning {
    let tuning = match request.params.tuning {
        Tuning::Cloud { .. } => request.params.tuning,
        _ => params_for(request.mood, ProviderFamily::Cloud).tuning,
    };
    match tuning {
        Tuning::Cloud {
            stability,
            similarity_boost,
            style,
            emotion,
        } => CloudTuning {
            stability: stability.clamp(0.0, 1.0),
            similarity_boost: similarity_boost.clamp(0.0, 1.0),
            style: style.clamp(0.0, 1.0),
            emotion,
        },
        Tuning::Plain | Tuning::Neural { .. } => CloudTuning {
            stability: 0.7,
            similarity_boost: 0.8,
            style: 0.2,
            emotion: "neutral",
        },
    }
}

/// Join a base URL and a path without doubling slashes.
fn endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
