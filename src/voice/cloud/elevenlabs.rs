//! ElevenLabs text-to-speech.

use serde::Serialize;

use super::{CloudVendor, cloud_tuning, endpoint};
use crate::config::ElevenLabsConfig;
use crate::voice::{ProviderKind, RenderRequest};

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
    style: f32,
    use_speaker_boost: bool,
}

#[derive(Debug, Serialize)]
struct SynthesisBody<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Clone)]
pub struct ElevenLabs {
    api_key: Option<String>,
    voice_id: String,
    model_id: String,
    base_url: String,
}

impl ElevenLabs {
    pub fn new(config: &ElevenLabsConfig) -> Self {
        Self {
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            voice_id: config.voice_id.clone(),
            model_id: config.model_id.clone(),
            base_url: config.base_url.clone(),
        }
    }

    fn settings(request: &RenderRequest) -> VoiceSettings {
        let tuning = cloud_tuning(request);
        VoiceSettings {
            stability: tuning.stability,
            similarity_boost: tuning.similarity_boost,
            style: tuning.style,
            use_speaker_boost: true,
        }
    }
}

impl CloudVendor for ElevenLabs {
    fn kind(&self) -> ProviderKind {
        ProviderKind::ElevenLabs
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn synthesis_request(
        &self,
        client: &reqwest::Client,
        request: &RenderRequest,
    ) -> reqwest::RequestBuilder {
        let url = endpoint(
            &self.base_url,
            &format!("v1/text-to-speech/{}", self.voice_id),
        );
        let body = SynthesisBody {
            text: request.text(),
            model_id: &self.model_id,
            voice_settings: Self::settings(request),
        };
        client
            .post(url)
            .header("xi-api-key", self.api_key.as_deref().unwrap_or_default())
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&body)
    }
}
