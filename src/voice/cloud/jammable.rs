//! Jammable voice generation.

use serde::Serialize;

use super::{CloudVendor, cloud_tuning, endpoint};
use crate::config::JammableConfig;
use crate::voice::{ProviderKind, RenderRequest};

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    text: &'a str,
    voice_id: &'a str,
    speed: f32,
    pitch: f32,
    emotion: &'static str,
    quality: &'static str,
}

#[derive(Debug, Clone)]
pub struct Jammable {
    api_key: Option<String>,
    voice_id: String,
    base_url: String,
}

impl Jammable {
    pub fn new(config: &JammableConfig) -> Self {
        Self {
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            voice_id: config.voice_id.clone(),
            base_url: config.base_url.clone(),
        }
    }
}

impl CloudVendor for Jammable {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Jammable
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
        let body = GenerateBody {
            text: request.text(),
            voice_id: &self.voice_id,
            speed: request.params.rate,
            pitch: request.params.pitch,
            emotion: cloud_tuning(request).emotion,
            quality: "high",
        };
        client
            .post(endpoint(&self.base_url, "v1/generate"))
            .bearer_auth(self.api_key.as_deref().unwrap_or_default())
            .json(&body)
    }
}
