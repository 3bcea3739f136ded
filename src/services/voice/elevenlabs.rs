use super::{CatalogVoice, VoiceProvider};
use crate::core::config::VoiceConfig;
use crate::core::error::ProviderError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::json;

const PROVIDER: &str = "ElevenLabs";

#[derive(Debug)]
pub struct ElevenLabsClient {
    api_key: String,
    base_url: String,
    tts_model_id: String,
    stability: f32,
    similarity_boost: f32,
    voice_name: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct PreviewsResponse {
    #[serde(default)]
    previews: Vec<Preview>,
}

#[derive(Deserialize)]
struct Preview {
    generated_voice_id: String,
}

#[derive(Deserialize)]
struct CreatedVoice {
    voice_id: String,
}

#[derive(Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<CatalogVoice>,
}

impl ElevenLabsClient {
    pub fn new(config: &VoiceConfig, client: reqwest::Client) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tts_model_id: config.tts_model_id.clone(),
            stability: config.stability,
            similarity_boost: config.similarity_boost,
            voice_name: config.voice_name.clone(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turns a non-2xx reply into a `ProviderError::Status` carrying the body.
    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ProviderError::Status {
            provider: PROVIDER,
            status: status.as_u16(),
            message: body,
        }
        .into())
    }

    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<String> {
        let resp = self
            .client
            .post(self.url(path))
            .header("xi-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach ElevenLabs {}", path))?;
        Self::check(resp)
            .await?
            .text()
            .await
            .context("Failed to read ElevenLabs response")
    }
}

fn decode<'a, T: Deserialize<'a>>(body: &'a str, what: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        ProviderError::Malformed {
            provider: PROVIDER,
            message: format!("{}: {}", what, e),
        }
        .into()
    })
}

fn first_preview_id(body: &str) -> Result<String> {
    let resp: PreviewsResponse = decode(body, "create-previews")?;
    resp.previews
        .into_iter()
        .next()
        .map(|p| p.generated_voice_id)
        .ok_or_else(|| {
            ProviderError::Malformed {
                provider: PROVIDER,
                message: "create-previews returned no previews".to_string(),
            }
            .into()
        })
}

#[async_trait]
impl VoiceProvider for ElevenLabsClient {
    async fn create_previews(&self, description: &str, preview_text: &str) -> Result<String> {
        let body = self
            .post_json(
                "/text-to-voice/create-previews",
                &json!({
                    "voice_description": description,
                    "text": preview_text,
                }),
            )
            .await?;
        let generated = first_preview_id(&body)?;
        debug!("ElevenLabs generated preview {}", generated);
        Ok(generated)
    }

    async fn create_voice_from_preview(&self, description: &str, generated_voice_id: &str) -> Result<String> {
        let body = self
            .post_json(
                "/text-to-voice/create-voice-from-preview",
                &json!({
                    "voice_name": self.voice_name,
                    "voice_description": description,
                    "generated_voice_id": generated_voice_id,
                }),
            )
            .await?;
        let created: CreatedVoice = decode(&body, "create-voice-from-preview")?;
        Ok(created.voice_id)
    }

    async fn list_voices(&self) -> Result<Vec<CatalogVoice>> {
        let resp = self
            .client
            .get(self.url("/voices"))
            .header("xi-api-key", &self.api_key)
            .send()
            .await
            .context("Failed to reach ElevenLabs /voices")?;
        let body = Self::check(resp)
            .await?
            .text()
            .await
            .context("Failed to read ElevenLabs voice list")?;
        let voices: VoicesResponse = decode(&body, "voices")?;
        Ok(voices.voices)
    }

    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .post(self.url(&format!("/text-to-speech/{}", voice_id)))
            .header("xi-api-key", &self.api_key)
            .header("accept", "audio/mpeg")
            .json(&json!({
                "text": text,
                "model_id": self.tts_model_id,
                "voice_settings": {
                    "stability": self.stability,
                    "similarity_boost": self.similarity_boost,
                },
            }))
            .send()
            .await
            .context("Failed to reach ElevenLabs text-to-speech")?;
        let audio = Self::check(resp)
            .await?
            .bytes()
            .await
            .context("Failed to read ElevenLabs audio")?;
        Ok(audio.to_vec())
    }
}
