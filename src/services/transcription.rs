use crate::core::config::TranscriptionConfig;
use crate::core::error::ProviderError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

const PROVIDER: &str = "Deepgram";

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Transcript {
    pub transcript: String,
    pub confidence: f64,
}

#[async_trait]
pub trait Transcriber: Send + Sync + Debug {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<Transcript>;
}

#[derive(Debug)]
pub struct DeepgramClient {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ListenResponse {
    results: ListenResults,
}

#[derive(Deserialize)]
struct ListenResults {
    #[serde(default)]
    channels: Vec<ListenChannel>,
}

#[derive(Deserialize)]
struct ListenChannel {
    #[serde(default)]
    alternatives: Vec<ListenAlternative>,
}

#[derive(Deserialize)]
struct ListenAlternative {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    confidence: f64,
}

fn parse_listen_response(body: &str) -> Result<Transcript> {
    let resp: ListenResponse = serde_json::from_str(body).map_err(|e| ProviderError::Malformed {
        provider: PROVIDER,
        message: format!("Failed to parse transcription: {}", e),
    })?;

    // No speech detected is an empty transcript, not an error.
    Ok(resp
        .results
        .channels
        .into_iter()
        .next()
        .and_then(|c| c.alternatives.into_iter().next())
        .map(|a| Transcript {
            transcript: a.transcript,
            confidence: a.confidence,
        })
        .unwrap_or_default())
}

impl DeepgramClient {
    pub fn new(config: &TranscriptionConfig, client: reqwest::Client) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
        }
    }
}

#[async_trait]
impl Transcriber for DeepgramClient {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<Transcript> {
        debug!("Transcribing {} bytes of {}", audio.len(), mime_type);
        let resp = self
            .client
            .post(format!(
                "{}/listen?model={}&smart_format=true&profanity_filter=true",
                self.base_url, self.model
            ))
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", mime_type)
            .body(audio.to_vec())
            .send()
            .await
            .context("Failed to reach Deepgram API")?;

        let status = resp.status();
        let body = resp.text().await.context("Failed to read Deepgram response")?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
                message: body,
            }
            .into());
        }

        parse_listen_response(&body)
    }
}
