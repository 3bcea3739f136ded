use crate::core::config::LlmConfig;
use crate::core::error::ProviderError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

const PROVIDER: &str = "Gemini";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    InlineData { mime_type: String, data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// A single user turn carrying an instruction and an image.
    pub fn image_prompt(prompt: impl Into<String>, mime_type: &str, image: &[u8]) -> Self {
        Self {
            role: Role::User,
            parts: vec![
                Part::Text(prompt.into()),
                Part::InlineData {
                    mime_type: mime_type.to_string(),
                    data: image.to_vec(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOptions {
    pub system_instruction: Option<String>,
    pub response_mime_type: Option<String>,
    pub temperature: Option<f32>,
}

impl GenerateOptions {
    pub fn json() -> Self {
        Self {
            response_mime_type: Some("application/json".to_string()),
            ..Default::default()
        }
    }

    pub fn with_system_instruction(instruction: impl Into<String>) -> Self {
        Self {
            system_instruction: Some(instruction.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    pub options: GenerateOptions,
    pub use_google_search: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateResponse {
    pub text: String,
    pub grounding_urls: Vec<String>,
}

#[async_trait]
pub trait GenerativeClient: Send + Sync + Debug {
    async fn generate(&self, model: &str, request: &GenerateRequest) -> Result<GenerateResponse>;
}

// --- Gemini ---

#[derive(Debug)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig, client: reqwest::Client) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiBlob,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiBlob {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    google_search: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    finish_reason: Option<String>,
    grounding_metadata: Option<GeminiGroundingMetadata>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GeminiGroundingChunk>,
}

#[derive(Deserialize)]
struct GeminiGroundingChunk {
    web: Option<GeminiWebSource>,
}

#[derive(Deserialize)]
struct GeminiWebSource {
    uri: Option<String>,
}

#[derive(Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiError,
}

#[derive(Deserialize)]
struct GeminiError {
    message: String,
}

fn to_wire_part(part: &Part) -> GeminiPart {
    match part {
        Part::Text(text) => GeminiPart::Text { text: text.clone() },
        Part::InlineData { mime_type, data } => GeminiPart::InlineData {
            inline_data: GeminiBlob {
                mime_type: mime_type.clone(),
                data: BASE64.encode(data),
            },
        },
    }
}

fn build_request_body(request: &GenerateRequest) -> GeminiRequest {
    let contents = request
        .contents
        .iter()
        .map(|c| GeminiContent {
            role: c.role.as_str().to_string(),
            parts: c.parts.iter().map(to_wire_part).collect(),
        })
        .collect();

    let system_instruction = request
        .options
        .system_instruction
        .as_ref()
        .map(|s| GeminiSystemInstruction {
            parts: vec![GeminiPart::Text { text: s.clone() }],
        });

    let tools = if request.use_google_search {
        vec![GeminiTool {
            google_search: serde_json::Map::new(),
        }]
    } else {
        Vec::new()
    };

    let generation_config = if request.options.response_mime_type.is_some()
        || request.options.temperature.is_some()
    {
        Some(GeminiGenerationConfig {
            response_mime_type: request.options.response_mime_type.clone(),
            temperature: request.options.temperature,
        })
    } else {
        None
    };

    GeminiRequest {
        contents,
        system_instruction,
        tools,
        generation_config,
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<GeminiErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

fn parse_response_body(body: &str) -> Result<GenerateResponse> {
    let result: GeminiResponse = serde_json::from_str(body).map_err(|e| ProviderError::Malformed {
        provider: PROVIDER,
        message: format!("Failed to parse Gemini response: {}", e),
    })?;

    let candidate = result
        .candidates
        .and_then(|c| c.into_iter().next())
        .ok_or_else(|| ProviderError::Malformed {
            provider: PROVIDER,
            message: "response contained no candidates".to_string(),
        })?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.as_deref().unwrap_or("UNKNOWN");
        return Err(ProviderError::Malformed {
            provider: PROVIDER,
            message: format!("empty response. Finish reason: {}", reason),
        }
        .into());
    }

    let grounding_urls = candidate
        .grounding_metadata
        .map(|m| {
            m.grounding_chunks
                .into_iter()
                .filter_map(|chunk| chunk.web.and_then(|w| w.uri))
                .collect()
        })
        .unwrap_or_default();

    Ok(GenerateResponse {
        text,
        grounding_urls,
    })
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    async fn generate(&self, model: &str, request: &GenerateRequest) -> Result<GenerateResponse> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        debug!(
            "Gemini request: model={} contents={} search={}",
            model,
            request.contents.len(),
            request.use_google_search
        );

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request_body(request))
            .send()
            .await
            .context("Failed to reach Gemini API")?;

        let status = resp.status();
        let body = resp.text().await.context("Failed to read Gemini response")?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
                message: error_message(&body),
            }
            .into());
        }

        parse_response_body(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::provider_error;

    #[test]
    fn test_gemini_response_parsing_safety_block() {
        let json = r#"{
            "candidates": [
                {
                    "finishReason": "SAFETY",
                    "index": 0
                }
            ]
        }"#;

        let err = parse_response_body(json).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
        assert!(provider_error(&err).is_some());
    }

    #[test]
    fn test_gemini_response_parsing_concatenates_parts() {
        let json = r#"{
            "candidates": [
                {
                    "content": {
                        "parts": [
                            { "text": "Hello " },
                            { "functionCall": {} },
                            { "text": "world" }
                        ],
                        "role": "model"
                    },
                    "finishReason": "STOP"
                }
            ]
        }"#;

        let resp = parse_response_body(json).unwrap();
        assert_eq!(resp.text, "Hello world");
        assert!(resp.grounding_urls.is_empty());
    }

    #[test]
    fn test_gemini_response_grounding_urls() {
        let json = r#"{
            "candidates": [{
                "content": { "parts": [{ "text": "Brief" }] },
                "groundingMetadata": {
                    "webSearchQueries": ["statue of liberty"],
                    "groundingChunks": [
                        { "web": { "uri": "https://www.nps.gov/stli", "title": "nps.gov" } },
                        { "retrievedContext": {} },
                        { "web": { "uri": "https://en.wikipedia.org/wiki/Statue_of_Liberty" } }
                    ]
                }
            }]
        }"#;

        let resp = parse_response_body(json).unwrap();
        assert_eq!(
            resp.grounding_urls,
            vec![
                "https://www.nps.gov/stli".to_string(),
                "https://en.wikipedia.org/wiki/Statue_of_Liberty".to_string()
            ]
        );
    }

    #[test]
    fn test_request_body_shape() {
        let request = GenerateRequest {
            contents: vec![Content::image_prompt("What is this?", "image/png", &[1, 2, 3])],
            options: GenerateOptions {
                system_instruction: Some("Be brief".to_string()),
                response_mime_type: Some("application/json".to_string()),
                temperature: None,
            },
            use_google_search: true,
        };

        let value = serde_json::to_value(build_request_body(&request)).unwrap();
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "What is this?");
        assert_eq!(value["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(value["contents"][0]["parts"][1]["inlineData"]["data"], "AQID");
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "Be brief");
        assert!(value["tools"][0]["googleSearch"].is_object());
        assert_eq!(value["generationConfig"]["responseMimeType"], "application/json");
        assert!(value["generationConfig"].get("temperature").is_none());
    }

    #[test]
    fn test_request_body_without_tools_or_config() {
        let request = GenerateRequest {
            contents: vec![Content::text(Role::Model, "Hi")],
            options: GenerateOptions::default(),
            use_google_search: false,
        };

        let value = serde_json::to_value(build_request_body(&request)).unwrap();
        assert_eq!(value["contents"][0]["role"], "model");
        assert!(value.get("tools").is_none());
        assert!(value.get("generationConfig").is_none());
        assert!(value.get("systemInstruction").is_none());
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error":{"code":404,"message":"models/gemini-x is not found","status":"NOT_FOUND"}}"#;
        assert_eq!(error_message(body), "models/gemini-x is not found");
        assert_eq!(error_message("plain failure"), "plain failure");
    }
}
