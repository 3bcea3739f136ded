use super::error::ApiError;
use super::AppState;
use crate::core::state::{CharacterProfile, ConversationMessage, PipelineResult};
use crate::services::pipeline::fallback_result;
use crate::services::transcription::Transcript;
use crate::services::voice::SpeechUnavailable;
use crate::utils::data_uri::decode_data_uri;
use axum::{
    extract::{Multipart, State},
    http::header,
    response::IntoResponse,
    Json,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const DEFAULT_AUDIO_MIME: &str = "audio/webm";

#[derive(Debug, Deserialize)]
pub struct IdentifyRequest {
    /// `data:image/jpeg;base64,...`
    pub image: String,
}

#[derive(Debug, Deserialize)]
pub struct RecharacterizeRequest {
    pub entity: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub entity: String,
    pub character_profile: CharacterProfile,
    pub conversation_history: Vec<ConversationMessage>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Deserialize)]
pub struct TextToSpeechRequest {
    pub text: String,
    #[serde(default)]
    pub entity: String,
    #[serde(default)]
    pub voice_id: Option<String>,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /api/identify
///
/// Always answers with a character; failures yield the fallback persona.
pub async fn identify(State(state): State<AppState>, Json(req): Json<IdentifyRequest>) -> Json<PipelineResult> {
    let (mime_type, image) = match decode_data_uri(&req.image) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!("/api/identify received an unusable image ({:#}); returning fallback character", e);
            return Json(fallback_result(state.pipeline.default_voice_id()));
        }
    };
    info!("/api/identify: {} bytes of {}", image.len(), mime_type);
    Json(state.pipeline.identify_or_fallback(&image, &mime_type).await)
}

/// POST /api/recharacterize
pub async fn recharacterize(
    State(state): State<AppState>,
    Json(req): Json<RecharacterizeRequest>,
) -> Json<PipelineResult> {
    Json(state.pipeline.recharacterize_or_fallback(&req.entity).await)
}

/// POST /api/chat
pub async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Result<Json<ChatResponse>, ApiError> {
    if req.conversation_history.is_empty() {
        return Err(ApiError::BadRequest("conversation_history must not be empty".to_string()));
    }

    let response = state
        .pipeline
        .chat(&req.character_profile, &req.conversation_history)
        .await
        .map_err(|e| ApiError::Upstream(format!("Chat with {} failed: {:#}", req.entity, e)))?;
    Ok(Json(ChatResponse { response }))
}

/// POST /api/speech-to-text (multipart field `audio`)
pub async fn speech_to_text(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Transcript>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("audio") {
            continue;
        }
        let mime_type = field.content_type().unwrap_or(DEFAULT_AUDIO_MIME).to_string();
        let audio = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read audio: {}", e)))?;

        let transcript = state
            .transcriber
            .transcribe(&audio, &mime_type)
            .await
            .map_err(|e| ApiError::Upstream(format!("Transcription failed: {:#}", e)))?;
        return Ok(Json(transcript));
    }

    Err(ApiError::BadRequest("Missing multipart field 'audio'".to_string()))
}

/// POST /api/text-to-speech, answering with MP3 bytes.
pub async fn text_to_speech(
    State(state): State<AppState>,
    Json(req): Json<TextToSpeechRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".to_string()));
    }

    let audio = state
        .speech
        .render(&req.text, req.voice_id.as_deref())
        .await
        .map_err(|e| match e.downcast_ref::<SpeechUnavailable>() {
            Some(unavailable) => ApiError::Unavailable(unavailable.to_string()),
            None => ApiError::Internal(format!("{:#}", e)),
        })?;

    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio))
}
