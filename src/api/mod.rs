//! HTTP boundary.

pub mod error;
pub mod handlers;

use crate::services::pipeline::CharacterPipeline;
use crate::services::transcription::Transcriber;
use crate::services::voice::SpeechRenderer;
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use log::warn;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<CharacterPipeline>,
    pub speech: Arc<SpeechRenderer>,
    pub transcriber: Arc<dyn Transcriber>,
}

impl AppState {
    pub fn new(pipeline: CharacterPipeline, speech: SpeechRenderer, transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            speech: Arc::new(speech),
            transcriber,
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/identify", post(handlers::identify))
        .route("/api/recharacterize", post(handlers::recharacterize))
        .route("/api/chat", post(handlers::chat))
        .route("/api/speech-to-text", post(handlers::speech_to_text))
        .route("/api/text-to-speech", post(handlers::text_to_speech))
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}
