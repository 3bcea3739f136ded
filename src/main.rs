use anyhow::{Context, Result};
use curiocity::api::{build_router, AppState};
use curiocity::core::config::Config;
use curiocity::services::llm::GeminiClient;
use curiocity::services::pipeline::CharacterPipeline;
use curiocity::services::transcription::DeepgramClient;
use curiocity::services::voice::elevenlabs::ElevenLabsClient;
use curiocity::services::voice::provisioner::VoiceProvisioner;
use curiocity::services::voice::SpeechRenderer;
use log::{info, warn};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = Config::load()?;
    if config.llm.api_key.is_empty() {
        warn!("GEMINI_API_KEY is not set; character generation will fall back to the mystery persona.");
    }
    if config.voice.api_key.is_empty() {
        warn!("ELEVENLABS_API_KEY is not set; voices will use the default voice id.");
    }

    // One connection pool shared by every provider client.
    let http = config.build_http_client()?;

    let gemini = Arc::new(GeminiClient::new(&config.llm, http.clone()));
    let elevenlabs = Arc::new(ElevenLabsClient::new(&config.voice, http.clone()));
    let deepgram = Arc::new(DeepgramClient::new(&config.transcription, http));

    let provisioner = Arc::new(VoiceProvisioner::new(elevenlabs.clone(), config.voice.cache_capacity));
    let pipeline = CharacterPipeline::new(&config, gemini, provisioner);
    let speech = SpeechRenderer::new(elevenlabs, config.voice.default_voice_id.clone());

    let state = AppState::new(pipeline, speech, deepgram);
    let app = build_router(state, &config.server.allowed_origins);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("CurioCity API listening on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
