use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "CURIOCITY_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub voice: VoiceConfig,

    #[serde(default)]
    pub transcription: TranscriptionConfig,

    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_model")]
    pub research_model: String,
    #[serde(default = "default_fallback_models")]
    pub fallback_models: Vec<String>,
    #[serde(default = "default_true")]
    pub enable_google_search: bool,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VoiceConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_voice_id")]
    pub default_voice_id: String,
    #[serde(default = "default_elevenlabs_base_url")]
    pub base_url: String,
    #[serde(default = "default_tts_model_id")]
    pub tts_model_id: String,
    #[serde(default = "default_stability")]
    pub stability: f32,
    #[serde(default = "default_similarity_boost")]
    pub similarity_boost: f32,
    #[serde(default = "default_voice_name")]
    pub voice_name: String,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranscriptionConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_deepgram_base_url")]
    pub base_url: String,
    #[serde(default = "default_transcription_model")]
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}
fn default_model() -> String {
    "gemini-3.1-pro-preview".to_string()
}
fn default_fallback_models() -> Vec<String> {
    vec![
        "gemini-2.5-flash".to_string(),
        "gemini-2.5-flash-lite".to_string(),
        "gemini-1.5-flash".to_string(),
    ]
}
fn default_true() -> bool {
    true
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_voice_id() -> String {
    "21m00Tcm4TlvDq8ikWAM".to_string()
}
fn default_elevenlabs_base_url() -> String {
    "https://api.elevenlabs.io/v1".to_string()
}
fn default_tts_model_id() -> String {
    "eleven_turbo_v2".to_string()
}
fn default_stability() -> f32 {
    0.5
}
fn default_similarity_boost() -> f32 {
    0.75
}
fn default_voice_name() -> String {
    "CurioCity Character".to_string()
}
fn default_cache_capacity() -> usize {
    128
}
fn default_deepgram_base_url() -> String {
    "https://api.deepgram.com/v1".to_string()
}
fn default_transcription_model() -> String {
    "nova-2".to_string()
}
fn default_timeout_seconds() -> u64 {
    30
}
fn default_connect_timeout_seconds() -> u64 {
    10
}
fn default_max_idle_per_host() -> usize {
    20
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            research_model: default_model(),
            fallback_models: default_fallback_models(),
            enable_google_search: true,
            base_url: default_gemini_base_url(),
        }
    }
}

impl LlmConfig {
    /// The static fallback chain: the primary model followed by the configured fallbacks.
    pub fn model_fallbacks(&self) -> Vec<String> {
        let mut models = vec![self.model.clone()];
        models.extend(self.fallback_models.iter().cloned());
        models
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            default_voice_id: default_voice_id(),
            base_url: default_elevenlabs_base_url(),
            tts_model_id: default_tts_model_id(),
            stability: default_stability(),
            similarity_boost: default_similarity_boost(),
            voice_name: default_voice_name(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_deepgram_base_url(),
            model: default_transcription_model(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
            max_idle_per_host: default_max_idle_per_host(),
        }
    }
}

impl Config {
    /// Loads `config.yml` (or the file named by `CURIOCITY_CONFIG`) and applies
    /// environment overrides. A missing file is not an error.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load_from(Path::new(&path))?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("{} not found, using default settings", path.display());
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = non_empty("GEMINI_API_KEY") {
            self.llm.api_key = v;
        }
        if let Some(v) = non_empty("GEMINI_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = non_empty("GEMINI_RESEARCH_MODEL") {
            self.llm.research_model = v;
        }
        if let Some(v) = non_empty("GEMINI_ENABLE_GOOGLE_SEARCH") {
            self.llm.enable_google_search = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(v) = non_empty("ELEVENLABS_API_KEY") {
            self.voice.api_key = v;
        }
        if let Some(v) = non_empty("ELEVENLABS_VOICE_ID") {
            self.voice.default_voice_id = v;
        }
        if let Some(v) = non_empty("DEEPGRAM_API_KEY") {
            self.transcription.api_key = v;
        }
        if let Some(v) = non_empty("CURIOCITY_PORT") {
            match v.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => log::warn!("Ignoring invalid CURIOCITY_PORT value: {}", v),
            }
        }
    }

    /// Builds the process-wide HTTP client shared by every provider client.
    pub fn build_http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.http.timeout_seconds))
            .connect_timeout(Duration::from_secs(self.http.connect_timeout_seconds))
            .pool_max_idle_per_host(self.http.max_idle_per_host)
            .build()
            .context("Failed to build HTTP client")
    }
}
