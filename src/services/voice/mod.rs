use anyhow::Result;
use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;

/// A voice already saved in the provider account.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct CatalogVoice {
    pub voice_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Provider labels such as `accent`, `gender`, `age` and `use_case`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: HashMap<String, String>,
}

/// Treats an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[async_trait]
pub trait VoiceProvider: Send + Sync + Debug {
    /// Designs a voice from a description; returns the generated preview id.
    async fn create_previews(&self, description: &str, preview_text: &str) -> Result<String>;
    /// Saves a generated preview as a durable voice; returns its voice id.
    async fn create_voice_from_preview(&self, description: &str, generated_voice_id: &str) -> Result<String>;
    async fn list_voices(&self) -> Result<Vec<CatalogVoice>>;
    /// Renders `text` as MP3 audio.
    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<Vec<u8>>;
}

/// Neither the requested voice nor the default voice could render speech.
#[derive(Error, Debug)]
#[error("Speech unavailable for voice {voice_id}: {reason}")]
pub struct SpeechUnavailable {
    pub voice_id: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct SpeechRenderer {
    provider: Arc<dyn VoiceProvider>,
    default_voice_id: String,
}

impl SpeechRenderer {
    pub fn new(provider: Arc<dyn VoiceProvider>, default_voice_id: String) -> Self {
        Self {
            provider,
            default_voice_id,
        }
    }

    /// Renders with the requested voice, retrying once with the default voice.
    pub async fn render(&self, text: &str, voice_id: Option<&str>) -> Result<Vec<u8>> {
        let requested = voice_id
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(self.default_voice_id.as_str());

        let err = match self.provider.synthesize(requested, text).await {
            Ok(audio) => return Ok(audio),
            Err(e) => e,
        };

        if requested == self.default_voice_id {
            return Err(SpeechUnavailable {
                voice_id: requested.to_string(),
                reason: format!("{:#}", err),
            }
            .into());
        }

        warn!(
            "TTS failed for voice_id={} ({:#}). Retrying with fallback voice.",
            requested, err
        );
        self.provider
            .synthesize(&self.default_voice_id, text)
            .await
            .map_err(|e| {
                SpeechUnavailable {
                    voice_id: self.default_voice_id.clone(),
                    reason: format!("{:#}", e),
                }
                .into()
            })
    }
}

pub mod cache;
pub mod elevenlabs;
pub mod provisioner;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::error::ProviderError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory voice provider. Voice ids in `broken_voices` fail to synthesize.
    #[derive(Debug, Default)]
    pub(crate) struct MockVoiceProvider {
        pub catalog: Vec<CatalogVoice>,
        pub broken_voices: Vec<String>,
        pub capacity_limited: bool,
        pub previews_fail: bool,
        pub create_calls: AtomicUsize,
        pub synthesized: Mutex<Vec<String>>,
    }

    impl MockVoiceProvider {
        pub fn create_calls(&self) -> usize {
            self.create_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VoiceProvider for MockVoiceProvider {
        async fn create_previews(&self, description: &str, _preview_text: &str) -> Result<String> {
            if self.previews_fail {
                return Err(ProviderError::Status {
                    provider: "ElevenLabs",
                    status: 500,
                    message: "preview failed".to_string(),
                }
                .into());
            }
            Ok(format!("preview-{}", description.len()))
        }

        async fn create_voice_from_preview(&self, _description: &str, generated_voice_id: &str) -> Result<String> {
            let n = self.create_calls.fetch_add(1, Ordering::SeqCst);
            if self.capacity_limited {
                return Err(ProviderError::Status {
                    provider: "ElevenLabs",
                    status: 400,
                    message: r#"{"detail":{"status":"voice_limit_reached"}}"#.to_string(),
                }
                .into());
            }
            Ok(format!("voice-{}-{}", n, generated_voice_id))
        }

        async fn list_voices(&self) -> Result<Vec<CatalogVoice>> {
            Ok(self.catalog.clone())
        }

        async fn synthesize(&self, voice_id: &str, text: &str) -> Result<Vec<u8>> {
            self.synthesized.lock().unwrap().push(voice_id.to_string());
            if self.broken_voices.iter().any(|v| v == voice_id) {
                return Err(ProviderError::Status {
                    provider: "ElevenLabs",
                    status: 404,
                    message: "voice_not_found".to_string(),
                }
                .into());
            }
            Ok(format!("{}:{}", voice_id, text).into_bytes())
        }
    }

    fn renderer(provider: Arc<MockVoiceProvider>) -> SpeechRenderer {
        SpeechRenderer::new(provider, "default".to_string())
    }

    #[tokio::test]
    async fn test_render_with_requested_voice() -> Result<()> {
        let provider = Arc::new(MockVoiceProvider::default());
        let audio = renderer(provider.clone()).render("hi", Some("custom")).await?;
        assert_eq!(audio, b"custom:hi");
        assert_eq!(*provider.synthesized.lock().unwrap(), vec!["custom"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_render_falls_back_to_default_voice() -> Result<()> {
        let provider = Arc::new(MockVoiceProvider {
            broken_voices: vec!["custom".to_string()],
            ..Default::default()
        });
        let audio = renderer(provider.clone()).render("hi", Some("custom")).await?;
        assert_eq!(audio, b"default:hi");
        assert_eq!(*provider.synthesized.lock().unwrap(), vec!["custom", "default"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_render_double_failure_is_unavailable() {
        let provider = Arc::new(MockVoiceProvider {
            broken_voices: vec!["custom".to_string(), "default".to_string()],
            ..Default::default()
        });
        let err = renderer(provider).render("hi", Some("custom")).await.unwrap_err();
        assert!(err.downcast_ref::<SpeechUnavailable>().is_some());
    }

    #[tokio::test]
    async fn test_render_default_voice_is_not_retried() {
        let provider = Arc::new(MockVoiceProvider {
            broken_voices: vec!["default".to_string()],
            ..Default::default()
        });
        let err = renderer(provider.clone()).render("hi", Some("  ")).await.unwrap_err();
        assert!(err.downcast_ref::<SpeechUnavailable>().is_some());
        assert_eq!(provider.synthesized.lock().unwrap().len(), 1);
    }
}
