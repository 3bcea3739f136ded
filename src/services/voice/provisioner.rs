use super::cache::{cache_key, VoiceCache};
use super::{CatalogVoice, VoiceProvider};
use crate::core::error::provider_error;
use crate::core::state::clamp_voice_description;
use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_PREVIEW_TEXT: &str = "Hello there, young explorer!";
pub const MIN_PREVIEW_CHARS: usize = 100;
pub const MAX_PREVIEW_CHARS: usize = 1000;

const PREVIEW_PADDING: &str =
    "I am so happy to meet you. Come closer, and let's explore the wonderful world around us together!";

const FEMALE_WORDS: &[&str] = &[
    "female", "woman", "women", "girl", "lady", "feminine", "she", "her", "mother", "grandmother", "queen",
];
const MALE_WORDS: &[&str] = &[
    "male", "man", "men", "boy", "gentleman", "masculine", "he", "his", "father", "grandfather", "king",
];
const YOUNG_WORDS: &[&str] = &["young", "youthful", "child", "kid", "teen", "teenage", "boy", "girl"];
const OLD_WORDS: &[&str] = &[
    "old", "elderly", "ancient", "senior", "grandmother", "grandfather", "seventies", "eighties",
];
const MIDDLE_WORDS: &[&str] = &["middle", "adult", "mature", "forties", "fifties"];
const NARRATION_WORDS: &[&str] = &["narration", "narrator", "narrative", "storytelling", "story", "audiobook"];

const ACCENT_WEIGHT: f32 = 3.0;
const GENDER_WEIGHT: f32 = 4.0;
const AGE_WEIGHT: f32 = 2.0;
const NARRATION_WEIGHT: f32 = 1.5;

/// Pads short preview text so the provider has enough speech to design from.
pub fn clamp_preview_text(text: &str) -> String {
    let mut preview = text.trim().to_string();
    if preview.is_empty() {
        preview = DEFAULT_PREVIEW_TEXT.to_string();
    }
    while preview.chars().count() < MIN_PREVIEW_CHARS {
        preview.push(' ');
        preview.push_str(PREVIEW_PADDING);
    }
    preview.chars().take(MAX_PREVIEW_CHARS).collect()
}

fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(str::to_string)
        .collect()
}

fn mentions(words: &HashSet<String>, vocabulary: &[&str]) -> bool {
    vocabulary.iter().any(|w| words.contains(*w))
}

fn age_class(words: &HashSet<String>) -> Option<&'static str> {
    if mentions(words, OLD_WORDS) {
        Some("old")
    } else if mentions(words, MIDDLE_WORDS) {
        Some("middle")
    } else if mentions(words, YOUNG_WORDS) {
        Some("young")
    } else {
        None
    }
}

fn gender_class(words: &HashSet<String>) -> Option<&'static str> {
    match (mentions(words, FEMALE_WORDS), mentions(words, MALE_WORDS)) {
        (true, false) => Some("female"),
        (false, true) => Some("male"),
        _ => None,
    }
}

/// How well a catalog voice matches a voice description.
pub fn score_voice(description: &str, voice: &CatalogVoice) -> f32 {
    let wanted = tokens(description);
    let label = |key: &str| voice.labels.get(key).map(|v| tokens(v)).unwrap_or_default();

    let mut haystack = format!("{} {}", voice.name, voice.description.as_deref().unwrap_or(""));
    for value in voice.labels.values() {
        haystack.push(' ');
        haystack.push_str(value);
    }
    let mut score = wanted.intersection(&tokens(&haystack)).count() as f32;

    let accent = label("accent");
    if !accent.is_empty() && accent.iter().any(|t| wanted.contains(t)) {
        score += ACCENT_WEIGHT;
    }

    if let Some(gender) = gender_class(&wanted) {
        if gender_class(&label("gender")) == Some(gender) {
            score += GENDER_WEIGHT;
        }
    }

    if let Some(age) = age_class(&wanted) {
        if age_class(&label("age")) == Some(age) {
            score += AGE_WEIGHT;
        }
    }

    if mentions(&label("use_case"), NARRATION_WORDS) {
        score += NARRATION_WEIGHT;
    }

    score
}

/// Highest scoring voice; ties keep catalog order.
pub fn pick_catalog_voice<'a>(description: &str, voices: &'a [CatalogVoice]) -> Option<&'a CatalogVoice> {
    let mut best: Option<(&CatalogVoice, f32)> = None;
    for voice in voices.iter().filter(|v| !v.voice_id.is_empty()) {
        let score = score_voice(description, voice);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((voice, score));
        }
    }
    best.map(|(voice, _)| voice)
}

#[derive(Debug)]
pub struct VoiceProvisioner {
    provider: Arc<dyn VoiceProvider>,
    cache: VoiceCache,
}

impl VoiceProvisioner {
    pub fn new(provider: Arc<dyn VoiceProvider>, cache_capacity: usize) -> Self {
        Self {
            provider,
            cache: VoiceCache::new(cache_capacity),
        }
    }

    pub fn cache(&self) -> &VoiceCache {
        &self.cache
    }

    /// Returns a durable voice id for the description, designing one if needed.
    pub async fn provision_voice(&self, description: &str, preview_text: &str) -> Result<String> {
        let description = clamp_voice_description(description);
        let preview = clamp_preview_text(preview_text);
        let key = cache_key(&description, &preview);

        if let Some(voice_id) = self.cache.get(&key).await {
            debug!("Voice cache hit: {}", voice_id);
            return Ok(voice_id);
        }

        let generated = self.provider.create_previews(&description, &preview).await?;
        match self.provider.create_voice_from_preview(&description, &generated).await {
            Ok(voice_id) => {
                info!("Designed new voice {}", voice_id);
                self.cache.insert(key, voice_id.clone()).await;
                Ok(voice_id)
            }
            Err(e) if provider_error(&e).is_some_and(|p| p.is_capacity_limited()) => {
                warn!("Voice creation is capacity limited ({:#}). Picking a catalog voice.", e);
                self.pick_from_catalog(&description).await
            }
            Err(e) => Err(e),
        }
    }

    async fn pick_from_catalog(&self, description: &str) -> Result<String> {
        let voices = self.provider.list_voices().await?;
        let voice = pick_catalog_voice(description, &voices)
            .ok_or_else(|| anyhow!("Voice catalog is empty; no voice to fall back to"))?;
        info!("Using catalog voice {} ({})", voice.voice_id, voice.name);
        Ok(voice.voice_id.clone())
    }
}
