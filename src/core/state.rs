use serde::{Deserialize, Serialize};

/// Number of most recent conversation messages forwarded to chat generation.
pub const CHAT_HISTORY_WINDOW: usize = 10;

pub const VOICE_DESCRIPTION_MIN_CHARS: usize = 20;
pub const VOICE_DESCRIPTION_MAX_CHARS: usize = 1000;
pub const MAX_SOURCE_URLS: usize = 8;

const VOICE_DESCRIPTION_PADDING: &str = "A friendly, expressive voice.";

/// Caps a voice description at the provider's maximum and pads short ones.
pub fn clamp_voice_description(description: &str) -> String {
    let clamped: String = description.trim().chars().take(VOICE_DESCRIPTION_MAX_CHARS).collect();
    if clamped.chars().count() < VOICE_DESCRIPTION_MIN_CHARS {
        format!("{} {}", clamped, VOICE_DESCRIPTION_PADDING).trim().to_string()
    } else {
        clamped
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CharacterProfile {
    pub name: String,
    pub backstory: String,
    pub personality_traits: Vec<String>,
    pub speaking_style: String,
    pub voice_description: String,
    pub fun_facts: Vec<String>,
    #[serde(default)]
    pub research_summary: String,
    #[serde(default)]
    pub canonical_facts: Vec<String>,
    #[serde(default)]
    pub source_urls: Vec<String>,
}

/// How precisely the identifier pinned down the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Specificity {
    Exact,
    Specific,
    Generic,
    #[default]
    Unknown,
}

impl Specificity {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "exact" => Specificity::Exact,
            "specific" => Specificity::Specific,
            "generic" => Specificity::Generic,
            _ => Specificity::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Specificity::Exact => "exact",
            Specificity::Specific => "specific",
            Specificity::Generic => "generic",
            Specificity::Unknown => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct IdentificationResult {
    pub entity: String,
    pub alternatives: Vec<String>,
    pub specificity: Specificity,
    pub confidence: f32,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    #[serde(other)]
    Assistant,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub text: String,
}

/// The chronological tail of a conversation that is sent to the model.
pub fn recent_window(history: &[ConversationMessage]) -> &[ConversationMessage] {
    let start = history.len().saturating_sub(CHAT_HISTORY_WINDOW);
    &history[start..]
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PipelineResult {
    pub entity: String,
    pub greeting: String,
    pub character_profile: CharacterProfile,
    pub voice_id: String,
    #[serde(default)]
    pub research_model: Option<String>,
    #[serde(default)]
    pub personification_model: Option<String>,
}
