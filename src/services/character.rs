use crate::core::state::{clamp_voice_description, CharacterProfile};
use crate::services::fallback::ModelFallbackExecutor;
use crate::services::llm::{Content, GenerateOptions, Role};
use crate::services::parse::{get_string, get_string_list, parse_model_json};
use crate::services::prompts::character_prompt;
use crate::services::research::{generic_facts, ResearchBrief, MAX_CANONICAL_FACTS};
use log::{info, warn};
use serde_json::{Map, Value};

pub const MAX_TRAITS: usize = 5;
pub const MAX_FUN_FACTS: usize = 3;

const DEFAULT_TRAITS: [&str; MAX_TRAITS] = ["curious", "friendly", "cheerful", "helpful", "playful"];
const DEFAULT_SPEAKING_STYLE: &str =
    "Warm, simple and enthusiastic, like a friendly guide talking to a young explorer. Loves asking questions back.";
const DEFAULT_VOICE_DESCRIPTION: &str =
    "A warm, friendly adult voice with a neutral accent, speaking at a gentle, clear pace with cheerful, upbeat energy";

/// A persona plus the greeting it opens with.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterDraft {
    pub profile: CharacterProfile,
    pub greeting: String,
    /// Model that produced the persona; `None` when every field is a default.
    pub model: Option<String>,
}

fn list_or(values: Vec<String>, cap: usize, default: impl FnOnce() -> Vec<String>) -> Vec<String> {
    if values.is_empty() {
        default()
    } else {
        values.into_iter().take(cap).collect()
    }
}

fn default_fun_facts(entity: &str, research: &ResearchBrief) -> Vec<String> {
    if research.canonical_facts.is_empty() {
        vec![
            format!("People all over the world are curious about {}.", entity),
            format!("Every {} has a story if you look closely.", entity),
        ]
    } else {
        research.canonical_facts.iter().take(MAX_FUN_FACTS).cloned().collect()
    }
}

fn build_draft(entity: &str, fields: &Map<String, Value>, research: &ResearchBrief) -> CharacterDraft {
    let name = get_string(fields, "name").unwrap_or_else(|| entity.to_string());

    let backstory = get_string(fields, "backstory").unwrap_or_else(|| {
        format!(
            "Hello! I'm {}. I have been waiting for someone curious like you to come and say hello, and I have so many stories to share!",
            name
        )
    });

    let voice_description = clamp_voice_description(
        &get_string(fields, "voice_description").unwrap_or_else(|| DEFAULT_VOICE_DESCRIPTION.to_string()),
    );

    // Character-step facts restate the research; fall back to research, then to filler.
    let canonical_facts = list_or(get_string_list(fields, "canonical_facts"), MAX_CANONICAL_FACTS, || {
        if research.canonical_facts.is_empty() {
            generic_facts(entity)
        } else {
            research.canonical_facts.clone()
        }
    });

    let greeting = get_string(fields, "greeting")
        .unwrap_or_else(|| format!("Hi there! I'm {}! 👋 Want to hear my story?", name));

    CharacterDraft {
        profile: CharacterProfile {
            personality_traits: list_or(get_string_list(fields, "personality_traits"), MAX_TRAITS, || {
                DEFAULT_TRAITS.iter().map(|t| t.to_string()).collect()
            }),
            speaking_style: get_string(fields, "speaking_style")
                .unwrap_or_else(|| DEFAULT_SPEAKING_STYLE.to_string()),
            fun_facts: list_or(get_string_list(fields, "fun_facts"), MAX_FUN_FACTS, || {
                default_fun_facts(entity, research)
            }),
            research_summary: research.summary.clone(),
            source_urls: research.source_urls.clone(),
            name,
            backstory,
            voice_description,
            canonical_facts,
        },
        greeting,
        model: None,
    }
}

/// Persona built entirely from defaults.
pub fn default_character(entity: &str, research: &ResearchBrief) -> CharacterDraft {
    build_draft(entity, &Map::new(), research)
}

/// Reads a persona reply. Missing or malformed fields take entity-derived defaults;
/// `None` when the reply holds no JSON object at all.
pub fn parse_character(entity: &str, text: &str, research: &ResearchBrief) -> Option<CharacterDraft> {
    parse_model_json(text)
        .object()
        .map(|fields| build_draft(entity, fields, research))
}

#[derive(Debug, Clone)]
pub struct CharacterSynthesizer {
    executor: ModelFallbackExecutor,
    preferred_models: Vec<String>,
}

impl CharacterSynthesizer {
    pub fn new(executor: ModelFallbackExecutor, preferred_models: Vec<String>) -> Self {
        Self {
            executor,
            preferred_models,
        }
    }

    /// Never fails: a failed generation yields the default persona.
    pub async fn synthesize(&self, entity: &str, research: &ResearchBrief) -> CharacterDraft {
        let prompt = character_prompt(entity, &research.summary, &research.canonical_facts);
        let result = self
            .executor
            .generate(
                vec![Content::text(Role::User, prompt)],
                GenerateOptions::json(),
                &self.preferred_models,
                false,
            )
            .await;

        match result {
            Ok(generation) => match parse_character(entity, generation.text(), research) {
                Some(draft) => {
                    info!("Created character '{}' for '{}' via {}", draft.profile.name, entity, generation.model);
                    CharacterDraft {
                        model: Some(generation.model),
                        ..draft
                    }
                }
                None => {
                    warn!("Character reply for '{}' was not JSON. Using default persona.", entity);
                    default_character(entity, research)
                }
            },
            Err(e) => {
                warn!("Character step failed for '{}': {:#}. Using default persona.", entity, e);
                default_character(entity, research)
            }
        }
    }
}
