//! The photo-to-character pipeline.
//!
//! Stages run strictly in sequence: identify, optionally disambiguate, research,
//! synthesize a persona, then provision a voice. Stages after identification
//! always produce output, degrading to defaults on failure.

use crate::core::config::Config;
use crate::core::state::{
    recent_window, CharacterProfile, ConversationMessage, MessageRole, PipelineResult,
};
use crate::services::character::{CharacterSynthesizer, MAX_TRAITS};
use crate::services::disambiguate::{needs_disambiguation, Disambiguator};
use crate::services::fallback::ModelFallbackExecutor;
use crate::services::identify::{EntityIdentifier, UNKNOWN_ENTITY};
use crate::services::label::normalize_entity_label;
use crate::services::llm::{Content, GenerateOptions, GenerativeClient, Role};
use crate::services::prompts::chat_system_prompt;
use crate::services::research::Researcher;
use crate::services::voice::provisioner::VoiceProvisioner;
use anyhow::{bail, Result};
use log::{error, info, warn};
use std::sync::Arc;

pub const MYSTERY_NAME: &str = "Mystery Thing";

/// Description sent to the voice designer for a persona.
pub fn voice_design_description(profile: &CharacterProfile, entity: &str) -> String {
    let traits = profile
        .personality_traits
        .iter()
        .take(MAX_TRAITS)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{}. Character name: {}. Entity: {}. Speaking style: {}. Personality traits: {}. \
        The generated voice must strongly match the described gender presentation, accent/region, age, tone, pacing, and energy.",
        profile.voice_description.trim().trim_end_matches('.'),
        profile.name,
        entity,
        profile.speaking_style,
        traits
    )
}

/// The fixed persona returned when the pipeline cannot run at all.
pub fn fallback_result(default_voice_id: &str) -> PipelineResult {
    let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    PipelineResult {
        entity: MYSTERY_NAME.to_string(),
        greeting: "Hi! I'm a Mystery Thing! 🤔 Ask me anything!".to_string(),
        character_profile: CharacterProfile {
            name: MYSTERY_NAME.to_string(),
            backstory: "I'm a mystery! Nobody knows where I came from, but I love making new friends and learning about the world.".to_string(),
            personality_traits: strings(&["curious", "friendly", "silly", "adventurous", "kind"]),
            speaking_style: "Speaks with wonder and excitement, asks lots of questions back.".to_string(),
            voice_description: "A friendly, curious young voice full of energy and wonder".to_string(),
            fun_facts: strings(&[
                "I love surprises!",
                "Everything is an adventure!",
                "I make friends everywhere I go!",
            ]),
            research_summary: String::new(),
            canonical_facts: Vec::new(),
            source_urls: Vec::new(),
        },
        voice_id: default_voice_id.to_string(),
        research_model: None,
        personification_model: None,
    }
}

#[derive(Debug, Clone)]
pub struct CharacterPipeline {
    identifier: EntityIdentifier,
    disambiguator: Disambiguator,
    researcher: Researcher,
    synthesizer: CharacterSynthesizer,
    provisioner: Arc<VoiceProvisioner>,
    executor: ModelFallbackExecutor,
    chat_models: Vec<String>,
    default_voice_id: String,
}

impl CharacterPipeline {
    pub fn new(config: &Config, client: Arc<dyn GenerativeClient>, provisioner: Arc<VoiceProvisioner>) -> Self {
        let llm = &config.llm;
        let executor = ModelFallbackExecutor::new(client, llm.model_fallbacks());
        let main_model = vec![llm.model.clone()];
        let grounded = llm.enable_google_search;

        Self {
            identifier: EntityIdentifier::new(executor.clone(), main_model.clone(), grounded),
            disambiguator: Disambiguator::new(executor.clone(), main_model.clone(), grounded),
            researcher: Researcher::new(executor.clone(), vec![llm.research_model.clone()], grounded),
            synthesizer: CharacterSynthesizer::new(executor.clone(), main_model.clone()),
            provisioner,
            executor,
            chat_models: main_model,
            default_voice_id: config.voice.default_voice_id.clone(),
        }
    }

    pub fn default_voice_id(&self) -> &str {
        &self.default_voice_id
    }

    /// Identifies the subject of an image, disambiguating once when the first pass is unsure.
    pub async fn resolve_entity(&self, image: &[u8], mime_type: &str) -> Result<String> {
        let identification = self.identifier.identify(image, mime_type).await?;
        let mut entity = identification.entity.clone();

        if needs_disambiguation(&identification) {
            match self.disambiguator.disambiguate(image, mime_type, &identification).await {
                Ok(Some(picked)) => entity = picked,
                Ok(None) => {}
                Err(e) => warn!("Disambiguation failed ({:#}). Keeping '{}'.", e, entity),
            }
        }

        let entity = normalize_entity_label(&entity);
        Ok(if entity.is_empty() { UNKNOWN_ENTITY.to_string() } else { entity })
    }

    pub async fn identify_from_image(&self, image: &[u8], mime_type: &str) -> Result<PipelineResult> {
        let entity = self.resolve_entity(image, mime_type).await?;
        Ok(self.build_character(&entity).await)
    }

    /// Rebuilds a character for a user-corrected entity name.
    pub async fn recharacterize(&self, entity_name: &str) -> Result<PipelineResult> {
        let entity = normalize_entity_label(entity_name);
        if entity.is_empty() {
            bail!("Entity name is empty");
        }
        info!("Recharacterizing as '{}'", entity);
        Ok(self.build_character(&entity).await)
    }

    /// Like [`identify_from_image`](Self::identify_from_image), but any failure yields the fallback persona.
    pub async fn identify_or_fallback(&self, image: &[u8], mime_type: &str) -> PipelineResult {
        match self.identify_from_image(image, mime_type).await {
            Ok(result) => result,
            Err(e) => {
                error!("Identify pipeline failed; returning fallback character: {:#}", e);
                fallback_result(&self.default_voice_id)
            }
        }
    }

    pub async fn recharacterize_or_fallback(&self, entity_name: &str) -> PipelineResult {
        match self.recharacterize(entity_name).await {
            Ok(result) => result,
            Err(e) => {
                error!("Recharacterize pipeline failed; returning fallback character: {:#}", e);
                fallback_result(&self.default_voice_id)
            }
        }
    }

    /// Research, persona and voice for a resolved entity. Never fails.
    pub async fn build_character(&self, entity: &str) -> PipelineResult {
        let research = self.researcher.research(entity).await;
        let draft = self.synthesizer.synthesize(entity, &research).await;

        let description = voice_design_description(&draft.profile, entity);
        let voice_id = match self.provisioner.provision_voice(&description, &draft.greeting).await {
            Ok(voice_id) if !voice_id.trim().is_empty() => voice_id,
            Ok(_) => {
                warn!("Voice design returned an empty id. Using default voice.");
                self.default_voice_id.clone()
            }
            Err(e) => {
                warn!("Voice design failed ({:#}). Using default voice.", e);
                self.default_voice_id.clone()
            }
        };

        PipelineResult {
            entity: entity.to_string(),
            greeting: draft.greeting,
            character_profile: draft.profile,
            voice_id,
            research_model: research.model,
            personification_model: draft.model,
        }
    }

    /// One chat turn in character. Only the most recent messages are sent.
    pub async fn chat(&self, profile: &CharacterProfile, history: &[ConversationMessage]) -> Result<String> {
        if history.is_empty() {
            bail!("Conversation history is empty");
        }

        let contents = recent_window(history)
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    MessageRole::User => Role::User,
                    MessageRole::Assistant => Role::Model,
                };
                Content::text(role, msg.text.clone())
            })
            .collect();

        let generation = self
            .executor
            .generate(
                contents,
                GenerateOptions::with_system_instruction(chat_system_prompt(profile)),
                &self.chat_models,
                false,
            )
            .await?;
        Ok(generation.text().trim().to_string())
    }
}
