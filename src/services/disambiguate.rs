use crate::core::state::{IdentificationResult, Specificity};
use crate::services::fallback::ModelFallbackExecutor;
use crate::services::identify::UNKNOWN_ENTITY;
use crate::services::label::{normalize_entity_label, strip_markup};
use crate::services::llm::{Content, GenerateOptions};
use crate::services::prompts::disambiguate_prompt;
use anyhow::Result;
use log::info;

pub const CONFIDENCE_THRESHOLD: f32 = 0.75;
pub const MAX_CANDIDATES: usize = 6;

/// A second look is only worth it when there is something to choose between
/// and the first pass was not already certain.
pub fn needs_disambiguation(result: &IdentificationResult) -> bool {
    !result.alternatives.is_empty()
        && (result.specificity != Specificity::Exact || result.confidence < CONFIDENCE_THRESHOLD)
}

/// Primary entity followed by the alternatives, deduplicated and capped.
pub fn candidate_labels(result: &IdentificationResult) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();
    for label in std::iter::once(&result.entity).chain(result.alternatives.iter()) {
        if label.is_empty() || label == UNKNOWN_ENTITY || candidates.contains(label) {
            continue;
        }
        candidates.push(label.clone());
        if candidates.len() == MAX_CANDIDATES {
            break;
        }
    }
    candidates
}

#[derive(Debug, Clone)]
pub struct Disambiguator {
    executor: ModelFallbackExecutor,
    preferred_models: Vec<String>,
    use_google_search: bool,
}

impl Disambiguator {
    pub fn new(executor: ModelFallbackExecutor, preferred_models: Vec<String>, use_google_search: bool) -> Self {
        Self {
            executor,
            preferred_models,
            use_google_search,
        }
    }

    /// Asks the model to pick among the candidates. `None` when there is nothing
    /// to ask about or the reply is empty after normalization.
    pub async fn disambiguate(
        &self,
        image: &[u8],
        mime_type: &str,
        result: &IdentificationResult,
    ) -> Result<Option<String>> {
        let candidates = candidate_labels(result);
        if candidates.is_empty() {
            return Ok(None);
        }

        let generation = self
            .executor
            .generate(
                vec![Content::image_prompt(disambiguate_prompt(&candidates), mime_type, image)],
                GenerateOptions::default(),
                &self.preferred_models,
                self.use_google_search,
            )
            .await?;

        // Some models answer with a whole paragraph; the name is on the first line.
        let first_line = generation.text().lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        let picked = normalize_entity_label(&strip_markup(first_line));
        if picked.is_empty() {
            return Ok(None);
        }

        info!("Disambiguated {:?} -> '{}' via {}", candidates, picked, generation.model);
        Ok(Some(picked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fallback::tests::{Outcome, ScriptedClient};
    use std::sync::Arc;

    fn result(entity: &str, alternatives: &[&str], specificity: Specificity, confidence: f32) -> IdentificationResult {
        IdentificationResult {
            entity: entity.to_string(),
            alternatives: alternatives.iter().map(|a| a.to_string()).collect(),
            specificity,
            confidence,
        }
    }

    #[test]
    fn test_trigger_conditions() {
        assert!(!needs_disambiguation(&result("Statue of Liberty", &[], Specificity::Exact, 0.9)));
        assert!(!needs_disambiguation(&result("Statue of Liberty", &[], Specificity::Generic, 0.1)));
        assert!(!needs_disambiguation(&result("Eiffel Tower", &["Tokyo Tower"], Specificity::Exact, 0.75)));
        assert!(needs_disambiguation(&result("Eiffel Tower", &["Tokyo Tower"], Specificity::Exact, 0.74)));
        assert!(needs_disambiguation(&result("Tower", &["Eiffel Tower"], Specificity::Specific, 0.99)));
        assert!(needs_disambiguation(&result("Tower", &["Eiffel Tower"], Specificity::Unknown, 0.0)));
    }

    #[test]
    fn test_candidates_are_deduplicated_and_capped() {
        let r = result("a", &["b", "a", "c", "d", "e", "f", "g"], Specificity::Generic, 0.2);
        assert_eq!(candidate_labels(&r), vec!["a", "b", "c", "d", "e", "f"]);

        let r = result(UNKNOWN_ENTITY, &["Cat"], Specificity::Unknown, 0.0);
        assert_eq!(candidate_labels(&r), vec!["Cat"]);
    }

    #[tokio::test]
    async fn test_disambiguate_normalizes_reply() -> Result<()> {
        let client = Arc::new(ScriptedClient::with_default(Outcome::Reply(
            "\"bronze statue of Abraham Lincoln.\"\nIt has a beard.",
        )));
        let executor = ModelFallbackExecutor::new(client.clone(), vec!["m".to_string()]);
        let disambiguator = Disambiguator::new(executor, vec![], false);

        let picked = disambiguator
            .disambiguate(&[1], "image/png", &result("statue", &["Abraham Lincoln"], Specificity::Generic, 0.4))
            .await?;
        // "statue" is not a depiction prefix; the reply is kept as a name.
        assert_eq!(picked.as_deref(), Some("bronze statue of Abraham Lincoln"));
        assert_eq!(client.calls(), vec![("m".to_string(), false)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_blank_reply_keeps_nothing() -> Result<()> {
        let client = Arc::new(ScriptedClient::with_default(Outcome::Reply("  \"\"  ")));
        let executor = ModelFallbackExecutor::new(client, vec!["m".to_string()]);
        let disambiguator = Disambiguator::new(executor, vec![], true);

        let picked = disambiguator
            .disambiguate(&[1], "image/png", &result("Tower", &["Eiffel Tower"], Specificity::Generic, 0.4))
            .await?;
        assert_eq!(picked, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_markdown_reply_is_unwrapped() -> Result<()> {
        let r = result("Tower", &["Eiffel Tower", "Tokyo Tower"], Specificity::Generic, 0.4);
        for reply in ["**Eiffel Tower**", "1. Eiffel Tower", "- *Eiffel Tower*\nThe iron lattice gives it away."] {
            let client = Arc::new(ScriptedClient::with_default(Outcome::Reply(reply)));
            let executor = ModelFallbackExecutor::new(client, vec!["m".to_string()]);
            let disambiguator = Disambiguator::new(executor, vec![], false);

            let picked = disambiguator.disambiguate(&[1], "image/png", &r).await?;
            assert_eq!(picked.as_deref(), Some("Eiffel Tower"), "reply {:?}", reply);
        }
        Ok(())
    }
}
