use crate::core::state::{IdentificationResult, Specificity};
use crate::services::fallback::ModelFallbackExecutor;
use crate::services::label::normalize_entity_label;
use crate::services::llm::{Content, GenerateOptions};
use crate::services::parse::{get_number, get_string, get_string_list, parse_model_json, ModelJson};
use crate::services::prompts::IDENTIFY_PROMPT;
use anyhow::Result;
use log::{info, warn};

/// Entity used when the model gives no usable label.
pub const UNKNOWN_ENTITY: &str = "Unknown object";

/// Reads an identification reply. Never fails: unparseable replies are treated as a bare label.
pub fn parse_identification(text: &str) -> IdentificationResult {
    let mut result = match parse_model_json(text) {
        ModelJson::Structured(map) | ModelJson::Partial(map) => {
            let mut alternatives: Vec<String> = Vec::new();
            for label in get_string_list(&map, "alternatives")
                .iter()
                .map(|a| normalize_entity_label(a))
            {
                if !label.is_empty() && !alternatives.contains(&label) {
                    alternatives.push(label);
                }
            }

            let confidence = get_number(&map, "confidence")
                .filter(|c| c.is_finite())
                .map(|c| c.clamp(0.0, 1.0) as f32)
                .unwrap_or(0.0);

            IdentificationResult {
                entity: normalize_entity_label(&get_string(&map, "entity").unwrap_or_default()),
                alternatives,
                specificity: Specificity::parse(&get_string(&map, "specificity").unwrap_or_default()),
                confidence,
            }
        }
        ModelJson::TextFallback(raw) => {
            warn!("Identification reply was not JSON; using the raw text as the entity label");
            IdentificationResult {
                entity: normalize_entity_label(&raw),
                ..Default::default()
            }
        }
    };

    if result.entity.is_empty() {
        result.entity = UNKNOWN_ENTITY.to_string();
    }
    result
}

#[derive(Debug, Clone)]
pub struct EntityIdentifier {
    executor: ModelFallbackExecutor,
    preferred_models: Vec<String>,
    use_google_search: bool,
}

impl EntityIdentifier {
    pub fn new(executor: ModelFallbackExecutor, preferred_models: Vec<String>, use_google_search: bool) -> Self {
        Self {
            executor,
            preferred_models,
            use_google_search,
        }
    }

    pub async fn identify(&self, image: &[u8], mime_type: &str) -> Result<IdentificationResult> {
        let generation = self
            .executor
            .generate(
                vec![Content::image_prompt(IDENTIFY_PROMPT, mime_type, image)],
                GenerateOptions::default(),
                &self.preferred_models,
                self.use_google_search,
            )
            .await?;

        let result = parse_identification(generation.text());
        info!(
            "Identified '{}' (specificity={}, confidence={:.2}, alternatives={:?}) via {}",
            result.entity,
            result.specificity.as_str(),
            result.confidence,
            result.alternatives,
            generation.model
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fallback::tests::{Outcome, ScriptedClient};
    use std::sync::Arc;

    #[test]
    fn test_parse_structured_identification() {
        let result = parse_identification(
            r#"```json
            {"entity": "marble bust of Abraham Lincoln at the Capitol", "entity_type": "artwork",
             "specificity": "Specific", "confidence": "0.6",
             "alternatives": ["Abraham Lincoln", "'George Washington'.", "", "bust of Abraham Lincoln", 7]}
            ```"#,
        );

        assert_eq!(result.entity, "Abraham Lincoln");
        assert_eq!(result.alternatives, vec!["Abraham Lincoln", "George Washington"]);
        assert_eq!(result.specificity, Specificity::Specific);
        assert!((result.confidence - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_parse_plain_text_identification() {
        let result = parse_identification("\"Golden Retriever.\"");
        assert_eq!(result.entity, "Golden Retriever");
        assert!(result.alternatives.is_empty());
        assert_eq!(result.specificity, Specificity::Unknown);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_parse_clamps_confidence_and_fills_unknown() {
        let result = parse_identification(r#"{"entity": " ", "confidence": 7, "alternatives": "x"}"#);
        assert_eq!(result.entity, UNKNOWN_ENTITY);
        assert_eq!(result.confidence, 1.0);
        assert!(result.alternatives.is_empty());

        let result = parse_identification(r#"{"entity": "Cat", "confidence": "very"}"#);
        assert_eq!(result.confidence, 0.0);

        assert_eq!(parse_identification("   ").entity, UNKNOWN_ENTITY);
    }

    #[tokio::test]
    async fn test_identify_uses_grounding_and_image() -> Result<()> {
        let client = Arc::new(ScriptedClient::with_default(Outcome::Reply(
            r#"{"entity":"Statue of Liberty","specificity":"exact","confidence":0.9,"alternatives":[]}"#,
        )));
        let executor = ModelFallbackExecutor::new(client.clone(), vec!["m".to_string()]);
        let identifier = EntityIdentifier::new(executor, vec![], true);

        let result = identifier.identify(&[0xFF, 0xD8], "image/jpeg").await?;
        assert_eq!(result.entity, "Statue of Liberty");
        assert_eq!(result.specificity, Specificity::Exact);
        assert_eq!(client.calls(), vec![("m".to_string(), true)]);
        Ok(())
    }
}
