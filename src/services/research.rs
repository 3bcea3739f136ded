use crate::core::state::MAX_SOURCE_URLS;
use crate::services::fallback::ModelFallbackExecutor;
use crate::services::llm::{Content, GenerateOptions, Role};
use crate::services::parse::{get_string, get_string_list, parse_model_json, ModelJson};
use crate::services::prompts::research_prompt;
use log::{info, warn};
use url::Url;

pub const MAX_CANONICAL_FACTS: usize = 8;

/// Grounded facts about an entity, folded verbatim into the persona.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResearchBrief {
    pub summary: String,
    pub canonical_facts: Vec<String>,
    pub source_urls: Vec<String>,
    /// Model that produced the brief; `None` for a degraded brief.
    pub model: Option<String>,
}

impl ResearchBrief {
    /// Minimal brief used when research could not be performed.
    pub fn degraded(entity: &str) -> Self {
        Self {
            summary: generic_summary(entity),
            canonical_facts: generic_facts(entity),
            source_urls: Vec::new(),
            model: None,
        }
    }
}

pub fn generic_summary(entity: &str) -> String {
    format!("{} is a fascinating subject with its own story to tell.", entity)
}

pub fn generic_facts(entity: &str) -> Vec<String> {
    vec![
        format!("{} is the subject of this character.", entity),
        format!("{} has interesting details worth exploring.", entity),
    ]
}

fn http_url(candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    match Url::parse(candidate) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(candidate.to_string()),
        _ => None,
    }
}

/// Grounding citations first, then any distinct model-claimed URLs.
pub fn merge_source_urls(grounding: &[String], claimed: &[String]) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for url in grounding.iter().chain(claimed.iter()).filter_map(|u| http_url(u)) {
        if urls.len() == MAX_SOURCE_URLS {
            break;
        }
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

/// Reads either the JSON brief or a legacy free-text brief.
pub fn parse_research(entity: &str, text: &str, grounding_urls: &[String]) -> ResearchBrief {
    let (summary, mut canonical_facts, claimed) = match parse_model_json(text) {
        ModelJson::Structured(map) | ModelJson::Partial(map) => (
            get_string(&map, "research_summary").unwrap_or_default(),
            get_string_list(&map, "canonical_facts"),
            get_string_list(&map, "source_urls"),
        ),
        ModelJson::TextFallback(raw) => (raw, Vec::new(), Vec::new()),
    };
    canonical_facts.truncate(MAX_CANONICAL_FACTS);

    ResearchBrief {
        summary: if summary.is_empty() { generic_summary(entity) } else { summary },
        canonical_facts,
        source_urls: merge_source_urls(grounding_urls, &claimed),
        model: None,
    }
}

#[derive(Debug, Clone)]
pub struct Researcher {
    executor: ModelFallbackExecutor,
    preferred_models: Vec<String>,
    use_google_search: bool,
}

impl Researcher {
    pub fn new(executor: ModelFallbackExecutor, preferred_models: Vec<String>, use_google_search: bool) -> Self {
        Self {
            executor,
            preferred_models,
            use_google_search,
        }
    }

    /// Never fails: any error degrades to a generic brief.
    pub async fn research(&self, entity: &str) -> ResearchBrief {
        let result = self
            .executor
            .generate(
                vec![Content::text(Role::User, research_prompt(entity))],
                GenerateOptions::default(),
                &self.preferred_models,
                self.use_google_search,
            )
            .await;

        match result {
            Ok(generation) => {
                let mut brief = parse_research(entity, generation.text(), &generation.response.grounding_urls);
                info!(
                    "Research for '{}': {} facts, {} sources via {}",
                    entity,
                    brief.canonical_facts.len(),
                    brief.source_urls.len(),
                    generation.model
                );
                brief.model = Some(generation.model);
                brief
            }
            Err(e) => {
                warn!("Research step failed for '{}': {:#}. Using a generic brief.", entity, e);
                ResearchBrief::degraded(entity)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fallback::tests::{Outcome, ScriptedClient};
    use std::sync::Arc;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_json_brief() {
        let facts: Vec<String> = (1..=10).map(|i| format!("\"fact {}\"", i)).collect();
        let reply = format!(
            r#"{{"research_summary": "A copper statue.", "canonical_facts": [{}],
                "source_urls": ["https://www.nps.gov/stli", "ftp://nope", "not a url", "https://example.org/a"]}}"#,
            facts.join(",")
        );

        let brief = parse_research("Statue of Liberty", &reply, &strings(&["https://www.nps.gov/stli"]));
        assert_eq!(brief.summary, "A copper statue.");
        assert_eq!(brief.canonical_facts.len(), MAX_CANONICAL_FACTS);
        assert_eq!(brief.canonical_facts[0], "fact 1");
        assert_eq!(
            brief.source_urls,
            strings(&["https://www.nps.gov/stli", "https://example.org/a"])
        );
    }

    #[test]
    fn test_free_text_brief() {
        let brief = parse_research(
            "Eiffel Tower",
            "  The Eiffel Tower was finished in 1889.\n\nIt is made of wrought iron.  ",
            &strings(&["https://a.example/1"]),
        );
        assert!(brief.summary.starts_with("The Eiffel Tower was finished in 1889."));
        assert!(brief.canonical_facts.is_empty());
        assert_eq!(brief.source_urls, strings(&["https://a.example/1"]));
    }

    #[test]
    fn test_source_urls_prefer_grounding_and_cap() {
        let grounding: Vec<String> = (0..6).map(|i| format!("https://g.example/{}", i)).collect();
        let claimed: Vec<String> = (0..6).map(|i| format!("https://c.example/{}", i)).collect();
        let mut with_dupes = grounding.clone();
        with_dupes.push(grounding[0].clone());

        let urls = merge_source_urls(&with_dupes, &claimed);
        assert_eq!(urls.len(), MAX_SOURCE_URLS);
        assert_eq!(&urls[..6], &grounding[..]);
        assert_eq!(urls[6], "https://c.example/0");
    }

    #[tokio::test]
    async fn test_research_prefers_research_model() {
        let client = Arc::new(
            ScriptedClient::default().on("research", true, Outcome::Reply(r#"{"research_summary":"Brief"}"#)),
        );
        let executor = ModelFallbackExecutor::new(client.clone(), strings(&["main"]));
        let researcher = Researcher::new(executor, strings(&["research"]), true);

        let brief = researcher.research("Mona Lisa").await;
        assert_eq!(brief.summary, "Brief");
        assert_eq!(brief.model.as_deref(), Some("research"));
        assert_eq!(client.calls()[0], ("research".to_string(), true));
    }

    #[tokio::test]
    async fn test_research_failure_degrades() {
        let client = Arc::new(ScriptedClient::with_default(Outcome::ServerError));
        let executor = ModelFallbackExecutor::new(client, strings(&["main"]));
        let researcher = Researcher::new(executor, vec![], true);

        let brief = researcher.research("Mona Lisa").await;
        assert_eq!(brief, ResearchBrief::degraded("Mona Lisa"));
        assert!(brief.summary.contains("Mona Lisa"));
        assert_eq!(brief.canonical_facts.len(), 2);
        assert!(brief.model.is_none());
    }
}
