use crate::core::error::provider_error;
use crate::services::llm::{Content, GenerateOptions, GenerateRequest, GenerateResponse, GenerativeClient};
use anyhow::{anyhow, Result};
use log::{debug, warn};
use std::collections::HashSet;
use std::sync::Arc;

/// Preferred models first, then the static fallbacks; blanks and repeats removed.
pub fn model_candidates(preferred: &[String], fallbacks: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    preferred
        .iter()
        .chain(fallbacks.iter())
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .filter(|m| seen.insert(m.to_string()))
        .map(|m| m.to_string())
        .collect()
}

/// A successful generation and the model that served it.
#[derive(Debug, Clone)]
pub struct Generation {
    pub response: GenerateResponse,
    pub model: String,
}

impl Generation {
    pub fn text(&self) -> &str {
        &self.response.text
    }
}

enum Sweep {
    Served(Generation),
    Exhausted(anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct ModelFallbackExecutor {
    client: Arc<dyn GenerativeClient>,
    fallbacks: Vec<String>,
}

impl ModelFallbackExecutor {
    pub fn new(client: Arc<dyn GenerativeClient>, fallbacks: Vec<String>) -> Self {
        Self { client, fallbacks }
    }

    /// Tries each candidate model in order. Models that are unavailable are skipped;
    /// any other failure is returned immediately. When every model fails with
    /// grounding enabled, the sweep is repeated once without the search tool.
    pub async fn generate(
        &self,
        contents: Vec<Content>,
        options: GenerateOptions,
        preferred_models: &[String],
        use_google_search: bool,
    ) -> Result<Generation> {
        let candidates = model_candidates(preferred_models, &self.fallbacks);
        if candidates.is_empty() {
            return Err(anyhow!("No model candidates configured"));
        }

        let mut request = GenerateRequest {
            contents,
            options,
            use_google_search,
        };

        let last_error = match self.sweep(&request, &candidates).await? {
            Sweep::Served(generation) => return Ok(generation),
            Sweep::Exhausted(err) => err,
        };

        if !use_google_search {
            return Err(last_error.context("No model candidates succeeded"));
        }

        warn!(
            "Google Search tool path failed ({:#}). Retrying without search tool.",
            last_error
        );
        request.use_google_search = false;
        match self.sweep(&request, &candidates).await? {
            Sweep::Served(generation) => Ok(generation),
            Sweep::Exhausted(err) => Err(err.context("No model candidates succeeded")),
        }
    }

    async fn sweep(&self, request: &GenerateRequest, candidates: &[String]) -> Result<Sweep> {
        let mut last_error = None;
        for model in candidates {
            match self.client.generate(model, request).await {
                Ok(response) => {
                    debug!("Model {} served the request", model);
                    return Ok(Sweep::Served(Generation {
                        response,
                        model: model.clone(),
                    }));
                }
                Err(err) => {
                    let unavailable = provider_error(&err).is_some_and(|e| e.is_model_unavailable());
                    if !unavailable {
                        return Err(err);
                    }
                    warn!("Model {} unavailable ({:#}). Trying next fallback.", model, err);
                    last_error = Some(err);
                }
            }
        }
        Ok(Sweep::Exhausted(
            last_error.unwrap_or_else(|| anyhow!("No model candidates configured")),
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::error::ProviderError;
    use crate::services::llm::Role;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy)]
    pub(crate) enum Outcome {
        Reply(&'static str),
        NotFound,
        ServerError,
    }

    /// Scripted generation client: outcomes per (model, grounding) with a default.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedClient {
        pub outcomes: HashMap<(String, bool), Outcome>,
        pub default: Option<Outcome>,
        pub calls: Mutex<Vec<(String, bool)>>,
    }

    impl ScriptedClient {
        pub fn with_default(outcome: Outcome) -> Self {
            Self {
                default: Some(outcome),
                ..Default::default()
            }
        }

        pub fn on(mut self, model: &str, grounded: bool, outcome: Outcome) -> Self {
            self.outcomes.insert((model.to_string(), grounded), outcome);
            self
        }

        pub fn calls(&self) -> Vec<(String, bool)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerativeClient for ScriptedClient {
        async fn generate(&self, model: &str, request: &GenerateRequest) -> Result<GenerateResponse> {
            let key = (model.to_string(), request.use_google_search);
            self.calls.lock().unwrap().push(key.clone());
            let outcome = self
                .outcomes
                .get(&key)
                .copied()
                .or(self.default)
                .unwrap_or(Outcome::NotFound);
            match outcome {
                Outcome::Reply(text) => Ok(GenerateResponse {
                    text: text.to_string(),
                    grounding_urls: vec![],
                }),
                Outcome::NotFound => Err(ProviderError::Status {
                    provider: "Gemini",
                    status: 404,
                    message: format!("models/{} is not found", model),
                }
                .into()),
                Outcome::ServerError => Err(ProviderError::Status {
                    provider: "Gemini",
                    status: 500,
                    message: "internal".to_string(),
                }
                .into()),
            }
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn executor(client: Arc<ScriptedClient>) -> ModelFallbackExecutor {
        ModelFallbackExecutor::new(client, strings(&["gemini-x", "a", "b"]))
    }

    fn prompt() -> Vec<Content> {
        vec![Content::text(Role::User, "hello")]
    }

    #[test]
    fn test_model_candidates_dedup_preserves_first_occurrence() {
        assert_eq!(
            model_candidates(&strings(&["gemini-x"]), &strings(&["gemini-x", "a", "b"])),
            strings(&["gemini-x", "a", "b"])
        );
        assert_eq!(
            model_candidates(&strings(&[" r ", "", "a"]), &strings(&["x", "a", "  ", "r"])),
            strings(&["r", "a", "x"])
        );
        assert!(model_candidates(&[], &[]).is_empty());
    }

    #[tokio::test]
    async fn test_advances_past_unavailable_model() -> Result<()> {
        let client = Arc::new(
            ScriptedClient::default()
                .on("gemini-x", false, Outcome::NotFound)
                .on("a", false, Outcome::Reply("from a")),
        );
        let gen = executor(client.clone())
            .generate(prompt(), GenerateOptions::default(), &[], false)
            .await?;

        assert_eq!(gen.text(), "from a");
        assert_eq!(gen.model, "a");
        assert_eq!(client.calls(), vec![("gemini-x".to_string(), false), ("a".to_string(), false)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_other_errors_fail_fast() {
        let client = Arc::new(
            ScriptedClient::default()
                .on("gemini-x", true, Outcome::ServerError)
                .on("a", true, Outcome::Reply("never")),
        );
        let err = executor(client.clone())
            .generate(prompt(), GenerateOptions::default(), &[], true)
            .await
            .unwrap_err();

        assert_eq!(provider_error(&err).and_then(|e| e.status()), Some(500));
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_retries_without_grounding_after_exhaustion() -> Result<()> {
        let client = Arc::new(
            ScriptedClient::default().on("b", false, Outcome::Reply("ungrounded")),
        );
        let gen = executor(client.clone())
            .generate(prompt(), GenerateOptions::default(), &strings(&["research"]), true)
            .await?;

        assert_eq!(gen.text(), "ungrounded");
        let calls = client.calls();
        assert_eq!(calls.len(), 8);
        assert!(calls[..4].iter().all(|(_, grounded)| *grounded));
        assert!(calls[4..].iter().all(|(_, grounded)| !*grounded));
        assert_eq!(calls[0].0, "research");
        Ok(())
    }

    #[tokio::test]
    async fn test_exhaustion_without_grounding_reports_no_candidates() {
        let client = Arc::new(ScriptedClient::with_default(Outcome::NotFound));
        let err = executor(client.clone())
            .generate(prompt(), GenerateOptions::default(), &[], false)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("No model candidates succeeded"));
        assert!(provider_error(&err).is_some_and(|e| e.is_model_unavailable()));
        assert_eq!(client.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_grounded_exhaustion_sweeps_twice_then_fails() {
        let client = Arc::new(ScriptedClient::with_default(Outcome::NotFound));
        let err = executor(client.clone())
            .generate(prompt(), GenerateOptions::default(), &[], true)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("No model candidates succeeded"));
        assert_eq!(client.calls().len(), 6);
    }

    #[tokio::test]
    async fn test_no_candidates_configured() {
        let client = Arc::new(ScriptedClient::with_default(Outcome::Reply("x")));
        let executor = ModelFallbackExecutor::new(client, vec![]);
        let err = executor
            .generate(prompt(), GenerateOptions::default(), &[], true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No model candidates configured"));
    }
}
