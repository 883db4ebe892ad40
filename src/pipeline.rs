use anyhow::Result;
use serde::Serialize;

use crate::auth::{AccessGuard, Unauthorized};
use crate::config::{AuthConfig, Config};
use crate::generation::{self, GeminiBackend};
use crate::prompt;
use crate::search;
use crate::store::SnippetStore;

/// Answer plus the context snippets it was generated from, in prompt order.
#[derive(Debug, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RetrievalResult {
    pub query: String,
    pub results: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct IngestReceipt {
    pub status: &'static str,
    pub count: usize,
}

/// Composes guard, store, retriever, and generation backend. Every entry
/// point authorizes before touching the store or the network.
pub struct RagPipeline {
    guard: AccessGuard,
    store: SnippetStore,
    backend: Option<GeminiBackend>,
    top_k: usize,
}

impl RagPipeline {
    pub fn new(config: &Config) -> Result<Self> {
        let token = config.auth.resolve_token();
        if AuthConfig::is_default_token(&token) {
            tracing::warn!(
                "auth token is the built-in default; set RAG_API_TOKEN or [auth] token \
                 before exposing this service"
            );
        }

        let backend = generation::create_backend(&config.generation)?;

        Ok(Self {
            guard: AccessGuard::new(&token),
            store: SnippetStore::new(config.store.effective_seeds()),
            backend,
            top_k: config.retrieval.top_k,
        })
    }

    /// Full pipeline: retrieve, prepend caller-supplied extra context, build
    /// the prompt, generate. Generation trouble never surfaces as an error;
    /// the degraded answer text carries it instead.
    pub async fn answer(
        &self,
        credential: Option<&str>,
        query: &str,
        extra_context: Option<&str>,
    ) -> Result<RagAnswer, Unauthorized> {
        self.guard.authorize(credential)?;

        let mut sources = search::retrieve(&self.store, query, self.top_k);
        if let Some(extra) = extra_context {
            if !extra.is_empty() {
                sources.insert(0, extra.to_string());
            }
        }

        let prompt = prompt::build_rag_prompt(query, &sources);
        let degraded = sources.first().cloned().unwrap_or_default();
        let outcome = match &self.backend {
            Some(backend) => backend.generate(&prompt, &degraded).await,
            None => generation::not_configured_outcome(&degraded),
        };

        if let Some(detail) = &outcome.error_detail {
            tracing::warn!(detail = %detail, "all generation attempts failed");
        } else if outcome.used_fallback {
            tracing::info!("answer produced on the fallback path");
        }

        Ok(RagAnswer {
            answer: outcome.answer,
            sources,
        })
    }

    pub fn retrieve_only(
        &self,
        credential: Option<&str>,
        query: &str,
    ) -> Result<RetrievalResult, Unauthorized> {
        self.guard.authorize(credential)?;

        let results = search::retrieve(&self.store, query, self.top_k);
        Ok(RetrievalResult {
            query: query.to_string(),
            results,
        })
    }

    /// Summarization reuses the generation backend without retrieval. The
    /// input text doubles as the degraded context when generation is down.
    pub async fn summarize(
        &self,
        credential: Option<&str>,
        text: &str,
    ) -> Result<Summary, Unauthorized> {
        self.guard.authorize(credential)?;

        let prompt = prompt::build_summary_prompt(text);
        let outcome = match &self.backend {
            Some(backend) => backend.generate(&prompt, text).await,
            None => generation::not_configured_outcome(text),
        };

        Ok(Summary {
            summary: outcome.answer,
        })
    }

    pub fn ingest(
        &self,
        credential: Option<&str>,
        text: &str,
    ) -> Result<IngestReceipt, Unauthorized> {
        self.guard.authorize(credential)?;

        let count = self.store.append(text.to_string());
        tracing::debug!(count, "snippet ingested");
        Ok(IngestReceipt {
            status: "ok",
            count,
        })
    }

    pub fn snippet_count(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn disabled_pipeline(seeds: &[&str]) -> RagPipeline {
        let mut config = Config::default();
        config.auth.token = "secret".to_string();
        config.generation.provider = "disabled".to_string();
        config.store.seeds = seeds.iter().map(|s| s.to_string()).collect();
        RagPipeline::new(&config).unwrap()
    }

    const AUTH: Option<&str> = Some("Bearer secret");

    #[tokio::test]
    async fn test_answer_requires_credential() {
        let pipeline = disabled_pipeline(&["alpha"]);
        assert!(pipeline.answer(None, "q", None).await.is_err());
        assert!(pipeline
            .answer(Some("Bearer wrong"), "q", None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_answer_without_backend_names_best_match() {
        let pipeline = disabled_pipeline(&["alpha doc about cats", "beta doc about dogs"]);
        let result = pipeline.answer(AUTH, "dogs", None).await.unwrap();
        assert_eq!(
            result.answer,
            "(LLM not configured) best match: beta doc about dogs"
        );
        assert_eq!(result.sources, vec!["beta doc about dogs"]);
    }

    #[tokio::test]
    async fn test_extra_context_lands_first_in_sources() {
        let pipeline = disabled_pipeline(&["alpha doc about cats"]);
        let result = pipeline
            .answer(AUTH, "cats", Some("caller supplied context"))
            .await
            .unwrap();
        assert_eq!(result.sources[0], "caller supplied context");
        assert_eq!(result.sources[1], "alpha doc about cats");
        assert_eq!(
            result.answer,
            "(LLM not configured) best match: caller supplied context"
        );
    }

    #[tokio::test]
    async fn test_empty_extra_context_is_ignored() {
        let pipeline = disabled_pipeline(&["alpha doc about cats"]);
        let result = pipeline.answer(AUTH, "cats", Some("")).await.unwrap();
        assert_eq!(result.sources, vec!["alpha doc about cats"]);
    }

    #[test]
    fn test_retrieve_only_reports_query_and_results() {
        let pipeline = disabled_pipeline(&["alpha doc", "beta doc"]);
        let result = pipeline.retrieve_only(AUTH, "beta").unwrap();
        assert_eq!(result.query, "beta");
        assert_eq!(result.results, vec!["beta doc"]);
    }

    #[test]
    fn test_retrieve_only_requires_credential() {
        let pipeline = disabled_pipeline(&["alpha"]);
        assert!(pipeline.retrieve_only(None, "q").is_err());
    }

    #[tokio::test]
    async fn test_summarize_without_backend_echoes_input_as_best_match() {
        let pipeline = disabled_pipeline(&["alpha"]);
        let result = pipeline.summarize(AUTH, "long text here").await.unwrap();
        assert_eq!(
            result.summary,
            "(LLM not configured) best match: long text here"
        );
    }

    #[test]
    fn test_ingest_appends_and_counts() {
        let pipeline = disabled_pipeline(&["alpha"]);
        let receipt = pipeline.ingest(AUTH, "new snippet").unwrap();
        assert_eq!(receipt.status, "ok");
        assert_eq!(receipt.count, 2);
        assert_eq!(pipeline.snippet_count(), 2);

        let found = pipeline.retrieve_only(AUTH, "snippet").unwrap();
        assert_eq!(found.results, vec!["new snippet"]);
    }

    #[test]
    fn test_ingest_requires_credential() {
        let pipeline = disabled_pipeline(&["alpha"]);
        assert!(pipeline.ingest(Some("Bearer nope"), "text").is_err());
        assert_eq!(pipeline.snippet_count(), 1);
    }

    #[test]
    fn test_empty_seed_list_falls_back_to_stock_snippets() {
        let pipeline = disabled_pipeline(&[]);
        assert_eq!(pipeline.snippet_count(), 3);
    }
}
