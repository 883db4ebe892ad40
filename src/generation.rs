//! Gemini generation backend with two-tier model fallback.
//!
//! Answer generation is resolved once at startup via [`create_backend`]:
//! callers hold an `Option<GeminiBackend>` and branch on presence instead of
//! probing the environment per request. When the backend is absent,
//! [`not_configured_outcome`] produces the placeholder answer without any
//! network traffic.
//!
//! # Fallback Strategy
//!
//! [`GeminiBackend::generate`] walks an ordered list of model identifiers
//! (primary first, then the fallback model):
//! - First successful call wins; `used_fallback` records whether any earlier
//!   attempt had already failed. Any success returns `error_detail: None`;
//!   earlier attempt errors are logged, not surfaced.
//! - When all attempts fail, the outcome's answer is a deterministic
//!   placeholder that embeds both error texts plus the best retrieved
//!   snippet, so callers can always return HTTP 200 with something useful
//!   in the body.
//!
//! Producing an outcome never fails. HTTP status errors, network errors,
//! and timeouts all collapse into the attempt's error text.

use anyhow::{bail, Context, Result};
use std::time::Duration;

use crate::config::GenerationConfig;

/// Result of one generation request.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    /// Generated answer, or the degraded placeholder when generation was
    /// unavailable or failed.
    pub answer: String,
    /// True when the answer did not come from a clean first-model success.
    pub used_fallback: bool,
    /// Combined attempt errors. Set only when every model failed.
    pub error_detail: Option<String>,
}

/// Client for the Gemini `generateContent` REST API.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    /// Models to try, in order. Never empty.
    models: Vec<String>,
}

/// Resolve the generation capability from configuration and environment.
///
/// Returns `Ok(None)` when generation is not available:
/// - `generation.provider = "disabled"` in the config, or
/// - neither `GEMINI_API_KEY` nor `GOOGLE_API_KEY` is set.
///
/// # Errors
///
/// Returns an error for unknown provider names or if the HTTP client
/// cannot be constructed.
pub fn create_backend(config: &GenerationConfig) -> Result<Option<GeminiBackend>> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        "gemini" => {
            let api_key = std::env::var("GEMINI_API_KEY")
                .or_else(|_| std::env::var("GOOGLE_API_KEY"))
                .ok()
                .filter(|key| !key.is_empty());

            match api_key {
                Some(key) => Ok(Some(GeminiBackend::new(config, key)?)),
                None => {
                    tracing::warn!(
                        "GEMINI_API_KEY/GOOGLE_API_KEY not set; generation disabled, \
                         answers will carry the best retrieved snippet"
                    );
                    Ok(None)
                }
            }
        }
        other => bail!("Unknown generation provider: {}", other),
    }
}

impl GeminiBackend {
    /// Create a backend with an explicit API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &GenerationConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let mut models = vec![config.primary_model.clone()];
        if !config.fallback_model.is_empty() && config.fallback_model != config.primary_model {
            models.push(config.fallback_model.clone());
        }

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            models,
        })
    }

    /// Generate an answer for `prompt`, trying each configured model in
    /// order. `degraded_context` is embedded in the placeholder answer when
    /// every attempt fails.
    pub async fn generate(&self, prompt: &str, degraded_context: &str) -> GenerationOutcome {
        let mut errors: Vec<String> = Vec::new();

        for (attempt, model) in self.models.iter().enumerate() {
            match self.call_model(model, prompt).await {
                Ok(answer) => {
                    return GenerationOutcome {
                        answer,
                        used_fallback: attempt > 0,
                        error_detail: None,
                    };
                }
                Err(e) => {
                    tracing::warn!(model = %model, error = %e, "generation attempt failed");
                    errors.push(e.to_string());
                }
            }
        }

        GenerationOutcome {
            answer: degraded_answer(&errors, degraded_context),
            used_fallback: true,
            error_detail: Some(errors.join("; ")),
        }
    }

    /// Call one model via `POST {api_base}/models/{model}:generateContent`.
    ///
    /// # Errors
    ///
    /// Non-2xx statuses, network failures, timeouts, and malformed response
    /// bodies all return errors; the caller accumulates them.
    async fn call_model(&self, model: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.api_base, model);

        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .with_context(|| format!("request to model '{}' failed", model))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response
            .json()
            .await
            .context("Invalid Gemini response: not JSON")?;
        parse_gemini_response(&json)
    }
}

/// Placeholder answer used when generation is configured but every model
/// attempt failed. The wording is part of the HTTP contract.
fn degraded_answer(errors: &[String], degraded_context: &str) -> String {
    match errors {
        [] => format!("(LLM error: no models configured) Context: {degraded_context}"),
        [only] => format!("(LLM error: {only}) Context: {degraded_context}"),
        [primary, fallback, ..] => {
            format!("(LLM error: {primary}; fallback error: {fallback}) Context: {degraded_context}")
        }
    }
}

/// Placeholder outcome used when no backend is configured at all. The
/// wording is part of the HTTP contract.
pub fn not_configured_outcome(degraded_context: &str) -> GenerationOutcome {
    GenerationOutcome {
        answer: format!("(LLM not configured) best match: {degraded_context}"),
        used_fallback: false,
        error_detail: None,
    }
}

/// Parse the `generateContent` response JSON.
///
/// Extracts `candidates[0].content.parts[].text` and joins the text parts.
fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            anyhow::anyhow!("Invalid Gemini response: missing candidates[0].content.parts")
        })?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("");

    if text.is_empty() {
        bail!("Invalid Gemini response: no text parts");
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_part() {
        let json = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "hello" }] } }]
        });
        assert_eq!(parse_gemini_response(&json).unwrap(), "hello");
    }

    #[test]
    fn test_parse_joins_multiple_parts() {
        let json = serde_json::json!({
            "candidates": [{ "content": { "parts": [
                { "text": "first " },
                { "text": "second" }
            ] } }]
        });
        assert_eq!(parse_gemini_response(&json).unwrap(), "first second");
    }

    #[test]
    fn test_parse_rejects_missing_candidates() {
        let json = serde_json::json!({ "error": { "message": "nope" } });
        assert!(parse_gemini_response(&json).is_err());
    }

    #[test]
    fn test_parse_rejects_empty_parts() {
        let json = serde_json::json!({
            "candidates": [{ "content": { "parts": [] } }]
        });
        assert!(parse_gemini_response(&json).is_err());
    }

    #[test]
    fn test_degraded_answer_embeds_both_errors() {
        let errors = vec!["primary down".to_string(), "fallback down".to_string()];
        assert_eq!(
            degraded_answer(&errors, "best snippet"),
            "(LLM error: primary down; fallback error: fallback down) Context: best snippet"
        );
    }

    #[test]
    fn test_degraded_answer_single_model() {
        let errors = vec!["primary down".to_string()];
        assert_eq!(
            degraded_answer(&errors, "ctx"),
            "(LLM error: primary down) Context: ctx"
        );
    }

    #[test]
    fn test_not_configured_outcome_wording() {
        let outcome = not_configured_outcome("top snippet");
        assert_eq!(outcome.answer, "(LLM not configured) best match: top snippet");
        assert!(!outcome.used_fallback);
        assert!(outcome.error_detail.is_none());
    }

    #[test]
    fn test_backend_skips_duplicate_fallback_model() {
        let config = GenerationConfig {
            primary_model: "m1".to_string(),
            fallback_model: "m1".to_string(),
            ..GenerationConfig::default()
        };
        let backend = GeminiBackend::new(&config, "key".to_string()).unwrap();
        assert_eq!(backend.models, vec!["m1"]);
    }

    #[test]
    fn test_backend_orders_primary_then_fallback() {
        let config = GenerationConfig::default();
        let backend = GeminiBackend::new(&config, "key".to_string()).unwrap();
        assert_eq!(backend.models, vec!["gemini-2.5-flash", "gemini-1.0-pro"]);
    }
}
