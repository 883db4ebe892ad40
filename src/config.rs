use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_token")]
    pub token: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token: default_token(),
        }
    }
}

fn default_token() -> String {
    "test".to_string()
}

impl AuthConfig {
    /// Effective bearer token: the `RAG_API_TOKEN` environment variable wins
    /// over the config file.
    pub fn resolve_token(&self) -> String {
        std::env::var("RAG_API_TOKEN").unwrap_or_else(|_| self.token.clone())
    }

    pub fn is_default_token(token: &str) -> bool {
        token == default_token()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_seeds")]
    pub seeds: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            seeds: default_seeds(),
        }
    }
}

fn default_seeds() -> Vec<String> {
    vec![
        "This is a RAG MCP project. MCP server runs locally and forwards queries.".to_string(),
        "The RAG HTTP endpoint is deployed on Render and protected with Bearer token.".to_string(),
        "You can plug Gemini to generate final answers from retrieved context.".to_string(),
    ]
}

impl StoreConfig {
    /// Seed snippets for the store. An empty `seeds` list in the config file
    /// falls back to the stock snippets so the store is never empty.
    pub fn effective_seeds(&self) -> Vec<String> {
        if self.seeds.is_empty() {
            default_seeds()
        } else {
            self.seeds.clone()
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_primary_model")]
    pub primary_model: String,
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            primary_model: default_primary_model(),
            fallback_model: default_fallback_model(),
            timeout_secs: default_timeout_secs(),
            api_base: default_api_base(),
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_primary_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_fallback_model() -> String {
    "gemini-1.0-pro".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            base_url: default_proxy_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_proxy_base_url() -> String {
    "http://127.0.0.1:8080/rag".to_string()
}

impl ProxyConfig {
    /// Effective upstream URL: the `RAG_BASE_URL` environment variable wins
    /// over the config file.
    pub fn resolve_base_url(&self) -> String {
        std::env::var("RAG_BASE_URL").unwrap_or_else(|_| self.base_url.clone())
    }
}

/// Load configuration from `path`, or fall back to the built-in defaults
/// when no file exists there.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate server
    if config.server.bind.is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    // Validate generation
    if config.generation.timeout_secs < 1 {
        anyhow::bail!("generation.timeout_secs must be >= 1");
    }
    if config.generation.is_enabled() {
        if config.generation.primary_model.is_empty() {
            anyhow::bail!(
                "generation.primary_model must be specified when provider is '{}'",
                config.generation.provider
            );
        }
        if config.generation.api_base.is_empty() {
            anyhow::bail!("generation.api_base must not be empty");
        }
    }

    match config.generation.provider.as_str() {
        "disabled" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be gemini or disabled.",
            other
        ),
    }

    // Validate proxy
    if config.proxy.timeout_secs < 1 {
        anyhow::bail!("proxy.timeout_secs must be >= 1");
    }
    if config.proxy.base_url.is_empty() {
        anyhow::bail!("proxy.base_url must not be empty");
    }

    Ok(())
}
