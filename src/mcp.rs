//! MCP stdio proxy for the RAG HTTP API.
//!
//! Exposes the remote RAG endpoint as MCP tools over stdio:
//!
//! * **`configure`** — stores the bearer token and endpoint URL for the
//!   session. Listed alone until the proxy is configured.
//! * **`rag_docs`** — forwards a query to the endpoint and reformats the
//!   JSON reply into readable text.
//!
//! The proxy starts configured when `RAG_API_TOKEN` is set in the
//! environment. Upstream trouble (bad status, timeout, network failure) is
//! rendered as tool error text; it never becomes a protocol fault.

use std::borrow::Cow;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use rmcp::model::*;
use rmcp::{transport::stdio, ErrorData as McpError, ServerHandler, ServiceExt};

use crate::config::{Config, ProxyConfig};

/// Upstream endpoint coordinates held for the life of the session.
#[derive(Debug, Clone)]
struct Upstream {
    token: String,
    base_url: String,
}

/// Result of one proxied query.
#[derive(Debug)]
pub enum ProxyOutcome {
    /// Upstream returned HTTP 200 with a JSON body.
    Success {
        message: String,
        query: String,
        data: serde_json::Value,
    },
    /// Upstream returned a bad status, timed out, or was unreachable.
    Failure {
        message: String,
        detail: Option<String>,
    },
}

/// MCP server proxying tool calls to a remote RAG endpoint.
///
/// Each session shares the same upstream state (everything is behind `Arc`),
/// so a `configure` call applies to the whole process.
#[derive(Clone)]
pub struct RagProxy {
    http: reqwest::Client,
    upstream: Arc<RwLock<Option<Upstream>>>,
    default_base_url: String,
}

impl RagProxy {
    /// Build the proxy from configuration. `RAG_API_TOKEN` in the
    /// environment pre-configures the session; otherwise the proxy starts
    /// unconfigured and only advertises the `configure` tool.
    pub fn new(config: &ProxyConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let default_base_url = config.resolve_base_url();
        let upstream = std::env::var("RAG_API_TOKEN")
            .ok()
            .filter(|token| !token.is_empty())
            .map(|token| Upstream {
                token,
                base_url: default_base_url.clone(),
            });

        if upstream.is_some() {
            tracing::info!(base_url = %default_base_url, "proxy pre-configured from environment");
        } else {
            tracing::info!("proxy starting unconfigured; waiting for the configure tool");
        }

        Ok(Self {
            http,
            upstream: Arc::new(RwLock::new(upstream)),
            default_base_url,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.upstream_snapshot().is_some()
    }

    /// Store upstream coordinates, replacing any previous configuration.
    pub fn configure(&self, token: &str, base_url: &str) {
        let mut upstream = self
            .upstream
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *upstream = Some(Upstream {
            token: token.to_string(),
            base_url: base_url.to_string(),
        });
    }

    fn upstream_snapshot(&self) -> Option<Upstream> {
        self.upstream
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Send one query to the configured upstream. Returns `None` when the
    /// proxy has not been configured yet.
    pub async fn query_upstream(&self, query: &str) -> Option<ProxyOutcome> {
        let upstream = self.upstream_snapshot()?;

        tracing::info!(query, "forwarding RAG query upstream");

        let response = self
            .http
            .post(&upstream.base_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", upstream.token))
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await;

        let outcome = match response {
            Ok(response) => {
                let status = response.status();
                if status == reqwest::StatusCode::OK {
                    match response.json::<serde_json::Value>().await {
                        Ok(data) => ProxyOutcome::Success {
                            message: "Query executed successfully".to_string(),
                            query: query.to_string(),
                            data,
                        },
                        Err(e) => ProxyOutcome::Failure {
                            message: format!("Unexpected error in RAG Docs query: {e}"),
                            detail: None,
                        },
                    }
                } else {
                    let body = response.text().await.unwrap_or_default();
                    ProxyOutcome::Failure {
                        message: format!("API error {}: {}", status.as_u16(), body),
                        detail: Some(format!(
                            "Error in RAG Docs call (status {})",
                            status.as_u16()
                        )),
                    }
                }
            }
            Err(e) if e.is_timeout() => ProxyOutcome::Failure {
                message: "Request timeout".to_string(),
                detail: Some("Timeout in RAG Docs service call".to_string()),
            },
            Err(e) => ProxyOutcome::Failure {
                message: format!("Unexpected error in RAG Docs query: {e}"),
                detail: None,
            },
        };

        if let ProxyOutcome::Failure { message, .. } = &outcome {
            tracing::warn!(message, "upstream query failed");
        }

        Some(outcome)
    }

    // ── Tool descriptors ─────────────────────────────────────────────────

    fn configure_tool(&self) -> Tool {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "api_token": {
                    "type": "string",
                    "description": "RAG API token for authentication",
                },
                "base_url": {
                    "type": "string",
                    "description": format!(
                        "Base URL for RAG API (optional, defaults to {})",
                        self.default_base_url
                    ),
                    "default": self.default_base_url,
                },
            },
            "required": ["api_token"],
        });

        Tool {
            name: Cow::Borrowed("configure"),
            title: None,
            description: Some(Cow::Borrowed(
                "Configure RAG tools with API token and base URL",
            )),
            input_schema: schema_map(schema),
            output_schema: None,
            annotations: None,
            execution: None,
            icons: None,
            meta: None,
        }
    }

    fn rag_docs_tool(&self) -> Tool {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The question to ask the RAG system",
                },
            },
            "required": ["query"],
        });

        Tool {
            name: Cow::Borrowed("rag_docs"),
            title: None,
            description: Some(Cow::Borrowed(
                "Performs an intelligent query on the RAG document database. \
                 Searches the stored documents and answers based on actual \
                 content, including references to the source snippets used.",
            )),
            input_schema: schema_map(schema),
            output_schema: None,
            annotations: Some(ToolAnnotations::new().read_only(true)),
            execution: None,
            icons: None,
            meta: None,
        }
    }

    /// Tools advertised for the current state: only `configure` until a
    /// token is stored, only `rag_docs` afterwards.
    pub fn available_tools(&self) -> Vec<Tool> {
        if self.is_configured() {
            vec![self.rag_docs_tool()]
        } else {
            vec![self.configure_tool()]
        }
    }

    // ── Tool handlers ────────────────────────────────────────────────────

    fn handle_configure(&self, args: &serde_json::Map<String, serde_json::Value>) -> CallToolResult {
        let token = args.get("api_token").and_then(|v| v.as_str()).unwrap_or("");
        if token.is_empty() {
            return CallToolResult::error(vec![Content::text(
                "Error: api_token parameter is required for configuration",
            )]);
        }

        let base_url = args
            .get("base_url")
            .and_then(|v| v.as_str())
            .filter(|url| !url.is_empty())
            .unwrap_or(&self.default_base_url)
            .to_string();

        self.configure(token, &base_url);
        tracing::info!(base_url = %base_url, "RAG tools configured");

        CallToolResult::success(vec![Content::text(format!(
            "RAG tools configured successfully with base URL: {base_url}"
        ))])
    }

    async fn handle_rag_docs(
        &self,
        args: &serde_json::Map<String, serde_json::Value>,
    ) -> CallToolResult {
        let query = args.get("query").and_then(|v| v.as_str()).unwrap_or("");
        if query.is_empty() {
            return CallToolResult::error(vec![Content::text(
                "Error: Query parameter is required",
            )]);
        }

        match self.query_upstream(query).await {
            None => CallToolResult::error(vec![Content::text(NOT_CONFIGURED_TEXT)]),
            Some(outcome) => {
                let segments: Vec<Content> = render_outcome(&outcome)
                    .into_iter()
                    .map(Content::text)
                    .collect();
                match outcome {
                    ProxyOutcome::Success { .. } => CallToolResult::success(segments),
                    ProxyOutcome::Failure { .. } => CallToolResult::error(segments),
                }
            }
        }
    }
}

const NOT_CONFIGURED_TEXT: &str =
    "RAG tools not configured. Please call 'configure' tool first with your API token.";

fn schema_map(value: serde_json::Value) -> Arc<serde_json::Map<String, serde_json::Value>> {
    match value {
        serde_json::Value::Object(map) => Arc::new(map),
        _ => Arc::new(serde_json::Map::new()),
    }
}

// ── Outcome rendering ────────────────────────────────────────────────────

/// Render a proxied outcome into text segments.
///
/// Success bodies yield one segment assembled from the reply: a
/// `Response:` line when the body carries an `answer` (or `response`)
/// string, a `Source Documents:` block when it carries `sources`, a
/// pretty-printed `RAG Data:` dump when it carries neither, and a closing
/// `Query:` line. Failures yield the message plus error details when known.
pub fn render_outcome(outcome: &ProxyOutcome) -> Vec<String> {
    match outcome {
        ProxyOutcome::Success { query, data, .. } => {
            let mut details: Vec<String> = Vec::new();

            if let Some(map) = data.as_object() {
                let answer = map
                    .get("answer")
                    .and_then(|v| v.as_str())
                    .or_else(|| map.get("response").and_then(|v| v.as_str()));
                if let Some(answer) = answer {
                    details.push(format!("Response: {answer}"));
                }

                if let Some(sources) = map.get("sources").and_then(|v| v.as_array()) {
                    details.push("Source Documents:".to_string());
                    for (i, source) in sources.iter().enumerate() {
                        details.push(render_source(i + 1, source));
                    }
                }

                if details.is_empty() && !map.is_empty() {
                    let dump = serde_json::to_string_pretty(data)
                        .unwrap_or_else(|_| data.to_string());
                    details.push(format!("RAG Data: {dump}"));
                }
            }

            details.push(format!("Query: {query}"));
            vec![details.join("\n")]
        }
        ProxyOutcome::Failure { message, detail } => match detail {
            Some(detail) => vec![format!("{message}\n\nError details: {detail}")],
            None => vec![message.clone()],
        },
    }
}

/// One numbered `Source Documents:` entry. Object sources render their
/// `document`, `score` (three decimals), and `content` fields when present;
/// content longer than 200 characters is truncated with an ellipsis. Plain
/// values render verbatim.
fn render_source(index: usize, source: &serde_json::Value) -> String {
    match source.as_object() {
        Some(map) => {
            let mut entry = format!("  {index}. ");
            if let Some(document) = map.get("document").and_then(|v| v.as_str()) {
                entry.push_str(&format!("Document: {document}"));
            }
            if let Some(score) = map.get("score").and_then(|v| v.as_f64()) {
                entry.push_str(&format!(" (Score: {score:.3})"));
            }
            if let Some(content) = map.get("content").and_then(|v| v.as_str()) {
                let shown: String = if content.chars().count() > 200 {
                    format!("{}...", content.chars().take(200).collect::<String>())
                } else {
                    content.to_string()
                };
                entry.push_str(&format!("\n     Content: {shown}"));
            }
            entry
        }
        None => match source.as_str() {
            Some(text) => format!("  {index}. {text}"),
            None => format!("  {index}. {source}"),
        },
    }
}

// ── MCP protocol ─────────────────────────────────────────────────────────

impl ServerHandler for RagProxy {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_tool_list_changed()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "rag-relay".to_string(),
                title: Some("RAG Relay Proxy".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "RAG Relay Proxy — forwards queries to an authenticated RAG HTTP endpoint. \
                 Call configure with your API token first (skipped when RAG_API_TOKEN is set), \
                 then use rag_docs to ask questions against the document store."
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult::with_all_items(self.available_tools())))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        // Both tools stay callable in every state; the state machine in
        // call_tool produces the explanatory text.
        match name {
            "configure" => Some(self.configure_tool()),
            "rag_docs" => Some(self.rag_docs_tool()),
            _ => None,
        }
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let args = request.arguments.unwrap_or_default();

        match request.name.as_ref() {
            "configure" => Ok(self.handle_configure(&args)),
            "rag_docs" => Ok(self.handle_rag_docs(&args).await),
            other => {
                if self.is_configured() {
                    Ok(CallToolResult::error(vec![Content::text(format!(
                        "Tool '{other}' not found. Available tools: configure, rag_docs"
                    ))]))
                } else {
                    Ok(CallToolResult::error(vec![Content::text(
                        NOT_CONFIGURED_TEXT,
                    )]))
                }
            }
        }
    }

    fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        let mut raw = RawResource::new(DOCS_URI, "RAG Relay Documentation");
        raw.description = Some("Documentation for using the RAG proxy server".to_string());
        raw.mime_type = Some("text/plain".to_string());

        std::future::ready(Ok(ListResourcesResult::with_all_items(vec![
            raw.no_annotation()
        ])))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        if request.uri == DOCS_URI {
            Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(DOCS_TEXT, DOCS_URI)],
            })
        } else {
            Err(McpError::new(
                ErrorCode::RESOURCE_NOT_FOUND,
                format!("Resource not found: {}", request.uri),
                None,
            ))
        }
    }
}

const DOCS_URI: &str = "rag://docs";

const DOCS_TEXT: &str = "\
# RAG Relay Proxy

This MCP server forwards queries to an authenticated RAG HTTP endpoint.

## Available Tools

### configure
Stores the API token and endpoint URL for this session.
Parameters:
- api_token (string, required): bearer token for the RAG API
- base_url (string, optional): RAG endpoint URL

### rag_docs
Performs an intelligent query on the RAG document database.
Parameters:
- query (string): the question to ask the RAG system

## Configuration
1. Set the RAG_API_TOKEN environment variable with your API token
2. Optionally set RAG_BASE_URL (defaults to http://127.0.0.1:8080/rag)
3. The server runs in stdio mode for MCP integration

## Example usage
- Ask questions about your documents
- Get contextual answers generated from retrieved context
- Retrieve source document information when needed
";

/// Serve the proxy over stdio until the client disconnects.
pub async fn run_proxy(config: &Config) -> anyhow::Result<()> {
    let proxy = RagProxy::new(&config.proxy)?;

    let server = proxy
        .serve(stdio())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "serving MCP on stdio failed"))?;
    server.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(data: serde_json::Value) -> ProxyOutcome {
        ProxyOutcome::Success {
            message: "Query executed successfully".to_string(),
            query: "what is this?".to_string(),
            data,
        }
    }

    #[test]
    fn test_render_answer_and_string_sources() {
        let outcome = success(serde_json::json!({
            "answer": "It is a test.",
            "sources": ["first doc", "second doc"],
        }));
        let segments = render_outcome(&outcome);
        assert_eq!(
            segments,
            vec![
                "Response: It is a test.\n\
                 Source Documents:\n  \
                 1. first doc\n  \
                 2. second doc\n\
                 Query: what is this?"
            ]
        );
    }

    #[test]
    fn test_render_accepts_response_key() {
        let outcome = success(serde_json::json!({ "response": "alt key" }));
        let segments = render_outcome(&outcome);
        assert_eq!(segments, vec!["Response: alt key\nQuery: what is this?"]);
    }

    #[test]
    fn test_render_object_source_with_score_and_content() {
        let outcome = success(serde_json::json!({
            "answer": "ok",
            "sources": [{
                "document": "handbook.md",
                "score": 0.5,
                "content": "short body",
            }],
        }));
        let segments = render_outcome(&outcome);
        assert!(segments[0].contains("  1. Document: handbook.md (Score: 0.500)"));
        assert!(segments[0].contains("\n     Content: short body"));
    }

    #[test]
    fn test_render_truncates_long_content() {
        let long = "x".repeat(250);
        let outcome = success(serde_json::json!({
            "answer": "ok",
            "sources": [{ "content": long }],
        }));
        let segments = render_outcome(&outcome);
        let expected = format!("\n     Content: {}...", "x".repeat(200));
        assert!(segments[0].contains(&expected));
        assert!(!segments[0].contains(&"x".repeat(201)));
    }

    #[test]
    fn test_render_short_content_has_no_ellipsis() {
        let outcome = success(serde_json::json!({
            "answer": "ok",
            "sources": [{ "content": "fits" }],
        }));
        let segments = render_outcome(&outcome);
        assert!(segments[0].contains("Content: fits\n") || segments[0].contains("Content: fits"));
        assert!(!segments[0].contains("fits..."));
    }

    #[test]
    fn test_render_empty_sources_keeps_header() {
        let outcome = success(serde_json::json!({ "answer": "ok", "sources": [] }));
        let segments = render_outcome(&outcome);
        assert!(segments[0].contains("Source Documents:\nQuery:"));
    }

    #[test]
    fn test_render_raw_dump_when_no_known_keys() {
        let outcome = success(serde_json::json!({ "hits": 3 }));
        let segments = render_outcome(&outcome);
        assert!(segments[0].starts_with("RAG Data: {"));
        assert!(segments[0].contains("\"hits\": 3"));
        assert!(segments[0].ends_with("Query: what is this?"));
    }

    #[test]
    fn test_render_non_object_body_yields_query_only() {
        let outcome = success(serde_json::json!([1, 2, 3]));
        let segments = render_outcome(&outcome);
        assert_eq!(segments, vec!["Query: what is this?"]);
    }

    #[test]
    fn test_render_failure_with_detail() {
        let outcome = ProxyOutcome::Failure {
            message: "API error 401: Invalid token".to_string(),
            detail: Some("Error in RAG Docs call (status 401)".to_string()),
        };
        assert_eq!(
            render_outcome(&outcome),
            vec!["API error 401: Invalid token\n\nError details: Error in RAG Docs call (status 401)"]
        );
    }

    #[test]
    fn test_render_failure_without_detail() {
        let outcome = ProxyOutcome::Failure {
            message: "Unexpected error in RAG Docs query: boom".to_string(),
            detail: None,
        };
        assert_eq!(
            render_outcome(&outcome),
            vec!["Unexpected error in RAG Docs query: boom"]
        );
    }

    #[test]
    fn test_tool_listing_follows_state() {
        let proxy = RagProxy::new(&ProxyConfig::default()).unwrap();
        let names: Vec<_> = proxy
            .available_tools()
            .iter()
            .map(|t| t.name.to_string())
            .collect();
        assert_eq!(names, vec!["configure"]);

        proxy.configure("tok", "http://127.0.0.1:9/rag");
        let names: Vec<_> = proxy
            .available_tools()
            .iter()
            .map(|t| t.name.to_string())
            .collect();
        assert_eq!(names, vec!["rag_docs"]);
    }

    #[test]
    fn test_configure_requires_token() {
        let proxy = RagProxy::new(&ProxyConfig::default()).unwrap();
        let result = proxy.handle_configure(&serde_json::Map::new());
        assert_eq!(result.is_error, Some(true));
        assert!(!proxy.is_configured());
    }

    #[test]
    fn test_configure_defaults_base_url() {
        let proxy = RagProxy::new(&ProxyConfig::default()).unwrap();
        let mut args = serde_json::Map::new();
        args.insert(
            "api_token".to_string(),
            serde_json::Value::String("tok".to_string()),
        );
        let result = proxy.handle_configure(&args);
        assert_ne!(result.is_error, Some(true));
        assert!(proxy.is_configured());
    }

    #[tokio::test]
    async fn test_query_upstream_unconfigured_is_none() {
        let proxy = RagProxy::new(&ProxyConfig::default()).unwrap();
        assert!(proxy.query_upstream("q").await.is_none());
    }

    #[test]
    fn test_server_info_advertises_tool_and_resource_capabilities() {
        let proxy = RagProxy::new(&ProxyConfig::default()).unwrap();
        let info = proxy.get_info();

        let tools = info.capabilities.tools.expect("tools capability");
        assert_eq!(tools.list_changed, Some(true));
        assert!(info.capabilities.resources.is_some());
        assert_eq!(info.server_info.name, "rag-relay");
    }
}
