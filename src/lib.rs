//! # RAG Relay
//!
//! An authenticated keyword-retrieval and LLM generation service with an
//! MCP tool proxy.
//!
//! RAG Relay keeps a small in-memory snippet store, matches incoming queries
//! against it by keyword overlap, and forwards the matched context plus the
//! question to the Gemini API (with a second-model fallback). The same
//! capability is reachable two ways: a bearer-token HTTP API, and an MCP
//! stdio server that proxies tool calls to a remote instance of that API.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────┐   ┌────────────┐
//! │  Snippet  │──▶│ Retriever  │──▶│  Gemini    │
//! │  Store    │   │ (keyword)  │   │ + fallback │
//! └───────────┘   └────────────┘   └─────┬──────┘
//!                                        │
//!                     ┌──────────────────┤
//!                     ▼                  ▼
//!                ┌─────────┐      ┌────────────┐
//!                │  HTTP   │◀─────│ MCP proxy  │
//!                │  (API)  │      │  (stdio)   │
//!                └─────────┘      └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ragr serve api                # start the HTTP API
//! ragr serve mcp                # start the MCP stdio proxy
//! ragr search "bearer token"    # retrieval only, from the CLI
//! ragr ask "how is auth done?"  # full retrieve-and-generate
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`auth`] | Bearer-token access guard |
//! | [`store`] | In-memory snippet store |
//! | [`search`] | Keyword-overlap retrieval |
//! | [`prompt`] | Prompt templates |
//! | [`generation`] | Gemini client with model fallback |
//! | [`pipeline`] | Guard → retrieve → generate orchestration |
//! | [`server`] | Authenticated HTTP API |
//! | [`mcp`] | MCP stdio proxy |

pub mod auth;
pub mod config;
pub mod generation;
pub mod mcp;
pub mod pipeline;
pub mod prompt;
pub mod search;
pub mod server;
pub mod store;
