//! # ragground: grounded question answering
//!
//! Answers a user's question from a pre-indexed document corpus. Each request
//! embeds the question, retrieves the most similar records, assembles a
//! grounding prompt (with page images when a record has one) and asks a chat
//! model to answer from that evidence only.
//!
//! ## Architecture
//!
//! - **[`config`]**: JSON file plus environment overlay, validation
//! - **[`embedder`]**: Text embedding (Azure OpenAI, deterministic mock)
//! - **[`db`]**: SQLite + sqlite-vec vector index
//! - **[`storage`]**: Image objects from Azure Blob Storage or a local directory
//! - **[`openai`]**: Azure OpenAI REST client and chat message types
//! - **[`pipeline`]**: Embed → retrieve → assemble → answer
//! - **[`server`]**: axum HTTP surface (`POST /api/rag`)
//! - **[`mcp`]**: MCP `ask` tool (stdio transport via rmcp)

pub mod config;
pub mod db;
pub mod embedder;
pub mod error;
pub mod mcp;
pub mod models;
pub mod openai;
pub mod pipeline;
pub mod server;
pub mod state;
pub mod storage;
