//! MCP surface: one `ask` tool over stdio.
pub mod server;
pub mod tools;
