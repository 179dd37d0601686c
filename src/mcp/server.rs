/// MCP server setup using `rmcp` with stdio transport.
///
/// Provides `McpContext` (shared state) and `McpServer` (startup logic).
use crate::mcp::tools::AppTools;
use anyhow::{Context, Result};
use rmcp::{ServiceExt, handler::server::router::Router, transport::io::stdio};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::pipeline::RagPipeline;
use crate::state::AppState;

/// Shared context available to all tool handlers.
#[derive(Clone)]
pub struct McpContext {
    pub pipeline: Arc<RagPipeline>,
    pub shutdown: CancellationToken,
}

impl From<&AppState> for McpContext {
    fn from(state: &AppState) -> Self {
        Self {
            pipeline: state.pipeline.clone(),
            shutdown: state.shutdown.clone(),
        }
    }
}

/// MCP server wrapping the context and serving via stdio.
#[derive(Clone)]
pub struct McpServer {
    pub ctx: McpContext,
}

impl McpServer {
    pub fn new(ctx: McpContext) -> Self {
        Self { ctx }
    }

    /// Serve on stdio until the client disconnects or shutdown is requested.
    pub async fn start(self) -> Result<()> {
        info!("Starting MCP server on stdio...");
        let (stdin, stdout) = stdio();

        let app_tools = AppTools::new(self.ctx.clone());
        let router = Router::new(app_tools.clone()).with_tools(app_tools.tool_router.clone());

        let running = router
            .serve((stdin, stdout))
            .await
            .context("MCP server failed to initialize on stdio")?;

        tokio::select! {
            quit = running.waiting() => {
                quit.context("MCP server encountered an error during stdio transport")?;
            }
            _ = self.ctx.shutdown.cancelled() => info!("MCP server shutting down"),
        }

        Ok(())
    }
}
