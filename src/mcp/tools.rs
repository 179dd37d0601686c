/// MCP tool handlers.
///
/// `ask` runs the same pipeline as `POST /api/rag` and returns the same
/// `{"aiMessage": ...}` shape. Failures surface as a tool error carrying the
/// generic message only.
use crate::error::GENERIC_ERROR_MESSAGE;
use crate::mcp::server::McpContext;
use crate::models::Query;
use rmcp::handler::server::ServerHandler;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{ErrorData as McpError, handler::server::tool::ToolRouter, model::*, tool, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{Instrument, error, info_span};

#[derive(Deserialize, JsonSchema)]
pub struct AskParams {
    /// Question to answer from the indexed documents
    pub message: String,
}

fn json_result(value: serde_json::Value) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&value).unwrap_or_default(),
    )]))
}

fn error_result(msg: &str) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(msg.to_string())]))
}

#[derive(Clone)]
pub struct AppTools {
    pub ctx: McpContext,
    pub tool_router: ToolRouter<Self>,
}

impl ServerHandler for AppTools {}

#[tool_router]
impl AppTools {
    pub fn new(ctx: McpContext) -> Self {
        Self {
            ctx,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Answer a question using only the indexed documents and their page images. Replies 'I don't know' in the prompt language when the documents do not cover it."
    )]
    pub async fn ask(&self, params: Parameters<AskParams>) -> Result<CallToolResult, McpError> {
        let query = Query::new(params.0.message);
        let cancel = self.ctx.shutdown.child_token();

        let outcome = self
            .ctx
            .pipeline
            .handle(&query, &cancel)
            .instrument(info_span!("rag_request", surface = "mcp"))
            .await;

        match outcome {
            Ok(answer) => json_result(serde_json::json!({ "aiMessage": answer.text })),
            Err(err) => {
                error!(kind = err.kind(), "ask failed: {err}");
                error_result(GENERIC_ERROR_MESSAGE)
            }
        }
    }
}
