use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use serde_json::{Value, json};
use tracing::{Instrument, error, info, info_span};

use crate::error::RagError;
use crate::models::{Answer, Query};
use crate::state::AppState;

/// Parse the request body as JSON whatever its declared content type.
fn parse_query(body: Result<Bytes, BytesRejection>) -> Result<Query, RagError> {
    let body = body.map_err(|rejection| RagError::invalid_input(rejection.body_text()))?;
    serde_json::from_slice(&body).map_err(|e| RagError::invalid_input(e.to_string()))
}

/// Answer one question. Every failure becomes the same generic 500 body.
pub async fn rag(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Answer>, RagError> {
    let query = parse_query(body).inspect_err(|err| {
        error!(kind = err.kind(), "rejected request: {err}");
    })?;

    // Cancelled on server shutdown, or when the client goes away and this future is dropped
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();
    let span = info_span!("rag_request", message_len = query.message.len());

    async move {
        match state.pipeline.handle(&query, &cancel).await {
            Ok(answer) => {
                info!("answered with {} chars", answer.text.len());
                Ok(Json(answer))
            }
            Err(err) => {
                error!(kind = err.kind(), "request failed: {err}");
                Err(err)
            }
        }
    }
    .instrument(span)
    .await
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
