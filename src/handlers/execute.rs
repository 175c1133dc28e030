//! Tool invocation handler.
//!
//! Resolves the named tool through the dispatch map and hands it to the
//! executor. Both arms of the execution result serialize into a 200
//! response: an upstream 4xx or a timeout is information for the agent, not
//! a failure of this service. Only an unknown tool name is a caller error.

use crate::error::{AppError, Result};
use crate::executor::ToolFailure;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    /// Registered tool name (operation id).
    pub tool: String,
    /// Arguments for the call; may be wrapped one level deep under
    /// "kwargs" by callers that nest them.
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolFailure>,
}

/// POST /execute - Invoke a registered tool.
pub async fn execute_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<ExecuteResponse>> {
    let start_time = std::time::Instant::now();

    let def = state
        .registry
        .get(&request.tool)
        .ok_or_else(|| AppError::ToolNotFound(request.tool.clone()))?;

    let outcome = state.executor.execute(&def, request.arguments).await;

    let total_time = start_time.elapsed();
    metrics::counter!("execute_requests_total").increment(1);
    metrics::histogram!("execute_latency_ms").record(total_time.as_millis() as f64);

    let response = match outcome {
        Ok(result) => ExecuteResponse {
            ok: true,
            result: Some(result),
            error: None,
        },
        Err(failure) => {
            tracing::info!(
                tool = %request.tool,
                error = %failure,
                "Tool call failed (non-fatal)"
            );
            metrics::counter!("execute_failures_total").increment(1);
            ExecuteResponse {
                ok: false,
                result: None,
                error: Some(failure),
            }
        }
    };

    Ok(Json(response))
}
