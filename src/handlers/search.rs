//! Semantic tool discovery handler.
//!
//! Embeds the query and retrieves the most relevant registered tools by
//! cosine similarity. Embedding is a single CPU-bound forward pass, run on
//! the blocking pool.

use crate::error::{AppError, Result};
use crate::spec::ToolDefinition;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default number of results to return
fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// The natural language query to match against tools
    pub query: String,
    /// Number of top results to return (default: 5)
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<ToolDefinition>,
}

/// POST /search - Find tools relevant to a natural language query.
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let start_time = std::time::Instant::now();

    if request.query.is_empty() {
        return Err(AppError::Validation("Query cannot be empty".to_string()));
    }
    if request.top_k == 0 {
        return Err(AppError::Validation("top_k must be at least 1".to_string()));
    }

    let registry = Arc::clone(&state.registry);
    let query = request.query.clone();
    let top_k = request.top_k;

    let found = tokio::task::spawn_blocking(move || registry.search(&query, top_k))
        .await
        .map_err(|e| AppError::Embedding(format!("Search task join error: {}", e)))??;

    let results: Vec<ToolDefinition> = found.iter().map(|def| (**def).clone()).collect();

    let total_time = start_time.elapsed();
    tracing::info!(
        query = %request.query,
        top_k,
        found = results.len(),
        total_ms = total_time.as_millis() as u64,
        "Search completed"
    );

    metrics::counter!("search_requests_total").increment(1);
    metrics::histogram!("search_latency_ms").record(total_time.as_millis() as f64);

    Ok(Json(SearchResponse { results }))
}
