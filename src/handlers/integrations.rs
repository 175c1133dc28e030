//! Integration setup handler.
//!
//! Connecting an API is the setup-time path: fetch the spec, compile it
//! into tool definitions, store the credential, and index the tools for
//! semantic discovery. Failures here abort the request and surface to the
//! caller, unlike tool execution, which never fails the conversation.

use crate::error::{AppError, Result};
use crate::spec;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct IntegrationRequest {
    /// Display name of the API, e.g. "Acme CRM".
    pub name: String,
    /// URL of the raw OpenAPI/Swagger document.
    pub spec_url: String,
    /// Optional static bearer token for the upstream API.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IntegrationResponse {
    pub message: String,
    pub tools_count: usize,
}

/// POST /integrations - Connect an API by spec URL.
///
/// # Flow
/// 1. Derive the connection id from the display name
/// 2. Store the credential (missing key preserves any existing one)
/// 3. Fetch and parse the spec
/// 4. Compile tool definitions
/// 5. Embed and register them (CPU-bound, so off the async runtime)
pub async fn integrations_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IntegrationRequest>,
) -> Result<Json<IntegrationResponse>> {
    let start_time = std::time::Instant::now();

    if request.name.trim().is_empty() {
        return Err(AppError::Validation("Name cannot be empty".to_string()));
    }
    if request.spec_url.trim().is_empty() {
        return Err(AppError::Validation("Spec URL cannot be empty".to_string()));
    }

    let connection_id = request.name.trim().to_lowercase().replace(' ', "-");

    state
        .credentials
        .store_api_key(&connection_id, request.api_key.as_deref());

    let spec_doc = spec::fetch_spec(&state.http, &request.spec_url).await?;
    let tools = spec::compile(&spec_doc, &request.name, &connection_id);

    let registry = Arc::clone(&state.registry);
    let tools_count = tokio::task::spawn_blocking(move || registry.register(tools))
        .await
        .map_err(|e| AppError::Embedding(format!("Registration task join error: {}", e)))??;

    tracing::info!(
        api = %request.name,
        connection = %connection_id,
        tools_count,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Integration connected"
    );

    metrics::counter!("integrations_total").increment(1);
    metrics::histogram!("integration_tools_count").record(tools_count as f64);

    Ok(Json(IntegrationResponse {
        message: format!("Successfully connected {}", request.name),
        tools_count,
    }))
}
