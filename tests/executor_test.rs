//! Integration tests for tool execution against a live local server.
//!
//! These tests verify the request placement policy (path substitution,
//! query vs body) and the non-fatal failure contract by pointing the
//! executor at an echo server on an ephemeral port.

use axum::{
    body::to_bytes,
    extract::Request,
    http::StatusCode,
    response::IntoResponse,
    routing::any,
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use toolbridge::{
    HttpMethod, MemoryCredentialStore, ToolDefinition, ToolExecutor, ToolFailure,
};

/// Echo handler: reflects method, path, query, auth header, and JSON body
/// so assertions can inspect exactly what the upstream saw.
async fn echo(req: Request) -> Json<Value> {
    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, usize::MAX).await.unwrap();
    let body_json: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    Json(json!({
        "method": parts.method.as_str(),
        "path": parts.uri.path(),
        "query": parts.uri.query().unwrap_or(""),
        "authorization": parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok()),
        "body": body_json,
    }))
}

async fn failing() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "no such contact")
}

async fn plain_text() -> &'static str {
    "pong"
}

/// Spawn the upstream test server, returning its address.
async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/missing", any(failing))
        .route("/ping", any(plain_text))
        .fallback(echo);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn executor_with_key(key: Option<&str>) -> ToolExecutor {
    let credentials = Arc::new(MemoryCredentialStore::new());
    if let Some(key) = key {
        credentials.store_api_key("test-conn", Some(key));
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    ToolExecutor::new(client, credentials)
}

fn tool(method: HttpMethod, base: SocketAddr, path: &str) -> ToolDefinition {
    ToolDefinition {
        name: "test_tool".to_string(),
        description: "A test tool.".to_string(),
        method,
        path_template: format!("http://{}{}", base, path),
        params: vec![],
        connection_id: "test-conn".to_string(),
    }
}

// ============================================================================
// Placement Policy Tests
// ============================================================================

#[tokio::test]
async fn test_get_substitutes_path_and_places_rest_in_query() {
    let addr = spawn_upstream().await;
    let executor = executor_with_key(None);
    let def = tool(HttpMethod::Get, addr, "/users/{id}");

    let result = executor
        .execute(&def, json!({"id": 42, "verbose": "true"}))
        .await
        .unwrap();

    assert_eq!(result["path"], "/users/42");
    assert_eq!(result["query"], "verbose=true");
    assert_eq!(result["method"], "GET");
}

#[tokio::test]
async fn test_get_with_only_path_args_sends_no_query() {
    let addr = spawn_upstream().await;
    let executor = executor_with_key(None);
    let def = tool(HttpMethod::Get, addr, "/users/{id}");

    let result = executor.execute(&def, json!({"id": 42})).await.unwrap();

    assert_eq!(result["path"], "/users/42");
    assert_eq!(result["query"], "");
}

#[tokio::test]
async fn test_post_serializes_args_as_json_body() {
    let addr = spawn_upstream().await;
    let executor = executor_with_key(None);
    let def = tool(HttpMethod::Post, addr, "/contacts");

    let result = executor
        .execute(&def, json!({"a": 1, "b": "x"}))
        .await
        .unwrap();

    assert_eq!(result["method"], "POST");
    assert_eq!(result["body"], json!({"a": 1, "b": "x"}));
    assert_eq!(result["query"], "");
}

#[tokio::test]
async fn test_non_get_methods_use_their_own_verb() {
    let addr = spawn_upstream().await;
    let executor = executor_with_key(None);

    for (method, verb) in [
        (HttpMethod::Put, "PUT"),
        (HttpMethod::Delete, "DELETE"),
        (HttpMethod::Patch, "PATCH"),
    ] {
        let def = tool(method, addr, "/things/{id}");
        let result = executor.execute(&def, json!({"id": 7})).await.unwrap();
        assert_eq!(result["method"], verb);
        assert_eq!(result["path"], "/things/7");
    }
}

#[tokio::test]
async fn test_path_args_are_excluded_from_body() {
    let addr = spawn_upstream().await;
    let executor = executor_with_key(None);
    let def = tool(HttpMethod::Put, addr, "/users/{id}");

    let result = executor
        .execute(&def, json!({"id": 3, "email": "a@b.c"}))
        .await
        .unwrap();

    assert_eq!(result["path"], "/users/3");
    assert_eq!(result["body"], json!({"email": "a@b.c"}));
}

#[tokio::test]
async fn test_kwargs_wrapper_is_unwrapped() {
    let addr = spawn_upstream().await;
    let executor = executor_with_key(None);
    let def = tool(HttpMethod::Post, addr, "/contacts");

    let result = executor
        .execute(&def, json!({"kwargs": {"name": "Ada"}}))
        .await
        .unwrap();

    assert_eq!(result["body"], json!({"name": "Ada"}));
}

// ============================================================================
// Float Coercion Tests
// ============================================================================

#[tokio::test]
async fn test_integral_float_path_param_succeeds() {
    let addr = spawn_upstream().await;
    let executor = executor_with_key(None);
    let def = tool(HttpMethod::Get, addr, "/users/{id}");

    let result = executor.execute(&def, json!({"id": 3.0})).await.unwrap();
    assert_eq!(result["path"], "/users/3");
}

#[tokio::test]
async fn test_non_integral_float_path_param_fails() {
    let addr = spawn_upstream().await;
    let executor = executor_with_key(None);
    let def = tool(HttpMethod::Get, addr, "/users/{id}");

    let err = executor.execute(&def, json!({"id": 3.5})).await.unwrap_err();
    assert!(matches!(err, ToolFailure::InvalidParameter { .. }));
}

// ============================================================================
// Auth Tests
// ============================================================================

#[tokio::test]
async fn test_stored_credential_is_injected_as_bearer() {
    let addr = spawn_upstream().await;
    let executor = executor_with_key(Some("sk-test"));
    let def = tool(HttpMethod::Get, addr, "/whoami");

    let result = executor.execute(&def, json!({})).await.unwrap();
    assert_eq!(result["authorization"], "Bearer sk-test");
}

#[tokio::test]
async fn test_missing_credential_proceeds_without_auth() {
    let addr = spawn_upstream().await;
    let executor = executor_with_key(None);
    let def = tool(HttpMethod::Get, addr, "/whoami");

    let result = executor.execute(&def, json!({})).await.unwrap();
    assert_eq!(result["authorization"], Value::Null);
}

// ============================================================================
// Failure Contract Tests
// ============================================================================

#[tokio::test]
async fn test_upstream_4xx_returns_failure_data() {
    let addr = spawn_upstream().await;
    let executor = executor_with_key(None);
    let def = tool(HttpMethod::Get, addr, "/missing");

    let err = executor.execute(&def, json!({})).await.unwrap_err();
    match err {
        ToolFailure::Upstream { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("no such contact"));
        }
        other => panic!("expected Upstream, got {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_refused_returns_transport_failure() {
    // Bind then drop to get an address nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let executor = executor_with_key(None);
    let def = tool(HttpMethod::Get, addr, "/unreachable");

    let err = executor.execute(&def, json!({})).await.unwrap_err();
    assert!(matches!(err, ToolFailure::Transport { .. }));
}

#[tokio::test]
async fn test_plain_text_success_degrades_to_json_string() {
    let addr = spawn_upstream().await;
    let executor = executor_with_key(None);
    let def = tool(HttpMethod::Get, addr, "/ping");

    let result = executor.execute(&def, json!({})).await.unwrap();
    assert_eq!(result, Value::String("pong".to_string()));
}
