//! Tool execution.
//!
//! A single generic dispatcher drives every compiled tool from its
//! `ToolDefinition`; no per-operation code is generated. Execution
//! failures are data, not faults: the agent loop that invoked the tool must
//! be able to inspect the failure and keep reasoning, so `execute` returns
//! `Result<Value, ToolFailure>` and never panics or bubbles setup-time
//! errors.

use crate::credentials::CredentialStore;
use crate::spec::types::{HttpMethod, ToolDefinition};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Callers that nest arguments one level deep wrap them under this key.
const WRAPPER_KEY: &str = "kwargs";

/// Non-fatal execution failure, returned to the caller as inspectable data.
#[derive(Error, Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolFailure {
    /// A path parameter received a non-integral float; path segments must
    /// resolve to whole values.
    #[error("Invalid value for path parameter '{name}': non-integer float {value}")]
    InvalidParameter { name: String, value: f64 },

    /// The upstream API answered with status >= 400.
    #[error("Error {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Timeout, connection refused, DNS failure and friends.
    #[error("Connection failed: {message}")]
    Transport { message: String },
}

pub type ToolResult = std::result::Result<Value, ToolFailure>;

/// Stateless executor sharing one HTTP client and the credential store.
pub struct ToolExecutor {
    client: reqwest::Client,
    credentials: Arc<dyn CredentialStore>,
}

impl ToolExecutor {
    /// The client should carry a bounded request timeout; a timeout
    /// surfaces as `ToolFailure::Transport`, never as a hang.
    pub fn new(client: reqwest::Client, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            client,
            credentials,
        }
    }

    /// Execute one tool call.
    ///
    /// Arguments not consumed by path substitution become query parameters
    /// for GET and the JSON body for everything else.
    pub async fn execute(&self, def: &ToolDefinition, args: Value) -> ToolResult {
        let invocation = Uuid::new_v4();
        let args = unwrap_args(args);

        let headers = self.credentials.get_auth_headers(&def.connection_id);
        if headers.is_empty() {
            tracing::warn!(
                connection = %def.connection_id,
                tool = %def.name,
                "No credentials found, proceeding without auth"
            );
        }

        let (url, consumed) = substitute_path(&def.path_template, &args)?;

        tracing::info!(
            invocation = %invocation,
            method = def.method.as_str(),
            url = %url,
            "Executing tool call"
        );

        let mut request = self.client.request(def.method.into(), &url);
        for (name, value) in &headers {
            request = request.header(name, value);
        }

        if def.method == HttpMethod::Get {
            let query: Vec<(String, String)> = args
                .iter()
                .filter(|(key, _)| !consumed.contains(key.as_str()))
                .map(|(key, value)| (key.clone(), value_to_string(value)))
                .collect();
            request = request.query(&query);
        } else {
            let body: Map<String, Value> = args
                .into_iter()
                .filter(|(key, _)| !consumed.contains(key.as_str()))
                .collect();
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| ToolFailure::Transport {
            message: e.to_string(),
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ToolFailure::Transport {
            message: e.to_string(),
        })?;

        if status.as_u16() >= 400 {
            tracing::warn!(
                invocation = %invocation,
                status = status.as_u16(),
                tool = %def.name,
                "Upstream API error"
            );
            return Err(ToolFailure::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        // Healthy endpoints that answer plain text should not look like
        // transport failures; degrade to a JSON string.
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

/// Unwrap one level of argument nesting: a map holding exactly
/// `{"kwargs": {...}}` is replaced by the inner object.
fn unwrap_args(args: Value) -> Map<String, Value> {
    let Value::Object(mut map) = args else {
        return Map::new();
    };

    // Only unwrap when the single wrapped value is itself an object;
    // anything else passes through untouched.
    if map.len() == 1 && matches!(map.get(WRAPPER_KEY), Some(Value::Object(_))) {
        if let Some(Value::Object(inner)) = map.remove(WRAPPER_KEY) {
            return inner;
        }
    }

    map
}

/// Substitute `{name}` placeholders from the arguments, returning the
/// resolved URL and the set of consumed argument names. Integral floats
/// coerce to their integer form (`3.0` -> `3`); non-integral floats fail.
fn substitute_path(
    template: &str,
    args: &Map<String, Value>,
) -> std::result::Result<(String, HashSet<String>), ToolFailure> {
    let mut url = template.to_string();
    let mut consumed = HashSet::new();

    for (key, value) in args {
        let placeholder = format!("{{{}}}", key);
        if !url.contains(&placeholder) {
            continue;
        }

        let segment = match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i.to_string()
                } else if let Some(u) = n.as_u64() {
                    u.to_string()
                } else {
                    let f = n.as_f64().unwrap_or(f64::NAN);
                    if f.is_finite() && f.fract() == 0.0 {
                        (f as i64).to_string()
                    } else {
                        return Err(ToolFailure::InvalidParameter {
                            name: key.clone(),
                            value: f,
                        });
                    }
                }
            }
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            other => other.to_string(),
        };

        url = url.replace(&placeholder, &segment);
        consumed.insert(key.clone());
    }

    Ok((url, consumed))
}

/// Scalar string form for query parameters.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
