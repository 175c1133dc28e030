//! Spec document retrieval.
//!
//! Fetches a user-supplied URL and parses the body as an OpenAPI/Swagger
//! document, trying JSON first and YAML second. A `text/html` response is
//! rejected up front with a targeted diagnostic: it almost always means the
//! user pasted a documentation page instead of the raw spec URL.

use crate::error::{AppError, Result};
use serde_json::Value;

/// Fetch and parse a spec document. No side effects beyond the network read.
pub async fn fetch_spec(client: &reqwest::Client, url: &str) -> Result<Value> {
    tracing::info!(url, "Fetching spec");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::SpecFetch(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::SpecFetch(format!(
            "{} returned status {}",
            url, status
        )));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if content_type.contains("text/html") {
        return Err(AppError::HtmlInsteadOfSpec);
    }

    let body = response
        .text()
        .await
        .map_err(|e| AppError::SpecFetch(e.to_string()))?;

    parse_spec(&body)
}

/// Parse a spec body: JSON first (more common), then YAML.
pub fn parse_spec(body: &str) -> Result<Value> {
    match serde_json::from_str::<Value>(body) {
        Ok(spec) => Ok(spec),
        Err(json_err) => serde_yaml::from_str::<Value>(body).map_err(|yaml_err| {
            AppError::SpecParse(format!("json: {}; yaml: {}", json_err, yaml_err))
        }),
    }
}
