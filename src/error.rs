use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Setup-time and service-level failures. These abort the request that
/// triggered them and surface to the caller; tool-execution failures are a
/// separate, non-fatal shape (`executor::ToolFailure`).
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Could not fetch spec: {0}")]
    SpecFetch(String),

    #[error("The URL returned an HTML page. Please use the raw spec URL.")]
    HtmlInsteadOfSpec,

    #[error("Spec is neither valid JSON nor valid YAML: {0}")]
    SpecParse(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Vector index error: {0}")]
    Index(String),

    #[error("Unknown tool: {0}")]
    ToolNotFound(String),

    #[error("Service temporarily unavailable: {0}")]
    Resource(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::SpecFetch(e) => {
                tracing::warn!(error = %e, "Spec fetch failed");
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::HtmlInsteadOfSpec => {
                tracing::warn!("Spec URL returned HTML");
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::SpecParse(e) => {
                tracing::warn!(error = %e, "Spec parse failed");
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::Validation(msg) => {
                tracing::warn!(error = %msg, "Validation error");
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            AppError::Embedding(e) => {
                tracing::error!(error = %e, "Embedding error");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::Index(e) => {
                tracing::error!(error = %e, "Vector index error");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::ToolNotFound(name) => {
                tracing::warn!(tool = %name, "Tool not found");
                (StatusCode::NOT_FOUND, self.to_string())
            }
            AppError::Resource(msg) => {
                tracing::warn!(error = %msg, "Resource error");
                (StatusCode::SERVICE_UNAVAILABLE, msg.clone())
            }
        };

        let body = Json(ErrorResponse {
            error: message,
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

impl From<ort::Error> for AppError {
    fn from(err: ort::Error) -> Self {
        AppError::Embedding(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
