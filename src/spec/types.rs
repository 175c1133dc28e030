//! Type definitions for compiled tools.

use serde::{Deserialize, Serialize};

/// HTTP methods a compiled tool may use. Spec entries with any other
/// method key (head, options, trace...) are skipped by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    /// Parse a spec method key, case-insensitively. Returns None for
    /// unsupported methods.
    pub fn from_spec_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "get" => Some(Self::Get),
            "post" => Some(Self::Post),
            "put" => Some(Self::Put),
            "delete" => Some(Self::Delete),
            "patch" => Some(Self::Patch),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

/// Where a declared parameter lives in the request.
///
/// `BodyImplicit` covers everything the spec declares outside the path and
/// query string (body, formData, header); at call time those arguments
/// follow the placement policy of the executor rather than their declared
/// location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamLocation {
    Path,
    Query,
    BodyImplicit,
}

/// Primitive parameter type, decided once at compile time and never
/// re-inferred at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    /// Map an OpenAPI type string to a ParamType. Unknown or absent types
    /// default to String.
    pub fn from_spec_type(spec_type: Option<&str>) -> Self {
        match spec_type.unwrap_or("").to_ascii_lowercase().as_str() {
            "integer" => Self::Integer,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "array" => Self::Array,
            "object" => Self::Object,
            _ => Self::String,
        }
    }
}

/// A single declared parameter of a compiled tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub location: ParamLocation,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
}

/// A callable operation derived from one spec operation.
///
/// Produced by the compiler and never mutated afterwards: the dispatch map
/// and the vector index metadata both refer to the same `Arc`'d value.
/// Definitions live for the process lifetime only; a restart requires
/// recompiling the spec, while indexed entries persist on disk (the index
/// holds the tool name as a weak back-reference, not the definition).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique operation id within one compiled spec. Collisions across a
    /// compile are resolved last-write-wins in the dispatch map.
    pub name: String,

    /// Human-readable description, enriched with path-parameter sentences
    /// for better retrieval quality.
    pub description: String,

    pub method: HttpMethod,

    /// Path with `{placeholder}` segments still in place, joined onto the
    /// resolved base URL at execution time.
    pub path_template: String,

    pub params: Vec<ParamSpec>,

    /// Identifies which stored credential applies to this tool's upstream.
    pub connection_id: String,
}

impl ToolDefinition {
    /// The text embedded into the vector index for this tool.
    pub fn document_text(&self) -> String {
        format!("Tool Name: {}\nDescription: {}", self.name, self.description)
    }
}
