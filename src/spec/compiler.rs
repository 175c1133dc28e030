//! Spec-to-tool compilation.
//!
//! Walks a parsed OpenAPI/Swagger document, kept as dynamic JSON since
//! specs in the wild are too loose for a strict model, and derives one
//! `ToolDefinition` per path/method pair. All typing decisions are made
//! here, once; the executor never re-infers anything at call time.

use crate::spec::types::{HttpMethod, ParamLocation, ParamSpec, ParamType, ToolDefinition};
use serde_json::Value;

/// Base URL used when the spec declares neither `servers` nor `host`.
const FALLBACK_BASE_URL: &str = "https://api.example.com";

/// Compile a parsed spec into tool definitions.
///
/// Output order follows the document's own path/method iteration order,
/// which is not canonical across spec producers; callers must rely only on
/// set membership and count. Operations whose names collide are all
/// produced; the registry's dispatch map resolves collisions last-write-wins.
pub fn compile(spec: &Value, api_name: &str, connection_id: &str) -> Vec<ToolDefinition> {
    let base_url = resolve_base_url(spec);

    let Some(paths) = spec.get("paths").and_then(|p| p.as_object()) else {
        tracing::warn!(api = api_name, "Spec has no paths object; no tools compiled");
        return Vec::new();
    };

    let mut tools = Vec::new();

    for (path, methods) in paths {
        let Some(methods) = methods.as_object() else {
            continue;
        };

        for (method_key, details) in methods {
            // Path-item keys that are not operations ("parameters", "$ref",
            // head/options/trace...) fall out here.
            let Some(method) = HttpMethod::from_spec_key(method_key) else {
                continue;
            };
            if !details.is_object() {
                continue;
            }

            let name = resolve_operation_name(details, method, path);
            let parameters = details
                .get("parameters")
                .and_then(|p| p.as_array())
                .cloned()
                .unwrap_or_default();
            let description = build_description(details, &parameters);
            let params = build_params(&parameters);

            tools.push(ToolDefinition {
                name,
                description,
                method,
                path_template: format!("{}{}", base_url, path),
                params,
                connection_id: connection_id.to_string(),
            });
        }
    }

    tracing::info!(
        api = api_name,
        tools = tools.len(),
        "Spec compilation complete"
    );

    tools
}

/// Resolve the base URL, in priority order: OpenAPI 3 `servers`, Swagger 2
/// `schemes`/`host`/`basePath`, then a fixed placeholder with a warning.
/// Trailing `/` is stripped so path templates join cleanly.
fn resolve_base_url(spec: &Value) -> String {
    let mut base_url = if let Some(servers) = spec
        .get("servers")
        .and_then(|s| s.as_array())
        .filter(|s| !s.is_empty())
    {
        servers[0]
            .get("url")
            .and_then(|u| u.as_str())
            .unwrap_or("")
            .to_string()
    } else if let Some(host) = spec.get("host").and_then(|h| h.as_str()) {
        let scheme = spec
            .get("schemes")
            .and_then(|s| s.as_array())
            .and_then(|s| s.first())
            .and_then(|s| s.as_str())
            .unwrap_or("https");
        let base_path = spec
            .get("basePath")
            .and_then(|b| b.as_str())
            .unwrap_or("");
        format!("{}://{}{}", scheme, host, base_path)
    } else {
        tracing::warn!(
            fallback = FALLBACK_BASE_URL,
            "Could not determine base URL from spec"
        );
        FALLBACK_BASE_URL.to_string()
    };

    while base_url.ends_with('/') {
        base_url.pop();
    }

    base_url
}

/// Explicit `operationId` when present, otherwise `<method><path>` with `/`
/// turned into `_` and braces dropped: `GET /users/{id}` -> `get_users_id`.
fn resolve_operation_name(details: &Value, method: HttpMethod, path: &str) -> String {
    if let Some(op_id) = details.get("operationId").and_then(|v| v.as_str()) {
        return op_id.to_string();
    }

    let clean_path: String = path
        .chars()
        .filter(|c| *c != '{' && *c != '}')
        .map(|c| if c == '/' { '_' } else { c })
        .collect();

    format!("{}{}", method.as_str().to_ascii_lowercase(), clean_path)
}

/// `summary`, else `description`, else a fixed placeholder, then one
/// clarifying sentence per path parameter to improve retrieval for
/// operations like `GET /users/{id}`.
fn build_description(details: &Value, parameters: &[Value]) -> String {
    let base = details
        .get("summary")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            details
                .get("description")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or("No description.");

    let path_param_notes: Vec<String> = parameters
        .iter()
        .filter(|p| p.get("in").and_then(|v| v.as_str()) == Some("path"))
        .filter_map(|p| {
            let name = p.get("name").and_then(|v| v.as_str())?;
            if name.is_empty() {
                return None;
            }
            let desc = p
                .get("description")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            Some(format!("Uses {} parameter ({})", name, desc))
        })
        .collect();

    if path_param_notes.is_empty() {
        base.to_string()
    } else {
        format!("{}. {}.", base, path_param_notes.join(". "))
    }
}

/// Build `ParamSpec`s for every declared parameter.
///
/// Type comes from `schema.type`, falling back to the Swagger-2 inline
/// `type` field, defaulting to string. A path parameter whose name ends in
/// "id" (case-insensitive) is forced to integer: specs routinely declare
/// numeric ids as strings that upstream APIs expect unquoted.
fn build_params(parameters: &[Value]) -> Vec<ParamSpec> {
    parameters
        .iter()
        .filter_map(|param| {
            let name = param.get("name").and_then(|v| v.as_str())?.to_string();

            let location = match param.get("in").and_then(|v| v.as_str()) {
                Some("path") => ParamLocation::Path,
                Some("query") => ParamLocation::Query,
                _ => ParamLocation::BodyImplicit,
            };

            let declared_type = param
                .get("schema")
                .and_then(|s| s.get("type"))
                .and_then(|t| t.as_str())
                .or_else(|| param.get("type").and_then(|t| t.as_str()));
            let mut param_type = ParamType::from_spec_type(declared_type);

            if location == ParamLocation::Path
                && (name.to_ascii_lowercase().ends_with("id")
                    || param_type == ParamType::Integer)
            {
                param_type = ParamType::Integer;
            }

            let required = param
                .get("required")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);

            Some(ParamSpec {
                name,
                location,
                param_type,
                required,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile_one(spec: Value) -> Vec<ToolDefinition> {
        compile(&spec, "test_api", "test-connection")
    }

    #[test]
    fn test_compile_uses_operation_id() {
        let spec = json!({
            "openapi": "3.0.0",
            "servers": [{"url": "https://api.acme.dev/v1"}],
            "paths": {
                "/contacts": {
                    "post": {
                        "operationId": "create_contact",
                        "summary": "Create a new contact"
                    }
                }
            }
        });

        let tools = compile_one(spec);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "create_contact");
        assert_eq!(tools[0].method, HttpMethod::Post);
        assert_eq!(tools[0].path_template, "https://api.acme.dev/v1/contacts");
        assert_eq!(tools[0].connection_id, "test-connection");
    }

    #[test]
    fn test_synthesized_name_from_method_and_path() {
        let spec = json!({
            "servers": [{"url": "https://api.acme.dev"}],
            "paths": {
                "/users/{id}": {
                    "get": { "summary": "Get a user" }
                }
            }
        });

        let tools = compile_one(spec);
        assert_eq!(tools[0].name, "get_users_id");
    }

    #[test]
    fn test_unsupported_methods_are_skipped() {
        let spec = json!({
            "servers": [{"url": "https://api.acme.dev"}],
            "paths": {
                "/things": {
                    "get": { "operationId": "list_things" },
                    "head": { "operationId": "head_things" },
                    "options": { "operationId": "options_things" },
                    "parameters": [{"name": "shared", "in": "query"}]
                }
            }
        });

        let tools = compile_one(spec);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "list_things");
    }

    #[test]
    fn test_definition_count_matches_path_method_pairs() {
        let spec = json!({
            "servers": [{"url": "https://api.acme.dev"}],
            "paths": {
                "/a": { "get": {}, "post": {} },
                "/b": { "put": {}, "delete": {}, "patch": {} }
            }
        });

        let tools = compile_one(spec);
        assert_eq!(tools.len(), 5);

        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"get_a"));
        assert!(names.contains(&"patch_b"));
    }

    #[test]
    fn test_swagger2_base_url_assembly() {
        let spec = json!({
            "swagger": "2.0",
            "schemes": ["http"],
            "host": "legacy.acme.dev",
            "basePath": "/api/v2/",
            "paths": { "/ping": { "get": {} } }
        });

        let tools = compile_one(spec);
        assert_eq!(tools[0].path_template, "http://legacy.acme.dev/api/v2/ping");
    }

    #[test]
    fn test_swagger2_scheme_defaults_to_https() {
        let spec = json!({
            "host": "acme.dev",
            "paths": { "/ping": { "get": {} } }
        });

        let tools = compile_one(spec);
        assert_eq!(tools[0].path_template, "https://acme.dev/ping");
    }

    #[test]
    fn test_fallback_base_url_when_spec_has_neither() {
        let spec = json!({
            "paths": { "/ping": { "get": {} } }
        });

        let tools = compile_one(spec);
        assert_eq!(
            tools[0].path_template,
            "https://api.example.com/ping"
        );
    }

    #[test]
    fn test_description_falls_back_through_fields() {
        let spec = json!({
            "servers": [{"url": "https://api.acme.dev"}],
            "paths": {
                "/a": { "get": { "summary": "From summary" } },
                "/b": { "get": { "description": "From description" } },
                "/c": { "get": {} }
            }
        });

        let tools = compile_one(spec);
        let desc_for = |name: &str| {
            tools
                .iter()
                .find(|t| t.name == name)
                .map(|t| t.description.clone())
                .unwrap()
        };

        assert_eq!(desc_for("get_a"), "From summary");
        assert_eq!(desc_for("get_b"), "From description");
        assert_eq!(desc_for("get_c"), "No description.");
    }

    #[test]
    fn test_description_enriched_with_path_params() {
        let spec = json!({
            "servers": [{"url": "https://api.acme.dev"}],
            "paths": {
                "/users/{userId}": {
                    "get": {
                        "summary": "Get a user",
                        "parameters": [
                            {
                                "name": "userId",
                                "in": "path",
                                "description": "Numeric id of the user",
                                "required": true
                            },
                            {
                                "name": "verbose",
                                "in": "query",
                                "description": "Include extra fields"
                            }
                        ]
                    }
                }
            }
        });

        let tools = compile_one(spec);
        assert_eq!(
            tools[0].description,
            "Get a user. Uses userId parameter (Numeric id of the user)."
        );
    }

    #[test]
    fn test_path_id_param_forced_to_integer() {
        let spec = json!({
            "servers": [{"url": "https://api.acme.dev"}],
            "paths": {
                "/users/{userId}/posts/{slug}": {
                    "get": {
                        "parameters": [
                            {
                                "name": "userId",
                                "in": "path",
                                "required": true,
                                "schema": {"type": "string"}
                            },
                            {
                                "name": "slug",
                                "in": "path",
                                "required": true,
                                "schema": {"type": "string"}
                            }
                        ]
                    }
                }
            }
        });

        let tools = compile_one(spec);
        let param_for = |name: &str| {
            tools[0]
                .params
                .iter()
                .find(|p| p.name == name)
                .cloned()
                .unwrap()
        };

        assert_eq!(param_for("userId").param_type, ParamType::Integer);
        assert_eq!(param_for("slug").param_type, ParamType::String);
    }

    #[test]
    fn test_swagger2_inline_type_is_read() {
        let spec = json!({
            "host": "acme.dev",
            "paths": {
                "/search": {
                    "get": {
                        "parameters": [
                            {"name": "limit", "in": "query", "type": "integer"},
                            {"name": "active", "in": "query", "type": "boolean"},
                            {"name": "q", "in": "query"}
                        ]
                    }
                }
            }
        });

        let tools = compile_one(spec);
        let types: Vec<ParamType> = tools[0].params.iter().map(|p| p.param_type).collect();
        assert_eq!(
            types,
            vec![ParamType::Integer, ParamType::Boolean, ParamType::String]
        );
    }

    #[test]
    fn test_required_defaults_to_false() {
        let spec = json!({
            "servers": [{"url": "https://api.acme.dev"}],
            "paths": {
                "/things": {
                    "get": {
                        "parameters": [
                            {"name": "a", "in": "query", "required": true},
                            {"name": "b", "in": "query"}
                        ]
                    }
                }
            }
        });

        let tools = compile_one(spec);
        assert!(tools[0].params[0].required);
        assert!(!tools[0].params[1].required);
    }

    #[test]
    fn test_body_params_are_body_implicit() {
        let spec = json!({
            "host": "acme.dev",
            "paths": {
                "/upload": {
                    "post": {
                        "parameters": [
                            {"name": "payload", "in": "body"},
                            {"name": "x-trace", "in": "header"}
                        ]
                    }
                }
            }
        });

        let tools = compile_one(spec);
        assert!(tools[0]
            .params
            .iter()
            .all(|p| p.location == ParamLocation::BodyImplicit));
    }
}
