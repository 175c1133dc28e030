//! Spec fetching and compilation.
//!
//! Turns a remote OpenAPI/Swagger document into `ToolDefinition`s: the
//! fetcher retrieves and parses the raw document, the compiler derives one
//! definition per supported path/method pair.

pub mod compiler;
pub mod fetcher;
pub mod types;

pub use compiler::compile;
pub use fetcher::{fetch_spec, parse_spec};
pub use types::{HttpMethod, ParamLocation, ParamSpec, ParamType, ToolDefinition};
