//! Credential lookup for tool execution.
//!
//! The executor consumes only the `CredentialStore` contract; where
//! credentials actually live (database, secret manager) is a collaborator
//! concern. The in-memory store here backs the service shell: static bearer
//! tokens keyed by connection id, nothing more.

use parking_lot::RwLock;
use std::collections::HashMap;

/// Read-only contract consumed by the executor. Returns an empty map when
/// no credentials exist for the connection, never an error.
pub trait CredentialStore: Send + Sync {
    fn get_auth_headers(&self, connection_id: &str) -> HashMap<String, String>;
}

/// Bearer-token store held in process memory.
#[derive(Default)]
pub struct MemoryCredentialStore {
    keys: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save or replace the API key for a connection. A `None` key leaves
    /// any existing credential in place, so re-adding an integration
    /// without re-entering the key keeps it working.
    pub fn store_api_key(&self, connection_id: &str, api_key: Option<&str>) {
        match api_key {
            Some(key) if !key.is_empty() => {
                self.keys
                    .write()
                    .insert(connection_id.to_string(), key.to_string());
                tracing::info!(connection = connection_id, "Credential stored");
            }
            _ => {
                tracing::debug!(
                    connection = connection_id,
                    "No API key provided; preserving any existing credential"
                );
            }
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get_auth_headers(&self, connection_id: &str) -> HashMap<String, String> {
        match self.keys.read().get(connection_id) {
            Some(key) => HashMap::from([(
                "Authorization".to_string(),
                format!("Bearer {}", key),
            )]),
            None => HashMap::new(),
        }
    }
}
