//! Semantic tool registry.
//!
//! Owns the name -> definition dispatch map and a handle to the vector
//! index, constructed once at startup and shared by reference; the
//! dispatch state is never ambient. Registration embeds each tool's
//! document text; search embeds the query and resolves ranked names back
//! through the map.

use crate::embedding::Embedder;
use crate::error::Result;
use crate::index::{IndexEntry, VectorIndex};
use crate::spec::types::ToolDefinition;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<ToolDefinition>>>,
    index: VectorIndex,
    embedder: Arc<dyn Embedder>,
}

impl ToolRegistry {
    pub fn new(embedder: Arc<dyn Embedder>, index: VectorIndex) -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            index,
            embedder,
        }
    }

    /// Register compiled tools: store each in the dispatch map (overwriting
    /// on name collision, last write wins) and append its embedded document
    /// to the vector index. Returns the number of tools registered.
    ///
    /// Registration is append-only with respect to the index: registering
    /// the same set twice leaves two near-duplicate entries per tool.
    /// Search deduplicates by name at read time, so duplicates cost index
    /// space and candidate slots but never surface twice.
    ///
    /// Embedding is CPU-bound; async callers should wrap this in
    /// `spawn_blocking`.
    pub fn register(&self, tools: Vec<ToolDefinition>) -> Result<usize> {
        if tools.is_empty() {
            tracing::warn!("No tools provided to register");
            return Ok(0);
        }

        let documents: Vec<String> = tools.iter().map(ToolDefinition::document_text).collect();

        tracing::info!(count = tools.len(), "Indexing tools into vector index");
        let embeddings = self.embedder.embed_batch(&documents)?;

        let mut entries = Vec::with_capacity(tools.len());
        {
            let mut map = self.tools.write();
            for ((tool, document_text), embedding) in
                tools.into_iter().zip(documents).zip(embeddings)
            {
                entries.push(IndexEntry {
                    document_text,
                    embedding,
                    tool_name: tool.name.clone(),
                });
                map.insert(tool.name.clone(), Arc::new(tool));
            }
        }

        let count = entries.len();
        self.index.append(entries)?;
        tracing::info!(count, "Indexing complete");

        Ok(count)
    }

    /// Find the tools most relevant to a natural-language query.
    ///
    /// Returns at most `k` definitions: nearest-neighbor hits are
    /// deduplicated by tool name preserving rank order, then resolved
    /// through the dispatch map. Indexed names with no live definition
    /// (normal after a restart, since the index persists and the map does
    /// not) are silently dropped.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<Arc<ToolDefinition>>> {
        tracing::info!(query, k, "Searching tools");

        let query_embedding = self.embedder.embed(query)?;
        let hits = self.index.search(&query_embedding, k);

        let map = self.tools.read();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut found = Vec::new();

        for hit in &hits {
            if !seen.insert(hit.tool_name.as_str()) {
                continue;
            }
            match map.get(&hit.tool_name) {
                Some(def) => found.push(Arc::clone(def)),
                None => {
                    tracing::debug!(
                        tool = %hit.tool_name,
                        "Indexed tool has no live definition, dropping"
                    );
                }
            }
        }

        tracing::info!(
            found = found.len(),
            tools = ?found.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "Search complete"
        );

        Ok(found)
    }

    /// Dispatch-map lookup by exact name.
    pub fn get(&self, name: &str) -> Option<Arc<ToolDefinition>> {
        self.tools.read().get(name).cloned()
    }

    /// Number of live definitions (not index entries).
    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }

    /// Number of persisted index entries, which can exceed `len()` after
    /// re-registration or differ after a restart.
    pub fn index_len(&self) -> usize {
        self.index.len()
    }
}
