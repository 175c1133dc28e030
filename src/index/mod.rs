//! Vector index for semantic tool lookup.
//!
//! An append-only store of embedded tool documents with cosine
//! nearest-neighbor search. Entries persist in a versioned binary file that
//! outlives the process, independent of the in-memory dispatch map, which
//! is rebuilt by recompiling specs after a restart. The registry resolves
//! that asymmetry at read time by dropping indexed names with no live
//! definition.

use crate::error::{AppError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Index file format version. Increment when the format changes.
const INDEX_VERSION: u32 = 1;

/// Magic bytes identifying valid index files.
const INDEX_MAGIC: &[u8; 8] = b"TOOLBIDX";

/// One embedded document. `tool_name` is a weak back-reference into the
/// registry's dispatch map, never an ownership link: the entry stays valid
/// on disk even when no definition with that name is live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub document_text: String,
    pub embedding: Vec<f32>,
    pub tool_name: String,
}

/// A ranked search hit.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub tool_name: String,
    pub score: f32,
}

/// Append-only vector store with exhaustive cosine search.
///
/// Embeddings are expected to be L2-normalized, so similarity is a plain
/// dot product. Tool sets are hundreds of entries, not millions; an
/// exhaustive scan at that size beats any ANN structure's overhead.
pub struct VectorIndex {
    entries: RwLock<Vec<IndexEntry>>,
    path: Option<PathBuf>,
}

impl VectorIndex {
    /// Open a persistent index, loading any previously saved entries.
    ///
    /// A missing, corrupt, or version-mismatched file starts the index
    /// empty rather than failing startup.
    pub fn open(path: &Path) -> Self {
        let entries = match load_entries(path) {
            Ok(Some(entries)) => {
                tracing::info!(
                    path = %path.display(),
                    entries = entries.len(),
                    "Vector index loaded"
                );
                entries
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable index file");
                Vec::new()
            }
        };

        Self {
            entries: RwLock::new(entries),
            path: Some(path.to_path_buf()),
        }
    }

    /// An index with no backing file. Used by tests and embedded callers.
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            path: None,
        }
    }

    /// Append entries and persist. Append-only by design: no identity check
    /// is made against existing entries for the same tool name (see
    /// DESIGN.md on the re-registration policy).
    pub fn append(&self, new_entries: Vec<IndexEntry>) -> Result<()> {
        if new_entries.is_empty() {
            return Ok(());
        }

        let mut entries = self.entries.write();
        entries.extend(new_entries);

        if let Some(path) = &self.path {
            save_entries(path, &entries)?;
        }

        Ok(())
    }

    /// Nearest-neighbor search: top `k` entries by dot product against a
    /// normalized query vector. Ties keep insertion order (stable sort).
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        let entries = self.entries.read();

        let mut scored: Vec<(usize, f32)> = entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (idx, dot(query, &entry.embedding)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(k)
            .map(|(idx, score)| SearchHit {
                tool_name: entries[idx].tool_name.clone(),
                score,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Dot product over the shared prefix. A dimension mismatch (index written
/// by a different model) scores the overlap only instead of panicking.
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// File format:
/// - 8 bytes: magic "TOOLBIDX"
/// - 4 bytes: version (u32 LE)
/// - 32 bytes: SHA256 of the payload
/// - 8 bytes: payload length (u64 LE)
/// - N bytes: payload: num_entries (u64 LE), then per entry:
///   name_len/name, doc_len/doc (u64 LE + UTF-8), dim (u64 LE), dim f32 LE
fn save_entries(path: &Path, entries: &[IndexEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::Index(format!("Failed to create index directory: {}", e)))?;
    }

    let mut payload = Vec::new();
    payload.extend_from_slice(&(entries.len() as u64).to_le_bytes());
    for entry in entries {
        write_str(&mut payload, &entry.tool_name);
        write_str(&mut payload, &entry.document_text);
        payload.extend_from_slice(&(entry.embedding.len() as u64).to_le_bytes());
        for &val in &entry.embedding {
            payload.extend_from_slice(&val.to_le_bytes());
        }
    }

    let checksum: [u8; 32] = Sha256::digest(&payload).into();

    let file = File::create(path)
        .map_err(|e| AppError::Index(format!("Failed to create index file: {}", e)))?;
    let mut writer = BufWriter::new(file);

    writer
        .write_all(INDEX_MAGIC)
        .and_then(|()| writer.write_all(&INDEX_VERSION.to_le_bytes()))
        .and_then(|()| writer.write_all(&checksum))
        .and_then(|()| writer.write_all(&(payload.len() as u64).to_le_bytes()))
        .and_then(|()| writer.write_all(&payload))
        .and_then(|()| writer.flush())
        .map_err(|e| AppError::Index(format!("Failed to write index file: {}", e)))?;

    tracing::debug!(
        path = %path.display(),
        entries = entries.len(),
        bytes = 8 + 4 + 32 + 8 + payload.len(),
        "Vector index saved"
    );

    Ok(())
}

/// Load entries from disk. Returns `Ok(None)` when the file is absent or
/// recognizably not ours (wrong magic/version/checksum), matching the
/// tolerant startup policy.
fn load_entries(path: &Path) -> Result<Option<Vec<IndexEntry>>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path)
        .map_err(|e| AppError::Index(format!("Failed to open index file: {}", e)))?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 8];
    if reader.read_exact(&mut magic).is_err() || &magic != INDEX_MAGIC {
        tracing::warn!(path = %path.display(), "Invalid index magic, ignoring");
        return Ok(None);
    }

    let mut version_bytes = [0u8; 4];
    reader
        .read_exact(&mut version_bytes)
        .map_err(|e| AppError::Index(format!("Failed to read index version: {}", e)))?;
    if u32::from_le_bytes(version_bytes) != INDEX_VERSION {
        tracing::warn!(path = %path.display(), "Index version mismatch, ignoring");
        return Ok(None);
    }

    let mut checksum = [0u8; 32];
    reader
        .read_exact(&mut checksum)
        .map_err(|e| AppError::Index(format!("Failed to read index checksum: {}", e)))?;

    let mut len_bytes = [0u8; 8];
    reader
        .read_exact(&mut len_bytes)
        .map_err(|e| AppError::Index(format!("Failed to read payload length: {}", e)))?;
    let payload_len = u64::from_le_bytes(len_bytes) as usize;

    let mut payload = vec![0u8; payload_len];
    reader
        .read_exact(&mut payload)
        .map_err(|e| AppError::Index(format!("Failed to read index payload: {}", e)))?;

    let actual: [u8; 32] = Sha256::digest(&payload).into();
    if actual != checksum {
        tracing::warn!(path = %path.display(), "Index checksum mismatch, ignoring");
        return Ok(None);
    }

    let mut cursor = 0usize;
    let num_entries = read_u64(&payload, &mut cursor)? as usize;
    let mut entries = Vec::with_capacity(num_entries);

    for _ in 0..num_entries {
        let tool_name = read_string(&payload, &mut cursor)?;
        let document_text = read_string(&payload, &mut cursor)?;
        let dim = read_u64(&payload, &mut cursor)? as usize;

        let mut embedding = Vec::with_capacity(dim);
        for _ in 0..dim {
            let bytes: [u8; 4] = payload
                .get(cursor..cursor + 4)
                .and_then(|s| s.try_into().ok())
                .ok_or_else(|| AppError::Index("Truncated embedding data".into()))?;
            embedding.push(f32::from_le_bytes(bytes));
            cursor += 4;
        }

        entries.push(IndexEntry {
            document_text,
            embedding,
            tool_name,
        });
    }

    Ok(Some(entries))
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u64).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn read_u64(payload: &[u8], cursor: &mut usize) -> Result<u64> {
    let bytes: [u8; 8] = payload
        .get(*cursor..*cursor + 8)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| AppError::Index("Truncated index payload".into()))?;
    *cursor += 8;
    Ok(u64::from_le_bytes(bytes))
}

fn read_string(payload: &[u8], cursor: &mut usize) -> Result<String> {
    let len = read_u64(payload, cursor)? as usize;
    let bytes = payload
        .get(*cursor..*cursor + len)
        .ok_or_else(|| AppError::Index("Truncated string in index payload".into()))?;
    *cursor += len;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| AppError::Index(format!("Invalid UTF-8 in index payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(name: &str, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            document_text: format!("Tool Name: {}", name),
            embedding,
            tool_name: name.to_string(),
        }
    }

    #[test]
    fn test_search_ranks_by_dot_product() {
        let index = VectorIndex::in_memory();
        index
            .append(vec![
                entry("far", vec![0.0, 1.0]),
                entry("near", vec![1.0, 0.0]),
                entry("mid", vec![0.7, 0.7]),
            ])
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].tool_name, "near");
        assert_eq!(hits[1].tool_name, "mid");
    }

    #[test]
    fn test_search_ties_keep_insertion_order() {
        let index = VectorIndex::in_memory();
        index
            .append(vec![
                entry("first", vec![1.0, 0.0]),
                entry("second", vec![1.0, 0.0]),
            ])
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 2);
        assert_eq!(hits[0].tool_name, "first");
        assert_eq!(hits[1].tool_name, "second");
    }

    #[test]
    fn test_search_on_empty_index_returns_nothing() {
        let index = VectorIndex::in_memory();
        assert!(index.search(&[1.0, 0.0], 5).is_empty());
    }

    #[test]
    fn test_append_is_append_only() {
        let index = VectorIndex::in_memory();
        index.append(vec![entry("dup", vec![1.0])]).unwrap();
        index.append(vec![entry("dup", vec![1.0])]).unwrap();

        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tools.idx");

        {
            let index = VectorIndex::open(&path);
            index
                .append(vec![
                    entry("alpha", vec![0.1, 0.2, 0.3]),
                    entry("beta", vec![0.4, 0.5, 0.6]),
                ])
                .unwrap();
        }

        let reloaded = VectorIndex::open(&path);
        assert_eq!(reloaded.len(), 2);

        let hits = reloaded.search(&[0.4, 0.5, 0.6], 1);
        assert_eq!(hits[0].tool_name, "beta");
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tools.idx");
        fs::write(&path, b"definitely not an index").unwrap();

        let index = VectorIndex::open(&path);
        assert!(index.is_empty());
    }

    #[test]
    fn test_checksum_detects_payload_corruption() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tools.idx");

        {
            let index = VectorIndex::open(&path);
            index.append(vec![entry("alpha", vec![1.0, 2.0])]).unwrap();
        }

        // Flip a byte in the payload region, past the 52-byte header.
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, &bytes).unwrap();

        let index = VectorIndex::open(&path);
        assert!(index.is_empty());
    }
}
