//! Embedding providers.
//!
//! The registry depends on the `Embedder` trait rather than a concrete
//! model, so tests can swap in a deterministic implementation. The
//! production provider is `BgeEmbedder`, a BGE-base bi-encoder running on
//! ONNX Runtime.

pub mod bge;

pub use bge::BgeEmbedder;

use crate::error::Result;

/// Produces dense, L2-normalized vectors for similarity comparison.
///
/// Implementations must be safe to call from concurrent handler tasks;
/// `BgeEmbedder` uses a lock-free session pool for this.
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts. Returns one unit-length vector per input.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.embed_batch(&[text.to_string()])?;
        Ok(batch.remove(0))
    }

    /// Dimensionality of produced vectors.
    fn dimension(&self) -> usize;
}
