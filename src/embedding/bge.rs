//! BGE bi-encoder embedding provider.
//!
//! Uses BAAI/bge-base-en-v1.5 to produce 768-dimensional embeddings. The
//! bi-encoder encodes queries and documents independently, so document
//! vectors can be computed once at registration time and only the query is
//! embedded per search.

use crate::embedding::Embedder;
use crate::error::{AppError, Result};
use crossbeam::queue::ArrayQueue;
use ndarray::Array2;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use std::cell::UnsafeCell;
use std::path::Path;
use std::sync::Arc;

/// BGE-base embedding dimension.
const EMBEDDING_DIM: usize = 768;

/// Embedding model behind a pool of ONNX sessions.
///
/// # Design Rationale
/// ONNX `Session::run` requires `&mut self`, but register and search may
/// embed concurrently from different agent turns. Instead of a Mutex (which
/// serializes every request), we create N independent Session instances and
/// hand out exclusive access via a lock-free queue of indices.
///
/// # Safety
/// The ArrayQueue guarantees each session index is held by at most one
/// thread between acquire and release, which makes the UnsafeCell access
/// sound.
pub struct BgeEmbedder {
    sessions: Vec<UnsafeCell<Session>>,
    available: Arc<ArrayQueue<usize>>,
    tokenizer: tokenizers::Tokenizer,
    max_length: usize,
}

impl BgeEmbedder {
    /// Load the model and tokenizer, creating `pool_size` sessions.
    ///
    /// Each session runs with a single intra-op thread; parallelism comes
    /// from the pool, not from threading within a session.
    pub fn load(
        model_path: &Path,
        tokenizer_path: &Path,
        max_length: usize,
        pool_size: usize,
    ) -> Result<Self> {
        let tokenizer = tokenizers::Tokenizer::from_file(tokenizer_path)
            .map_err(|e| AppError::Embedding(format!("Failed to load tokenizer: {}", e)))?;

        let model_bytes = std::fs::read(model_path)
            .map_err(|e| AppError::Embedding(format!("Failed to read model file: {}", e)))?;

        let mut sessions = Vec::with_capacity(pool_size);
        let available = Arc::new(ArrayQueue::new(pool_size));

        for i in 0..pool_size {
            let session = Session::builder()
                .map_err(|e| AppError::Embedding(e.to_string()))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| AppError::Embedding(e.to_string()))?
                .with_intra_threads(1)
                .map_err(|e| AppError::Embedding(e.to_string()))?
                .commit_from_memory(&model_bytes)
                .map_err(|e: ort::Error| AppError::Embedding(e.to_string()))?;

            sessions.push(UnsafeCell::new(session));
            available
                .push(i)
                .map_err(|_| AppError::Embedding("Failed to initialize session pool".into()))?;
        }

        tracing::info!(
            model = %model_path.display(),
            tokenizer = %tokenizer_path.display(),
            pool_size,
            max_length,
            "Embedding model loaded"
        );

        Ok(Self {
            sessions,
            available,
            tokenizer,
            max_length,
        })
    }

    fn acquire_session(&self) -> Result<usize> {
        self.available
            .pop()
            .ok_or_else(|| AppError::Resource("No available embedding sessions".into()))
    }

    fn release_session(&self, index: usize) {
        // Never fails: we only release indices we acquired.
        let _ = self.available.push(index);
    }

    /// Run the encoder on pre-tokenized, padded inputs and mean-pool into
    /// L2-normalized embeddings.
    fn run_encoder(
        &self,
        session_idx: usize,
        batch_size: usize,
        max_len: usize,
        input_ids: Vec<i64>,
        attention_mask: Vec<i64>,
    ) -> Result<Array2<f32>> {
        let shape = [batch_size, max_len];
        let token_type_ids = vec![0i64; batch_size * max_len];

        let input_ids_tensor = Tensor::from_array((shape, input_ids))
            .map_err(|e| AppError::Embedding(e.to_string()))?;
        let attention_mask_tensor = Tensor::from_array((shape, attention_mask.clone()))
            .map_err(|e| AppError::Embedding(e.to_string()))?;
        let token_type_ids_tensor = Tensor::from_array((shape, token_type_ids))
            .map_err(|e| AppError::Embedding(e.to_string()))?;

        // SAFETY: ArrayQueue guarantees exclusive access to this index
        // between acquire_session() and release_session().
        let session = unsafe { &mut *self.sessions[session_idx].get() };

        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor,
            ])
            .map_err(|e| AppError::Embedding(format!("Encoder inference failed: {}", e)))?;

        let hidden_state = outputs
            .get("last_hidden_state")
            .ok_or_else(|| AppError::Embedding("No 'last_hidden_state' output found".into()))?;

        let tensor = hidden_state
            .try_extract_tensor::<f32>()
            .map_err(|e| AppError::Embedding(e.to_string()))?;

        let (shape_info, data) = tensor;
        let hidden_size = shape_info[2] as usize;

        // Mean pooling over non-padding tokens, then L2 normalization so
        // cosine similarity reduces to a dot product downstream.
        let mut embeddings = Array2::zeros((batch_size, hidden_size));

        for i in 0..batch_size {
            let mut sum = vec![0.0f32; hidden_size];
            let mut count = 0.0f32;

            for j in 0..max_len {
                if attention_mask[i * max_len + j] == 1 {
                    let base_idx = i * max_len * hidden_size + j * hidden_size;
                    for (k, sum_val) in sum.iter_mut().enumerate() {
                        *sum_val += data[base_idx + k];
                    }
                    count += 1.0;
                }
            }

            if count > 0.0 {
                for (k, sum_val) in sum.iter().enumerate() {
                    embeddings[[i, k]] = sum_val / count;
                }
            }

            let norm: f32 = embeddings.row(i).iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                let mut row = embeddings.row_mut(i);
                for val in row.iter_mut() {
                    *val /= norm;
                }
            }
        }

        Ok(embeddings)
    }
}

impl Embedder for BgeEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| AppError::Embedding(format!("Tokenization failed: {}", e)))?;

        let batch_size = encodings.len();
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len().min(self.max_length))
            .max()
            .unwrap_or(1);

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let len = ids.len().min(max_len);

            for j in 0..len {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = mask[j] as i64;
            }
        }

        let session_idx = self.acquire_session()?;
        let result = self.run_encoder(session_idx, batch_size, max_len, input_ids, attention_mask);
        self.release_session(session_idx);

        let embeddings = result?;
        Ok(embeddings.outer_iter().map(|row| row.to_vec()).collect())
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }
}

// SAFETY: Tokenizer is Send + Sync; Sessions are only reached through the
// ArrayQueue, which hands each index to at most one thread at a time. That
// gives the same mutual exclusion as a Mutex, without blocking.
unsafe impl Send for BgeEmbedder {}
unsafe impl Sync for BgeEmbedder {}
