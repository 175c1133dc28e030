use crate::config::Config;
use crate::credentials::{CredentialStore, MemoryCredentialStore};
use crate::embedding::{BgeEmbedder, Embedder};
use crate::error::Result;
use crate::executor::ToolExecutor;
use crate::index::VectorIndex;
use crate::registry::ToolRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all request handlers.
///
/// The registry is the only mutable piece and guards itself; everything
/// else is read-only after construction.
pub struct AppState {
    pub registry: Arc<ToolRegistry>,
    pub executor: ToolExecutor,
    pub credentials: Arc<MemoryCredentialStore>,
    pub http: reqwest::Client,
    /// Flag indicating the embedder is loaded and warmed up.
    pub ready: AtomicBool,
    pub config: Arc<Config>,
}

impl AppState {
    /// Initialize application state: load the embedding model pool, open
    /// the persisted vector index, and build the shared HTTP client with a
    /// bounded request timeout.
    pub fn new(config: Config) -> Result<Self> {
        let num_cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let pool_size = config.pool_size.unwrap_or(num_cores);

        tracing::info!(num_cores, pool_size, "Initializing embedding session pool");

        let embedder: Arc<dyn Embedder> = Arc::new(BgeEmbedder::load(
            &config.model_path,
            &config.tokenizer_path,
            config.max_sequence_length,
            pool_size,
        )?);

        // The index survives restarts; the dispatch map does not. Tools
        // must be re-registered (specs recompiled) before indexed entries
        // resolve again.
        let index = VectorIndex::open(&config.index_path);
        if !index.is_empty() {
            tracing::info!(
                entries = index.len(),
                "Index has persisted entries with no live definitions yet"
            );
        }

        let registry = Arc::new(ToolRegistry::new(Arc::clone(&embedder), index));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| crate::error::AppError::Resource(e.to_string()))?;

        let credentials = Arc::new(MemoryCredentialStore::new());
        let credential_store: Arc<dyn CredentialStore> = credentials.clone();
        let executor = ToolExecutor::new(http.clone(), credential_store);

        let state = Self {
            registry,
            executor,
            credentials,
            http,
            ready: AtomicBool::new(false),
            config: Arc::new(config),
        };

        state.warmup(embedder.as_ref())?;
        state.ready.store(true, Ordering::SeqCst);

        Ok(state)
    }

    /// Run a warmup embedding to trigger lazy initialization in ONNX
    /// Runtime, so the first real request avoids cold-start latency.
    fn warmup(&self, embedder: &dyn Embedder) -> Result<()> {
        tracing::info!("Running embedder warmup...");
        let _ = embedder.embed("warmup query")?;
        tracing::info!("Embedder warmup completed");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}
