use std::env;
use std::path::PathBuf;

pub struct Config {
    pub host: String,
    pub port: u16,
    /// Path to the bi-encoder ONNX model used for embeddings.
    pub model_path: PathBuf,
    /// Path to the bi-encoder tokenizer JSON.
    pub tokenizer_path: PathBuf,
    pub max_sequence_length: usize,
    pub shutdown_timeout_secs: u64,
    /// Optional override for the embedding session pool size. If None,
    /// uses available parallelism.
    pub pool_size: Option<usize>,
    /// Path to the persisted vector index file.
    pub index_path: PathBuf,
    /// Bounded per-call timeout for outbound tool requests, in seconds.
    pub request_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            model_path: PathBuf::from(
                env::var("MODEL_PATH").unwrap_or_else(|_| "./models/model_int8.onnx".to_string()),
            ),
            tokenizer_path: PathBuf::from(
                env::var("TOKENIZER_PATH")
                    .unwrap_or_else(|_| "./models/tokenizer.json".to_string()),
            ),
            max_sequence_length: env::var("MAX_SEQ_LENGTH")
                .unwrap_or_else(|_| "512".to_string())
                .parse()?,
            shutdown_timeout_secs: env::var("SHUTDOWN_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            pool_size: env::var("POOL_SIZE").ok().and_then(|s| s.parse().ok()),
            index_path: PathBuf::from(
                env::var("INDEX_PATH").unwrap_or_else(|_| ".toolbridge/tools.idx".to_string()),
            ),
            request_timeout_secs: env::var("REQUEST_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
        })
    }
}
