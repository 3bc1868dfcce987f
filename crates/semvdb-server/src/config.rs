use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use semvdb_embed::OnnxOptions;
use semvdb_sdk::ClientConfig;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "semvdb-server",
    about = "Hybrid semantic search and similarity graphs over a Qdrant collection"
)]
pub struct Args {
    #[arg(long, env = "SEMVDB_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "SEMVDB_PORT", default_value_t = 6555)]
    pub port: u16,

    #[arg(long, env = "QDRANT_URL", default_value = "http://qdrant:6333")]
    pub qdrant_url: String,

    #[arg(long, env = "QDRANT_API_KEY")]
    pub qdrant_api_key: Option<String>,

    /// Qdrant request timeout in seconds
    #[arg(long, env = "QDRANT_TIMEOUT", default_value_t = 100)]
    pub qdrant_timeout: u64,

    #[arg(long, env = "SEMVDB_COLLECTION", default_value = "lyrics")]
    pub collection: String,

    #[arg(long, default_value = semvdb_sdk::DEFAULT_DENSE_VECTOR)]
    pub dense_vector: String,

    #[arg(long, default_value = semvdb_sdk::DEFAULT_SPARSE_VECTOR)]
    pub sparse_vector: String,

    /// Payload field holding the text of each point
    #[arg(long, env = "SEMVDB_TEXT_FIELD", default_value = semvdb_core::config::DEFAULT_TEXT_FIELD)]
    pub text_field: String,

    /// Hugging Face repository with `model.onnx` and `tokenizer.json`
    #[arg(long, env = "SEMVDB_MODEL_REPO", default_value = "brunokreiner/lyrics-bert")]
    pub model_repo: String,

    /// Local ONNX model; overrides --model-repo together with --tokenizer-path
    #[arg(long, env = "SEMVDB_MODEL_PATH", requires = "tokenizer_path")]
    pub model_path: Option<PathBuf>,

    #[arg(long, env = "SEMVDB_TOKENIZER_PATH", requires = "model_path")]
    pub tokenizer_path: Option<PathBuf>,

    /// L2-normalise dense query vectors
    #[arg(long)]
    pub normalize: bool,

    /// OpenAI-compatible embeddings endpoint used instead of the local model
    #[arg(long, env = "SEMVDB_EMBEDDINGS_URL", conflicts_with = "model_path")]
    pub embeddings_url: Option<String>,

    #[arg(long, env = "SEMVDB_EMBEDDINGS_MODEL", default_value = "brunokreiner/lyrics-bert")]
    pub embeddings_model: String,

    #[arg(long, env = "SEMVDB_EMBEDDINGS_API_KEY")]
    pub embeddings_api_key: Option<String>,

    /// Fitted BM25 parameters (JSON)
    #[arg(long, env = "SEMVDB_BM25_PARAMS", default_value = "lyrics-bert-embeddings-bm25.json")]
    pub bm25_params: PathBuf,

    /// CORS origin; repeat for several
    #[arg(
        long = "allowed-origin",
        env = "SEMVDB_ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_values_t = [String::from("http://localhost"), String::from("http://localhost:8000")]
    )]
    pub allowed_origins: Vec<String>,
}

impl Args {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.qdrant_url, &self.collection)
            .with_api_key(self.qdrant_api_key.clone())
            .with_timeout(Duration::from_secs(self.qdrant_timeout))
            .with_vector_names(&self.dense_vector, &self.sparse_vector)
    }

    pub fn onnx_options(&self) -> OnnxOptions {
        OnnxOptions {
            normalize: self.normalize,
            ..OnnxOptions::default()
        }
    }
}
