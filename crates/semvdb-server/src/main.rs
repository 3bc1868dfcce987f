mod config;
mod http_server;


use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use semvdb_core::{Searcher, SearcherConfig};
use semvdb_embed::{Bm25Encoder, HybridEncoder, OnnxVectorizer, RemoteVectorizer, Vectorizer};
use semvdb_sdk::Client;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Args;

async fn load_vectorizer(args: &Args) -> Result<Arc<dyn Vectorizer>> {
    if let Some(url) = &args.embeddings_url {
        info!(%url, model = %args.embeddings_model, "using remote embeddings");
        return Ok(Arc::new(RemoteVectorizer::new(
            url,
            args.embeddings_model.clone(),
            args.embeddings_api_key.clone(),
        )));
    }
    let vectorizer = match (&args.model_path, &args.tokenizer_path) {
        (Some(model), Some(tokenizer)) => {
            OnnxVectorizer::new(model, tokenizer, args.onnx_options())?
        }
        _ => {
            info!(repo = %args.model_repo, "fetching model from the hub");
            OnnxVectorizer::from_hub(&args.model_repo, args.onnx_options())
                .await
                .with_context(|| format!("Failed to load model {}", args.model_repo))?
        }
    };
    Ok(Arc::new(vectorizer))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = args.socket_addr()?;
    let client = Client::with_config(args.client_config())?;
    match client.health().await {
        Ok(()) => info!(url = %args.qdrant_url, collection = %args.collection, "qdrant reachable"),
        Err(e) => warn!(url = %args.qdrant_url, error = %e, "qdrant health check failed"),
    }

    let vectorizer = load_vectorizer(&args).await?;
    let bm25 = Bm25Encoder::load(&args.bm25_params)?;
    let searcher = Searcher::with_config(
        client,
        HybridEncoder::new(vectorizer, bm25),
        SearcherConfig {
            text_field: args.text_field.clone(),
        },
    );

    let cors = http_server::cors_layer(&args.allowed_origins)?;
    let app = http_server::router(Arc::new(searcher), cors);
    http_server::serve(app, addr).await
}
