//! Query encoders for semantic-vdb.
//!
//! Dense vectors come from a [`Vectorizer`]: either a local ONNX sentence
//! model with mean pooling or a remote OpenAI-compatible embeddings endpoint.
//! Sparse vectors come from the hashed BM25 encoder in [`bm25`].
//! [`HybridEncoder`] glues both behind `semvdb_core::QueryEncoder`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ndarray::{Array2, ArrayView2, ArrayView3, ArrayViewD, Ix2, Ix3};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Value,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};
use tracing::{debug, info};

pub mod bm25;
pub mod encoder;

pub use bm25::{Bm25Encoder, Bm25Params};
pub use encoder::HybridEncoder;

/// Hub file names fetched by [`OnnxVectorizer::from_hub`].
pub const HUB_MODEL_FILE: &str = "model.onnx";
pub const HUB_TOKENIZER_FILE: &str = "tokenizer.json";

#[async_trait]
pub trait Vectorizer: Send + Sync {
    /// One vector per input text, in input order.
    async fn vectorize(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>>;

    /// Output width; 0 until known.
    fn dimension(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct OnnxOptions {
    /// L2-normalise pooled vectors
    pub normalize: bool,
    pub intra_threads: usize,
    /// Token limit per text, including special tokens
    pub max_length: usize,
}

impl Default for OnnxOptions {
    fn default() -> Self {
        Self {
            normalize: false,
            intra_threads: 4,
            max_length: 512,
        }
    }
}

/// Sentence encoder running a transformer exported to ONNX.
pub struct OnnxVectorizer {
    tokenizer: Tokenizer,
    session: Mutex<Session>,
    uses_token_type_ids: bool,
    normalize: bool,
    dimension: AtomicUsize,
}

impl OnnxVectorizer {
    pub fn new(
        model_path: impl Into<PathBuf>,
        tokenizer_path: impl Into<PathBuf>,
        options: OnnxOptions,
    ) -> Result<Self> {
        let model_path = model_path.into();
        let tokenizer_path = tokenizer_path.into();

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: options.max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Invalid truncation settings: {}", e))?;
        tokenizer.with_padding(Some(PaddingParams::default()));

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(options.intra_threads)?
            .commit_from_file(&model_path)?;
        let uses_token_type_ids = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        info!(
            model = %model_path.display(),
            tokenizer = %tokenizer_path.display(),
            normalize = options.normalize,
            "loaded ONNX sentence encoder"
        );
        Ok(Self {
            tokenizer,
            session: Mutex::new(session),
            uses_token_type_ids,
            normalize: options.normalize,
            dimension: AtomicUsize::new(0),
        })
    }

    /// Downloads (or reuses the cached) model and tokenizer from the
    /// Hugging Face hub.
    pub async fn from_hub(repo: &str, options: OnnxOptions) -> Result<Self> {
        let repo_id = repo.to_string();
        let (model_path, tokenizer_path) = tokio::task::spawn_blocking(move || {
            let api = hf_hub::api::sync::Api::new()?;
            let repo = api.model(repo_id);
            let model = repo.get(HUB_MODEL_FILE)?;
            let tokenizer = repo.get(HUB_TOKENIZER_FILE)?;
            Ok::<_, anyhow::Error>((model, tokenizer))
        })
        .await??;
        Self::new(model_path, tokenizer_path, options)
    }

    fn run(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let batch_size = encodings.len();
        let seq_len = encodings.first().map_or(0, |enc| enc.len());

        let collect = |field: fn(&tokenizers::Encoding) -> &[u32]| -> Result<Array2<i64>> {
            let flat = encodings
                .iter()
                .flat_map(|enc| field(enc).iter().map(|&x| i64::from(x)))
                .collect();
            Ok(Array2::from_shape_vec((batch_size, seq_len), flat)?)
        };
        let input_ids = collect(tokenizers::Encoding::get_ids)?;
        let attention_mask = collect(tokenizers::Encoding::get_attention_mask)?;
        let token_type_ids = collect(tokenizers::Encoding::get_type_ids)?;
        let mask = attention_mask.clone();

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("Session lock poisoned"))?;
        let outputs = if self.uses_token_type_ids {
            session.run(ort::inputs![
                "input_ids" => Value::from_array(input_ids)?,
                "attention_mask" => Value::from_array(attention_mask)?,
                "token_type_ids" => Value::from_array(token_type_ids)?
            ])?
        } else {
            session.run(ort::inputs![
                "input_ids" => Value::from_array(input_ids)?,
                "attention_mask" => Value::from_array(attention_mask)?
            ])?
        };

        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        let shape: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
        let embeddings = ArrayViewD::from_shape(shape, data)
            .map_err(|e| anyhow!("Failed to view output tensor: {}", e))?;

        let mut vectors = match embeddings.ndim() {
            3 => mean_pooling(embeddings.into_dimensionality::<Ix3>()?, mask.view()),
            2 => embeddings
                .into_dimensionality::<Ix2>()?
                .outer_iter()
                .map(|row| row.iter().map(|&x| f64::from(x)).collect())
                .collect(),
            n => return Err(anyhow!("Unexpected output rank: {}", n)),
        };
        if self.normalize {
            vectors.iter_mut().for_each(|v| l2_normalize(v));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Vectorizer for OnnxVectorizer {
    fn dimension(&self) -> usize {
        self.dimension.load(Ordering::Relaxed)
    }

    async fn vectorize(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let count = texts.len();
        let vectors = self.run(texts)?;
        if let Some(first) = vectors.first() {
            self.dimension.store(first.len(), Ordering::Relaxed);
        }
        debug!(texts = count, dim = self.dimension(), "encoded batch");
        Ok(vectors)
    }
}

/// Average of token embeddings over positions where the mask is set.
///
/// A row with an all-zero mask pools to the zero vector.
pub fn mean_pooling(hidden: ArrayView3<f32>, mask: ArrayView2<i64>) -> Vec<Vec<f64>> {
    hidden
        .outer_iter()
        .zip(mask.outer_iter())
        .map(|(tokens, row_mask)| {
            let mut sum = vec![0.0f64; tokens.ncols()];
            let mut count = 0.0f64;
            for (token, &m) in tokens.outer_iter().zip(row_mask.iter()) {
                if m == 0 {
                    continue;
                }
                for (acc, &x) in sum.iter_mut().zip(token.iter()) {
                    *acc += f64::from(x);
                }
                count += 1.0;
            }
            if count > 0.0 {
                sum.iter_mut().for_each(|x| *x /= count);
            }
            sum
        })
        .collect()
}

pub fn l2_normalize(vec: &mut [f64]) {
    let norm = vec.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        vec.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct RemoteVectorizer {
    client: Client,
    url: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
}

impl RemoteVectorizer {
    pub fn new(base_url: &str, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url: format!("{}/embeddings", base_url.trim_end_matches('/')),
            api_key,
            model: model.into(),
            dimension: 0,
        }
    }

    /// Declares the output width reported by [`Vectorizer::dimension`].
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: Vec<String>,
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f64>,
}

#[async_trait]
impl Vectorizer for RemoteVectorizer {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn vectorize(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let expected = texts.len();
        let mut req = self.client.post(&self.url).json(&EmbeddingRequest {
            input: texts,
            model: &self.model,
        });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let body: EmbeddingResponse = req.send().await?.error_for_status()?.json().await?;

        let mut data = body.data;
        if data.len() != expected {
            return Err(anyhow!(
                "Embedding endpoint returned {} vectors for {} texts",
                data.len(),
                expected
            ));
        }
        data.sort_by_key(|item| item.index);
        Ok(data.into_iter().map(|item| item.embedding).collect())
    }
}
