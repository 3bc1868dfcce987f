//! BM25 sparse encoder with hashed term indices.
//!
//! Terms are lowercased, stripped of English stop words and Snowball-stemmed,
//! then mapped to a sparse index with 32-bit MurmurHash3 so no vocabulary has
//! to be shipped with the encoder. Fitted statistics (document count, average
//! length, per-index document frequency) load from a JSON parameter file.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use anyhow::{bail, Context, Result};
use rust_stemmers::{Algorithm, Stemmer};
use semvdb_core::SparseVector;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_K1: f32 = 1.2;
pub const DEFAULT_B: f32 = 0.75;

/// NLTK English stop-word list.
const STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan", "shan't",
    "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't", "wouldn",
    "wouldn't",
];

/// Document frequencies keyed by hashed term index, stored as parallel arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocFreq {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

/// Fitted BM25 statistics as persisted on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    #[serde(default = "default_k1")]
    pub k1: f32,
    #[serde(default = "default_b")]
    pub b: f32,
    pub avgdl: f32,
    pub n_docs: u64,
    #[serde(default)]
    pub doc_freq: DocFreq,
}

fn default_k1() -> f32 {
    DEFAULT_K1
}

fn default_b() -> f32 {
    DEFAULT_B
}

/// Lowercase, split on anything that is not alphanumeric, drop stop words,
/// and stem what remains.
pub struct Bm25Tokenizer {
    stemmer: Stemmer,
    stop_words: HashSet<&'static str>,
}

impl Default for Bm25Tokenizer {
    fn default() -> Self {
        Self {
            stemmer: Stemmer::create(Algorithm::English),
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }
}

impl Bm25Tokenizer {
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty() && !self.stop_words.contains(word))
            .map(|word| self.stemmer.stem(word).into_owned())
            .collect()
    }
}

/// MurmurHash3 x86 32-bit. Term indices must match the hash the stored sparse
/// vectors were encoded with, so this cannot be swapped for another hash.
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;

    fn mix(k: u32) -> u32 {
        k.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2)
    }

    let mut h = seed;
    let chunks = data.chunks_exact(4);
    let tail = chunks.remainder();
    for chunk in chunks {
        let k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        h ^= mix(k);
        h = h.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    if !tail.is_empty() {
        let k = tail
            .iter()
            .enumerate()
            .fold(0u32, |acc, (i, byte)| acc | (u32::from(*byte) << (8 * i)));
        h ^= mix(k);
    }

    h ^= data.len() as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^ (h >> 16)
}

/// Sparse index of a single term.
pub fn term_index(term: &str) -> u32 {
    murmur3_32(term.as_bytes(), 0)
}

pub struct Bm25Encoder {
    params: Bm25Params,
    doc_freq: HashMap<u32, f32>,
    tokenizer: Bm25Tokenizer,
}

impl Bm25Encoder {
    pub fn new(params: Bm25Params) -> Result<Self> {
        if !(params.avgdl.is_finite() && params.avgdl > 0.0) {
            bail!("avgdl must be positive, got {}", params.avgdl);
        }
        if params.doc_freq.indices.len() != params.doc_freq.values.len() {
            bail!(
                "doc_freq has {} indices but {} values",
                params.doc_freq.indices.len(),
                params.doc_freq.values.len()
            );
        }
        let doc_freq = params
            .doc_freq
            .indices
            .iter()
            .copied()
            .zip(params.doc_freq.values.iter().copied())
            .collect();
        Ok(Self {
            params,
            doc_freq,
            tokenizer: Bm25Tokenizer::default(),
        })
    }

    /// Loads fitted parameters from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read BM25 params from {}", path.display()))?;
        let params: Bm25Params = serde_json::from_str(&raw)
            .with_context(|| format!("Malformed BM25 params in {}", path.display()))?;
        info!(
            path = %path.display(),
            n_docs = params.n_docs,
            terms = params.doc_freq.indices.len(),
            "loaded BM25 parameters"
        );
        Self::new(params)
    }

    /// Fits statistics over a corpus with the default `k1` and `b`.
    pub fn fit<S: AsRef<str>>(corpus: &[S]) -> Result<Self> {
        let tokenizer = Bm25Tokenizer::default();
        let mut total_len = 0usize;
        let mut df: BTreeMap<u32, f32> = BTreeMap::new();
        for doc in corpus {
            let tf = term_frequencies(&tokenizer, doc.as_ref());
            total_len += tf.values().map(|n| *n as usize).sum::<usize>();
            for idx in tf.keys() {
                *df.entry(*idx).or_insert(0.0) += 1.0;
            }
        }
        if corpus.is_empty() || total_len == 0 {
            bail!("Cannot fit BM25 on a corpus without terms");
        }

        let (indices, values) = df.into_iter().unzip();
        Self::new(Bm25Params {
            k1: DEFAULT_K1,
            b: DEFAULT_B,
            avgdl: total_len as f32 / corpus.len() as f32,
            n_docs: corpus.len() as u64,
            doc_freq: DocFreq { indices, values },
        })
    }

    pub fn params(&self) -> &Bm25Params {
        &self.params
    }

    /// Writes the fitted parameters as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string(&self.params)?;
        std::fs::write(path.as_ref(), json)
            .with_context(|| format!("Failed to write {}", path.as_ref().display()))
    }

    /// Document-side weights: saturated term frequency, length-normalised.
    ///
    /// This is also the encoding used for search queries, since the stored
    /// sparse vectors carry the IDF side.
    pub fn encode_document(&self, text: &str) -> SparseVector {
        let tf = term_frequencies(&self.tokenizer, text);
        let doc_len: f32 = tf.values().sum();
        let Bm25Params { k1, b, avgdl, .. } = self.params;
        let norm = k1 * (1.0 - b + b * doc_len / avgdl);

        let (indices, values) = tf.into_iter().map(|(idx, n)| (idx, n / (n + norm))).unzip();
        SparseVector { indices, values }
    }

    /// Query-side weights: IDF of each distinct term, normalised to sum to 1.
    pub fn encode_query(&self, text: &str) -> SparseVector {
        let tf = term_frequencies(&self.tokenizer, text);
        let n_docs = self.params.n_docs as f32;
        let idf: Vec<(u32, f32)> = tf
            .into_keys()
            .map(|idx| {
                let df = self.doc_freq.get(&idx).copied().unwrap_or(1.0);
                (idx, ((n_docs + 1.0) / (df + 0.5)).ln())
            })
            .collect();
        let total: f32 = idf.iter().map(|(_, w)| w).sum();
        if total == 0.0 {
            return SparseVector::default();
        }
        let (indices, values) = idf.into_iter().map(|(idx, w)| (idx, w / total)).unzip();
        SparseVector { indices, values }
    }
}

fn term_frequencies(tokenizer: &Bm25Tokenizer, text: &str) -> BTreeMap<u32, f32> {
    let mut tf = BTreeMap::new();
    for token in tokenizer.tokenize(text) {
        *tf.entry(term_index(&token)).or_insert(0.0) += 1.0;
    }
    tf
}
