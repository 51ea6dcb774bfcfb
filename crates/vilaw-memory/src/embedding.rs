use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use vilaw_core::{VilawError, VilawResult};

/// Trait for computing text embeddings (vector representations).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Compute the embedding vector for a single text.
    async fn embed(&self, text: &str) -> VilawResult<Vec<f32>>;

    /// Compute embeddings for a batch of texts.
    async fn embed_batch(&self, texts: &[&str]) -> VilawResult<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Dimension of the vectors produced by this embedder.
    fn dimension(&self) -> usize;
}

/// Deterministic bag-of-words hashing embedder with L2 normalisation.
///
/// Needs no external service, which makes it the offline default and the
/// test embedder. Vietnamese diacritics survive the tokeniser because they
/// are alphanumeric. Swap in [`HttpEmbedder`] against a sentence-transformers
/// service for real deployments.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> VilawResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(VilawError::Memory("cannot embed empty text".to_string()));
        }

        let mut vector = vec![0.0f32; self.dimension];

        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 1)
            .collect();

        let mut freq: HashMap<&str, f32> = HashMap::new();
        for word in &words {
            *freq.entry(word).or_insert(0.0) += 1.0;
        }

        let total = words.len() as f32;
        if total == 0.0 {
            return Ok(vector);
        }

        // Two hash positions per word smooth out collisions at small
        // dimensions.
        for (word, count) in &freq {
            let tf = count / total;
            let h1 = fnv1a(word.as_bytes()) as usize;
            let h2 = fnv1a(&[word.as_bytes(), &[0x1u8]].concat()) as usize;
            vector[h1 % self.dimension] += tf;
            vector[h2 % self.dimension] += tf * 0.6;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// FNV-1a hash.
fn fnv1a(data: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for &byte in data {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Client for a sentence-transformers style embedding service
/// (`POST {url}` with `{"texts": [...]}` returning `{"embeddings": [[..]]}`),
/// the deployment shape used for the Vietnamese SBERT model.
pub struct HttpEmbedder {
    url: String,
    dimension: usize,
    http: reqwest::Client,
}

impl HttpEmbedder {
    pub fn new(url: impl Into<String>, dimension: usize) -> Self {
        Self {
            url: url.into(),
            dimension,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> VilawResult<Vec<f32>> {
        let mut batch = self.embed_batch(&[text]).await?;
        batch
            .pop()
            .ok_or_else(|| VilawError::Memory("embedding service returned no vectors".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> VilawResult<Vec<Vec<f32>>> {
        let resp = self
            .http
            .post(&self.url)
            .json(&serde_json::json!({ "texts": texts }))
            .send()
            .await
            .map_err(|e| VilawError::Memory(format!("embedding request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(VilawError::Memory(format!(
                "embedding service error {status}"
            )));
        }

        let body: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| VilawError::Memory(format!("embedding response parse failed: {e}")))?;

        if body.embeddings.len() != texts.len() {
            return Err(VilawError::Memory(format!(
                "embedding service returned {} vectors for {} texts",
                body.embeddings.len(),
                texts.len()
            )));
        }
        Ok(body.embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
