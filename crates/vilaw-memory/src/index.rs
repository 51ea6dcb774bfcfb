use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;
use vilaw_core::{VilawError, VilawResult};

/// One already-chunked piece of a source document, with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocChunk {
    pub id: Uuid,
    pub text: String,
    /// Human-readable label of the document the chunk came from.
    pub source: String,
    pub embedding: Vec<f32>,
}

/// In-memory brute-force cosine index over [`DocChunk`]s.
///
/// The corpus is loaded once at startup and only grows; fine for the corpus
/// sizes a single-process assistant serves.
pub struct VectorIndex {
    chunks: RwLock<IndexInner>,
}

struct IndexInner {
    ordered: Vec<DocChunk>,
    by_id: HashMap<Uuid, usize>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(IndexInner {
                ordered: Vec::new(),
                by_id: HashMap::new(),
            }),
        }
    }

    pub async fn insert(&self, chunk: DocChunk) {
        let mut inner = self.chunks.write().await;
        let pos = inner.ordered.len();
        inner.by_id.insert(chunk.id, pos);
        inner.ordered.push(chunk);
    }

    /// Top-k chunks by cosine similarity to `query_embedding`, best first.
    pub async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> VilawResult<Vec<(DocChunk, f32)>> {
        if query_embedding.is_empty() {
            return Err(VilawError::Memory("empty query embedding".to_string()));
        }

        let inner = self.chunks.read().await;
        let mut scored: Vec<(DocChunk, f32)> = inner
            .ordered
            .iter()
            .map(|chunk| {
                let score = cosine_similarity(query_embedding, &chunk.embedding);
                (chunk.clone(), score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    pub async fn get(&self, id: Uuid) -> Option<DocChunk> {
        let inner = self.chunks.read().await;
        inner
            .by_id
            .get(&id)
            .and_then(|&pos| inner.ordered.get(pos))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.chunks.read().await.ordered.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for VectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Cosine similarity between two vectors; 0.0 for mismatched lengths.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn chunk(text: &str, embedding: Vec<f32>) -> DocChunk {
        DocChunk {
            id: Uuid::new_v4(),
            text: text.to_string(),
            source: "thong-tu-01".to_string(),
            embedding,
        }
    }

    #[tokio::test]
    async fn search_ranks_by_similarity() {
        let index = VectorIndex::new();
        index.insert(chunk("gần", vec![0.9, 0.1, 0.0])).await;
        index.insert(chunk("xa", vec![0.0, 0.0, 1.0])).await;

        let results = index.search(&[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.text, "gần");
        assert!(results[0].1 > results[1].1);
    }

    #[tokio::test]
    async fn search_truncates_to_top_k() {
        let index = VectorIndex::new();
        for i in 0..10 {
            let mut embedding = vec![0.0f32; 3];
            embedding[i % 3] = 1.0;
            index.insert(chunk(&format!("chunk_{i}"), embedding)).await;
        }
        let results = index.search(&[1.0, 0.0, 0.0], 4).await.unwrap();
        assert_eq!(results.len(), 4);
    }

    #[tokio::test]
    async fn get_by_id_round_trips() {
        let index = VectorIndex::new();
        let c = chunk("điều 2", vec![1.0]);
        let id = c.id;
        index.insert(c).await;

        assert_eq!(index.get(id).await.unwrap().text, "điều 2");
        assert!(index.get(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn empty_query_embedding_is_rejected() {
        let index = VectorIndex::new();
        assert!(index.search(&[], 3).await.is_err());
    }
}
