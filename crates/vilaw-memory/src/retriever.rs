use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;
use vilaw_core::VilawResult;

use crate::bm25::Bm25Index;
use crate::embedding::Embedder;
use crate::index::{DocChunk, VectorIndex};

/// Rank assigned to a document that only one of the two legs (vector or
/// BM25) returned, when fusing with Reciprocal Rank Fusion.
const MISSING_RANK: f32 = 1000.0;

/// One retrieved chunk with its fused relevance score.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub text: String,
    pub source: String,
    pub score: f32,
}

/// Hybrid retriever: dense vector search plus BM25 keyword search, fused
/// with Reciprocal Rank Fusion.
///
/// The `alpha` knob balances the legs: 1.0 is pure vector, 0.0 is pure
/// BM25, 0.5 (default) an equal blend.
pub struct HybridRetriever {
    embedder: Arc<dyn Embedder>,
    index: VectorIndex,
    bm25: RwLock<Bm25Index>,
    alpha: f32,
    rrf_k: f32,
}

impl HybridRetriever {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            index: VectorIndex::new(),
            bm25: RwLock::new(Bm25Index::new()),
            alpha: 0.5,
            rrf_k: 60.0,
        }
    }

    /// Set the vector/BM25 balance. Chainable builder method.
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha.clamp(0.0, 1.0);
        self
    }

    /// Embed and index one corpus chunk.
    pub async fn add_chunk(
        &self,
        text: impl Into<String>,
        source: impl Into<String>,
    ) -> VilawResult<Uuid> {
        let text = text.into();
        let id = Uuid::new_v4();

        {
            let mut bm25 = self.bm25.write().await;
            bm25.add_document(id, &text);
        }

        let embedding = self.embedder.embed(&text).await?;
        self.index
            .insert(DocChunk {
                id,
                text,
                source: source.into(),
                embedding,
            })
            .await;
        Ok(id)
    }

    /// Number of indexed chunks.
    pub async fn len(&self) -> usize {
        self.index.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.index.is_empty().await
    }

    /// Retrieve the `top_k` most relevant chunks for `query`.
    ///
    /// Both legs fetch `3 * top_k` candidates; the RRF score of a document
    /// is `alpha / (k + vector_rank) + (1 - alpha) / (k + bm25_rank)` with
    /// `MISSING_RANK` standing in for an absent leg.
    pub async fn search(&self, query: &str, top_k: usize) -> VilawResult<Vec<RetrievedChunk>> {
        let fetch_k = top_k * 3;

        let query_embedding = self.embedder.embed(query).await?;
        let vector_results = self.index.search(&query_embedding, fetch_k).await?;
        let bm25_results = {
            let bm25 = self.bm25.read().await;
            bm25.search(query, fetch_k)
        };

        let mut vector_ranks: HashMap<Uuid, f32> = HashMap::new();
        let mut chunks: HashMap<Uuid, DocChunk> = HashMap::new();
        for (rank, (chunk, _score)) in vector_results.into_iter().enumerate() {
            vector_ranks.insert(chunk.id, (rank + 1) as f32);
            chunks.insert(chunk.id, chunk);
        }

        let mut bm25_ranks: HashMap<Uuid, f32> = HashMap::new();
        for (rank, (doc_id, _score)) in bm25_results.iter().enumerate() {
            bm25_ranks.insert(*doc_id, (rank + 1) as f32);
            if !chunks.contains_key(doc_id) {
                if let Some(chunk) = self.index.get(*doc_id).await {
                    chunks.insert(*doc_id, chunk);
                }
            }
        }

        let mut fused: Vec<(Uuid, f32)> = chunks
            .keys()
            .map(|doc_id| {
                let v_rank = vector_ranks.get(doc_id).copied().unwrap_or(MISSING_RANK);
                let b_rank = bm25_ranks.get(doc_id).copied().unwrap_or(MISSING_RANK);
                let score = self.alpha * (1.0 / (self.rrf_k + v_rank))
                    + (1.0 - self.alpha) * (1.0 / (self.rrf_k + b_rank));
                (*doc_id, score)
            })
            .collect();

        fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        fused.truncate(top_k);

        Ok(fused
            .into_iter()
            .filter_map(|(doc_id, score)| {
                chunks.remove(&doc_id).map(|chunk| RetrievedChunk {
                    text: chunk.text,
                    source: chunk.source,
                    score,
                })
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;

    fn retriever(alpha: f32) -> HybridRetriever {
        HybridRetriever::new(Arc::new(HashEmbedder::default())).with_alpha(alpha)
    }

    #[tokio::test]
    async fn indexed_chunk_is_retrieved() {
        let retriever = retriever(0.5);
        retriever
            .add_chunk(
                "dụng cụ là tài sản không đủ tiêu chuẩn tài sản cố định",
                "thong-tu-01",
            )
            .await
            .unwrap();

        let results = retriever.search("dụng cụ tài sản", 5).await.unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].source, "thong-tu-01");
        assert!(results[0].score > 0.0);
    }

    #[tokio::test]
    async fn relevant_chunk_outranks_unrelated_one() {
        let retriever = retriever(0.5);
        retriever
            .add_chunk(
                "máy móc thiết bị là công cụ lao động thuộc tài sản cố định hữu hình",
                "thong-tu-01",
            )
            .await
            .unwrap();
        retriever
            .add_chunk("hướng dẫn nấu phở bò truyền thống", "blog-nau-an")
            .await
            .unwrap();

        let results = retriever
            .search("máy móc thiết bị tài sản cố định", 2)
            .await
            .unwrap();
        assert_eq!(results[0].source, "thong-tu-01");
    }

    #[tokio::test]
    async fn pure_bm25_still_returns_keyword_matches() {
        let retriever = retriever(0.0);
        retriever
            .add_chunk("vật liệu là đầu vào trong quá trình sản xuất", "thong-tu-01")
            .await
            .unwrap();

        let results = retriever.search("vật liệu sản xuất", 3).await.unwrap();
        assert!(!results.is_empty());
    }

    #[tokio::test]
    async fn top_k_bounds_result_count() {
        let retriever = retriever(0.5);
        for i in 0..8 {
            retriever
                .add_chunk(format!("điều {i} quy định về định mức"), "thong-tu-01")
                .await
                .unwrap();
        }
        let results = retriever.search("định mức", 3).await.unwrap();
        assert_eq!(results.len(), 3);
    }
}
