use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use vilaw_core::{VilawError, VilawResult};

use crate::index::cosine_similarity;

/// One cached question/answer pair with the question's embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub question: String,
    pub answer: String,
    pub embedding: Vec<f32>,
    pub stored_at: DateTime<Utc>,
}

/// Semantic response cache: answers are keyed by question-embedding
/// similarity rather than exact text, so rephrasings of an already-answered
/// question skip the whole retrieval-and-generation pipeline.
///
/// Eviction is FIFO beyond `max_entries`. With a backing file the cache
/// persists as JSON (entries carry their embeddings, so a restart reloads a
/// usable index) and is rewritten on every store.
#[derive(Debug)]
pub struct SemanticCache {
    entries: RwLock<Vec<CacheEntry>>,
    /// Minimum cosine similarity for a lookup to count as a hit.
    threshold: f32,
    max_entries: usize,
    path: Option<PathBuf>,
}

impl SemanticCache {
    /// An in-memory cache with no persistence.
    pub fn new(threshold: f32, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            threshold,
            max_entries,
            path: None,
        }
    }

    /// A file-backed cache. Existing entries are loaded from `path`; a
    /// missing file starts empty.
    pub async fn with_file(
        path: PathBuf,
        threshold: f32,
        max_entries: usize,
    ) -> VilawResult<Self> {
        let entries = if path.exists() {
            let data = tokio::fs::read_to_string(&path).await?;
            serde_json::from_str::<Vec<CacheEntry>>(&data)
                .map_err(|e| VilawError::Memory(format!("invalid cache file: {e}")))?
        } else {
            Vec::new()
        };
        info!(entries = entries.len(), path = %path.display(), "semantic cache loaded");

        Ok(Self {
            entries: RwLock::new(entries),
            threshold,
            max_entries,
            path: Some(path),
        })
    }

    /// Return the cached answer whose question is most similar to
    /// `query_embedding`, if that similarity clears the threshold.
    pub async fn lookup(&self, query_embedding: &[f32]) -> Option<String> {
        let entries = self.entries.read().await;
        let best = entries
            .iter()
            .enumerate()
            .map(|(row, entry)| (row, cosine_similarity(query_embedding, &entry.embedding)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;

        let (row, similarity) = best;
        if similarity >= self.threshold {
            info!(row, similarity, "answer recovered from semantic cache");
            Some(entries[row].answer.clone())
        } else {
            debug!(similarity, threshold = self.threshold, "cache miss");
            None
        }
    }

    /// Append a freshly generated answer, evicting oldest entries beyond
    /// the capacity, and persist when file-backed.
    pub async fn store(
        &self,
        question: impl Into<String>,
        embedding: Vec<f32>,
        answer: impl Into<String>,
    ) -> VilawResult<()> {
        let snapshot = {
            let mut entries = self.entries.write().await;
            entries.push(CacheEntry {
                question: question.into(),
                answer: answer.into(),
                embedding,
                stored_at: Utc::now(),
            });
            while entries.len() > self.max_entries {
                entries.remove(0);
            }
            self.path.is_some().then(|| entries.clone())
        };

        if let (Some(path), Some(entries)) = (&self.path, snapshot) {
            let data = serde_json::to_string(&entries)?;
            tokio::fs::write(path, data).await?;
        }
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hit_above_threshold_returns_cached_answer() {
        let cache = SemanticCache::new(0.9, 10);
        cache
            .store("chỉ tiêu tuyển sinh", vec![1.0, 0.0], "Chỉ tiêu ổn định như năm ngoái")
            .await
            .unwrap();

        let hit = cache.lookup(&[0.999, 0.01]).await;
        assert_eq!(hit.unwrap(), "Chỉ tiêu ổn định như năm ngoái");
    }

    #[tokio::test]
    async fn miss_below_threshold_returns_none() {
        let cache = SemanticCache::new(0.9, 10);
        cache
            .store("chỉ tiêu tuyển sinh", vec![1.0, 0.0], "câu trả lời")
            .await
            .unwrap();

        assert!(cache.lookup(&[0.0, 1.0]).await.is_none());
    }

    #[tokio::test]
    async fn empty_cache_never_hits() {
        let cache = SemanticCache::new(0.0, 10);
        assert!(cache.lookup(&[1.0, 0.0]).await.is_none());
    }

    #[tokio::test]
    async fn fifo_eviction_drops_oldest_first() {
        let cache = SemanticCache::new(0.9, 2);
        cache.store("q1", vec![1.0, 0.0], "a1").await.unwrap();
        cache.store("q2", vec![0.0, 1.0], "a2").await.unwrap();
        cache.store("q3", vec![0.7, 0.7], "a3").await.unwrap();

        assert_eq!(cache.len().await, 2);
        // q1 was evicted: its embedding no longer clears the threshold
        // against the survivors.
        assert!(cache.lookup(&[1.0, 0.0]).await.is_none());
        assert_eq!(cache.lookup(&[0.0, 1.0]).await.unwrap(), "a2");
    }

    #[tokio::test]
    async fn file_backed_cache_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache_file.json");

        {
            let cache = SemanticCache::with_file(path.clone(), 0.9, 10).await.unwrap();
            cache
                .store("học phí bao nhiêu", vec![0.0, 1.0], "Học phí không đổi")
                .await
                .unwrap();
        }

        let reloaded = SemanticCache::with_file(path, 0.9, 10).await.unwrap();
        assert_eq!(reloaded.len().await, 1);
        assert_eq!(
            reloaded.lookup(&[0.0, 1.0]).await.unwrap(),
            "Học phí không đổi"
        );
    }

    #[tokio::test]
    async fn corrupt_cache_file_is_a_memory_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache_file.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let err = SemanticCache::with_file(path, 0.9, 10).await.unwrap_err();
        assert!(matches!(err, VilawError::Memory(_)));
    }
}
