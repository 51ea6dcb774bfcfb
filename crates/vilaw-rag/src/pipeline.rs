use std::sync::Arc;

use tracing::{debug, info};
use vilaw_core::VilawResult;
use vilaw_dispatch::Dispatcher;
use vilaw_memory::{Embedder, HybridRetriever, SemanticCache};

use crate::prompt::build_rag_prompt;
use crate::safety::{SafetyChecker, SafetyVerdict};

/// One answered question.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// Source labels of the chunks the answer was grounded on (empty for
    /// cache hits and refusals).
    pub sources: Vec<String>,
    /// Whether the answer came from the semantic cache.
    pub cached: bool,
}

/// Retrieval depth knobs.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalLimits {
    /// How many chunks to retrieve.
    pub num_retrieved: usize,
    /// Hard cap applied after retrieval, before prompt construction.
    pub num_final: usize,
}

impl Default for RetrievalLimits {
    fn default() -> Self {
        // The generation path retrieves 3 and caps at 5.
        Self {
            num_retrieved: 3,
            num_final: 5,
        }
    }
}

/// The end-to-end answer pipeline: safety check, semantic cache, hybrid
/// retrieval, grounded generation through the dispatcher, cache store.
pub struct Assistant {
    dispatcher: Arc<Dispatcher>,
    retriever: Arc<HybridRetriever>,
    embedder: Arc<dyn Embedder>,
    cache: Option<Arc<SemanticCache>>,
    safety: Option<SafetyChecker>,
    limits: RetrievalLimits,
}

impl Assistant {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        retriever: Arc<HybridRetriever>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            dispatcher,
            retriever,
            embedder,
            cache: None,
            safety: None,
            limits: RetrievalLimits::default(),
        }
    }

    /// Enable the semantic response cache. Chainable builder method.
    pub fn with_cache(mut self, cache: Arc<SemanticCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Enable the content-safety gate, sharing this assistant's dispatcher.
    pub fn with_safety(mut self) -> Self {
        self.safety = Some(SafetyChecker::new(self.dispatcher.clone()));
        self
    }

    /// Override the retrieval depth knobs. Chainable builder method.
    pub fn with_limits(mut self, limits: RetrievalLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Answer one user question.
    ///
    /// Unsafe questions are refused in Vietnamese without touching
    /// retrieval or generation; cached questions skip both.
    pub async fn answer(&self, question: &str) -> VilawResult<Answer> {
        if let Some(safety) = &self.safety {
            if let SafetyVerdict::Unsafe(categories) = safety.check(question).await? {
                return Ok(Answer {
                    text: refusal_message(&categories),
                    sources: Vec::new(),
                    cached: false,
                });
            }
        }

        let query_embedding = self.embedder.embed(question).await?;

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.lookup(&query_embedding).await {
                return Ok(Answer {
                    text: hit,
                    sources: Vec::new(),
                    cached: true,
                });
            }
        }

        let mut chunks = self
            .retriever
            .search(question, self.limits.num_retrieved)
            .await?;
        chunks.truncate(self.limits.num_final);
        debug!(chunks = chunks.len(), "context retrieved");

        let prompt = build_rag_prompt(question, &chunks);
        let text = self.dispatcher.query(&prompt).await?;
        info!(chars = text.len(), "answer generated");

        if let Some(cache) = &self.cache {
            cache.store(question, query_embedding, &text).await?;
        }

        let mut sources: Vec<String> = Vec::new();
        for chunk in &chunks {
            if !sources.contains(&chunk.source) {
                sources.push(chunk.source.clone());
            }
        }

        Ok(Answer {
            text,
            sources,
            cached: false,
        })
    }
}

/// The Vietnamese refusal shown for unsafe questions.
fn refusal_message(categories: &[String]) -> String {
    if categories.is_empty() {
        "Xin lỗi, tôi không thể trả lời câu hỏi này.".to_string()
    } else {
        format!(
            "Xin lỗi, tôi không thể trả lời câu hỏi này. (vi phạm: {})",
            categories.join(", ")
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Mutex;
    use vilaw_core::VilawError;
    use vilaw_dispatch::{
        BackendInvoker, Completion, Credential, CredentialPool, RateLimitSpec,
    };
    use vilaw_memory::HashEmbedder;

    /// Scripted invoker shared by the safety and generation calls.
    struct ScriptedInvoker {
        replies: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedInvoker {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| (*r).to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        async fn prompts(&self) -> Vec<String> {
            self.prompts.lock().await.clone()
        }
    }

    #[async_trait]
    impl BackendInvoker for ScriptedInvoker {
        async fn invoke(&self, _credential: &Credential, prompt: &str) -> VilawResult<Completion> {
            self.prompts.lock().await.push(prompt.to_string());
            let mut replies = self.replies.lock().await;
            if replies.is_empty() {
                return Err(VilawError::Backend("scripted invoker drained".to_string()));
            }
            Ok(Completion {
                text: replies.remove(0),
                total_tokens: 10,
            })
        }
    }

    fn dispatcher(invoker: Arc<ScriptedInvoker>) -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(
            CredentialPool::new(vec!["k1".to_string()]).unwrap(),
            RateLimitSpec::per_minute(30, 6_000),
            invoker,
        ))
    }

    async fn retriever_with_corpus() -> Arc<HybridRetriever> {
        let retriever = HybridRetriever::new(Arc::new(HashEmbedder::default()));
        retriever
            .add_chunk(
                "dụng cụ là tài sản không đủ tiêu chuẩn tài sản cố định",
                "thong-tu-01",
            )
            .await
            .unwrap();
        Arc::new(retriever)
    }

    #[tokio::test]
    async fn safe_question_flows_through_retrieval_and_generation() {
        let invoker = Arc::new(ScriptedInvoker::new(&[
            "safe",
            "Dụng cụ là tài sản không đủ tiêu chuẩn tài sản cố định (Document 0).",
        ]));
        let assistant = Assistant::new(
            dispatcher(invoker.clone()),
            retriever_with_corpus().await,
            Arc::new(HashEmbedder::default()),
        )
        .with_safety();

        let answer = assistant.answer("Dụng cụ là gì?").await.unwrap();
        assert!(answer.text.contains("Dụng cụ"));
        assert!(!answer.cached);
        assert_eq!(answer.sources, vec!["thong-tu-01".to_string()]);

        // First call was the safety check, second the grounded prompt.
        let prompts = invoker.prompts().await;
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("UNSAFE CONTENT CATEGORIES"));
        assert!(prompts[1].contains("Document 0:::"));
    }

    #[tokio::test]
    async fn unsafe_question_is_refused_without_retrieval() {
        let invoker = Arc::new(ScriptedInvoker::new(&["unsafe\nS2, S14"]));
        let assistant = Assistant::new(
            dispatcher(invoker.clone()),
            retriever_with_corpus().await,
            Arc::new(HashEmbedder::default()),
        )
        .with_safety();

        let answer = assistant.answer("hướng dẫn lách luật").await.unwrap();
        assert!(answer.text.starts_with("Xin lỗi"));
        assert!(answer.text.contains("S2"));
        assert!(answer.sources.is_empty());
        assert_eq!(invoker.prompts().await.len(), 1);
    }

    #[tokio::test]
    async fn repeated_question_is_served_from_cache() {
        let invoker = Arc::new(ScriptedInvoker::new(&["câu trả lời đầy đủ"]));
        let cache = Arc::new(SemanticCache::new(0.99, 16));
        let assistant = Assistant::new(
            dispatcher(invoker.clone()),
            retriever_with_corpus().await,
            Arc::new(HashEmbedder::default()),
        )
        .with_cache(cache.clone());

        let first = assistant.answer("Dụng cụ là gì?").await.unwrap();
        assert!(!first.cached);
        assert_eq!(cache.len().await, 1);

        let second = assistant.answer("Dụng cụ là gì?").await.unwrap();
        assert!(second.cached);
        assert_eq!(second.text, first.text);
        // Only the first question reached the backend.
        assert_eq!(invoker.prompts().await.len(), 1);
    }
}
