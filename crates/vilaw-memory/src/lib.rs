//! Retrieval memory for Vilaw: embeddings, a brute-force vector index, a
//! BM25 keyword index, hybrid fusion of the two, and the semantic response
//! cache.
//!
//! # Main types
//!
//! - [`Embedder`] — embedding trait; [`HashEmbedder`] (offline default) and
//!   [`HttpEmbedder`] (sentence-transformers service) implement it.
//! - [`VectorIndex`] / [`DocChunk`] — in-memory cosine index over corpus
//!   chunks.
//! - [`Bm25Index`] — keyword leg of retrieval.
//! - [`HybridRetriever`] — RRF fusion of the two legs.
//! - [`SemanticCache`] — similarity-keyed question→answer cache.

pub mod bm25;
pub mod cache;
pub mod embedding;
pub mod index;
pub mod retriever;

pub use bm25::Bm25Index;
pub use cache::{CacheEntry, SemanticCache};
pub use embedding::{Embedder, HashEmbedder, HttpEmbedder};
pub use index::{DocChunk, VectorIndex};
pub use retriever::{HybridRetriever, RetrievedChunk};
