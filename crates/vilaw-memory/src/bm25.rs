use std::collections::HashMap;

use uuid::Uuid;

/// BM25 parameters.
const K1: f32 = 1.2;
const B: f32 = 0.75;

/// Lowercase alphanumeric tokeniser, dropping single-character tokens.
/// Vietnamese diacritics are alphanumeric, so accented syllables survive
/// intact.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 1)
        .collect()
}

/// BM25 inverted index for the keyword leg of retrieval.
///
/// The corpus is indexed once at startup; there is no document removal.
#[derive(Debug, Clone, Default)]
pub struct Bm25Index {
    /// term -> (doc_id, term frequency) postings.
    postings: HashMap<String, Vec<(Uuid, f32)>>,
    /// doc_id -> document length in tokens.
    doc_lengths: HashMap<Uuid, f32>,
    total_length: f32,
}

impl Bm25Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index one document.
    pub fn add_document(&mut self, id: Uuid, text: &str) {
        let tokens = tokenize(text);
        let doc_len = tokens.len() as f32;

        let mut term_freq: HashMap<String, f32> = HashMap::new();
        for token in tokens {
            *term_freq.entry(token).or_insert(0.0) += 1.0;
        }
        for (term, freq) in term_freq {
            self.postings.entry(term).or_default().push((id, freq));
        }

        self.doc_lengths.insert(id, doc_len);
        self.total_length += doc_len;
    }

    /// Up to `top_k` documents scored against `query`, best first.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(Uuid, f32)> {
        let doc_count = self.doc_lengths.len();
        if doc_count == 0 {
            return Vec::new();
        }
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let n = doc_count as f32;
        let avgdl = (self.total_length / n).max(1.0);
        let mut scores: HashMap<Uuid, f32> = HashMap::new();

        for token in &query_tokens {
            let Some(postings) = self.postings.get(token) else {
                continue;
            };
            let df = postings.len() as f32;
            // Robertson IDF, always non-negative.
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for &(doc_id, tf) in postings {
                let dl = self.doc_lengths.get(&doc_id).copied().unwrap_or(0.0);
                let term_score = idf * (tf * (K1 + 1.0)) / (tf + K1 * (1.0 - B + B * dl / avgdl));
                *scores.entry(doc_id).or_insert(0.0) += term_score;
            }
        }

        let mut results: Vec<(Uuid, f32)> = scores.into_iter().collect();
        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);
        results
    }

    pub fn document_count(&self) -> usize {
        self.doc_lengths.len()
    }
}
