//! Case index types and the read-side trait.
//!
//! The index is built offline by the `index-builder` binary and opened
//! read-only by the server; no core operation mutates it.

use serde::{Deserialize, Serialize};

/// One stored counseling exchange.
///
/// `doc_id` is the insertion order assigned at index-build time and is
/// the tie-break key when two documents score identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseDocument {
    pub doc_id: i64,
    /// The patient's stated situation; the embedding is derived from this.
    pub patient_context: String,
    /// The counselor's reply.
    pub counselor_response: String,
    /// Character count of the response, computed at index-build time.
    pub response_length: i64,
}

/// A retrieved case with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseMatch {
    pub document: CaseDocument,
    /// Cosine similarity against the query embedding (higher = better).
    pub score: f32,
}

/// What the serving process expects the persisted index to match.
#[derive(Debug, Clone)]
pub struct EmbeddingSpec {
    pub model: String,
    pub dimension: usize,
}

/// Metadata persisted alongside the corpus at build time.
#[derive(Debug, Clone)]
pub struct IndexMeta {
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub built_at: String,
    pub document_count: usize,
}

/// Read-only nearest-neighbor lookup over the counseling corpus.
///
/// Kept as a trait so the retriever can be exercised against a stub
/// index in tests.
pub trait CaseIndex: Send + Sync {
    /// Returns up to `k` cases ordered by descending similarity, ties
    /// broken by ascending `doc_id`. A `k` larger than the corpus
    /// returns the whole corpus.
    fn search(&self, query_embedding: &[f32], k: usize) -> Vec<CaseMatch>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn meta(&self) -> &IndexMeta;
}

/// Compute cosine similarity between two vectors.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(left: f32, right: f32) -> bool {
        (left - right).abs() < 1e-5
    }

    #[test]
    fn cosine_is_one_for_identical_vectors() {
        let vec = vec![1.0, 2.0, 3.0, 4.0];
        assert!(approx_eq(cosine_similarity(&vec, &vec), 1.0));
    }

    #[test]
    fn cosine_is_zero_for_orthogonal_vectors() {
        assert!(approx_eq(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0));
    }

    #[test]
    fn mismatched_or_empty_vectors_score_zero() {
        assert!(approx_eq(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0));
        assert!(approx_eq(cosine_similarity(&[], &[]), 0.0));
    }
}
