//! Case retriever: query embedding + nearest-neighbor search.

use std::sync::Arc;

use crate::llm::{LlmError, LlmProvider};

use super::error::RagError;
use super::index::{CaseIndex, CaseMatch};

/// Retrieves the most similar stored cases for a free-text query.
///
/// The index and provider are shared read-only state; retrieval never
/// mutates either, so repeated identical queries return identical
/// document sets.
pub struct CaseRetriever {
    index: Arc<dyn CaseIndex>,
    provider: Arc<dyn LlmProvider>,
    embedding_model: String,
    max_k: usize,
}

impl CaseRetriever {
    pub fn new(
        index: Arc<dyn CaseIndex>,
        provider: Arc<dyn LlmProvider>,
        embedding_model: String,
        max_k: usize,
    ) -> Self {
        Self {
            index,
            provider,
            embedding_model,
            max_k,
        }
    }

    /// Returns up to `k` cases ordered by descending similarity.
    ///
    /// `k` is clamped to `[1, max_k]`; asking for more cases than the
    /// corpus holds returns the whole corpus.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<CaseMatch>, RagError> {
        let k = k.clamp(1, self.max_k);

        let inputs = vec![query.to_string()];
        let embeddings = self
            .provider
            .embed(&inputs, &self.embedding_model)
            .await
            .map_err(RagError::EmbeddingFailure)?;

        let query_embedding = embeddings.into_iter().next().ok_or_else(|| {
            RagError::EmbeddingFailure(LlmError::InvalidResponse(
                "provider returned no embedding for the query".to_string(),
            ))
        })?;

        let expected_dimension = self.index.meta().embedding_dimension;
        if query_embedding.len() != expected_dimension {
            return Err(RagError::EmbeddingFailure(LlmError::InvalidResponse(
                format!(
                    "query embedding has dimension {}, index expects {}",
                    query_embedding.len(),
                    expected_dimension
                ),
            )));
        }

        Ok(self.index.search(&query_embedding, k))
    }
}
