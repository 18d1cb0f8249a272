use thiserror::Error;

use crate::core::errors::ApiError;
use crate::llm::LlmError;

/// Failures in the retrieval pipeline.
///
/// `IndexUnavailable` is fatal at startup; the serving process refuses
/// to start without a loadable index. `EmbeddingFailure` fails the
/// request it occurred in. `GenerationError` is isolated: retrieval
/// results computed before it are still returned to the caller.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("case index unavailable: {0}")]
    IndexUnavailable(String),
    #[error("embedding failure: {0}")]
    EmbeddingFailure(#[source] LlmError),
    #[error("generation failed: {0}")]
    GenerationError(#[source] LlmError),
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::IndexUnavailable(_) => ApiError::ServiceUnavailable,
            RagError::EmbeddingFailure(source) => {
                ApiError::Internal(format!("embedding failure: {}", source))
            }
            RagError::GenerationError(source) => {
                ApiError::Internal(format!("generation failed: {}", source))
            }
        }
    }
}
