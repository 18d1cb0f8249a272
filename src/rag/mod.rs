//! Counseling-case retrieval pipeline.
//!
//! This module provides:
//! - `CaseIndex` / `SqliteCaseIndex`: the persisted vector index over the
//!   counseling corpus, loaded read-only at startup
//! - `CaseRetriever`: query embedding + nearest-neighbor search
//! - `ContextBuilder`: formats retrieved cases into a bounded prompt context
//! - `Advisor`: asks the hosted model to synthesize guidance for the counselor

pub mod advisor;
pub mod context_builder;
pub mod engine;
pub mod error;
pub mod index;
pub mod sqlite;

pub use advisor::Advisor;
pub use context_builder::ContextBuilder;
pub use engine::CaseRetriever;
pub use error::RagError;
pub use index::{CaseDocument, CaseIndex, CaseMatch, EmbeddingSpec, IndexMeta};
pub use sqlite::{SqliteCaseIndex, SqliteIndexWriter};
