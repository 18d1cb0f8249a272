//! SQLite persistence for the case index.
//!
//! The corpus is stored as one row per document with the embedding as a
//! little-endian f32 BLOB. `SqliteIndexWriter` is the offline write
//! path used by the `index-builder` binary; `SqliteCaseIndex` opens the
//! same file read-only and loads everything into memory once, so
//! searches never touch the database after startup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::error::RagError;
use super::index::{cosine_similarity, CaseDocument, CaseIndex, CaseMatch, EmbeddingSpec, IndexMeta};

const META_EMBEDDING_MODEL: &str = "embedding_model";
const META_EMBEDDING_DIMENSION: &str = "embedding_dimension";
const META_BUILT_AT: &str = "built_at";
const META_DOCUMENT_COUNT: &str = "document_count";

/// In-memory case index loaded from a persisted SQLite file.
#[derive(Debug)]
pub struct SqliteCaseIndex {
    documents: Vec<CaseDocument>,
    vectors: Vec<Vec<f32>>,
    meta: IndexMeta,
}

impl SqliteCaseIndex {
    /// Opens the index read-only and validates it against the embedding
    /// provider the server is configured with.
    ///
    /// Any inconsistency (missing file, missing metadata, model or
    /// dimension mismatch, malformed embedding blob) is
    /// `IndexUnavailable`: the caller must not serve queries.
    pub async fn open(db_path: &Path, expected: &EmbeddingSpec) -> Result<Self, RagError> {
        if !db_path.exists() {
            return Err(RagError::IndexUnavailable(format!(
                "index not found at {} (run index-builder first)",
                db_path.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                RagError::IndexUnavailable(format!(
                    "failed to open index at {}: {}",
                    db_path.display(),
                    e
                ))
            })?;

        let meta = load_meta(&pool).await?;
        validate_meta(&meta, expected)?;

        let rows = sqlx::query(
            "SELECT doc_id, patient_context, counselor_response, response_length, embedding
             FROM documents ORDER BY doc_id ASC",
        )
        .fetch_all(&pool)
        .await
        .map_err(|e| RagError::IndexUnavailable(format!("failed to read documents: {}", e)))?;

        let mut documents = Vec::with_capacity(rows.len());
        let mut vectors = Vec::with_capacity(rows.len());

        for row in &rows {
            let doc_id: i64 = row.get("doc_id");
            let embedding_bytes: Vec<u8> = row.get("embedding");
            if embedding_bytes.len() != meta.embedding_dimension * 4 {
                return Err(RagError::IndexUnavailable(format!(
                    "document {} embedding has {} bytes, expected {} for dimension {}",
                    doc_id,
                    embedding_bytes.len(),
                    meta.embedding_dimension * 4,
                    meta.embedding_dimension
                )));
            }

            documents.push(CaseDocument {
                doc_id,
                patient_context: row.get("patient_context"),
                counselor_response: row.get("counselor_response"),
                response_length: row.get("response_length"),
            });
            vectors.push(deserialize_embedding(&embedding_bytes));
        }

        pool.close().await;

        if documents.len() != meta.document_count {
            return Err(RagError::IndexUnavailable(format!(
                "index metadata reports {} documents but {} were found (incomplete build?)",
                meta.document_count,
                documents.len()
            )));
        }

        if documents.is_empty() {
            tracing::warn!("case index at {} is empty", db_path.display());
        }

        Ok(Self {
            documents,
            vectors,
            meta,
        })
    }
}

impl CaseIndex for SqliteCaseIndex {
    fn search(&self, query_embedding: &[f32], k: usize) -> Vec<CaseMatch> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(idx, vector)| (idx, cosine_similarity(query_embedding, vector)))
            .collect();

        // Documents are loaded in doc_id order, so the index tie-break
        // is insertion order.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(idx, score)| CaseMatch {
                document: self.documents[idx].clone(),
                score,
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.documents.len()
    }

    fn meta(&self) -> &IndexMeta {
        &self.meta
    }
}

async fn load_meta(pool: &SqlitePool) -> Result<IndexMeta, RagError> {
    let rows = sqlx::query("SELECT key, value FROM index_meta")
        .fetch_all(pool)
        .await
        .map_err(|e| {
            RagError::IndexUnavailable(format!(
                "failed to read index metadata (is this a case index?): {}",
                e
            ))
        })?;

    let entries: HashMap<String, String> = rows
        .iter()
        .map(|row| (row.get("key"), row.get("value")))
        .collect();

    let embedding_model = entries
        .get(META_EMBEDDING_MODEL)
        .cloned()
        .ok_or_else(|| missing_meta(META_EMBEDDING_MODEL))?;
    let embedding_dimension = entries
        .get(META_EMBEDDING_DIMENSION)
        .ok_or_else(|| missing_meta(META_EMBEDDING_DIMENSION))?
        .parse::<usize>()
        .map_err(|_| {
            RagError::IndexUnavailable("index metadata has a malformed dimension".to_string())
        })?;
    let built_at = entries
        .get(META_BUILT_AT)
        .cloned()
        .ok_or_else(|| missing_meta(META_BUILT_AT))?;
    let document_count = entries
        .get(META_DOCUMENT_COUNT)
        .ok_or_else(|| missing_meta(META_DOCUMENT_COUNT))?
        .parse::<usize>()
        .map_err(|_| {
            RagError::IndexUnavailable("index metadata has a malformed document count".to_string())
        })?;

    Ok(IndexMeta {
        embedding_model,
        embedding_dimension,
        built_at,
        document_count,
    })
}

fn validate_meta(meta: &IndexMeta, expected: &EmbeddingSpec) -> Result<(), RagError> {
    if meta.embedding_model != expected.model {
        return Err(RagError::IndexUnavailable(format!(
            "index was built with embedding model '{}' but the server is configured for '{}'",
            meta.embedding_model, expected.model
        )));
    }
    if meta.embedding_dimension != expected.dimension {
        return Err(RagError::IndexUnavailable(format!(
            "index dimension {} does not match configured dimension {}",
            meta.embedding_dimension, expected.dimension
        )));
    }
    Ok(())
}

fn missing_meta(key: &str) -> RagError {
    RagError::IndexUnavailable(format!("index metadata is missing '{}'", key))
}

/// Serialize embedding to bytes (little-endian f32).
fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Deserialize embedding from bytes.
fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Offline write path for building the case index.
///
/// Never constructed by the serving process.
pub struct SqliteIndexWriter {
    pool: SqlitePool,
    dimension: usize,
    next_doc_id: i64,
    db_path: PathBuf,
}

impl SqliteIndexWriter {
    pub async fn create(db_path: PathBuf, spec: &EmbeddingSpec) -> anyhow::Result<Self> {
        if db_path.exists() {
            anyhow::bail!(
                "refusing to overwrite existing index at {} (remove it first)",
                db_path.display()
            );
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to create index at {}", db_path.display()))?;

        sqlx::query("CREATE TABLE index_meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)")
            .execute(&pool)
            .await?;
        sqlx::query(
            "CREATE TABLE documents (
                doc_id INTEGER PRIMARY KEY,
                patient_context TEXT NOT NULL,
                counselor_response TEXT NOT NULL,
                response_length INTEGER NOT NULL,
                embedding BLOB NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        let built_at = chrono::Utc::now().to_rfc3339();
        for (key, value) in [
            (META_EMBEDDING_MODEL, spec.model.clone()),
            (META_EMBEDDING_DIMENSION, spec.dimension.to_string()),
            (META_BUILT_AT, built_at),
            (META_DOCUMENT_COUNT, "0".to_string()),
        ] {
            sqlx::query("INSERT INTO index_meta (key, value) VALUES (?1, ?2)")
                .bind(key)
                .bind(value)
                .execute(&pool)
                .await?;
        }

        Ok(Self {
            pool,
            dimension: spec.dimension,
            next_doc_id: 0,
            db_path,
        })
    }

    /// Insert a batch of (patient_context, counselor_response, embedding)
    /// triples. Document ids follow insertion order.
    pub async fn insert_batch(
        &mut self,
        items: Vec<(String, String, Vec<f32>)>,
    ) -> anyhow::Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for (patient_context, counselor_response, embedding) in &items {
            if embedding.len() != self.dimension {
                anyhow::bail!(
                    "embedding has dimension {}, expected {}",
                    embedding.len(),
                    self.dimension
                );
            }

            let response_length = counselor_response.chars().count() as i64;
            let blob = serialize_embedding(embedding);

            sqlx::query(
                "INSERT INTO documents
                    (doc_id, patient_context, counselor_response, response_length, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(self.next_doc_id)
            .bind(patient_context)
            .bind(counselor_response)
            .bind(response_length)
            .bind(&blob)
            .execute(&mut *tx)
            .await?;

            self.next_doc_id += 1;
        }

        tx.commit().await?;
        tracing::debug!("indexed {} documents", items.len());
        Ok(())
    }

    /// Stamp the final document count and close the file.
    pub async fn finish(self) -> anyhow::Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;

        sqlx::query("UPDATE index_meta SET value = ?1 WHERE key = ?2")
            .bind(count.to_string())
            .bind(META_DOCUMENT_COUNT)
            .execute(&self.pool)
            .await?;

        self.pool.close().await;
        tracing::info!(
            "case index written to {} ({} documents)",
            self.db_path.display(),
            count
        );
        Ok(count as usize)
    }
}
