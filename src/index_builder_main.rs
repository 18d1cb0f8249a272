//! Offline index builder.
//!
//! Reads a JSONL corpus of counseling exchanges, embeds each patient
//! context through the configured provider, and writes the SQLite case
//! index the server loads at startup. This is the only write path to
//! the index; the serving process never runs it.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use serde::Deserialize;

use casebook_backend::core::config::validation::validate_config;
use casebook_backend::core::config::{AppPaths, ConfigService, Settings};
use casebook_backend::core::logging;
use casebook_backend::llm::{LlmProvider, OpenAiProvider};
use casebook_backend::rag::{EmbeddingSpec, SqliteIndexWriter};

const EMBED_BATCH_SIZE: usize = 64;

/// One corpus line: `{"patient_context": "...", "counselor_response": "..."}`
#[derive(Debug, Deserialize)]
struct CorpusRecord {
    patient_context: String,
    counselor_response: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: index-builder <corpus.jsonl> [output.db]");
        std::process::exit(2);
    }
    let corpus_path = PathBuf::from(&args[1]);

    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);

    let config = ConfigService::new(paths.clone());
    let merged = config.load_config()?;
    validate_config(&merged)?;
    let settings = Settings::resolve(&merged);

    let output_path = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| paths.index_path.clone());

    let records = read_corpus(&corpus_path)?;
    tracing::info!(
        "embedding {} corpus records with {}",
        records.len(),
        settings.llm.embedding_model
    );

    let provider = OpenAiProvider::new(&settings.llm)?;
    let spec = EmbeddingSpec {
        model: settings.llm.embedding_model.clone(),
        dimension: settings.llm.embedding_dimension,
    };
    let mut writer = SqliteIndexWriter::create(output_path, &spec).await?;

    for (batch_no, batch) in records.chunks(EMBED_BATCH_SIZE).enumerate() {
        let inputs: Vec<String> = batch
            .iter()
            .map(|record| record.patient_context.clone())
            .collect();
        let embeddings = provider
            .embed(&inputs, &settings.llm.embedding_model)
            .await
            .with_context(|| format!("failed to embed batch {}", batch_no + 1))?;

        let items = batch
            .iter()
            .zip(embeddings)
            .map(|(record, embedding)| {
                (
                    record.patient_context.clone(),
                    record.counselor_response.clone(),
                    embedding,
                )
            })
            .collect();
        writer.insert_batch(items).await?;
        tracing::info!("indexed batch {} ({} records)", batch_no + 1, batch.len());
    }

    let count = writer.finish().await?;
    tracing::info!("done: {} documents indexed", count);
    Ok(())
}

fn read_corpus(path: &Path) -> anyhow::Result<Vec<CorpusRecord>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read corpus at {}", path.display()))?;

    let mut records = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: CorpusRecord = serde_json::from_str(line)
            .with_context(|| format!("invalid corpus record on line {}", line_no + 1))?;
        if record.patient_context.trim().is_empty()
            || record.counselor_response.trim().is_empty()
        {
            bail!("corpus record on line {} has an empty field", line_no + 1);
        }
        records.push(record);
    }

    if records.is_empty() {
        bail!("corpus at {} contains no records", path.display());
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_corpus(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_jsonl_records_and_skips_blank_lines() {
        let file = write_corpus(
            r#"{"patient_context": "cannot sleep", "counselor_response": "try a routine"}

{"patient_context": "burnout", "counselor_response": "set boundaries"}
"#,
        );

        let records = read_corpus(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].patient_context, "cannot sleep");
        assert_eq!(records[1].counselor_response, "set boundaries");
    }

    #[test]
    fn malformed_lines_report_their_line_number() {
        let file = write_corpus(
            r#"{"patient_context": "ok", "counselor_response": "ok"}
not json
"#,
        );

        let err = read_corpus(file.path()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn empty_fields_are_rejected() {
        let file = write_corpus(r#"{"patient_context": " ", "counselor_response": "ok"}"#);
        assert!(read_corpus(file.path()).is_err());
    }

    #[test]
    fn empty_corpus_is_rejected() {
        let file = write_corpus("\n\n");
        assert!(read_corpus(file.path()).is_err());
    }
}
