use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::rag::advisor::DISCLAIMER;
use crate::rag::{Advisor, CaseMatch, CaseRetriever, ContextBuilder, RagError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub k: Option<usize>,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let query = validated_query(&payload)?;
    let k = payload.k.unwrap_or(state.retrieval_settings().default_k);

    let cases = state.retriever.retrieve(query, k).await?;

    Ok(Json(json!({
        "count": cases.len(),
        "cases": cases_payload(&cases)
    })))
}

pub async fn advise(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let query = validated_query(&payload)?;
    let k = payload.k.unwrap_or(state.retrieval_settings().default_k);

    let outcome = run_advise(
        &state.retriever,
        &state.context_builder,
        &state.advisor,
        query,
        k,
    )
    .await?;

    Ok(Json(json!({
        "count": outcome.cases.len(),
        "cases": cases_payload(&outcome.cases),
        "advice": outcome.advice,
        "advice_error": outcome.advice_error,
        "disclaimer": DISCLAIMER
    })))
}

pub(crate) struct AdviseOutcome {
    pub cases: Vec<CaseMatch>,
    pub advice: Option<String>,
    pub advice_error: Option<String>,
}

/// Retrieval failures fail the request; generation failures degrade to
/// an error string so the retrieved cases are still returned.
pub(crate) async fn run_advise(
    retriever: &CaseRetriever,
    context_builder: &ContextBuilder,
    advisor: &Advisor,
    query: &str,
    k: usize,
) -> Result<AdviseOutcome, RagError> {
    let cases = retriever.retrieve(query, k).await?;
    let context = context_builder.build_context(&cases);

    let (advice, advice_error) = match advisor.generate_advice(query, &context).await {
        Ok(text) => (Some(text), None),
        Err(err) => {
            tracing::warn!("advice generation failed: {}", err);
            (None, Some(format!("Error generating advice: {}", err)))
        }
    };

    Ok(AdviseOutcome {
        cases,
        advice,
        advice_error,
    })
}

fn validated_query(payload: &QueryRequest) -> Result<&str, ApiError> {
    let query = payload.query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }
    Ok(query)
}

fn cases_payload(cases: &[CaseMatch]) -> Vec<Value> {
    cases
        .iter()
        .map(|case| {
            json!({
                "patient_context": case.document.patient_context,
                "counselor_response": case.document.counselor_response,
                "response_length": case.document.response_length,
                "score": case.score
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    use crate::core::config::GenerationSettings;
    use crate::llm::{ChatRequest, LlmError, LlmProvider};
    use crate::rag::index::{cosine_similarity, CaseDocument, CaseIndex, IndexMeta};

    struct StubIndex {
        documents: Vec<CaseDocument>,
        vectors: Vec<Vec<f32>>,
        meta: IndexMeta,
    }

    impl StubIndex {
        fn new(entries: Vec<(&str, &str, Vec<f32>)>) -> Self {
            let dimension = entries.first().map(|(_, _, v)| v.len()).unwrap_or(0);
            let documents = entries
                .iter()
                .enumerate()
                .map(|(i, (patient, counselor, _))| CaseDocument {
                    doc_id: i as i64,
                    patient_context: patient.to_string(),
                    counselor_response: counselor.to_string(),
                    response_length: counselor.chars().count() as i64,
                })
                .collect();
            let vectors = entries.into_iter().map(|(_, _, v)| v).collect();
            Self {
                documents,
                vectors,
                meta: IndexMeta {
                    embedding_model: "stub-embed".to_string(),
                    embedding_dimension: dimension,
                    built_at: "2026-01-01T00:00:00Z".to_string(),
                    document_count: 0,
                },
            }
        }
    }

    impl CaseIndex for StubIndex {
        fn search(&self, query_embedding: &[f32], k: usize) -> Vec<CaseMatch> {
            let mut scored: Vec<(usize, f32)> = self
                .vectors
                .iter()
                .enumerate()
                .map(|(idx, v)| (idx, cosine_similarity(query_embedding, v)))
                .collect();
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

    struct StubProvider {
        chat_fails: bool,
    }

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn health_check(&self) -> Result<bool, LlmError> {
            Ok(true)
        }

        async fn chat(&self, _request: ChatRequest, _model_id: &str) -> Result<String, LlmError> {
            if self.chat_fails {
                return Err(LlmError::Api {
                    status: 401,
                    message: "authentication failed".to_string(),
                });
            }
            Ok("Start with validation, then explore sleep hygiene.".to_string())
        }

        async fn embed(
            &self,
            inputs: &[String],
            _model_id: &str,
        ) -> Result<Vec<Vec<f32>>, LlmError> {
            Ok(vec![vec![1.0, 0.0]; inputs.len()])
        }
    }

    fn pipeline(chat_fails: bool) -> (CaseRetriever, ContextBuilder, Advisor) {
        let index = Arc::new(StubIndex::new(vec![
            ("anxiety and poor sleep", "suggest a wind-down routine", vec![1.0, 0.0]),
            ("work stress", "set boundaries", vec![0.5, 0.5]),
        ]));
        let provider = Arc::new(StubProvider { chat_fails });

        let retriever = CaseRetriever::new(
            index,
            provider.clone(),
            "stub-embed".to_string(),
            10,
        );
        let advisor = Advisor::new(
            provider,
            "stub-chat".to_string(),
            GenerationSettings {
                max_tokens: 300,
                temperature: 0.7,
            },
        );
        (retriever, ContextBuilder::new(500), advisor)
    }

    #[tokio::test]
    async fn advise_returns_cases_and_advice() {
        let (retriever, builder, advisor) = pipeline(false);

        let outcome = run_advise(&retriever, &builder, &advisor, "cannot sleep", 2)
            .await
            .unwrap();

        assert_eq!(outcome.cases.len(), 2);
        assert!(outcome.advice.unwrap().contains("validation"));
        assert!(outcome.advice_error.is_none());
    }

    #[tokio::test]
    async fn generation_failure_keeps_retrieval_results() {
        let (retriever, builder, advisor) = pipeline(true);

        let outcome = run_advise(&retriever, &builder, &advisor, "cannot sleep", 2)
            .await
            .unwrap();

        assert_eq!(outcome.cases.len(), 2);
        assert!(outcome.advice.is_none());
        let message = outcome.advice_error.unwrap();
        assert!(message.starts_with("Error generating advice:"));
        assert!(message.contains("authentication failed"));
    }

    #[test]
    fn blank_queries_are_rejected() {
        let payload = QueryRequest {
            query: "   ".to_string(),
            k: None,
        };
        assert!(matches!(
            validated_query(&payload),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn cases_serialize_with_metadata_and_score() {
        let cases = vec![CaseMatch {
            document: CaseDocument {
                doc_id: 0,
                patient_context: "patient".to_string(),
                counselor_response: "reply".to_string(),
                response_length: 5,
            },
            score: 0.9,
        }];

        let payload = cases_payload(&cases);
        assert_eq!(payload.len(), 1);
        assert_eq!(payload[0]["patient_context"], "patient");
        assert_eq!(payload[0]["response_length"], 5);
    }
}
