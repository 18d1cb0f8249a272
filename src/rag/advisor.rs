//! Advice generation over retrieved cases.
//!
//! The instruction template frames the model as a clinical supervisor
//! talking to the counselor. Generated text is guidance between
//! professionals and must never be presented as direct patient advice;
//! callers surface `DISCLAIMER` alongside every generated response.

use std::sync::Arc;

use crate::core::config::GenerationSettings;
use crate::llm::{ChatMessage, ChatRequest, LlmError, LlmProvider};

use super::error::RagError;

pub const DISCLAIMER: &str = "Educational prototype - not medical advice.";

const SYSTEM_PROMPT: &str =
    "You are a supportive clinical supervisor with expertise in therapeutic techniques.";

pub struct Advisor {
    provider: Arc<dyn LlmProvider>,
    chat_model: String,
    settings: GenerationSettings,
}

impl Advisor {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        chat_model: String,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            provider,
            chat_model,
            settings,
        }
    }

    /// Asks the hosted model to synthesize guidance for the counselor.
    ///
    /// Provider failures come back as `GenerationError` carrying the
    /// provider's message; the caller degrades to an error string
    /// instead of failing the whole request.
    pub async fn generate_advice(&self, query: &str, context: &str) -> Result<String, RagError> {
        let prompt = build_prompt(query, context);

        let request = ChatRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ])
        .with_temperature(self.settings.temperature)
        .with_max_tokens(self.settings.max_tokens);

        let advice = self
            .provider
            .chat(request, &self.chat_model)
            .await
            .map_err(RagError::GenerationError)?;

        if advice.trim().is_empty() {
            return Err(RagError::GenerationError(LlmError::InvalidResponse(
                "provider returned an empty completion".to_string(),
            )));
        }

        Ok(advice.trim().to_string())
    }
}

fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "You are an experienced clinical supervisor helping a mental health counselor.\n\
         \n\
         COUNSELOR'S SITUATION:\n\
         {query}\n\
         \n\
         RELEVANT EXAMPLES FROM PAST SESSIONS:\n\
         {context}\n\
         \n\
         INSTRUCTIONS:\n\
         Based on the examples above, provide practical guidance for this counselor. Your response should:\n\
         1. Acknowledge the counselor's challenge\n\
         2. Suggest 2-3 specific therapeutic approaches based on the examples\n\
         3. Highlight which response style might work best (questions, validation, advice, empathy)\n\
         4. Keep response under 200 words\n\
         5. Maintain professional, supportive tone\n\
         \n\
         IMPORTANT: This is guidance between professionals, not direct patient advice."
    )
}
