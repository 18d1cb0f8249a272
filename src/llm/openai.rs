use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::LlmSettings;

use super::provider::{LlmError, LlmProvider};
use super::types::ChatRequest;

/// Provider for OpenAI-compatible hosted APIs.
///
/// Works against api.openai.com as well as any local server exposing
/// the same `/v1/chat/completions` and `/v1/embeddings` routes.
#[derive(Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(settings: &LlmSettings) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            client,
        })
    }

    fn request(&self, url: &str, body: &Value) -> reqwest::RequestBuilder {
        let mut req = self.client.post(url).json(body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }
}

fn send_error(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout(err.to_string())
    } else {
        LlmError::Network(err.to_string())
    }
}

async fn error_for_status(res: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let message = res.text().await.unwrap_or_default();
    Err(LlmError::Api {
        status: status.as_u16(),
        message,
    })
}

fn parse_chat_payload(payload: &Value) -> Result<String, LlmError> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(|content| content.to_string())
        .ok_or_else(|| {
            LlmError::InvalidResponse("completion payload missing message content".to_string())
        })
}

fn parse_embeddings_payload(payload: &Value) -> Result<Vec<Vec<f32>>, LlmError> {
    let data = payload["data"].as_array().ok_or_else(|| {
        LlmError::InvalidResponse("embeddings payload missing data array".to_string())
    })?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let values = item["embedding"].as_array().ok_or_else(|| {
            LlmError::InvalidResponse("embeddings payload missing embedding values".to_string())
        })?;
        let mut vector = Vec::with_capacity(values.len());
        for value in values {
            let number = value.as_f64().ok_or_else(|| {
                LlmError::InvalidResponse("embedding value is not a number".to_string())
            })?;
            vector.push(number as f32);
        }
        embeddings.push(vector);
    }

    Ok(embeddings)
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn health_check(&self) -> Result<bool, LlmError> {
        let url = format!("{}/v1/models", self.base_url);
        let mut req = self.client.get(&url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        match req.send().await {
            Ok(res) => Ok(res.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut body = json!({
            "model": model_id,
            "messages": request.messages,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature {
                obj.insert("temperature".to_string(), json!(t));
            }
            if let Some(t) = request.top_p {
                obj.insert("top_p".to_string(), json!(t));
            }
            if let Some(t) = request.max_tokens {
                obj.insert("max_tokens".to_string(), json!(t));
            }
            if let Some(s) = request.stop {
                obj.insert("stop".to_string(), json!(s));
            }
        }

        let res = self.request(&url, &body).send().await.map_err(send_error)?;
        let res = error_for_status(res).await?;
        let payload: Value = res
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        parse_chat_payload(&payload)
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, LlmError> {
        let url = format!("{}/v1/embeddings", self.base_url);

        let body = json!({
            "model": model_id,
            "input": inputs,
        });

        let res = self.request(&url, &body).send().await.map_err(send_error)?;
        let res = error_for_status(res).await?;
        let payload: Value = res
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let embeddings = parse_embeddings_payload(&payload)?;
        if embeddings.len() != inputs.len() {
            return Err(LlmError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }
}
