use std::env;
use std::time::Duration;

use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_K: usize = 3;
pub const DEFAULT_MAX_K: usize = 10;
pub const DEFAULT_RESPONSE_EXCERPT_CHARS: usize = 500;

pub const DEFAULT_MAX_TOKENS: i32 = 300;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Hosted model API settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub request_timeout: Duration,
}

/// Case retrieval settings.
#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub default_k: usize,
    pub max_k: usize,
    pub response_excerpt_chars: usize,
}

/// Advice generation settings.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub max_tokens: i32,
    pub temperature: f64,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub llm: LlmSettings,
    pub retrieval: RetrievalSettings,
    pub generation: GenerationSettings,
}

impl Settings {
    /// Resolves typed settings from the merged config document.
    ///
    /// Unknown or missing fields fall back to defaults; the API key may
    /// also come from the CASEBOOK_API_KEY environment variable, which
    /// takes precedence over secrets.yaml.
    pub fn resolve(config: &Value) -> Self {
        let llm = config.get("llm");
        let retrieval = config.get("retrieval");
        let generation = config.get("generation");

        let api_key = env::var("CASEBOOK_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                llm.and_then(|v| v.get("api_key"))
                    .and_then(|v| v.as_str())
                    .filter(|key| !key.trim().is_empty())
                    .map(|key| key.to_string())
            });

        Settings {
            llm: LlmSettings {
                base_url: string_or(llm, "base_url", DEFAULT_BASE_URL),
                api_key,
                chat_model: string_or(llm, "chat_model", DEFAULT_CHAT_MODEL),
                embedding_model: string_or(llm, "embedding_model", DEFAULT_EMBEDDING_MODEL),
                embedding_dimension: usize_or(
                    llm,
                    "embedding_dimension",
                    DEFAULT_EMBEDDING_DIMENSION,
                ),
                request_timeout: Duration::from_secs(u64_or(
                    llm,
                    "request_timeout_secs",
                    DEFAULT_REQUEST_TIMEOUT_SECS,
                )),
            },
            retrieval: RetrievalSettings {
                default_k: usize_or(retrieval, "default_k", DEFAULT_K),
                max_k: usize_or(retrieval, "max_k", DEFAULT_MAX_K),
                response_excerpt_chars: usize_or(
                    retrieval,
                    "response_excerpt_chars",
                    DEFAULT_RESPONSE_EXCERPT_CHARS,
                ),
            },
            generation: GenerationSettings {
                max_tokens: i32_or(generation, "max_tokens", DEFAULT_MAX_TOKENS),
                temperature: f64_or(generation, "temperature", DEFAULT_TEMPERATURE),
            },
        }
    }
}

fn string_or(section: Option<&Value>, key: &str, default: &str) -> String {
    section
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default)
        .to_string()
}

fn u64_or(section: Option<&Value>, key: &str, default: u64) -> u64 {
    section
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_u64())
        .unwrap_or(default)
}

fn usize_or(section: Option<&Value>, key: &str, default: usize) -> usize {
    u64_or(section, key, default as u64) as usize
}

fn i32_or(section: Option<&Value>, key: &str, default: i32) -> i32 {
    section
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_i64())
        .map(|v| v as i32)
        .unwrap_or(default)
}

fn f64_or(section: Option<&Value>, key: &str, default: f64) -> f64 {
    section
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_f64())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_config_resolves_to_defaults() {
        let settings = Settings::resolve(&json!({}));

        assert_eq!(settings.llm.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.llm.chat_model, DEFAULT_CHAT_MODEL);
        assert_eq!(settings.llm.embedding_dimension, DEFAULT_EMBEDDING_DIMENSION);
        assert_eq!(
            settings.llm.request_timeout,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );
        assert_eq!(settings.retrieval.default_k, DEFAULT_K);
        assert_eq!(settings.retrieval.max_k, DEFAULT_MAX_K);
        assert_eq!(
            settings.retrieval.response_excerpt_chars,
            DEFAULT_RESPONSE_EXCERPT_CHARS
        );
        assert_eq!(settings.generation.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(settings.generation.temperature, DEFAULT_TEMPERATURE);
    }

    #[test]
    fn configured_values_override_defaults() {
        let settings = Settings::resolve(&json!({
            "llm": {
                "base_url": "http://localhost:8080",
                "chat_model": "local-chat",
                "embedding_model": "local-embed",
                "embedding_dimension": 384,
                "request_timeout_secs": 10
            },
            "retrieval": {
                "default_k": 5,
                "max_k": 8,
                "response_excerpt_chars": 200
            },
            "generation": {
                "max_tokens": 128,
                "temperature": 0.2
            }
        }));

        assert_eq!(settings.llm.base_url, "http://localhost:8080");
        assert_eq!(settings.llm.chat_model, "local-chat");
        assert_eq!(settings.llm.embedding_model, "local-embed");
        assert_eq!(settings.llm.embedding_dimension, 384);
        assert_eq!(settings.llm.request_timeout, Duration::from_secs(10));
        assert_eq!(settings.retrieval.default_k, 5);
        assert_eq!(settings.retrieval.max_k, 8);
        assert_eq!(settings.retrieval.response_excerpt_chars, 200);
        assert_eq!(settings.generation.max_tokens, 128);
        assert_eq!(settings.generation.temperature, 0.2);
    }

    #[test]
    fn blank_strings_fall_back_to_defaults() {
        let settings = Settings::resolve(&json!({
            "llm": { "chat_model": "  " }
        }));
        assert_eq!(settings.llm.chat_model, DEFAULT_CHAT_MODEL);
    }
}
