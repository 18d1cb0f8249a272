use std::sync::Arc;

use crate::core::config::validation::validate_config;
use crate::core::config::{AppPaths, ConfigService, RetrievalSettings, Settings};
use crate::llm::{LlmProvider, OpenAiProvider};
use crate::rag::{Advisor, CaseIndex, CaseRetriever, ContextBuilder, EmbeddingSpec, SqliteCaseIndex};

pub mod error;

use error::InitializationError;

/// Global application state shared across all routes.
///
/// The case index and the LLM provider are loaded once per process and
/// are read-only afterwards, so they can be shared freely between
/// concurrent requests without locking.
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Settings,
    pub llm: Arc<dyn LlmProvider>,
    pub index: Arc<dyn CaseIndex>,
    pub retriever: CaseRetriever,
    pub context_builder: ContextBuilder,
    pub advisor: Advisor,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// Loads and validates the configuration, constructs the hosted
    /// model provider, and opens the persisted case index. A missing or
    /// incompatible index is fatal: the server must not start without
    /// one.
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let config = ConfigService::new(paths.clone());

        let merged = config
            .load_config()
            .map_err(|e| InitializationError::Config(e.into()))?;
        validate_config(&merged).map_err(|e| InitializationError::Config(e.into()))?;
        let settings = Settings::resolve(&merged);

        let provider = Arc::new(
            OpenAiProvider::new(&settings.llm).map_err(|e| InitializationError::Llm(e.into()))?,
        );

        Self::with_provider(paths, config, settings, provider).await
    }

    /// Initialization seam that accepts a pre-built provider, used by
    /// tests to exercise startup against stubs.
    pub async fn with_provider(
        paths: Arc<AppPaths>,
        config: ConfigService,
        settings: Settings,
        provider: Arc<dyn LlmProvider>,
    ) -> Result<Arc<Self>, InitializationError> {
        let expected = EmbeddingSpec {
            model: settings.llm.embedding_model.clone(),
            dimension: settings.llm.embedding_dimension,
        };

        let index: Arc<dyn CaseIndex> = Arc::new(
            SqliteCaseIndex::open(&paths.index_path, &expected)
                .await
                .map_err(|e| InitializationError::Index(e.into()))?,
        );

        let retriever = CaseRetriever::new(
            index.clone(),
            provider.clone(),
            settings.llm.embedding_model.clone(),
            settings.retrieval.max_k,
        );
        let context_builder = ContextBuilder::new(settings.retrieval.response_excerpt_chars);
        let advisor = Advisor::new(
            provider.clone(),
            settings.llm.chat_model.clone(),
            settings.generation.clone(),
        );

        Ok(Arc::new(AppState {
            paths,
            config,
            settings,
            llm: provider,
            index,
            retriever,
            context_builder,
            advisor,
        }))
    }

    pub fn retrieval_settings(&self) -> &RetrievalSettings {
        &self.settings.retrieval
    }
}
