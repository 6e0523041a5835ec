use crate::prompts::PromptTemplates;
use crate::researcher::{ResearchOptions, Researcher};
use delve_common::{DelveError, ResearchReport, Result};
use delve_config::{ConfigProvider, DelveConfig};
use delve_http::Sleeper;
use delve_llm::inference::HfInferenceClient;
use delve_llm::sanitize::Sanitizer;
use delve_web::GoogleSearchClient;
use std::sync::Arc;

/// Builds a fresh [`Researcher`] from the current configuration for every request.
pub struct ResearchService {
    config: Arc<dyn ConfigProvider>,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl ResearchService {
    pub fn new(config: Arc<dyn ConfigProvider>) -> Self {
        Self {
            config,
            sleeper: None,
        }
    }

    /// Sleeper handed to the inference client (tests use a recording one).
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// One configuration snapshot is read and used for the whole run.
    pub async fn research(&self, text: &str) -> Result<ResearchReport> {
        let snapshot = self.config.current();
        let researcher = self.build_researcher(&snapshot)?;
        researcher.research(text).await
    }

    /// Check credentials and wire clients. No network traffic happens here.
    pub fn build_researcher(&self, config: &DelveConfig) -> Result<Researcher> {
        config.credentials.require_search()?;
        if !config.credentials.has_model_token() {
            tracing::warn!("no model token configured; inference calls will be anonymous");
        }

        let generator = build_generator(config, self.sleeper.clone())?;
        let search = GoogleSearchClient::new(
            &config.search.endpoint,
            config.credentials.search_api_key.clone(),
            config.credentials.search_engine_id.clone(),
        )
        .map_err(|e| DelveError::Config(e.to_string()))?
        .with_num(config.search.num);

        Ok(Researcher::new(Arc::new(generator), Arc::new(search))
            .with_templates(PromptTemplates::from_settings(&config.research.prompts))
            .with_options(ResearchOptions {
                max_sources: config.search.max_sources,
                require_sources: config.research.require_sources,
                max_retries: config.inference.max_retries,
            }))
    }
}

/// The configured substitution table; errors when the table is unstable.
pub fn build_sanitizer(config: &DelveConfig) -> Result<Sanitizer> {
    let subs = &config.inference.substitutions;
    Sanitizer::with_preset_and(subs.preset, subs.extra.clone())
        .map_err(|e| DelveError::Config(e.to_string()))
}

fn build_generator(
    config: &DelveConfig,
    sleeper: Option<Arc<dyn Sleeper>>,
) -> Result<HfInferenceClient> {
    let inference = &config.inference;
    let sanitizer = build_sanitizer(config)?;
    let client = HfInferenceClient::new(&inference.endpoint, config.credentials.model_token.clone())
        .and_then(|c| c.with_parameters(inference.parameters.clone()))
        .map_err(|e| DelveError::Config(e.to_string()))?
        .with_backoff(inference.backoff)
        .with_max_retries(inference.max_retries)
        .with_sanitizer(Arc::new(sanitizer));
    Ok(match sleeper {
        Some(s) => client.with_sleeper(s),
        None => client,
    })
}
