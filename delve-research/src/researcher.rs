use crate::prompts::PromptTemplates;
use delve_common::{
    DelveError, ResearchReport, ResearchStep, Result, SearchError, SearchResult, Stage,
};
use delve_llm::traits::TextGenerator;
use delve_web::SearchProvider;
use std::sync::Arc;
use std::time::Instant;

pub const ANALYSIS_TITLE: &str = "Initial Analysis";
pub const RELATED_TITLE: &str = "Related Information";
pub const COMPARISON_TITLE: &str = "Comparison Analysis";
pub const NO_RELATED_INFO: &str = "No related information found.";

/// Knobs that shape one research run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchOptions {
    /// Hits kept from the search stage.
    pub max_sources: usize,
    /// Treat an empty search as a failure.
    pub require_sources: bool,
    /// Cold-model retries for each generation call.
    pub max_retries: usize,
}

impl Default for ResearchOptions {
    fn default() -> Self {
        Self {
            max_sources: 5,
            require_sources: false,
            max_retries: delve_llm::DEFAULT_MAX_RETRIES,
        }
    }
}

/// Runs analyze → search → compare → summarize, strictly in sequence.
pub struct Researcher {
    generator: Arc<dyn TextGenerator>,
    search: Arc<dyn SearchProvider>,
    templates: PromptTemplates,
    options: ResearchOptions,
}

impl Researcher {
    pub fn new(generator: Arc<dyn TextGenerator>, search: Arc<dyn SearchProvider>) -> Self {
        Self {
            generator,
            search,
            templates: PromptTemplates::default(),
            options: ResearchOptions::default(),
        }
    }

    pub fn with_templates(mut self, templates: PromptTemplates) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_options(mut self, options: ResearchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn templates(&self) -> &PromptTemplates {
        &self.templates
    }

    pub async fn research(&self, text: &str) -> Result<ResearchReport> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DelveError::EmptyInput);
        }
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let started = Instant::now();
        tracing::info!(
            %run_id,
            model = self.generator.model_name(),
            search = self.search.provider_name(),
            text_chars = text.chars().count(),
            "research.start"
        );

        let mut steps = Vec::with_capacity(3);

        // 1. analysis
        let analysis = self
            .generate(Stage::Analysis, &self.templates.render_analysis(text))
            .await?;
        steps.push(ResearchStep::new(ANALYSIS_TITLE, analysis));
        tracing::debug!(%run_id, stage = %Stage::Analysis, "research.stage.done");

        // 2. search, then 3. comparison when there is something to compare
        let sources = self.find_sources(text).await?;
        tracing::debug!(%run_id, stage = %Stage::Search, source_count = sources.len(), "research.stage.done");

        if sources.is_empty() {
            if self.options.require_sources {
                return Err(DelveError::at(
                    Stage::Search,
                    SearchError::NoResults(text.to_string()),
                ));
            }
            steps.push(ResearchStep::new(RELATED_TITLE, NO_RELATED_INFO));
        } else {
            let related = self
                .generate(Stage::Search, &self.templates.render_related(text, &sources))
                .await?;
            let comparison_prompt = self.templates.render_comparison(text, &sources);
            steps.push(ResearchStep::new(RELATED_TITLE, related).with_sources(sources));

            let comparison = self
                .generate(Stage::Comparison, &comparison_prompt)
                .await?;
            steps.push(ResearchStep::new(COMPARISON_TITLE, comparison));
            tracing::debug!(%run_id, stage = %Stage::Comparison, "research.stage.done");
        }

        // 4. summary
        let summary = self
            .generate(Stage::Summary, &self.templates.render_summary(text, &steps))
            .await?;

        tracing::info!(
            %run_id,
            steps = steps.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "research.done"
        );
        Ok(ResearchReport { steps, summary })
    }

    async fn find_sources(&self, text: &str) -> Result<Vec<SearchResult>> {
        let mut hits = self.search.search(text).await.map_err(|e| {
            tracing::warn!(stage = %Stage::Search, error = %e, "research.stage.failed");
            DelveError::at(Stage::Search, e)
        })?;
        hits.truncate(self.options.max_sources);
        Ok(hits)
    }

    async fn generate(&self, stage: Stage, prompt: &str) -> Result<String> {
        self.generator
            .generate(prompt, self.options.max_retries)
            .await
            .map_err(|e| {
                tracing::warn!(%stage, error = %e, "research.stage.failed");
                DelveError::at(stage, e)
            })
    }
}
