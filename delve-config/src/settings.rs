//! Typed shape of `delve.yaml`.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a usable configuration minus the credentials.

use delve_common::observability::LogFormat;
use delve_common::{Backoff, Credentials, GenerationParameters, SubstitutionRule};
use delve_llm::sanitize::SubstitutionPreset;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DelveConfig {
    pub version: Option<String>,
    pub credentials: Credentials,
    pub inference: InferenceSettings,
    pub search: SearchSettings,
    pub research: ResearchSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    pub endpoint: String,
    pub max_retries: usize,
    pub backoff: Backoff,
    pub parameters: GenerationParameters,
    pub substitutions: SubstitutionSettings,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            endpoint: delve_llm::DEFAULT_INFERENCE_ENDPOINT.to_string(),
            max_retries: delve_llm::DEFAULT_MAX_RETRIES,
            backoff: Backoff::default(),
            parameters: GenerationParameters::default(),
            substitutions: SubstitutionSettings::default(),
        }
    }
}

/// Preset table plus rules appended after it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubstitutionSettings {
    pub preset: SubstitutionPreset,
    pub extra: Vec<SubstitutionRule>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub endpoint: String,
    /// Items requested per query (the API caps this at 10).
    pub num: u8,
    /// How many hits the report keeps and feeds into prompts.
    pub max_sources: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            endpoint: delve_web::DEFAULT_SEARCH_ENDPOINT.to_string(),
            num: delve_web::DEFAULT_NUM_RESULTS,
            max_sources: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResearchSettings {
    pub prompts: PromptSettings,
    /// Fail the run instead of reporting "No related information found."
    pub require_sources: bool,
}

/// Named wording for the research prompts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptPreset {
    #[default]
    General,
    Nosql,
}

/// A preset with optional per-template overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    pub preset: PromptPreset,
    pub analysis: Option<String>,
    pub related: Option<String>,
    pub comparison: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
    pub stderr: bool,
    pub filter: String,
    pub dir: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            stderr: false,
            filter: "info".to_string(),
            dir: None,
        }
    }
}

impl DelveConfig {
    /// Checks that deserialization alone cannot express.
    pub fn validate(&self) -> Result<(), String> {
        self.inference
            .parameters
            .validate()
            .map_err(|e| format!("inference.parameters: {e}"))?;
        if self.inference.endpoint.trim().is_empty() {
            return Err("inference.endpoint is empty".into());
        }
        if self.search.endpoint.trim().is_empty() {
            return Err("search.endpoint is empty".into());
        }
        if !(1..=delve_web::DEFAULT_NUM_RESULTS).contains(&self.search.num) {
            return Err(format!(
                "search.num must be within 1..={}, got {}",
                delve_web::DEFAULT_NUM_RESULTS,
                self.search.num
            ));
        }
        if self.search.max_sources == 0 {
            return Err("search.max_sources must be at least 1".into());
        }
        Ok(())
    }

    /// Names of the credentials that are not set, in declaration order.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let c = &self.credentials;
        [
            ("model_token", &c.model_token),
            ("search_api_key", &c.search_api_key),
            ("search_engine_id", &c.search_engine_id),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}
