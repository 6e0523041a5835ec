//! Common types and utilities shared across delve crates.
//!
//! This crate defines the research data model, generation knobs, backoff
//! policies, observability helpers, and the shared error taxonomy used
//! throughout the workspace. It stays dependency-light so every crate can
//! depend on it.
//!
//! # Overview
//!
//! - [`Credentials`]: model token plus search API key / engine id
//! - [`GenerationParameters`]: options forwarded to the inference endpoint
//! - [`Backoff`]: delay schedule between retries
//! - [`SearchResult`], [`ResearchStep`], [`ResearchReport`]: research output
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`DelveError`], [`InferenceError`], [`SearchError`] and [`Result`]
//!
//! # Examples
//!
//! ```rust
//! use delve_common::{Backoff, GenerationParameters};
//! use std::time::Duration;
//!
//! let params = GenerationParameters::default();
//! assert_eq!(params.max_new_tokens, Some(250));
//!
//! let backoff = Backoff::Linear { ms: 5_000 };
//! assert_eq!(backoff.delay_for(2), Duration::from_secs(10));
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub mod observability;

/// Literal returned whenever the model produced no usable text.
pub const NO_RESPONSE_SENTINEL: &str = "No response generated";

/// Credentials read by the inference and search clients.
///
/// Supplied by configuration and treated as read-only for the duration of a
/// request. Debug output never includes the secret values.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub model_token: String,
    #[serde(default)]
    pub search_api_key: String,
    #[serde(default)]
    pub search_engine_id: String,
}

impl Credentials {
    /// Search needs both the API key and the engine id.
    ///
    /// ```
    /// use delve_common::{Credentials, DelveError};
    ///
    /// let creds = Credentials {
    ///     search_api_key: "key".into(),
    ///     ..Credentials::default()
    /// };
    /// assert!(matches!(creds.require_search(), Err(DelveError::Config(_))));
    /// ```
    pub fn require_search(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.search_api_key.trim().is_empty() {
            missing.push("search_api_key");
        }
        if self.search_engine_id.trim().is_empty() {
            missing.push("search_engine_id");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DelveError::Config(format!(
                "missing search credentials ({}); configure them before researching",
                missing.join(", ")
            )))
        }
    }

    pub fn has_model_token(&self) -> bool {
        !self.model_token.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn mask(v: &str) -> &'static str {
            if v.is_empty() { "<unset>" } else { "<redacted>" }
        }
        f.debug_struct("Credentials")
            .field("model_token", &mask(&self.model_token))
            .field("search_api_key", &mask(&self.search_api_key))
            .field("search_engine_id", &mask(&self.search_engine_id))
            .finish()
    }
}

/// Options sent alongside the prompt to the text-generation endpoint.
///
/// Unset fields are omitted from the request body. Deserializing a partial
/// object fills the remaining fields from [`GenerationParameters::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_new_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_sample: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_repeat_ngram_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_return_sequences: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub early_stopping: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_invalid_values: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clean_up_tokenization_spaces: Option<bool>,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            max_new_tokens: Some(250),
            temperature: Some(0.3),
            top_p: Some(0.9),
            do_sample: Some(true),
            truncation: Some("only_first".to_string()),
            repetition_penalty: Some(1.2),
            length_penalty: Some(1.0),
            no_repeat_ngram_size: Some(3),
            min_length: Some(50),
            max_length: Some(250),
            num_return_sequences: Some(1),
            early_stopping: Some(true),
            remove_invalid_values: Some(true),
            clean_up_tokenization_spaces: Some(true),
        }
    }
}

impl GenerationParameters {
    /// Reject sampling values outside `[0, 1]`.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (name, value) in [("temperature", self.temperature), ("top_p", self.top_p)] {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(format!("{name} must be within [0, 1], got {v}"));
                }
            }
        }
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return Err(format!("min_length ({min}) exceeds max_length ({max})"));
            }
        }
        Ok(())
    }
}

/// Delay schedule between retries. `retry` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed { ms: u64 },
    /// `retry × ms`: 5s, 10s, 15s for `ms = 5000`.
    Linear { ms: u64 },
    /// `ms × 2^(retry-1)`.
    Exponential { ms: u64 },
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Linear { ms: 5_000 }
    }
}

impl Backoff {
    pub fn delay_for(&self, retry: u32) -> Duration {
        let retry = retry.max(1);
        let ms = match *self {
            Backoff::Fixed { ms } => ms,
            Backoff::Linear { ms } => ms.saturating_mul(u64::from(retry)),
            Backoff::Exponential { ms } => {
                let factor = 1u64.checked_shl(retry - 1).unwrap_or(u64::MAX);
                ms.saturating_mul(factor)
            }
        };
        Duration::from_millis(ms)
    }
}

/// One literal, case-insensitive corrective substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionRule {
    pub find: String,
    pub replace: String,
}

impl SubstitutionRule {
    pub fn new(find: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            find: find.into(),
            replace: replace.into(),
        }
    }
}

/// A web search hit reduced to what the report shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
}

/// One titled unit of research output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchStep {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub sources: Vec<SearchResult>,
}

impl ResearchStep {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            sources: Vec::new(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<SearchResult>) -> Self {
        self.sources = sources;
        self
    }
}

/// Everything a research run produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchReport {
    pub steps: Vec<ResearchStep>,
    pub summary: String,
}

/// Pipeline stage a research failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Analysis,
    Search,
    Comparison,
    Summary,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Analysis => "analysis",
            Stage::Search => "search",
            Stage::Comparison => "comparison",
            Stage::Summary => "summary",
        })
    }
}

/// Failures of the text-generation call.
#[derive(thiserror::Error, Debug)]
pub enum InferenceError {
    /// Still 503 after the retry budget was spent.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("inference API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to get response from inference API: {0}")]
    Transport(String),

    #[error("invalid response from inference API: {0}")]
    Decode(String),

    #[error("inference client misconfigured: {0}")]
    Config(String),
}

/// Failures of the web search call.
#[derive(thiserror::Error, Debug)]
pub enum SearchError {
    #[error("search API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("search failed: {0}")]
    Transport(String),

    #[error("invalid response from search API: {0}")]
    Decode(String),

    /// Raised by callers that need at least one hit; the client itself
    /// returns an empty list.
    #[error("no search results found for {0:?}")]
    NoResults(String),

    #[error("search client misconfigured: {0}")]
    Config(String),
}

/// Top-level error type used across the workspace.
#[derive(thiserror::Error, Debug)]
pub enum DelveError {
    /// Missing or invalid configuration, detected before any network call.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("nothing to research: input text is empty")]
    EmptyInput,

    #[error("research failed during {stage}: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<DelveError>,
    },
}

impl DelveError {
    pub fn at(stage: Stage, source: impl Into<DelveError>) -> Self {
        DelveError::Stage {
            stage,
            source: Box::new(source.into()),
        }
    }
}

/// Convenient alias for results that use [`DelveError`].
pub type Result<T> = std::result::Result<T, DelveError>;
