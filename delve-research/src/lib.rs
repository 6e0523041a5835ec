//! Research orchestration: analyze → search → compare → summarize.
//!
//! [`Researcher`] sequences the calls against any [`TextGenerator`] and
//! [`SearchProvider`]; [`ResearchService`] wires the production clients
//! from a [`delve_config::ConfigProvider`] snapshot.
//!
//! [`TextGenerator`]: delve_llm::traits::TextGenerator
//! [`SearchProvider`]: delve_web::SearchProvider

pub mod prompts;
mod researcher;
mod service;

pub use prompts::PromptTemplates;
pub use researcher::{
    ANALYSIS_TITLE, COMPARISON_TITLE, NO_RELATED_INFO, RELATED_TITLE, ResearchOptions, Researcher,
};
pub use service::{ResearchService, build_sanitizer};
