//! Text generation for delve.
//!
//! This crate exposes the [`traits::TextGenerator`] seam, the hosted
//! inference client [`inference::HfInferenceClient`], and the cleanup
//! pipeline in [`sanitize`] that every generated answer passes through.
//!
//! # Examples
//! ```no_run
//! use delve_llm::{inference::HfInferenceClient, traits::TextGenerator, DEFAULT_INFERENCE_ENDPOINT};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), delve_common::InferenceError> {
//! let client = HfInferenceClient::new(DEFAULT_INFERENCE_ENDPOINT, "hf_token")?;
//! let text = client.generate("Explain sharding in one sentence.", 3).await?;
//! assert!(!text.is_empty());
//! # Ok(())
//! # }
//! ```
pub mod inference;
pub mod sanitize;
pub mod traits;

/// Default hosted model.
pub const DEFAULT_INFERENCE_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/google/flan-t5-base";

/// Retries granted to a cold (503) model before giving up.
pub const DEFAULT_MAX_RETRIES: usize = 3;
