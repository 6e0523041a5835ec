use async_trait::async_trait;
use delve_common::InferenceError;

/// Anything that turns a prompt into cleaned, non-empty text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for `prompt`, retrying a cold model up to `max_retries` times.
    async fn generate(&self, prompt: &str, max_retries: usize) -> Result<String, InferenceError>;

    /// Get the model name being used
    fn model_name(&self) -> &str;

    /// Retry budget used by [`TextGenerator::generate_default`].
    fn default_max_retries(&self) -> usize {
        crate::DEFAULT_MAX_RETRIES
    }

    async fn generate_default(&self, prompt: &str) -> Result<String, InferenceError> {
        self.generate(prompt, self.default_max_retries()).await
    }
}
