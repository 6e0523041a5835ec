use crate::sanitize::{Sanitizer, SubstitutionPreset};
use crate::traits::TextGenerator;
use async_trait::async_trait;
use delve_common::{Backoff, GenerationParameters, InferenceError, NO_RESPONSE_SENTINEL};
use delve_http::{HttpClient, HttpError, RequestOpts, RetryPolicy, Sleeper};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Client for a hosted text-generation endpoint (Hugging Face Inference API shape).
pub struct HfInferenceClient {
    client: HttpClient,
    token: String,
    model: String,
    parameters: GenerationParameters,
    backoff: Backoff,
    max_retries: usize,
    sanitizer: Arc<Sanitizer>,
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    inputs: &'a str,
    parameters: &'a GenerationParameters,
}

#[derive(Debug, Deserialize)]
struct Generated {
    #[serde(default)]
    generated_text: Option<String>,
}

/// `[{generated_text}]`, `{generated_text}`, or something we don't recognise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerationResponse {
    Batch(Vec<Generated>),
    Single(Generated),
    Other(serde_json::Value),
}

impl GenerationResponse {
    fn into_text(self) -> Option<String> {
        match self {
            GenerationResponse::Batch(items) => items.into_iter().next()?.generated_text,
            GenerationResponse::Single(item) => item.generated_text,
            GenerationResponse::Other(value) => {
                tracing::debug!(%value, "inference.response.unrecognized_shape");
                None
            }
        }
    }
}

impl HfInferenceClient {
    /// Create a client for `endpoint` (the full model URL).
    ///
    /// Defaults: the stock [`GenerationParameters`], linear 5s backoff,
    /// three retries, and the `nosql` substitution preset.
    pub fn new(endpoint: &str, token: impl Into<String>) -> Result<Self, InferenceError> {
        let client = HttpClient::new(endpoint)
            .map_err(|e| InferenceError::Config(format!("HttpClient init failed: {e}")))?;
        let model = model_from_endpoint(endpoint);
        let sanitizer = Sanitizer::with_preset(SubstitutionPreset::default())?;

        Ok(Self {
            client,
            token: token.into(),
            model,
            parameters: GenerationParameters::default(),
            backoff: Backoff::default(),
            max_retries: crate::DEFAULT_MAX_RETRIES,
            sanitizer: Arc::new(sanitizer),
        })
    }

    pub fn with_parameters(mut self, parameters: GenerationParameters) -> Result<Self, InferenceError> {
        parameters.validate().map_err(InferenceError::Config)?;
        self.parameters = parameters;
        Ok(self)
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: Arc<Sanitizer>) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Replace the sleeper used between 503 retries.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.client = self.client.with_sleeper(sleeper);
        self
    }

    pub fn parameters(&self) -> &GenerationParameters {
        &self.parameters
    }

    /// Strip the echo, clean, then drop any prompt prefix the cleanup put
    /// back. The result never starts with `prompt` unless it is the sentinel.
    fn finish(&self, prompt: &str, raw: &str) -> String {
        let cleaned = self.sanitizer.clean(strip_echo(prompt, raw));
        if prompt.is_empty() || cleaned == NO_RESPONSE_SENTINEL {
            return cleaned;
        }
        // no second clean here: it could rebuild the prefix again
        let mut rest = cleaned.as_str();
        while let Some(tail) = rest.strip_prefix(prompt) {
            rest = tail.trim_start();
        }
        if rest.is_empty() {
            NO_RESPONSE_SENTINEL.to_string()
        } else if rest.len() == cleaned.len() {
            cleaned
        } else {
            rest.to_string()
        }
    }
}

#[async_trait]
impl TextGenerator for HfInferenceClient {
    async fn generate(&self, prompt: &str, max_retries: usize) -> Result<String, InferenceError> {
        let req = GenerationRequest {
            inputs: prompt,
            parameters: &self.parameters,
        };
        let opts = RequestOpts {
            auth: Some(delve_http::Auth::Bearer(&self.token)),
            retry: Some(RetryPolicy::on_statuses(max_retries, [503], self.backoff)),
            ..Default::default()
        };

        tracing::debug!(
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            max_retries,
            "inference.generate.start"
        );

        let resp: GenerationResponse = self
            .client
            .post_json_opts("", &req, opts)
            .await
            .map_err(|e| http_to_inference(e, max_retries))?;

        let raw = resp.into_text().unwrap_or_default();
        let text = self.finish(prompt, &raw);

        tracing::debug!(
            model = %self.model,
            raw_chars = raw.chars().count(),
            cleaned_chars = text.chars().count(),
            sentinel = text == NO_RESPONSE_SENTINEL,
            "inference.generate.done"
        );
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn default_max_retries(&self) -> usize {
        self.max_retries
    }
}

/// Remove one leading exact copy of `prompt`.
fn strip_echo<'a>(prompt: &str, text: &'a str) -> &'a str {
    if prompt.is_empty() {
        return text;
    }
    text.strip_prefix(prompt).map_or(text, str::trim_start)
}

/// `.../models/google/flan-t5-base` -> `google/flan-t5-base`
fn model_from_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim_end_matches('/');
    match trimmed.split_once("/models/") {
        Some((_, model)) if !model.is_empty() => model.to_string(),
        _ => trimmed.to_string(),
    }
}

fn http_to_inference(e: HttpError, max_retries: usize) -> InferenceError {
    match e {
        HttpError::Api {
            status, message, ..
        } if status.as_u16() == 503 => InferenceError::ModelUnavailable(format!(
            "{message} (still unavailable after {max_retries} retries, try again in a few minutes)"
        )),
        HttpError::Api {
            status, message, ..
        } => InferenceError::Api {
            status: status.as_u16(),
            message,
        },
        HttpError::Network(msg) => InferenceError::Transport(msg),
        HttpError::Decode(err, snippet) => InferenceError::Decode(format!("{err}; body: {snippet}")),
        HttpError::Url(msg) | HttpError::Build(msg) => InferenceError::Config(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_echo_removes_one_copy() {
        assert_eq!(strip_echo("Say hi", "Say hi Say hi  hello"), "Say hi  hello");
        assert_eq!(strip_echo("ab", "ab abc is great"), "abc is great");
        assert_eq!(strip_echo("Say hi", "hello Say hi"), "hello Say hi");
        assert_eq!(strip_echo("", "abc"), "abc");
    }

    #[test]
    fn model_name_comes_from_endpoint_path() {
        assert_eq!(
            model_from_endpoint("https://api-inference.huggingface.co/models/google/flan-t5-base/"),
            "google/flan-t5-base"
        );
        assert_eq!(model_from_endpoint("http://localhost:9000"), "http://localhost:9000");
    }

    #[test]
    fn response_shapes() {
        let batch: GenerationResponse =
            serde_json::from_str(r#"[{"generated_text":"a"},{"generated_text":"b"}]"#).unwrap();
        assert_eq!(batch.into_text().as_deref(), Some("a"));

        let single: GenerationResponse =
            serde_json::from_str(r#"{"generated_text":"one"}"#).unwrap();
        assert_eq!(single.into_text().as_deref(), Some("one"));

        let other: GenerationResponse = serde_json::from_str(r#""just a string""#).unwrap();
        assert_eq!(other.into_text(), None);

        let empty: GenerationResponse = serde_json::from_str("[]").unwrap();
        assert_eq!(empty.into_text(), None);
    }

    #[test]
    fn cleaned_output_never_leads_with_prompt() {
        let client = HfInferenceClient::new("http://localhost:1/models/m", "")
            .unwrap()
            .with_sanitizer(Arc::new(Sanitizer::with_preset(SubstitutionPreset::None).unwrap()));
        // the tag hides the second echo until cleanup removes it
        assert_eq!(client.finish("echo", "echo<b></b>echo rest"), "rest");
        assert_eq!(client.finish("echo", "echo"), NO_RESPONSE_SENTINEL);
        assert_eq!(client.finish("echo", "echo <i>echo</i>"), NO_RESPONSE_SENTINEL);
        assert_eq!(client.finish("Say hi", "Say hi Say hi  hello"), "hello");
        assert_eq!(client.finish("echo", "a reply"), "a reply");
    }

    #[test]
    fn substitution_cannot_rebuild_the_prompt_prefix() {
        let client = HfInferenceClient::new("http://localhost:1/models/m", "").unwrap();
        // `SQL database` becomes `NoSQL database` during cleanup
        let out = client.finish("No", "NoSQL databases scale out");
        assert!(!out.starts_with("No"), "{out}");
        assert_eq!(out, "SQL databases scale out");
    }

    #[test]
    fn out_of_range_parameters_are_rejected() {
        let params = GenerationParameters {
            temperature: Some(3.0),
            ..GenerationParameters::default()
        };
        let err = HfInferenceClient::new("http://localhost:1/models/m", "")
            .unwrap()
            .with_parameters(params)
            .err()
            .unwrap();
        assert!(matches!(err, InferenceError::Config(_)));
    }
}
