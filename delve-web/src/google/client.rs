use super::types::SearchResponse;
use crate::{DEFAULT_NUM_RESULTS, SearchProvider};
use async_trait::async_trait;
use delve_common::{SearchError, SearchResult};
use delve_http::{Auth, HttpClient, HttpError, RequestOpts, RetryPolicy};
use std::borrow::Cow;
use std::time::Instant;

const QUERY_LOG_MAX: usize = 160;

/// Minimal client for the Google Custom Search JSON API.
#[derive(Clone)]
pub struct GoogleSearchClient {
    http: HttpClient,
    api_key: String,
    engine_id: String,
    num: u8,
}

impl std::fmt::Debug for GoogleSearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSearchClient")
            .field("endpoint", &self.http.base().as_str())
            .field("api_key", &"<redacted>")
            .field("engine_id", &"<redacted>")
            .field("num", &self.num)
            .finish()
    }
}

impl GoogleSearchClient {
    /// `endpoint` is the full search URL, normally [`crate::DEFAULT_SEARCH_ENDPOINT`].
    pub fn new(
        endpoint: &str,
        api_key: impl Into<String>,
        engine_id: impl Into<String>,
    ) -> Result<Self, SearchError> {
        let http = HttpClient::new(endpoint)
            .map_err(|e| SearchError::Config(format!("HttpClient init failed: {e}")))?
            .with_retry_policy(RetryPolicy::none());
        Ok(Self {
            http,
            api_key: api_key.into(),
            engine_id: engine_id.into(),
            num: DEFAULT_NUM_RESULTS,
        })
    }

    /// Items per query, clamped to what the API accepts (1..=10).
    pub fn with_num(mut self, num: u8) -> Self {
        self.num = num.clamp(1, DEFAULT_NUM_RESULTS);
        self
    }

    pub fn num(&self) -> u8 {
        self.num
    }

    /// One page of raw results.
    pub async fn search_page(&self, query: &str) -> Result<SearchResponse, SearchError> {
        let params: Vec<(&str, Cow<'_, str>)> = vec![
            ("cx", Cow::Borrowed(self.engine_id.as_str())),
            ("q", Cow::Borrowed(query)),
            ("num", Cow::Owned(self.num.to_string())),
        ];
        let query_snippet = snippet(query);
        let started = Instant::now();
        tracing::info!(
            target: "web.google",
            query = %query_snippet,
            num = self.num,
            "google.search.start"
        );

        let result = self
            .http
            .get_json::<SearchResponse>(
                "",
                RequestOpts {
                    auth: Some(Auth::Query {
                        name: "key",
                        value: Cow::Borrowed(self.api_key.as_str()),
                    }),
                    query: Some(params),
                    retry: Some(RetryPolicy::none()),
                    ..Default::default()
                },
            )
            .await;

        match result {
            Ok(resp) => {
                tracing::info!(
                    target: "web.google",
                    query = %query_snippet,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    item_count = resp.items.as_ref().map_or(0, Vec::len),
                    "google.search.success"
                );
                Ok(resp)
            }
            Err(e) => {
                tracing::warn!(
                    target: "web.google",
                    query = %query_snippet,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "google.search.error"
                );
                Err(http_to_search(e))
            }
        }
    }
}

#[async_trait]
impl SearchProvider for GoogleSearchClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        Ok(self.search_page(query).await?.into_results())
    }

    fn provider_name(&self) -> &str {
        "google"
    }
}

fn snippet(query: &str) -> String {
    match query.char_indices().nth(QUERY_LOG_MAX) {
        Some((cut, _)) => format!("{}…", &query[..cut]),
        None => query.to_string(),
    }
}

fn http_to_search(e: HttpError) -> SearchError {
    match e {
        HttpError::Api {
            status, message, ..
        } => SearchError::Api {
            status: status.as_u16(),
            message,
        },
        HttpError::Network(msg) => SearchError::Transport(msg),
        HttpError::Decode(err, snippet) => SearchError::Decode(format!("{err}; body: {snippet}")),
        HttpError::Url(msg) | HttpError::Build(msg) => SearchError::Config(msg),
    }
}
