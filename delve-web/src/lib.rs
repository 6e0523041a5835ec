//! Web discovery for delve.
//!
//! - [`SearchProvider`]: the seam the research pipeline searches through
//! - Google Custom Search client (`google`)
//!
//! Truncating the hit list (e.g. to the top five) is left to callers.

pub mod google;

use async_trait::async_trait;
use delve_common::{SearchError, SearchResult};

pub use google::GoogleSearchClient;

/// Google Custom Search JSON API.
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// Items requested per query; the API refuses more than ten.
pub const DEFAULT_NUM_RESULTS: u8 = 10;

/// Anything that turns a query into ranked `{title, url}` pairs.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Zero hits is an empty list, not an error.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError>;

    fn provider_name(&self) -> &str;
}
