mod client;
mod types;

pub use client::GoogleSearchClient;
pub use types::{SearchItem, SearchResponse};
