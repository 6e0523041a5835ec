use delve_common::SearchResult;
use serde::Deserialize;

/// Body of a Custom Search `GET`. Only the fields we read are modelled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    /// Absent when the query matched nothing.
    #[serde(default)]
    pub items: Option<Vec<SearchItem>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
}

impl SearchItem {
    /// `None` for items without a usable link; a blank title falls back to the link.
    pub fn into_result(self) -> Option<SearchResult> {
        let url = self.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty())?;
        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| url.clone());
        Some(SearchResult { title, url })
    }
}

impl SearchResponse {
    pub fn into_results(self) -> Vec<SearchResult> {
        self.items
            .unwrap_or_default()
            .into_iter()
            .filter_map(SearchItem::into_result)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_items_is_empty() {
        let resp: SearchResponse =
            serde_json::from_str(r#"{"kind":"customsearch#search","searchInformation":{}}"#).unwrap();
        assert!(resp.into_results().is_empty());
    }

    #[test]
    fn items_map_to_title_and_url() {
        let resp: SearchResponse = serde_json::from_str(
            r#"{"items":[
                {"title":"X","link":"http://y","snippet":"ignored"},
                {"title":"no link"},
                {"title":"  ","link":"https://z.example/"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            resp.into_results(),
            vec![
                SearchResult {
                    title: "X".into(),
                    url: "http://y".into()
                },
                SearchResult {
                    title: "https://z.example/".into(),
                    url: "https://z.example/".into()
                },
            ]
        );
    }
}
