//! Prompt templates for the four research stages.
//!
//! Templates are plain strings with `{text}`, `{sources}` and `{findings}`
//! placeholders. Unknown `{...}` spans are left untouched, and substituted
//! values are never re-scanned, so user text containing braces is safe.

use delve_common::{ResearchStep, SearchResult};
use delve_config::{PromptPreset, PromptSettings};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptTemplates {
    pub analysis: String,
    pub related: String,
    pub comparison: String,
    pub summary: String,
}

const GENERAL_ANALYSIS: &str = "Provide a concise technical analysis of \"{text}\". \
Cover what it is, its key features, how it works, and typical use cases. \
Use short bullet points and do not repeat information.";

const GENERAL_RELATED: &str = "Analyze these search results about \"{text}\" and provide a technical summary:\n\
{sources}\n\
Highlight the technical details, capabilities and implementation notes they share. \
Do not include HTML tags or special characters.";

const GENERAL_COMPARISON: &str = "Compare \"{text}\" with the most common alternatives. \
Describe the key differences, trade-offs, performance characteristics and when to choose each.";

const GENERAL_SUMMARY: &str = "Provide a comprehensive technical summary of \"{text}\" based on these findings:\n\
{findings}\n\
Close with its strengths, limitations and likely future developments.";

const NOSQL_ANALYSIS: &str = "Provide a concise technical analysis of \"{text}\" in the following format:

Core Definition:
- A document-oriented NoSQL database
- Stores data in flexible, JSON-like documents
- Designed for scalability and flexibility

Key Features:
- Schema-less design
- Horizontal scaling through sharding
- High availability with replica sets
- Rich query language
- Indexing support
- Aggregation framework

Technical Architecture:
- Document-based data model
- Distributed architecture
- Replication and sharding

Use Cases:
- Big data applications
- Content management systems
- Real-time analytics
- IoT applications

Format the response with clear section headers and bullet points. Do not repeat information.";

const NOSQL_RELATED: &str = "Analyze these search results about \"{text}\" and provide a technical summary:
{sources}

Technical Details:
- Document-oriented architecture
- BSON data format
- Distributed systems design

Features and Capabilities:
- Flexible schema design
- Horizontal scaling
- High availability
- Aggregation framework

Implementation:
- Replica sets for high availability
- Sharding for horizontal scaling
- Indexing strategies

Format the response with clear section headers and bullet points. Do not include HTML tags or special characters.";

const NOSQL_COMPARISON: &str = "Compare \"{text}\" with traditional relational databases:

Key Differences:
- Document-oriented vs table-based
- Flexible schema vs rigid schema
- Horizontal vs vertical scaling

Performance:
- Better for unstructured data
- Relational databases better for complex joins

Use Cases:
- Document stores: big data, real-time analytics
- Relational: complex transactions, reporting

Format the response with clear section headers and bullet points. Do not include incorrect statements about MongoDB's capabilities.";

const NOSQL_SUMMARY: &str = "Provide a comprehensive technical summary of \"{text}\":
{findings}

Overview:
- Document-oriented NoSQL database
- Designed for scalability and flexibility

Architecture:
- Replica sets for high availability
- Sharding for horizontal scaling

Future Developments:
- Enhanced transactions
- Improved analytics
- Cloud integration

Format the response with clear section headers and bullet points.";

impl Default for PromptTemplates {
    fn default() -> Self {
        Self::preset(PromptPreset::General)
    }
}

impl PromptTemplates {
    pub fn preset(preset: PromptPreset) -> Self {
        let (analysis, related, comparison, summary) = match preset {
            PromptPreset::General => (
                GENERAL_ANALYSIS,
                GENERAL_RELATED,
                GENERAL_COMPARISON,
                GENERAL_SUMMARY,
            ),
            PromptPreset::Nosql => (NOSQL_ANALYSIS, NOSQL_RELATED, NOSQL_COMPARISON, NOSQL_SUMMARY),
        };
        Self {
            analysis: analysis.to_string(),
            related: related.to_string(),
            comparison: comparison.to_string(),
            summary: summary.to_string(),
        }
    }

    /// Preset wording with any configured templates swapped in.
    pub fn from_settings(settings: &PromptSettings) -> Self {
        let mut t = Self::preset(settings.preset);
        let overrides = [
            (&mut t.analysis, &settings.analysis),
            (&mut t.related, &settings.related),
            (&mut t.comparison, &settings.comparison),
            (&mut t.summary, &settings.summary),
        ];
        for (slot, value) in overrides {
            if let Some(v) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                *slot = v.to_string();
            }
        }
        t
    }

    pub fn render_analysis(&self, text: &str) -> String {
        render(&self.analysis, &[("text", text)])
    }

    pub fn render_related(&self, text: &str, sources: &[SearchResult]) -> String {
        render(&self.related, &[("text", text), ("sources", &format_sources(sources))])
    }

    pub fn render_comparison(&self, text: &str, sources: &[SearchResult]) -> String {
        render(&self.comparison, &[("text", text), ("sources", &format_sources(sources))])
    }

    pub fn render_summary(&self, text: &str, steps: &[ResearchStep]) -> String {
        render(&self.summary, &[("text", text), ("findings", &format_findings(steps))])
    }
}

/// `1. Title (url)` per line.
pub fn format_sources(sources: &[SearchResult]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {} ({})", i + 1, s.title, s.url))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_findings(steps: &[ResearchStep]) -> String {
    steps
        .iter()
        .map(|s| format!("{}: {}", s.title, s.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Single left-to-right pass over `template`.
fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let hit = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (close, *v))
        });
        match hit {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(title: &str, url: &str) -> SearchResult {
        SearchResult {
            title: title.into(),
            url: url.into(),
        }
    }

    #[test]
    fn placeholders_are_filled_once() {
        let out = render("A {text} B {sources} {other}", &[("text", "{sources}"), ("sources", "S")]);
        assert_eq!(out, "A {sources} B S {other}");
    }

    #[test]
    fn unbalanced_braces_survive() {
        assert_eq!(render("x { y", &[("text", "t")]), "x { y");
        assert_eq!(render("{text}}", &[("text", "t")]), "t}");
    }

    #[test]
    fn related_prompt_lists_sources() {
        let t = PromptTemplates::default();
        let prompt = t.render_related("sharding", &[hit("A", "http://a"), hit("B", "http://b")]);
        assert!(prompt.contains("\"sharding\""));
        assert!(prompt.contains("1. A (http://a)\n2. B (http://b)"));
    }

    #[test]
    fn summary_prompt_carries_findings() {
        let t = PromptTemplates::preset(PromptPreset::Nosql);
        let steps = vec![
            ResearchStep::new("Initial Analysis", "a1"),
            ResearchStep::new("Related Information", "r1"),
        ];
        let prompt = t.render_summary("MongoDB", &steps);
        assert!(prompt.starts_with("Provide a comprehensive technical summary of \"MongoDB\""));
        assert!(prompt.contains("Initial Analysis: a1\n\nRelated Information: r1"));
    }

    #[test]
    fn overrides_replace_single_templates() {
        let settings = PromptSettings {
            preset: PromptPreset::Nosql,
            summary: Some("Sum {findings}".into()),
            analysis: Some("   ".into()),
            ..PromptSettings::default()
        };
        let t = PromptTemplates::from_settings(&settings);
        assert_eq!(t.summary, "Sum {findings}");
        assert_eq!(t.analysis, NOSQL_ANALYSIS);
        assert_eq!(t.related, NOSQL_RELATED);
    }
}
