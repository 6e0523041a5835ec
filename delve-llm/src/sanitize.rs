//! Cleanup pipeline applied to generated text.
//!
//! One pass runs, in order: drop label-only header lines, strip HTML-like
//! tags, drop `[...]` spans, collapse whitespace, apply the substitution
//! table, unwrap quoted spans, spell out `&`, drop `[]`, collapse whitespace
//! and trim. [`Sanitizer::clean`] repeats the pass until the text stops
//! changing, so cleaning cleaned text is a no-op.

use delve_common::{InferenceError, SubstitutionRule, NO_RESPONSE_SENTINEL};
use regex::{NoExpand, Regex};
use serde::Deserialize;

/// Upper bound on passes; ordinary text settles in two or three.
const MAX_PASSES: usize = 8;

/// Characters a replacement may not introduce, since earlier steps act on them.
const RESERVED_CHARS: &[char] = &['<', '>', '[', ']', '\'', '"', '&', ':'];

/// Built-in substitution tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubstitutionPreset {
    /// Steers document-database answers away from relational vocabulary.
    #[default]
    Nosql,
    None,
}

impl SubstitutionPreset {
    pub fn rules(self) -> Vec<SubstitutionRule> {
        match self {
            SubstitutionPreset::None => Vec::new(),
            SubstitutionPreset::Nosql => [
                ("relational database", "NoSQL database"),
                ("SQL database", "NoSQL database"),
                ("table-based", "document-oriented"),
                ("rows and columns", "collections and documents"),
                ("relational", "NoSQL"),
                ("SQL", "NoSQL"),
                ("tables", "collections"),
                ("rows", "documents"),
                ("NoNoNoSQL", "NoSQL"),
                ("MongoBads", "MongoDB"),
                ("Mongol DB", "MongoDB"),
                ("BASE DB", "NoSQL database"),
                ("BASE-Case", "NoSQL"),
                ("Border DB", "MongoDB"),
            ]
            .into_iter()
            .map(|(find, replace)| SubstitutionRule::new(find, replace))
            .collect(),
        }
    }
}

struct CompiledRule {
    pattern: Regex,
    replace: String,
}

/// Ordered, idempotent text cleanup with a configurable substitution table.
pub struct Sanitizer {
    header_line: Regex,
    html_tag: Regex,
    bracketed: Regex,
    whitespace: Regex,
    single_quoted: Regex,
    double_quoted: Regex,
    empty_brackets: Regex,
    rules: Vec<CompiledRule>,
}

impl std::fmt::Debug for Sanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sanitizer")
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl Sanitizer {
    /// Compile the pipeline with `rules` as the substitution table.
    ///
    /// Rejects tables whose output would feed back into the pipeline: blank
    /// `find`, reserved characters in `replace`, or a replacement that some
    /// rule would match again.
    ///
    /// ```
    /// use delve_common::SubstitutionRule;
    /// use delve_llm::sanitize::Sanitizer;
    ///
    /// let s = Sanitizer::new(vec![SubstitutionRule::new("colour", "color")]).unwrap();
    /// assert_eq!(s.clean("Colour <b>matters</b> [1]"), "color matters");
    ///
    /// assert!(Sanitizer::new(vec![SubstitutionRule::new("db", "<db>")]).is_err());
    /// ```
    pub fn new(rules: Vec<SubstitutionRule>) -> Result<Self, InferenceError> {
        let compiled = rules
            .into_iter()
            .map(compile_rule)
            .collect::<Result<Vec<_>, _>>()?;

        for rule in &compiled {
            if rule.replace.contains(RESERVED_CHARS) {
                return Err(InferenceError::Config(format!(
                    "substitution {:?} uses one of the reserved characters {:?}",
                    rule.replace, RESERVED_CHARS
                )));
            }
            if let Some(clash) = compiled.iter().find(|other| {
                other.pattern.is_match(&rule.replace) || other.pattern.is_match(NO_RESPONSE_SENTINEL)
            }) {
                return Err(InferenceError::Config(format!(
                    "substitution table is not stable: pattern {} matches {:?} or the empty-output sentinel",
                    clash.pattern, rule.replace
                )));
            }
        }

        Ok(Self {
            header_line: fixed(r"(?m)^[ \t]*[A-Z][A-Za-z \t]*:[ \t\r]*$")?,
            html_tag: fixed(r"<[^>]*>")?,
            bracketed: fixed(r"(?s)\[.*?\]")?,
            whitespace: fixed(r"\s+")?,
            single_quoted: fixed(r"'([^']*)'")?,
            double_quoted: fixed(r#""([^"]*)""#)?,
            empty_brackets: fixed(r"\[\]")?,
            rules: compiled,
        })
    }

    pub fn with_preset(preset: SubstitutionPreset) -> Result<Self, InferenceError> {
        Self::new(preset.rules())
    }

    /// Preset rules followed by `extra`.
    pub fn with_preset_and(
        preset: SubstitutionPreset,
        extra: Vec<SubstitutionRule>,
    ) -> Result<Self, InferenceError> {
        let mut rules = preset.rules();
        rules.extend(extra);
        Self::new(rules)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Run the pipeline to a fixed point; empty output becomes the sentinel.
    pub fn clean(&self, input: &str) -> String {
        let mut current = self.pass(input);
        for _ in 1..MAX_PASSES {
            let next = self.pass(&current);
            if next == current {
                break;
            }
            current = next;
        }
        if current.is_empty() {
            NO_RESPONSE_SENTINEL.to_string()
        } else {
            current
        }
    }

    fn pass(&self, input: &str) -> String {
        let s = self.header_line.replace_all(input, "");
        let s = self.html_tag.replace_all(&s, "");
        let s = self.bracketed.replace_all(&s, "");
        let mut s = self.whitespace.replace_all(&s, " ").into_owned();
        for rule in &self.rules {
            s = rule
                .pattern
                .replace_all(&s, NoExpand(&rule.replace))
                .into_owned();
        }
        let s = self.single_quoted.replace_all(&s, "$1");
        let s = self.double_quoted.replace_all(&s, "$1");
        let s = s.replace('&', "and");
        let s = self.empty_brackets.replace_all(&s, "");
        self.whitespace.replace_all(&s, " ").trim().to_string()
    }
}

fn fixed(pattern: &str) -> Result<Regex, InferenceError> {
    Regex::new(pattern).map_err(|e| InferenceError::Config(format!("cleanup pattern {pattern}: {e}")))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Literal, case-insensitive; word boundaries only on word-character edges.
fn compile_rule(rule: SubstitutionRule) -> Result<CompiledRule, InferenceError> {
    let find = rule.find.trim();
    if find.is_empty() {
        return Err(InferenceError::Config(
            "substitution rule with an empty `find`".to_string(),
        ));
    }
    let lead = if find.starts_with(is_word_char) { r"\b" } else { "" };
    let tail = if find.ends_with(is_word_char) { r"\b" } else { "" };
    let pattern = Regex::new(&format!("(?i){lead}{}{tail}", regex::escape(find)))
        .map_err(|e| InferenceError::Config(format!("substitution {find:?}: {e}")))?;
    Ok(CompiledRule {
        pattern,
        replace: rule.replace,
    })
}
