//! NER collaborator contract and a rule-based recognizer.
//!
//! [`Gazetteer`] is a deterministic recognizer driven by a TOML file of
//! literal terms and regular expressions. Statistical models plug in through
//! the same [`EntityRecognizer`] trait from the shell crate.

use std::convert::Infallible;

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

use crate::resolve::EntitySpan;

/// Finds entity spans in a page's text.
///
/// Spans must be character offsets into `text`, half-open.
pub trait EntityRecognizer {
    type Error: std::error::Error + Send + Sync + 'static;

    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, Self::Error>;
}

#[derive(Debug, Error)]
pub enum GazetteerError {
    #[error("Invalid gazetteer file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Rule '{label}' has neither terms nor patterns")]
    EmptyRule { label: String },
    #[error("Rule '{label}': invalid pattern: {source}")]
    Pattern {
        label: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Deserialize)]
struct GazetteerFile {
    #[serde(default)]
    case_insensitive: bool,
    #[serde(default, rename = "entity")]
    entities: Vec<RuleFile>,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    label: String,
    #[serde(default)]
    terms: Vec<String>,
    #[serde(default)]
    patterns: Vec<String>,
}

#[derive(Debug)]
struct Rule {
    label: String,
    regex: Regex,
}

/// Rule-based recognizer over literal terms and regular expressions.
///
/// Overlapping matches are resolved leftmost-longest; on a tie the rule
/// declared first wins.
#[derive(Debug)]
pub struct Gazetteer {
    rules: Vec<Rule>,
}

impl Gazetteer {
    /// Parse a gazetteer from TOML.
    ///
    /// ```toml
    /// case_insensitive = true
    ///
    /// [[entity]]
    /// label = "PER"
    /// terms = ["Hans Müller"]
    ///
    /// [[entity]]
    /// label = "ORG"
    /// patterns = ['\b\p{Lu}\w+ GmbH\b']
    /// ```
    pub fn from_toml(source: &str) -> Result<Self, GazetteerError> {
        let file: GazetteerFile = toml::from_str(source)?;
        let rules = file
            .entities
            .into_iter()
            .map(|rule| compile_rule(rule, file.case_insensitive))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All non-overlapping matches in `text`, ordered by start offset.
    pub fn find(&self, text: &str) -> Vec<EntitySpan> {
        // (byte_start, byte_end, rule index)
        let mut candidates: Vec<(usize, usize, usize)> = self
            .rules
            .iter()
            .enumerate()
            .flat_map(|(i, rule)| {
                rule.regex
                    .find_iter(text)
                    .filter(|m| !m.is_empty())
                    .map(move |m| (m.start(), m.end(), i))
            })
            .collect();

        candidates.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));

        let offsets = CharOffsets::new(text);
        let mut spans = Vec::new();
        let mut covered_until = 0;
        for (start, end, rule) in candidates {
            if start < covered_until {
                continue;
            }
            covered_until = end;
            spans.push(EntitySpan {
                text: text[start..end].to_string(),
                start: offsets.char_index(start),
                end: offsets.char_index(end),
                label: self.rules[rule].label.clone(),
            });
        }
        spans
    }
}

impl EntityRecognizer for Gazetteer {
    type Error = Infallible;

    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, Self::Error> {
        Ok(self.find(text))
    }
}

fn compile_rule(rule: RuleFile, case_insensitive: bool) -> Result<Rule, GazetteerError> {
    if rule.terms.is_empty() && rule.patterns.is_empty() {
        return Err(GazetteerError::EmptyRule { label: rule.label });
    }

    let alternatives: Vec<String> = rule
        .terms
        .iter()
        .filter(|t| !t.trim().is_empty())
        .map(|t| term_pattern(t))
        .chain(rule.patterns.iter().map(|p| format!("(?:{p})")))
        .collect();

    let regex = RegexBuilder::new(&alternatives.join("|"))
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|source| GazetteerError::Pattern {
            label: rule.label.clone(),
            source,
        })?;

    Ok(Rule {
        label: rule.label,
        regex,
    })
}

/// Literal term as a pattern, anchored on word boundaries where the term
/// itself starts or ends with a word character.
fn term_pattern(term: &str) -> String {
    let term: String = term.trim().nfc().collect();
    let starts_word = term.chars().next().is_some_and(char::is_alphanumeric);
    let ends_word = term.chars().last().is_some_and(char::is_alphanumeric);
    format!(
        "{}{}{}",
        if starts_word { r"\b" } else { "" },
        regex::escape(&term),
        if ends_word { r"\b" } else { "" },
    )
}

/// Byte offset to character offset lookup for one string.
struct CharOffsets {
    boundaries: Vec<usize>,
}

impl CharOffsets {
    fn new(text: &str) -> Self {
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        boundaries.push(text.len());
        Self { boundaries }
    }

    /// `byte` must lie on a character boundary.
    fn char_index(&self, byte: usize) -> usize {
        self.boundaries
            .binary_search(&byte)
            .unwrap_or_else(|insert_at| insert_at)
    }
}
