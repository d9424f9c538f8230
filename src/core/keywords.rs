//! Search-term extraction from a bug report.
//!
//! Deliberately simple: tokens are kept in the order they first appear in
//! `summary + description`, not ranked by frequency.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::model::BugReport;

/// Default number of distinct keywords kept
pub const DEFAULT_KEYWORD_LIMIT: usize = 10;

/// Tokens shorter than this (in chars) are dropped
const MIN_TOKEN_CHARS: usize = 4;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W+").expect("static regex is valid"));

/// Common words that carry no search signal. Only entries longer than three
/// characters matter since shorter tokens are already dropped.
const STOPWORDS: &[&str] = &[
    "the", "and", "with", "this", "that", "from", "have", "when", "then", "than", "there", "their",
    "they", "them", "were", "been", "being", "into", "onto", "should", "would", "could", "does",
    "doesn", "didn", "after", "before", "while", "which", "where", "what", "also", "only", "some",
    "will", "your", "about", "just", "like", "more", "most", "other", "such", "very", "each",
    "here", "over", "under", "because", "these", "those", "without", "within", "again", "still",
    "even", "once", "please", "expected", "actual", "steps", "reproduce",
];

/// Derives a bounded set of search terms
#[derive(Debug, Clone)]
pub struct KeywordExtractor
{
    limit: usize,
}

impl Default for KeywordExtractor
{
    fn default() -> Self
    {
        Self { limit: DEFAULT_KEYWORD_LIMIT }
    }
}

impl KeywordExtractor
{
    /// Override the number of keywords kept
    pub fn with_limit(
        mut self,
        limit: usize,
    ) -> Self
    {
        self.limit = limit;
        self
    }

    /// Keywords for a report, in encounter order
    pub fn extract_keywords(
        &self,
        report: &BugReport,
    ) -> Vec<String>
    {
        let text = format!("{} {}", report.summary, report.description);
        self.extract_from_text(&text)
    }

    /// Keywords for arbitrary text, in encounter order
    pub fn extract_from_text(
        &self,
        text: &str,
    ) -> Vec<String>
    {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for token in NON_WORD.split(text)
        {
            if out.len() >= self.limit
            {
                break;
            }

            let token = token.to_lowercase();
            if token
                .chars()
                .count()
                < MIN_TOKEN_CHARS
                || STOPWORDS.contains(&token.as_str())
            {
                continue;
            }

            if seen.insert(token.clone())
            {
                out.push(token);
            }
        }

        out
    }
}
