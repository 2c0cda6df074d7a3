//! Critical keyword matching.
//!
//! Keywords match as whole words or whole phrases, case-insensitively:
//!
//! - a keyword only matches at word boundaries ("offer" never matches
//!   "coffee", "bank" never matches "embankment")
//! - a multi-word keyword matches its words in order, separated by any run
//!   of whitespace, hyphens or underscores ("order confirmation",
//!   "order-confirmation")
//! - the final word may carry a plain plural suffix ("invoices", "taxes")
//!
//! There is no stemming. "Banking" does not match "bank"; list it explicitly
//! if it should.

use regex::{Regex, RegexBuilder, RegexSet, RegexSetBuilder};

use crate::config::ConfigError;

/// Critical keywords and phrases that force a KEEP verdict.
pub const DEFAULT_CRITICAL_KEYWORDS: &[&str] = &[
    "receipt",
    "invoice",
    "order",
    "payment",
    "booking",
    "reservation",
    "shipped",
    "tracking",
    "password",
    "security",
    "tax",
    "medical",
    "bank",
    "legal",
    "interview",
    "verification code",
    "account statement",
    "boarding pass",
];

/// A keyword hit in a piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordMatch {
    /// The configured keyword, normalized to lowercase single spaces.
    pub keyword: String,
    /// The text that matched, as it appeared in the input.
    pub matched: String,
}

/// Compiled whole-word / phrase matcher over a fixed keyword list.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: Vec<String>,
    patterns: Vec<Regex>,
    set: RegexSet,
}

impl KeywordMatcher {
    pub fn new<I, S>(keywords: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for keyword in keywords {
            let words: Vec<String> = keyword
                .as_ref()
                .split_whitespace()
                .map(|w| w.to_lowercase())
                .collect();
            if words.is_empty() {
                continue;
            }
            let joined = words.join(" ");
            if !normalized.contains(&joined) {
                normalized.push(joined);
            }
        }

        let sources: Vec<String> = normalized.iter().map(|k| keyword_pattern(k)).collect();

        let set = RegexSetBuilder::new(&sources)
            .case_insensitive(true)
            .build()
            .map_err(|source| ConfigError::Pattern {
                pattern: sources.join(" | "),
                source,
            })?;

        let patterns = sources
            .iter()
            .map(|src| {
                RegexBuilder::new(src)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ConfigError::Pattern {
                        pattern: src.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            keywords: normalized,
            patterns,
            set,
        })
    }

    /// Matcher over [`DEFAULT_CRITICAL_KEYWORDS`].
    pub fn default_keywords() -> Result<Self, ConfigError> {
        Self::new(DEFAULT_CRITICAL_KEYWORDS)
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// First configured keyword (in list order) present in `text`.
    pub fn find(&self, text: &str) -> Option<KeywordMatch> {
        let index = self.set.matches(text).iter().next()?;
        let matched = self.patterns[index].find(text)?;
        Some(KeywordMatch {
            keyword: self.keywords[index].clone(),
            matched: matched.as_str().to_string(),
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.set.is_match(text)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Regex source for one normalized keyword.
fn keyword_pattern(keyword: &str) -> String {
    let body = keyword
        .split(' ')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"[\s\-_]+");

    let starts_word = keyword.chars().next().is_some_and(is_word_char);
    let ends_alpha = keyword.chars().last().is_some_and(char::is_alphabetic);
    let ends_word = keyword.chars().last().is_some_and(is_word_char);

    let mut pattern = String::new();
    if starts_word {
        pattern.push_str(r"\b");
    }
    pattern.push_str("(?:");
    pattern.push_str(&body);
    pattern.push(')');
    if ends_alpha {
        pattern.push_str("(?:e?s)?");
    }
    if ends_word {
        pattern.push_str(r"\b");
    }
    pattern
}
