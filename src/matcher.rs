//! Relevance predicates applied by workers to each commit

use anyhow::{Context, Result as AnyResult};
use regex::Regex;

use crate::commit::CommitRecord;
use crate::error::Result;

/// Security-related word prefixes searched for in commit messages
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "attack",
    "breach",
    "bruteforce",
    "brute force",
    "crypto",
    "exploit",
    "firewall",
    "hole",
    "leak",
    "malicious",
    "man-in-the-middle",
    "mitm",
    "penetration",
    "privacy",
    "quarantine",
    "sabotage",
    "secur",
    "spoof",
    "tamper",
    "trojan",
    "trust",
    "unauthorized",
    "virus",
];

/// Decides whether a commit is relevant.
///
/// Implementations must be pure: the same record always gives the same
/// answer. An `Err` is treated as a bug and aborts the worker that hit it.
pub trait Matcher: Send + Sync {
    fn matches(&self, record: &CommitRecord) -> Result<bool>;
}

impl<F> Matcher for F
where
    F: Fn(&CommitRecord) -> Result<bool> + Send + Sync,
{
    fn matches(&self, record: &CommitRecord) -> Result<bool> {
        self(record)
    }
}

/// Case-insensitive search for keywords at the start of a word in the
/// commit message. Records without a message never match.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    regex: Regex,
}

impl KeywordMatcher {
    pub fn new<I, S>(keywords: I) -> AnyResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let alternatives: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .map(|k| regex::escape(&k))
            .collect();
        if alternatives.is_empty() {
            anyhow::bail!("keyword list is empty");
        }

        Self::with_pattern(&format!(r"\b(?:{})", alternatives.join("|")))
    }

    /// Build from a ready-made regular expression, matched case-insensitively
    pub fn with_pattern(pattern: &str) -> AnyResult<Self> {
        let regex = Regex::new(&format!("(?i){}", pattern))
            .with_context(|| format!("Invalid keyword pattern: {}", pattern))?;
        Ok(Self { regex })
    }

    /// Matcher over [`DEFAULT_KEYWORDS`]
    pub fn security_keywords() -> AnyResult<Self> {
        Self::new(DEFAULT_KEYWORDS)
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}


impl Matcher for KeywordMatcher {
    fn matches(&self, record: &CommitRecord) -> Result<bool> {
        Ok(record
            .message
            .as_deref()
            .is_some_and(|message| self.regex.is_match(message)))
    }
}
