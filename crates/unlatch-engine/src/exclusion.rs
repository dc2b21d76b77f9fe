//! Host exclusion: decides whether the engine runs at all on a host.

use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::error::{EngineError, EngineResult};

/// How a [`HostPattern`] is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// `youtube.com` matches `youtube.com` and `m.youtube.com`.
    Suffix,
    /// `inshorturl.*` is an anchored glob; `*` is the only metacharacter.
    Wildcard,
}

/// One exclusion entry.
#[derive(Debug, Clone)]
pub struct HostPattern {
    pattern: String,
    mode: MatchMode,
    regex: Option<Regex>,
}

impl HostPattern {
    /// Parse a pattern. Inline `#` comments are stripped.
    pub fn parse(text: &str) -> EngineResult<Self> {
        let pattern = text
            .split('#')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        let invalid = |message: &str| EngineError::InvalidPattern {
            pattern: text.to_string(),
            message: message.to_string(),
        };

        if pattern.is_empty() {
            return Err(invalid("empty pattern"));
        }
        if pattern.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(invalid("not a bare host pattern"));
        }

        match pattern.matches('*').count() {
            0 => Ok(Self {
                pattern,
                mode: MatchMode::Suffix,
                regex: None,
            }),
            1 => {
                let anchored = format!("^{}$", regex::escape(&pattern).replace(r"\*", ".*"));
                let regex = Regex::new(&anchored).map_err(|e| invalid(&e.to_string()))?;
                Ok(Self {
                    pattern,
                    mode: MatchMode::Wildcard,
                    regex: Some(regex),
                })
            }
            _ => Err(invalid("more than one wildcard")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Whether `host` (already lowercased) matches.
    pub fn matches(&self, host: &str) -> bool {
        match (&self.mode, &self.regex) {
            (MatchMode::Wildcard, Some(regex)) => regex.is_match(host),
            _ => {
                host == self.pattern
                    || host
                        .strip_suffix(self.pattern.as_str())
                        .is_some_and(|rest| rest.ends_with('.'))
            }
        }
    }
}

/// Set of host patterns on which the engine stays inert.
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    patterns: Vec<HostPattern>,
}

impl ExclusionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from pattern text, skipping entries that fail to parse.
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::new();
        filter.extend(patterns);
        filter
    }

    /// Add more patterns, skipping entries that fail to parse.
    pub fn extend<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for text in patterns {
            match HostPattern::parse(text.as_ref()) {
                Ok(pattern) => {
                    if !self.patterns.iter().any(|p| p.pattern == pattern.pattern) {
                        self.patterns.push(pattern);
                    }
                }
                Err(e) => warn!("Skipping exclusion pattern: {}", e),
            }
        }
    }

    /// First pattern matching `host`, if any.
    pub fn matching(&self, host: &str) -> Option<&HostPattern> {
        let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() {
            return None;
        }
        self.patterns.iter().find(|p| p.matches(&host))
    }

    pub fn is_excluded(&self, host: &str) -> bool {
        self.matching(host).is_some()
    }

    pub fn patterns(&self) -> &[HostPattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
