// SPDX-License-Identifier: Apache-2.0

//! Line filters compiled from a list of patterns.
//!
//! Each pattern is one of:
//! - `/regex/`: a regular expression, matched anywhere in the line
//! - a glob (contains `*`, `?` or `[`): must match the whole line
//! - anything else: a literal keyword, matched as a substring
//!
//! A filter matches when any of its patterns match.

use glob::Pattern;
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("invalid filter pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

pub type Result<T> = std::result::Result<T, FilterError>;

fn invalid(pattern: &str, reason: impl ToString) -> FilterError {
    FilterError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Literal(String),
    Glob(Pattern),
    Regex(Regex),
}

impl Matcher {
    fn matches(&self, line: &str) -> bool {
        match self {
            Matcher::Literal(s) => line.contains(s.as_str()),
            Matcher::Glob(p) => p.matches(line),
            Matcher::Regex(r) => r.is_match(line),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Filter {
    matchers: Vec<Matcher>,
}

/// Returns true if `s` contains glob metacharacters.
pub fn has_glob_meta(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

impl Filter {
    /// Compile a filter. Empty patterns are ignored; a filter with no
    /// patterns matches nothing.
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut matchers = Vec::with_capacity(patterns.len());

        for raw in patterns {
            let raw = raw.as_ref();
            if raw.is_empty() {
                continue;
            }

            let matcher = if raw.len() >= 2 && raw.starts_with('/') && raw.ends_with('/') {
                let re = Regex::new(&raw[1..raw.len() - 1]).map_err(|e| invalid(raw, e))?;
                Matcher::Regex(re)
            } else if has_glob_meta(raw) {
                let p = Pattern::new(raw).map_err(|e| invalid(raw, e))?;
                Matcher::Glob(p)
            } else {
                Matcher::Literal(raw.to_string())
            };
            matchers.push(matcher);
        }

        Ok(Self { matchers })
    }

    pub fn matches(&self, line: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(line))
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}
