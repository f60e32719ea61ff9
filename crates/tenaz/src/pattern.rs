//! URL patterns for destination assertions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pattern for matching document URLs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum UrlPattern {
    /// Exact URL match, ignoring a single trailing slash
    Exact(String),
    /// Prefix match
    Prefix(String),
    /// Contains substring
    Contains(String),
    /// Host component equals (e.g. "www.linkedin.com")
    Host(String),
    /// Regex match
    Regex(String),
    /// Glob pattern (e.g., "**/discussion*")
    Glob(String),
    /// Match any URL
    Any,
}

impl UrlPattern {
    /// Exact match shorthand
    #[must_use]
    pub fn exact(url: impl Into<String>) -> Self {
        Self::Exact(url.into())
    }

    /// Prefix match shorthand
    #[must_use]
    pub fn prefix(url: impl Into<String>) -> Self {
        Self::Prefix(url.into())
    }

    /// Check if a URL matches this pattern
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Exact(pattern) => trim_slash(url) == trim_slash(pattern),
            Self::Prefix(pattern) => url.starts_with(pattern.as_str()),
            Self::Contains(pattern) => url.contains(pattern.as_str()),
            Self::Host(host) => host_of(url).is_some_and(|h| h.eq_ignore_ascii_case(host)),
            Self::Regex(pattern) => regex::Regex::new(pattern)
                .map(|re| re.is_match(url))
                .unwrap_or(false),
            Self::Glob(pattern) => Self::glob_matches(pattern, url),
            Self::Any => true,
        }
    }

    /// Simple glob matching for URLs
    fn glob_matches(pattern: &str, url: &str) -> bool {
        let parts: Vec<&str> = pattern.split('*').collect();
        let mut pos = 0;
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() {
                continue;
            }
            match url[pos..].find(part) {
                Some(found) if i == 0 && found != 0 => return false,
                Some(found) => pos += found + part.len(),
                None => return false,
            }
        }
        pattern.ends_with('*') || pos == url.len()
    }
}

fn trim_slash(url: &str) -> &str {
    url.strip_suffix('/').unwrap_or(url)
}

/// Host component of an absolute URL, without port or credentials
#[must_use]
pub fn host_of(url: &str) -> Option<&str> {
    let rest = url.split_once("://")?.1;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = host_port.split(':').next()?;
    (!host.is_empty()).then_some(host)
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(p) => write!(f, "{p}"),
            Self::Prefix(p) => write!(f, "{p}*"),
            Self::Contains(p) => write!(f, "*{p}*"),
            Self::Host(h) => write!(f, "host={h}"),
            Self::Regex(p) => write!(f, "/{p}/"),
            Self::Glob(p) => write!(f, "{p}"),
            Self::Any => write!(f, "*"),
        }
    }
}
