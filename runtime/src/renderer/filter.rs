//! Request filter that keeps page weight down by refusing heavy resources.

use regex::Regex;
use std::collections::HashSet;

/// Outcome of filtering one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Allow,
    Block,
}

/// Blocks requests by host pattern, resource type or file extension.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    blocked_domains: Vec<DomainPattern>,
    blocked_types: HashSet<String>,
    blocked_extensions: Vec<String>,
}

#[derive(Debug, Clone)]
enum DomainPattern {
    Exact(String),
    /// `*.example.com` matches `example.com` and any subdomain.
    Suffix(String),
    /// Any other pattern with `*` wildcards.
    Wildcard(Regex),
}

impl DomainPattern {
    fn parse(pattern: &str) -> Option<Self> {
        let pattern = pattern.trim().to_ascii_lowercase();
        if pattern.is_empty() {
            return None;
        }
        if let Some(domain) = pattern.strip_prefix("*.") {
            if !domain.contains('*') {
                return Some(Self::Suffix(domain.to_string()));
            }
        }
        if pattern.contains('*') {
            let escaped: Vec<String> = pattern.split('*').map(regex::escape).collect();
            let re = Regex::new(&format!("^{}$", escaped.join(".*"))).ok()?;
            return Some(Self::Wildcard(re));
        }
        Some(Self::Exact(pattern))
    }

    fn matches(&self, host: &str) -> bool {
        match self {
            Self::Exact(p) => p == host,
            Self::Suffix(domain) => host == domain || host.ends_with(&format!(".{domain}")),
            Self::Wildcard(re) => re.is_match(host),
        }
    }
}

impl RequestFilter {
    pub fn new<D, T, E>(blocked_domains: D, blocked_types: T, blocked_extensions: E) -> Self
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        T: IntoIterator,
        T::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Self {
            blocked_domains: blocked_domains
                .into_iter()
                .filter_map(|d| DomainPattern::parse(d.as_ref()))
                .collect(),
            blocked_types: blocked_types
                .into_iter()
                .map(|t| t.as_ref().to_ascii_lowercase())
                .collect(),
            blocked_extensions: blocked_extensions
                .into_iter()
                .map(|e| e.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Decide whether a request for `url` of `resource_type` may proceed.
    /// Host and extension rules are skipped for unparseable URLs.
    pub fn decide(&self, url: &str, resource_type: &str) -> FilterDecision {
        if self
            .blocked_types
            .contains(&resource_type.to_ascii_lowercase())
        {
            return FilterDecision::Block;
        }
        let Ok(parsed) = url::Url::parse(url) else {
            return FilterDecision::Allow;
        };

        let host = parsed.host_str().unwrap_or("").to_ascii_lowercase();
        if self.blocked_domains.iter().any(|p| p.matches(&host)) {
            return FilterDecision::Block;
        }
        let path = parsed.path().to_ascii_lowercase();
        if self.blocked_extensions.iter().any(|ext| path.ends_with(ext)) {
            return FilterDecision::Block;
        }
        FilterDecision::Allow
    }
}
