use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Matches the numeric listing id embedded in paths such as `.../3-vaer-id-4962343`,
/// in either letter case.
pub const DEFAULT_IDENTIFIER_PATTERN: &str = r"(?i)id-(\d+)";

/// Stable token naming one real-world resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid identifier pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("identifier pattern `{0}` has no capture group")]
    MissingCaptureGroup(String),
}

/// Derives identifiers from URLs and picks one canonical URL per identifier.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    pattern: Regex,
    allowed_host_suffix: Option<String>,
    strip_query: bool,
}

impl IdentityResolver {
    /// Builds a resolver from a regex whose first capture group is the identifier.
    pub fn new(pattern: &str) -> Result<Self, IdentityError> {
        let pattern = Regex::new(pattern)?;
        if pattern.captures_len() < 2 {
            return Err(IdentityError::MissingCaptureGroup(pattern.as_str().to_string()));
        }
        Ok(Self {
            pattern,
            allowed_host_suffix: None,
            strip_query: false,
        })
    }

    /// Only URLs whose host ends with `suffix` take part in canonicalization.
    pub fn with_allowed_host_suffix(mut self, suffix: impl Into<String>) -> Self {
        let suffix = suffix.into().trim().to_ascii_lowercase();
        self.allowed_host_suffix = (!suffix.is_empty()).then_some(suffix);
        self
    }

    /// Drop query string and fragment before grouping.
    pub fn with_query_stripping(mut self, strip: bool) -> Self {
        self.strip_query = strip;
        self
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn extract_identifier(&self, url: &str) -> Option<ResourceId> {
        self.pattern
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| ResourceId::new(m.as_str()))
    }

    /// Groups `urls` by identifier and selects the shortest URL of each group,
    /// breaking ties lexicographically. Input order never affects the result.
    pub fn canonicalize<I, S>(&self, urls: I) -> Canonicalization
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut result = Canonicalization::default();
        let mut groups: BTreeMap<ResourceId, BTreeSet<String>> = BTreeMap::new();
        let mut unidentified_seen = HashSet::new();

        for raw in urls {
            result.input_count += 1;
            let url = match self.clean(raw.as_ref()) {
                Some(url) => url,
                None => {
                    result.off_host.push(raw.as_ref().to_string());
                    continue;
                }
            };
            match self.extract_identifier(&url) {
                Some(id) => {
                    groups.entry(id).or_default().insert(url);
                }
                None => {
                    if unidentified_seen.insert(url.clone()) {
                        result.unidentified.push(url);
                    }
                }
            }
        }

        for (id, members) in groups {
            let Some(canonical) = members
                .iter()
                .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
                .cloned()
            else {
                continue;
            };
            if members.len() > 1 {
                result
                    .duplicates
                    .insert(id.clone(), members.into_iter().collect());
            }
            result.canonical.insert(id, canonical);
        }

        result
    }

    fn clean(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if self.allowed_host_suffix.is_none() && !self.strip_query {
            return Some(raw.to_string());
        }
        let mut parsed = Url::parse(raw).ok()?;
        if let Some(suffix) = &self.allowed_host_suffix {
            let host = parsed.host_str()?.to_ascii_lowercase();
            if !host.ends_with(suffix.as_str()) {
                return None;
            }
        }
        if self.strip_query {
            parsed.set_query(None);
            parsed.set_fragment(None);
            return Some(parsed.to_string());
        }
        Some(raw.to_string())
    }
}

/// Result of [`IdentityResolver::canonicalize`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Canonicalization {
    pub canonical: BTreeMap<ResourceId, String>,
    /// Identifiers reached through more than one distinct URL, members sorted.
    pub duplicates: BTreeMap<ResourceId, Vec<String>>,
    /// URLs the identifier pattern did not match, first-seen order.
    pub unidentified: Vec<String>,
    /// URLs rejected by the host allowlist or not parseable as URLs.
    pub off_host: Vec<String>,
    pub input_count: usize,
}

impl Canonicalization {
    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }

    pub fn get(&self, id: &ResourceId) -> Option<&str> {
        self.canonical.get(id).map(String::as_str)
    }
}
