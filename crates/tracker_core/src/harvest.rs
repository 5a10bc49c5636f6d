use std::collections::HashSet;
use std::fmt;

use crate::{IdentityResolver, ResourceId};

pub const DEFAULT_STAGNATION_THRESHOLD: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleVerdict {
    Continue,
    Exhausted,
}

/// Counts consecutive idle cycles on one result page.
///
/// A cycle is idle when it produced no new URL and no further-rendering action
/// succeeded. Any productive cycle resets the count.
#[derive(Debug, Clone)]
pub struct StagnationTracker {
    threshold: u32,
    idle_cycles: u32,
}

impl StagnationTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            idle_cycles: 0,
        }
    }

    pub fn observe(&mut self, new_urls: usize, rendered_more: bool) -> CycleVerdict {
        if new_urls == 0 && !rendered_more {
            self.idle_cycles += 1;
        } else {
            self.idle_cycles = 0;
        }
        if self.idle_cycles >= self.threshold {
            CycleVerdict::Exhausted
        } else {
            CycleVerdict::Continue
        }
    }

    pub fn idle_cycles(&self) -> u32 {
        self.idle_cycles
    }
}

impl Default for StagnationTracker {
    fn default() -> Self {
        Self::new(DEFAULT_STAGNATION_THRESHOLD)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredUrl {
    pub url: String,
    pub identifier: Option<ResourceId>,
}

/// Seen-set owned by a single harvest.
///
/// URLs are deduplicated by identifier when the pattern matches and by raw
/// string otherwise. Alternate spellings of an already-seen identifier are kept
/// aside as variants; they do not count as progress.
#[derive(Debug, Default)]
pub struct DiscoverySet {
    seen_urls: HashSet<String>,
    seen_ids: HashSet<ResourceId>,
    discovered: Vec<DiscoveredUrl>,
    variants: Vec<String>,
}

impl DiscoverySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `urls` and returns how many of them were new.
    pub fn absorb<I, S>(&mut self, resolver: &IdentityResolver, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fresh = 0;
        for url in urls {
            let url = url.into();
            let url = url.trim();
            if url.is_empty() || !self.seen_urls.insert(url.to_string()) {
                continue;
            }
            match resolver.extract_identifier(url) {
                Some(id) if !self.seen_ids.insert(id.clone()) => {
                    self.variants.push(url.to_string());
                }
                identifier => {
                    self.discovered.push(DiscoveredUrl {
                        url: url.to_string(),
                        identifier,
                    });
                    fresh += 1;
                }
            }
        }
        fresh
    }

    pub fn len(&self) -> usize {
        self.discovered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.discovered.is_empty()
    }

    pub fn into_outcome(self, stats: HarvestStats) -> HarvestOutcome {
        HarvestOutcome {
            discovered: self.discovered,
            variants: self.variants,
            stats,
        }
    }
}

/// Why a harvest stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestStop {
    MaxPages,
    NoNextPage,
    EmptyPage,
    Cancelled,
    OpenFailed,
}

impl fmt::Display for HarvestStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarvestStop::MaxPages => write!(f, "max pages reached"),
            HarvestStop::NoNextPage => write!(f, "no next page"),
            HarvestStop::EmptyPage => write!(f, "page yielded nothing new"),
            HarvestStop::Cancelled => write!(f, "cancelled"),
            HarvestStop::OpenFailed => write!(f, "could not open search"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestStats {
    pub pages_visited: u32,
    pub cycles: u32,
    pub interaction_failures: u32,
    pub stop: HarvestStop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestOutcome {
    /// First-seen URL per identifier (or per raw URL when unidentified), in discovery order.
    pub discovered: Vec<DiscoveredUrl>,
    pub variants: Vec<String>,
    pub stats: HarvestStats,
}

impl HarvestOutcome {
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.discovered.iter().map(|found| found.url.as_str())
    }

    /// Every distinct URL seen, discovered ones first.
    pub fn all_urls(&self) -> impl Iterator<Item = &str> {
        self.urls().chain(self.variants.iter().map(String::as_str))
    }
}
