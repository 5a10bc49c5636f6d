use std::collections::BTreeMap;

use crate::{ChangeEvent, FailureKind, HarvestStats, ResourceId, SoftFailure};

/// Summary of one sync run, handed back to the caller instead of errors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunReport {
    pub query: String,
    pub first_run: bool,
    pub prior_records: usize,
    pub rechecked: usize,
    pub recheck_failures: usize,
    pub discovered_urls: usize,
    pub unique_identifiers: usize,
    pub new_records: usize,
    pub revived_records: usize,
    pub discovery_failures: usize,
    pub carried_forward: usize,
    pub written_records: usize,
    pub status_checks: usize,
    pub persisted: bool,
    pub harvest: Option<HarvestStats>,
    pub events: Vec<ChangeEvent>,
    pub failures: Vec<SoftFailure>,
    pub unidentified_urls: Vec<String>,
    /// URLs dropped by the host allowlist or not parseable as URLs.
    pub off_host_urls: Vec<String>,
    pub duplicate_groups: BTreeMap<ResourceId, Vec<String>>,
}

impl RunReport {
    pub fn failure_count(&self, kind: FailureKind) -> usize {
        self.failures
            .iter()
            .filter(|failure| failure.kind == kind)
            .count()
    }
}
