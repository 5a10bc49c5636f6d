use std::collections::{BTreeMap, BTreeSet};

use crate::{
    ChangeEvent, IdentityResolver, ListingStatus, MergedRecord, ResourceId, RunReport,
    SoftFailure, StatusCheck,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Rechecking,
    Discovering,
    Reconciling,
    Finalizing,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncOptions {
    /// Re-fetch discovered identifiers already stored with a non-active status.
    pub recheck_rediscovered: bool,
}

/// State of one sync run. Only [`crate::update`] mutates it.
#[derive(Debug, Clone)]
pub struct SyncState {
    pub(crate) query: String,
    pub(crate) resolver: IdentityResolver,
    pub(crate) options: SyncOptions,
    pub(crate) phase: Phase,
    pub(crate) started: bool,
    pub(crate) prior: BTreeMap<ResourceId, MergedRecord>,
    pub(crate) merged: BTreeMap<ResourceId, MergedRecord>,
    pub(crate) rechecked: BTreeSet<ResourceId>,
    pub(crate) pending: BTreeSet<ResourceId>,
    pub(crate) events: Vec<ChangeEvent>,
    pub(crate) checks: Vec<StatusCheck>,
    pub(crate) report: RunReport,
}

impl SyncState {
    pub fn new(query: impl Into<String>, resolver: IdentityResolver, options: SyncOptions) -> Self {
        let query = query.into();
        Self {
            report: RunReport {
                query: query.clone(),
                ..RunReport::default()
            },
            query,
            resolver,
            options,
            phase: Phase::Loading,
            started: false,
            prior: BTreeMap::new(),
            merged: BTreeMap::new(),
            rechecked: BTreeSet::new(),
            pending: BTreeSet::new(),
            events: Vec::new(),
            checks: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn pending_fetches(&self) -> usize {
        self.pending.len()
    }

    /// Records reconciled so far in this run.
    pub fn merged(&self) -> &BTreeMap<ResourceId, MergedRecord> {
        &self.merged
    }

    pub fn events(&self) -> &[ChangeEvent] {
        &self.events
    }

    /// Status checks made so far in this run.
    pub fn status_checks(&self) -> &[StatusCheck] {
        &self.checks
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub(crate) fn prior_active(&self) -> Vec<(ResourceId, String)> {
        self.prior
            .iter()
            .filter(|(_, record)| record.status() == ListingStatus::Active)
            .map(|(id, record)| (id.clone(), record.meta.url.clone()))
            .collect()
    }

    pub(crate) fn push_failure(&mut self, failure: SoftFailure) {
        self.report.failures.push(failure);
    }

    pub(crate) fn accept(&mut self, record: MergedRecord, event: Option<ChangeEvent>) {
        if let Some(event) = event {
            self.events.push(event);
        }
        self.merged.insert(record.identifier().clone(), record);
    }
}
