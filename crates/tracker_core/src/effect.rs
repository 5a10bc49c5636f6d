use std::collections::BTreeMap;

use crate::{ChangeEvent, MergedRecord, ResourceId, RunReport, StatusCheck};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    LoadStore {
        query: String,
    },
    FetchSnapshot {
        identifier: ResourceId,
        url: String,
        purpose: FetchPurpose,
    },
    RunHarvest {
        query: String,
    },
    Persist {
        query: String,
        records: BTreeMap<ResourceId, MergedRecord>,
        events: Vec<ChangeEvent>,
        checks: Vec<StatusCheck>,
    },
    Finish(RunReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPurpose {
    /// Re-scrape of an identifier that was active on the previous run.
    Recheck,
    /// Scrape of an identifier found by the harvest.
    Discovery,
}
