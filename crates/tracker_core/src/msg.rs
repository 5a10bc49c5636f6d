use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::{FetchPurpose, HarvestOutcome, MergedRecord, ResourceId, Snapshot, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Begin the run.
    Start,
    /// Prior records read from the store; empty on a first run.
    StoreLoaded(BTreeMap<ResourceId, MergedRecord>),
    /// Prior state exists but could not be read.
    StoreUnavailable(String),
    /// Result of one snapshot fetch requested through `Effect::FetchSnapshot`.
    SnapshotFetched {
        identifier: ResourceId,
        url: String,
        purpose: FetchPurpose,
        /// When the fetch finished; stamps the status check of a failed fetch.
        checked_at: DateTime<Utc>,
        result: Result<Snapshot, TransportError>,
    },
    /// The harvest for the run's query has finished.
    HarvestFinished(HarvestOutcome),
    /// Outcome of the replace-all write and the log appends.
    Persisted(Result<(), String>),
}
