//! Tracker core: identity resolution, reconciliation and the pure sync state machine.
mod effect;
mod failure;
mod harvest;
mod identity;
mod msg;
mod reconcile;
mod record;
mod report;
mod state;
mod update;

pub use effect::{Effect, FetchPurpose};
pub use failure::{FailureKind, SoftFailure, TransportError, TransportKind};
pub use harvest::{
    CycleVerdict, DiscoveredUrl, DiscoverySet, HarvestOutcome, HarvestStats, HarvestStop,
    StagnationTracker, DEFAULT_STAGNATION_THRESHOLD,
};
pub use identity::{
    Canonicalization, IdentityError, IdentityResolver, ResourceId, DEFAULT_IDENTIFIER_PATTERN,
};
pub use msg::Msg;
pub use reconcile::{reconcile, retain, status_transition};
pub use record::{
    is_metadata_field, ChangeEvent, FieldHistory, FieldMap, FieldValue, FieldVersion,
    ListingStatus, MergedRecord, RecordMeta, Snapshot, StatusCheck, METADATA_FIELDS,
};
pub use report::RunReport;
pub use state::{Phase, SyncOptions, SyncState};
pub use update::update;
