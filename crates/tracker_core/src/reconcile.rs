use crate::record::is_metadata_field;
use crate::{ChangeEvent, ListingStatus, MergedRecord, Snapshot};

/// Merges a fresh snapshot into the last persisted record for the same identifier.
///
/// Without a prior record the snapshot becomes the record as-is. Otherwise every
/// fresh field replaces the live value, and a differing non-null prior value is
/// kept as the next history version. Fields the fresh snapshot did not observe
/// are carried over untouched. `first_seen` sticks to the first observation and
/// `last_seen` moves only while the resource is active.
pub fn reconcile(
    prior: Option<&MergedRecord>,
    fresh: Snapshot,
) -> (MergedRecord, Option<ChangeEvent>) {
    let Some(prior) = prior else {
        return (MergedRecord::from_snapshot(fresh), None);
    };

    let event = status_transition(prior.status(), &fresh);
    let (mut meta, fresh_fields) = fresh.into_parts();
    meta.stamp_seen(Some(&prior.meta));
    let mut merged = MergedRecord::new(meta);

    for (name, value) in fresh_fields {
        if is_metadata_field(&name) {
            continue;
        }
        let mut history = prior.field(&name).cloned().unwrap_or_default();
        history.supersede(value);
        merged.insert_field(name, history);
    }

    for (name, history) in prior.fields() {
        if merged.field(name).is_none() {
            merged.insert_field(name, history.clone());
        }
    }

    (merged, event)
}

/// Outcome for a recheck whose scrape failed: the prior record stands as-is.
pub fn retain(prior: &MergedRecord) -> (MergedRecord, Option<ChangeEvent>) {
    (prior.clone(), None)
}

/// Emits an event only for the exact `active -> inactive` transition.
pub fn status_transition(previous: ListingStatus, fresh: &Snapshot) -> Option<ChangeEvent> {
    match (previous, fresh.status()) {
        (ListingStatus::Active, ListingStatus::Inactive) => Some(ChangeEvent {
            identifier: fresh.identifier().clone(),
            timestamp: fresh.meta.observed_at,
            previous_status: previous,
            new_status: ListingStatus::Inactive,
        }),
        _ => None,
    }
}

