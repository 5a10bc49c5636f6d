use std::mem;

use chrono::{DateTime, Utc};

use crate::{
    reconcile, retain, Effect, FailureKind, FetchPurpose, HarvestOutcome, ListingStatus, Msg,
    Phase, ResourceId, Snapshot, SoftFailure, StatusCheck, SyncState, TransportError,
    TransportKind,
};

/// Pure update function: applies a message to the run state and returns the
/// effects the runner must perform next. Messages that do not fit the current
/// phase are ignored.
pub fn update(mut state: SyncState, msg: Msg) -> (SyncState, Vec<Effect>) {
    let effects = match msg {
        Msg::Start => {
            if state.started || state.phase != Phase::Loading {
                return (state, Vec::new());
            }
            state.started = true;
            vec![Effect::LoadStore {
                query: state.query.clone(),
            }]
        }
        Msg::StoreLoaded(records) => {
            if state.phase != Phase::Loading {
                return (state, Vec::new());
            }
            state.report.prior_records = records.len();
            state.report.first_run = records.is_empty();
            state.prior = records;
            begin_rechecking(&mut state)
        }
        Msg::StoreUnavailable(reason) => {
            if state.phase != Phase::Loading {
                return (state, Vec::new());
            }
            // Never overwrite a table we could not read.
            state.push_failure(SoftFailure::new(FailureKind::Store, reason));
            finish(&mut state)
        }
        Msg::SnapshotFetched {
            identifier,
            url,
            purpose,
            checked_at,
            result,
        } => {
            let expected_phase = match purpose {
                FetchPurpose::Recheck => Phase::Rechecking,
                FetchPurpose::Discovery => Phase::Discovering,
            };
            if state.phase != expected_phase || !state.pending.remove(&identifier) {
                return (state, Vec::new());
            }
            log_check(&mut state, &identifier, checked_at, &result);
            match purpose {
                FetchPurpose::Recheck => apply_recheck(&mut state, identifier, &url, result),
                FetchPurpose::Discovery => apply_discovery(&mut state, identifier, &url, result),
            }
            if state.pending.is_empty() {
                advance(&mut state)
            } else {
                Vec::new()
            }
        }
        Msg::HarvestFinished(outcome) => {
            if state.phase != Phase::Discovering || !state.pending.is_empty() {
                return (state, Vec::new());
            }
            let effects = plan_discovery(&mut state, &outcome);
            if effects.is_empty() {
                finalize(&mut state)
            } else {
                effects
            }
        }
        Msg::Persisted(result) => {
            if state.phase != Phase::Finalizing {
                return (state, Vec::new());
            }
            match result {
                Ok(()) => state.report.persisted = true,
                Err(reason) => {
                    state.push_failure(SoftFailure::new(FailureKind::Store, reason));
                }
            }
            finish(&mut state)
        }
    };

    (state, effects)
}

fn begin_rechecking(state: &mut SyncState) -> Vec<Effect> {
    state.phase = Phase::Rechecking;
    let effects: Vec<Effect> = state
        .prior_active()
        .into_iter()
        .map(|(identifier, url)| {
            state.pending.insert(identifier.clone());
            Effect::FetchSnapshot {
                identifier,
                url,
                purpose: FetchPurpose::Recheck,
            }
        })
        .collect();
    if effects.is_empty() {
        begin_discovering(state)
    } else {
        effects
    }
}

fn begin_discovering(state: &mut SyncState) -> Vec<Effect> {
    state.phase = Phase::Discovering;
    vec![Effect::RunHarvest {
        query: state.query.clone(),
    }]
}

fn advance(state: &mut SyncState) -> Vec<Effect> {
    match state.phase {
        Phase::Rechecking => begin_discovering(state),
        Phase::Discovering => finalize(state),
        _ => Vec::new(),
    }
}

/// Every attempted check is logged; fetches skipped by cancellation are not checks.
fn log_check(
    state: &mut SyncState,
    identifier: &ResourceId,
    checked_at: DateTime<Utc>,
    result: &Result<Snapshot, TransportError>,
) {
    let check = match result {
        Ok(snapshot) => {
            let mut check = StatusCheck::observed(snapshot);
            check.identifier = identifier.clone();
            check
        }
        Err(err) if err.kind == TransportKind::Cancelled => return,
        Err(err) => StatusCheck::failed(identifier.clone(), checked_at, err.to_string()),
    };
    state.checks.push(check);
}

fn apply_recheck(
    state: &mut SyncState,
    identifier: ResourceId,
    url: &str,
    result: Result<Snapshot, TransportError>,
) {
    state.rechecked.insert(identifier.clone());
    let Some(prior) = state.prior.get(&identifier).cloned() else {
        return;
    };
    match result {
        Ok(snapshot) => {
            let snapshot = flag_ambiguous(state, identifier, url, snapshot);
            let (record, event) = reconcile(Some(&prior), snapshot);
            state.report.rechecked += 1;
            state.accept(record, event);
        }
        Err(err) => {
            state.report.recheck_failures += 1;
            state.push_failure(
                SoftFailure::new(FailureKind::Transport, err.to_string())
                    .for_resource(&identifier, url),
            );
            let (record, event) = retain(&prior);
            state.accept(record, event);
        }
    }
}

fn apply_discovery(
    state: &mut SyncState,
    identifier: ResourceId,
    url: &str,
    result: Result<Snapshot, TransportError>,
) {
    match result {
        Ok(snapshot) => {
            let snapshot = flag_ambiguous(state, identifier.clone(), url, snapshot);
            let prior = state.prior.get(&identifier).cloned();
            if prior.is_some() {
                state.report.revived_records += 1;
            } else {
                state.report.new_records += 1;
            }
            let (record, event) = reconcile(prior.as_ref(), snapshot);
            state.accept(record, event);
        }
        Err(err) => {
            state.report.discovery_failures += 1;
            state.push_failure(
                SoftFailure::new(FailureKind::Transport, err.to_string())
                    .for_resource(&identifier, url),
            );
        }
    }
}

/// Pins the snapshot to the requested identifier and reports inconclusive pages.
fn flag_ambiguous(
    state: &mut SyncState,
    identifier: ResourceId,
    url: &str,
    mut snapshot: Snapshot,
) -> Snapshot {
    if snapshot.status() == ListingStatus::Unknown {
        state.push_failure(
            SoftFailure::new(FailureKind::AmbiguousContent, "status could not be determined")
                .for_resource(&identifier, url),
        );
    }
    snapshot.meta.identifier = identifier;
    snapshot
}

fn plan_discovery(state: &mut SyncState, outcome: &HarvestOutcome) -> Vec<Effect> {
    let canonical = state.resolver.canonicalize(outcome.all_urls());

    state.report.discovered_urls = outcome.discovered.len();
    state.report.unique_identifiers = canonical.len();
    state.report.harvest = Some(outcome.stats.clone());
    state.report.duplicate_groups = canonical.duplicates.clone();
    state.report.unidentified_urls = canonical.unidentified.clone();
    state.report.off_host_urls = canonical.off_host.clone();

    if outcome.stats.interaction_failures > 0 {
        state.push_failure(SoftFailure::new(
            FailureKind::InteractionFailure,
            format!(
                "{} collector interactions failed during harvest",
                outcome.stats.interaction_failures
            ),
        ));
    }
    for url in &canonical.unidentified {
        state.push_failure(
            SoftFailure::new(FailureKind::NoIdentifier, "url does not match identifier pattern")
                .for_url(url),
        );
    }

    let mut effects = Vec::new();
    for (identifier, url) in canonical.canonical {
        if state.rechecked.contains(&identifier) || state.merged.contains_key(&identifier) {
            continue;
        }
        if state.prior.contains_key(&identifier) && !state.options.recheck_rediscovered {
            continue;
        }
        state.pending.insert(identifier.clone());
        effects.push(Effect::FetchSnapshot {
            identifier,
            url,
            purpose: FetchPurpose::Discovery,
        });
    }
    effects
}

fn finalize(state: &mut SyncState) -> Vec<Effect> {
    state.phase = Phase::Reconciling;
    for (identifier, record) in &state.prior {
        if !state.merged.contains_key(identifier) {
            state.merged.insert(identifier.clone(), record.clone());
            state.report.carried_forward += 1;
        }
    }

    state.phase = Phase::Finalizing;
    state.report.written_records = state.merged.len();
    state.report.events = state.events.clone();
    state.report.status_checks = state.checks.len();
    vec![Effect::Persist {
        query: state.query.clone(),
        records: mem::take(&mut state.merged),
        events: mem::take(&mut state.events),
        checks: mem::take(&mut state.checks),
    }]
}

fn finish(state: &mut SyncState) -> Vec<Effect> {
    state.phase = Phase::Done;
    vec![Effect::Finish(state.report.clone())]
}
