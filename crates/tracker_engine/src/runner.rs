use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use futures_util::{stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracker_core::{
    update, Effect, FetchPurpose, Msg, Phase, ResourceId, RunReport, SyncState, TransportError,
    TransportKind,
};
use tracker_logging::{track_debug, track_info, track_warn};

use crate::collector::PageCollector;
use crate::extractor::{Clock, SnapshotExtractor};
use crate::harvester::Harvester;
use crate::progress::{LogProgressSink, ProgressSink, SyncProgress};
use crate::store::RecordStore;

/// Executes the effects of the sync state machine until it reports `Done`.
///
/// Consecutive snapshot fetches run with up to `fetch_concurrency` in flight;
/// each result is fed back the moment it arrives, so reconciliation stays
/// with the single owner of the state.
///
/// Once the cancellation token fires, fetches that have not started are
/// answered with a cancelled transport error instead of going out, so the
/// run drains quickly and still persists what it has.
pub struct SyncRunner {
    harvester: Harvester,
    collector: Box<dyn PageCollector>,
    extractor: Arc<dyn SnapshotExtractor>,
    store: Arc<dyn RecordStore>,
    progress: Arc<dyn ProgressSink>,
    fetch_concurrency: usize,
    cancel: CancellationToken,
    clock: Clock,
}

impl SyncRunner {
    pub fn new(
        harvester: Harvester,
        collector: Box<dyn PageCollector>,
        extractor: Arc<dyn SnapshotExtractor>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            harvester,
            collector,
            extractor,
            store,
            progress: Arc::new(LogProgressSink),
            fetch_concurrency: 1,
            cancel: CancellationToken::new(),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_fetch_concurrency(mut self, fetch_concurrency: usize) -> Self {
        self.fetch_concurrency = fetch_concurrency.max(1);
        self
    }

    pub async fn run(&mut self, state: SyncState) -> RunReport {
        let mut phase = state.phase();
        let (mut state, effects) = update(state, Msg::Start);
        let mut queue: VecDeque<Effect> = effects.into();

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::FetchSnapshot {
                    identifier,
                    url,
                    purpose,
                } => {
                    let mut batch = vec![(identifier, url, purpose)];
                    while let Some(Effect::FetchSnapshot { .. }) = queue.front() {
                        if let Some(Effect::FetchSnapshot {
                            identifier,
                            url,
                            purpose,
                        }) = queue.pop_front()
                        {
                            batch.push((identifier, url, purpose));
                        }
                    }
                    track_debug!("fetching {} snapshots", batch.len());
                    state = self.fetch_batch(state, batch, &mut queue).await;
                }
                Effect::LoadStore { query } => {
                    let msg = match self.store.load(&query) {
                        Ok(records) => {
                            self.progress.emit(SyncProgress::StoreLoaded {
                                records: records.len(),
                            });
                            Msg::StoreLoaded(records)
                        }
                        Err(err) => {
                            track_warn!("stored table for `{query}` is unusable: {err}");
                            Msg::StoreUnavailable(err.to_string())
                        }
                    };
                    state = self.apply(state, msg, &mut queue);
                }
                Effect::RunHarvest { query } => {
                    let outcome = self
                        .harvester
                        .harvest(self.collector.as_mut(), &query)
                        .await;
                    self.progress.emit(SyncProgress::HarvestFinished {
                        urls: outcome.discovered.len(),
                        stop: outcome.stats.stop,
                    });
                    state = self.apply(state, Msg::HarvestFinished(outcome), &mut queue);
                }
                Effect::Persist {
                    query,
                    records,
                    events,
                    checks,
                } => {
                    let result = self
                        .store
                        .replace_all(&query, &records)
                        .and_then(|()| self.store.log_events(&events))
                        .and_then(|()| self.store.log_status_checks(&checks))
                        .map_err(|err| err.to_string());
                    self.progress.emit(SyncProgress::Persisted {
                        records: records.len(),
                        ok: result.is_ok(),
                    });
                    state = self.apply(state, Msg::Persisted(result), &mut queue);
                }
                Effect::Finish(report) => {
                    self.progress.emit(SyncProgress::PhaseChanged(Phase::Done));
                    return report;
                }
            }

            if state.phase() != phase {
                phase = state.phase();
                if phase != Phase::Done {
                    self.progress.emit(SyncProgress::PhaseChanged(phase));
                }
            }
        }

        state.report().clone()
    }

    fn apply(&self, state: SyncState, msg: Msg, queue: &mut VecDeque<Effect>) -> SyncState {
        let (state, effects) = update(state, msg);
        queue.extend(effects);
        state
    }

    async fn fetch_batch(
        &self,
        mut state: SyncState,
        batch: Vec<(ResourceId, String, FetchPurpose)>,
        queue: &mut VecDeque<Effect>,
    ) -> SyncState {
        if self.cancel.is_cancelled() {
            track_info!("run cancelled; skipping {} fetches", batch.len());
        }
        let extractor = Arc::clone(&self.extractor);
        let mut results = stream::iter(batch)
            .map(|(identifier, url, purpose)| {
                let extractor = Arc::clone(&extractor);
                let cancel = self.cancel.clone();
                let clock = Arc::clone(&self.clock);
                async move {
                    let result = if cancel.is_cancelled() {
                        Err(TransportError::new(TransportKind::Cancelled, "run cancelled"))
                    } else {
                        extractor.fetch_snapshot(&identifier, &url).await
                    };
                    Msg::SnapshotFetched {
                        identifier,
                        url,
                        purpose,
                        checked_at: clock(),
                        result,
                    }
                }
            })
            .buffer_unordered(self.fetch_concurrency);

        while let Some(msg) = results.next().await {
            if let Msg::SnapshotFetched {
                identifier,
                purpose,
                result,
                ..
            } = &msg
            {
                self.progress.emit(SyncProgress::SnapshotApplied {
                    identifier: identifier.clone(),
                    purpose: *purpose,
                    ok: result.is_ok(),
                });
            }
            state = self.apply(state, msg, queue);
        }
        state
    }
}
