use tracker_core::{FetchPurpose, HarvestStop, Phase, ResourceId};
use tracker_logging::{track_debug, track_info, track_warn};

/// Observable milestones of a sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncProgress {
    PhaseChanged(Phase),
    StoreLoaded {
        records: usize,
    },
    SnapshotApplied {
        identifier: ResourceId,
        purpose: FetchPurpose,
        ok: bool,
    },
    HarvestFinished {
        urls: usize,
        stop: HarvestStop,
    },
    Persisted {
        records: usize,
        ok: bool,
    },
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: SyncProgress);
}

/// Writes progress to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: SyncProgress) {
        match event {
            SyncProgress::PhaseChanged(phase) => track_info!("phase: {phase:?}"),
            SyncProgress::StoreLoaded { records } => {
                track_info!("loaded {records} stored records")
            }
            SyncProgress::SnapshotApplied {
                identifier,
                purpose,
                ok: true,
            } => track_debug!("{purpose:?} {identifier}: reconciled"),
            SyncProgress::SnapshotApplied {
                identifier,
                purpose,
                ok: false,
            } => track_warn!("{purpose:?} {identifier}: fetch failed"),
            SyncProgress::HarvestFinished { urls, stop } => {
                track_info!("harvest found {urls} urls ({stop})")
            }
            SyncProgress::Persisted { records, ok: true } => {
                track_info!("persisted {records} records")
            }
            SyncProgress::Persisted { records, ok: false } => {
                track_warn!("persisting {records} records failed")
            }
        }
    }
}
