use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracker_core::{ResourceId, Snapshot, TransportError, TransportKind};
use tracker_logging::track_debug;

use crate::fetch::PageFetcher;
use crate::fields::{FieldExtractor, LabelValueExtractor};
use crate::status::StatusRules;

/// Source of observation timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Produces a snapshot of one resource. Content that cannot be classified
/// yields `status = unknown`; only transport problems are errors. A server
/// that answers 5xx or 429 says nothing about the resource, so that is a
/// transport problem too.
#[async_trait::async_trait]
pub trait SnapshotExtractor: Send + Sync {
    async fn fetch_snapshot(
        &self,
        identifier: &ResourceId,
        url: &str,
    ) -> Result<Snapshot, TransportError>;
}

pub struct HttpSnapshotExtractor {
    fetcher: Arc<dyn PageFetcher>,
    rules: StatusRules,
    fields: Arc<dyn FieldExtractor>,
    clock: Clock,
}

impl HttpSnapshotExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, rules: StatusRules) -> Self {
        Self {
            fetcher,
            rules,
            fields: Arc::new(LabelValueExtractor::new()),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_field_extractor(mut self, fields: Arc<dyn FieldExtractor>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait::async_trait]
impl SnapshotExtractor for HttpSnapshotExtractor {
    async fn fetch_snapshot(
        &self,
        identifier: &ResourceId,
        url: &str,
    ) -> Result<Snapshot, TransportError> {
        let page = self.fetcher.fetch(url).await?;
        if is_server_unavailable(page.status) {
            return Err(TransportError::new(
                TransportKind::ServerUnavailable {
                    status: page.status,
                },
                format!("{url} answered {}", page.status),
            ));
        }
        let observed_at = (self.clock)();
        let body = page.decode();
        let status = self.rules.classify(page.status, &body.text);

        let mut snapshot = Snapshot::new(identifier.clone(), url, status, observed_at)
            .with_http_status(page.status);
        if page.is_success() {
            for (name, value) in self.fields.extract(&body.text) {
                snapshot.set_field(name, value);
            }
        }
        track_debug!(
            "{identifier}: {status} (http {}, {} fields)",
            page.status,
            snapshot.fields().len()
        );
        Ok(snapshot)
    }
}

fn is_server_unavailable(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}
