//! Tracker engine: IO collaborators and effect execution for the sync core.
mod collector;
mod config;
mod decode;
mod extractor;
mod fetch;
mod fields;
mod harvester;
mod pacer;
mod persist;
mod progress;
mod runner;
mod slug;
mod status;
mod store;

pub use collector::{
    next_page_url, CollectorError, HttpPageCollector, PageCollector, DEFAULT_SEARCH_URL_TEMPLATE,
};
pub use config::{
    ConfigError, FetchConfig, HarvestConfig, IdentityConfig, StoreConfig, SyncConfig,
    TrackerConfig,
};
pub use decode::{decode_body, DecodedBody};
pub use extractor::{Clock, HttpSnapshotExtractor, SnapshotExtractor};
pub use fetch::{FetchSettings, FetchedPage, PageFetcher, ReqwestFetcher};
pub use fields::{FieldExtractor, LabelValueExtractor};
pub use harvester::{HarvestSettings, Harvester};
pub use pacer::Pacer;
pub use persist::{append_lines, ensure_dir, AtomicFileWriter, PersistError};
pub use progress::{LogProgressSink, ProgressSink, SyncProgress};
pub use runner::SyncRunner;
pub use slug::query_slug;
pub use status::StatusRules;
pub use store::{
    JsonFileStore, RecordStore, StoreError, DEFAULT_EVENTS_FILE, DEFAULT_STATUS_FILE,
};
