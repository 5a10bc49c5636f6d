use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use serde::Serialize;
use tracker_core::{ChangeEvent, FieldValue, MergedRecord, RecordMeta, ResourceId, StatusCheck};
use tracker_logging::{track_debug, track_info};

use crate::extractor::Clock;
use crate::persist::{append_lines, AtomicFileWriter, PersistError};
use crate::slug::query_slug;

pub const DEFAULT_EVENTS_FILE: &str = "events.jsonl";
pub const DEFAULT_STATUS_FILE: &str = "status_history.jsonl";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path:?} is not a record table: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path:?} row {row}: {message}")]
    BadRow {
        path: PathBuf,
        row: usize,
        message: String,
    },
    #[error("could not encode records: {0}")]
    Encode(#[source] serde_json::Error),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Keyed table of the latest merged record per identifier, one table per query.
pub trait RecordStore: Send + Sync {
    /// A query that was never stored loads as an empty table.
    fn load(&self, query: &str) -> Result<BTreeMap<ResourceId, MergedRecord>, StoreError>;

    /// Replaces the whole table for `query` in one atomic step.
    fn replace_all(
        &self,
        query: &str,
        records: &BTreeMap<ResourceId, MergedRecord>,
    ) -> Result<(), StoreError>;

    /// Appends to the change-event log.
    fn log_events(&self, events: &[ChangeEvent]) -> Result<(), StoreError>;

    /// Appends to the status-check log. Rows are never rewritten.
    fn log_status_checks(&self, checks: &[StatusCheck]) -> Result<(), StoreError>;
}

/// Stores each table as `<data_dir>/<slug>.json`, a JSON array of flat rows:
/// the metadata columns, then every field followed by its `field_<n>` history
/// columns. Events and status checks go to append-only JSON-lines files.
pub struct JsonFileStore {
    writer: AtomicFileWriter,
    events_path: PathBuf,
    status_path: PathBuf,
    archive: Option<AtomicFileWriter>,
    clock: Clock,
}

impl JsonFileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            events_path: data_dir.join(DEFAULT_EVENTS_FILE),
            status_path: data_dir.join(DEFAULT_STATUS_FILE),
            writer: AtomicFileWriter::new(data_dir),
            archive: None,
            clock: Arc::new(Utc::now),
        }
    }

    /// Event log location; relative paths are resolved against the data dir.
    pub fn with_events_file(mut self, events_file: impl AsRef<Path>) -> Self {
        self.events_path = self.writer.dir().join(events_file);
        self
    }

    /// Status-check log location, resolved like the event log.
    pub fn with_status_file(mut self, status_file: impl AsRef<Path>) -> Self {
        self.status_path = self.writer.dir().join(status_file);
        self
    }

    /// Also keep a dated copy of every written table in `dir`.
    pub fn with_archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive = Some(AtomicFileWriter::new(dir.into()));
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn table_path(&self, query: &str) -> PathBuf {
        self.writer.dir().join(table_file(query))
    }

    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    pub fn status_path(&self) -> &Path {
        &self.status_path
    }

    /// Where today's archive copy of `query` goes, if archiving is on.
    pub fn archive_path(&self, query: &str) -> Option<PathBuf> {
        self.archive
            .as_ref()
            .map(|archive| archive.dir().join(self.archive_file(query)))
    }

    fn archive_file(&self, query: &str) -> String {
        let date = (self.clock)().date_naive();
        format!("{}_{}.json", query_slug(query), date.format("%Y-%m-%d"))
    }
}

fn table_file(query: &str) -> String {
    format!("{}.json", query_slug(query))
}

impl RecordStore for JsonFileStore {
    fn load(&self, query: &str) -> Result<BTreeMap<ResourceId, MergedRecord>, StoreError> {
        let path = self.table_path(query);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                track_info!("no stored table at {path:?}; starting empty");
                return Ok(BTreeMap::new());
            }
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        let rows: Vec<Map<String, Value>> =
            serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?;

        let mut records = BTreeMap::new();
        for (index, row) in rows.into_iter().enumerate() {
            let record = decode_row(row).map_err(|message| StoreError::BadRow {
                path: path.clone(),
                row: index,
                message,
            })?;
            records.insert(record.identifier().clone(), record);
        }
        track_debug!("loaded {} records from {path:?}", records.len());
        Ok(records)
    }

    fn replace_all(
        &self,
        query: &str,
        records: &BTreeMap<ResourceId, MergedRecord>,
    ) -> Result<(), StoreError> {
        let rows: Vec<Map<String, Value>> = records
            .values()
            .map(encode_row)
            .collect::<Result<_, _>>()
            .map_err(StoreError::Encode)?;
        let body = serde_json::to_vec_pretty(&rows).map_err(StoreError::Encode)?;

        let path = self.writer.write(&table_file(query), &body)?;
        track_info!("wrote {} records to {path:?}", rows.len());

        if let Some(archive) = &self.archive {
            let path = archive.write(&self.archive_file(query), &body)?;
            track_debug!("archived table to {path:?}");
        }
        Ok(())
    }

    fn log_events(&self, events: &[ChangeEvent]) -> Result<(), StoreError> {
        append_json_lines(&self.events_path, events)?;
        track_debug!("logged {} change events", events.len());
        Ok(())
    }

    fn log_status_checks(&self, checks: &[StatusCheck]) -> Result<(), StoreError> {
        append_json_lines(&self.status_path, checks)?;
        track_debug!("logged {} status checks", checks.len());
        Ok(())
    }
}

fn append_json_lines<T: Serialize>(path: &Path, items: &[T]) -> Result<(), StoreError> {
    if items.is_empty() {
        return Ok(());
    }
    let lines = items
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::Encode)?;
    append_lines(path, lines)?;
    Ok(())
}

fn encode_row(record: &MergedRecord) -> Result<Map<String, Value>, serde_json::Error> {
    let mut row = match serde_json::to_value(&record.meta)? {
        Value::Object(meta) => meta,
        _ => Map::new(),
    };
    for (name, value) in record.to_columns() {
        let cell = match value {
            Some(value) => serde_json::to_value(value)?,
            None => Value::Null,
        };
        row.insert(name, cell);
    }
    Ok(row)
}

fn decode_row(row: Map<String, Value>) -> Result<MergedRecord, String> {
    let meta: RecordMeta =
        serde_json::from_value(Value::Object(row.clone())).map_err(|err| err.to_string())?;
    let mut columns = Vec::with_capacity(row.len());
    for (name, cell) in row {
        let value = match cell {
            Value::Null => None,
            cell => Some(
                serde_json::from_value::<FieldValue>(cell)
                    .map_err(|err| format!("column `{name}`: {err}"))?,
            ),
        };
        columns.push((name, value));
    }
    Ok(MergedRecord::from_columns(meta, columns))
}
