use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ResourceId;

/// Column names reserved for record metadata. They are never versioned.
pub const METADATA_FIELDS: [&str; 7] = [
    "identifier",
    "url",
    "status",
    "observed_at",
    "http_status",
    "first_seen",
    "last_seen",
];

pub fn is_metadata_field(name: &str) -> bool {
    METADATA_FIELDS.contains(&name)
}

/// Raw value of an extracted field. `None` at the use sites stands for null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Integer(i64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Boolean(value) => write!(f, "{value}"),
            FieldValue::Integer(value) => write!(f, "{value}"),
            FieldValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(i64::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Inactive,
    Unknown,
}

impl ListingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Inactive => "inactive",
            ListingStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Insertion-ordered field name -> value mapping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldMap {
    entries: Vec<(String, Option<FieldValue>)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, keeping its original position if already present.
    pub fn insert(&mut self, name: impl Into<String>, value: Option<FieldValue>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Option<FieldValue>> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&FieldValue>)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for FieldMap {
    type Item = (String, Option<FieldValue>);
    type IntoIter = std::vec::IntoIter<(String, Option<FieldValue>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>> FromIterator<(K, Option<FieldValue>)> for FieldMap {
    fn from_iter<T: IntoIterator<Item = (K, Option<FieldValue>)>>(iter: T) -> Self {
        let mut map = FieldMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

/// Fixed metadata carried by every snapshot and merged record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub identifier: ResourceId,
    pub url: String,
    pub status: ListingStatus,
    pub observed_at: DateTime<Utc>,
    pub http_status: Option<u16>,
    /// First observation of the resource. Set on merged records only.
    #[serde(default)]
    pub first_seen: Option<DateTime<Utc>>,
    /// Latest observation in which the resource was active.
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

impl RecordMeta {
    /// Carries the seen dates of `prior` (if any) over to this observation.
    pub(crate) fn stamp_seen(&mut self, prior: Option<&RecordMeta>) {
        self.first_seen = prior
            .map(|prior| prior.first_seen.unwrap_or(prior.observed_at))
            .or(Some(self.observed_at));
        self.last_seen = if self.status == ListingStatus::Active {
            Some(self.observed_at)
        } else {
            prior.and_then(|prior| prior.last_seen)
        };
    }
}

/// One observation of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub meta: RecordMeta,
    fields: FieldMap,
}

impl Snapshot {
    pub fn new(
        identifier: ResourceId,
        url: impl Into<String>,
        status: ListingStatus,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            meta: RecordMeta {
                identifier,
                url: url.into(),
                status,
                observed_at,
                http_status: None,
                first_seen: None,
                last_seen: None,
            },
            fields: FieldMap::new(),
        }
    }

    pub fn with_http_status(mut self, code: u16) -> Self {
        self.meta.http_status = Some(code);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set_field(name, Some(value.into()));
        self
    }

    pub fn with_null_field(mut self, name: impl Into<String>) -> Self {
        self.set_field(name, None);
        self
    }

    /// Returns false when `name` collides with a metadata column and was ignored.
    pub fn set_field(&mut self, name: impl Into<String>, value: Option<FieldValue>) -> bool {
        let name = name.into();
        if is_metadata_field(&name) {
            return false;
        }
        self.fields.insert(name, value);
        true
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).and_then(Option::as_ref)
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn identifier(&self) -> &ResourceId {
        &self.meta.identifier
    }

    pub fn status(&self) -> ListingStatus {
        self.meta.status
    }

    pub(crate) fn into_parts(self) -> (RecordMeta, FieldMap) {
        (self.meta, self.fields)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldVersion {
    pub suffix: u32,
    pub value: FieldValue,
}

/// Live value of a field plus its superseded values, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldHistory {
    current: Option<FieldValue>,
    versions: Vec<FieldVersion>,
}

impl FieldHistory {
    pub fn live(value: Option<FieldValue>) -> Self {
        Self {
            current: value,
            versions: Vec::new(),
        }
    }

    /// Rebuilds a history from persisted parts; versions are ordered by suffix.
    pub fn from_parts(current: Option<FieldValue>, mut versions: Vec<FieldVersion>) -> Self {
        versions.sort_by_key(|version| version.suffix);
        versions.dedup_by_key(|version| version.suffix);
        Self { current, versions }
    }

    pub fn current(&self) -> Option<&FieldValue> {
        self.current.as_ref()
    }

    pub fn versions(&self) -> &[FieldVersion] {
        &self.versions
    }

    pub fn latest_suffix(&self) -> u32 {
        self.versions
            .iter()
            .map(|version| version.suffix)
            .max()
            .unwrap_or(0)
    }

    /// Installs `fresh` as the live value. A non-null live value that differs
    /// is pushed onto the history; returns the suffix it was stored under.
    pub(crate) fn supersede(&mut self, fresh: Option<FieldValue>) -> Option<u32> {
        let previous = std::mem::replace(&mut self.current, fresh);
        match previous {
            Some(previous) if self.current.as_ref() != Some(&previous) => {
                // Suffixes are never reused; a spent counter stops versioning.
                let suffix = self.latest_suffix().checked_add(1)?;
                self.versions.push(FieldVersion {
                    suffix,
                    value: previous,
                });
                Some(suffix)
            }
            _ => None,
        }
    }
}

/// Latest persisted state of a resource together with its field histories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRecord {
    pub meta: RecordMeta,
    fields: Vec<(String, FieldHistory)>,
}

impl MergedRecord {
    pub fn new(meta: RecordMeta) -> Self {
        Self {
            meta,
            fields: Vec::new(),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let (mut meta, fields) = snapshot.into_parts();
        meta.stamp_seen(None);
        Self {
            meta,
            fields: fields
                .into_iter()
                .map(|(name, value)| (name, FieldHistory::live(value)))
                .collect(),
        }
    }

    pub fn identifier(&self) -> &ResourceId {
        &self.meta.identifier
    }

    pub fn status(&self) -> ListingStatus {
        self.meta.status
    }

    pub fn field(&self, name: &str) -> Option<&FieldHistory> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, history)| history)
    }

    pub fn live_value(&self, name: &str) -> Option<&FieldValue> {
        self.field(name).and_then(FieldHistory::current)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldHistory)> {
        self.fields
            .iter()
            .map(|(name, history)| (name.as_str(), history))
    }

    /// Replaces or appends a field; metadata names are ignored.
    pub fn insert_field(&mut self, name: impl Into<String>, history: FieldHistory) {
        let name = name.into();
        if is_metadata_field(&name) {
            return;
        }
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = history,
            None => self.fields.push((name, history)),
        }
    }

    /// Flattens the record into wire columns: each live field followed by its
    /// `name_<n>` history columns. Metadata columns are not included.
    pub fn to_columns(&self) -> Vec<(String, Option<FieldValue>)> {
        let mut columns = Vec::new();
        for (name, history) in &self.fields {
            columns.push((name.clone(), history.current.clone()));
            for version in &history.versions {
                columns.push((
                    format!("{name}_{}", version.suffix),
                    Some(version.value.clone()),
                ));
            }
        }
        columns
    }

    /// Inverse of [`MergedRecord::to_columns`]. A column `name_<n>` is read as a
    /// version of `name` only when a `name` column is present too; null history
    /// cells are skipped.
    pub fn from_columns<I>(meta: RecordMeta, columns: I) -> Self
    where
        I: IntoIterator<Item = (String, Option<FieldValue>)>,
    {
        let columns: Vec<_> = columns
            .into_iter()
            .filter(|(name, _)| !is_metadata_field(name))
            .collect();
        let names: HashSet<&str> = columns.iter().map(|(name, _)| name.as_str()).collect();

        let mut live: Vec<(String, Option<FieldValue>)> = Vec::new();
        let mut versions: Vec<(String, FieldVersion)> = Vec::new();
        for (name, value) in &columns {
            match split_suffix(name) {
                Some((base, suffix)) if names.contains(base) => {
                    if let Some(value) = value {
                        versions.push((
                            base.to_string(),
                            FieldVersion {
                                suffix,
                                value: value.clone(),
                            },
                        ));
                    }
                }
                _ => live.push((name.clone(), value.clone())),
            }
        }

        let mut record = MergedRecord::new(meta);
        for (name, current) in live {
            let own_versions = versions
                .iter()
                .filter(|(base, _)| *base == name)
                .map(|(_, version)| version.clone())
                .collect();
            record.insert_field(name, FieldHistory::from_parts(current, own_versions));
        }
        record
    }
}

fn split_suffix(name: &str) -> Option<(&str, u32)> {
    let (base, digits) = name.rsplit_once('_')?;
    if base.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let suffix = digits.parse::<u32>().ok()?;
    (suffix > 0).then_some((base, suffix))
}

/// Recorded `active -> inactive` transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub identifier: ResourceId,
    pub timestamp: DateTime<Utc>,
    pub previous_status: ListingStatus,
    pub new_status: ListingStatus,
}

/// One availability check of a resource. Failed fetches are logged as
/// `unknown` with the transport error and no HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCheck {
    pub identifier: ResourceId,
    pub checked_at: DateTime<Utc>,
    pub status: ListingStatus,
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusCheck {
    pub fn observed(snapshot: &Snapshot) -> Self {
        Self {
            identifier: snapshot.meta.identifier.clone(),
            checked_at: snapshot.meta.observed_at,
            status: snapshot.meta.status,
            http_status: snapshot.meta.http_status,
            error: None,
        }
    }

    pub fn failed(
        identifier: ResourceId,
        checked_at: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            identifier,
            checked_at,
            status: ListingStatus::Unknown,
            http_status: None,
            error: Some(error.into()),
        }
    }
}
