use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracker_core::{IdentityError, IdentityResolver, SyncOptions, DEFAULT_IDENTIFIER_PATTERN};

use crate::collector::DEFAULT_SEARCH_URL_TEMPLATE;
use crate::fetch::FetchSettings;
use crate::harvester::HarvestSettings;
use crate::pacer::Pacer;
use crate::status::StatusRules;
use crate::store::{DEFAULT_EVENTS_FILE, DEFAULT_STATUS_FILE};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("politeness delay min ({min_ms} ms) exceeds max ({max_ms} ms)")]
    Politeness { min_ms: u64, max_ms: u64 },
    #[error("`{0}` must be at least 1")]
    Zero(&'static str),
    #[error("search url template must contain `{{query}}`")]
    SearchTemplate,
}

/// Complete run configuration. Every section falls back to its defaults, so
/// a config file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub harvest: HarvestConfig,
    pub identity: IdentityConfig,
    pub fetch: FetchConfig,
    pub status: StatusRules,
    pub store: StoreConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub max_pages: u32,
    pub stagnation_threshold: u32,
    pub max_cycles_per_page: u32,
    pub stop_on_empty_page: bool,
    pub call_timeout_secs: u64,
    /// `{query}` is replaced by the query slug.
    pub search_url_template: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        let settings = HarvestSettings::default();
        Self {
            max_pages: settings.max_pages,
            stagnation_threshold: settings.stagnation_threshold,
            max_cycles_per_page: settings.max_cycles_per_page,
            stop_on_empty_page: settings.stop_on_empty_page,
            call_timeout_secs: settings.call_timeout.as_secs(),
            search_url_template: DEFAULT_SEARCH_URL_TEMPLATE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub pattern: String,
    pub allowed_host_suffix: Option<String>,
    pub strip_query: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_IDENTIFIER_PATTERN.to_string(),
            allowed_host_suffix: None,
            strip_query: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
    pub user_agent: String,
    pub politeness_min_ms: u64,
    pub politeness_max_ms: u64,
    pub fetch_concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let settings = FetchSettings::default();
        Self {
            connect_timeout_secs: settings.connect_timeout.as_secs(),
            request_timeout_secs: settings.request_timeout.as_secs(),
            redirect_limit: settings.redirect_limit,
            max_bytes: settings.max_bytes,
            allowed_content_types: settings.allowed_content_types,
            user_agent: settings.user_agent,
            politeness_min_ms: 600,
            politeness_max_ms: 1200,
            fetch_concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub archive_dir: Option<PathBuf>,
    pub events_file: PathBuf,
    pub status_file: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            archive_dir: None,
            events_file: PathBuf::from(DEFAULT_EVENTS_FILE),
            status_file: PathBuf::from(DEFAULT_STATUS_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub recheck_rediscovered: bool,
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolver()?;
        let nonzero = [
            ("harvest.max_pages", u64::from(self.harvest.max_pages)),
            (
                "harvest.stagnation_threshold",
                u64::from(self.harvest.stagnation_threshold),
            ),
            (
                "harvest.max_cycles_per_page",
                u64::from(self.harvest.max_cycles_per_page),
            ),
            ("harvest.call_timeout_secs", self.harvest.call_timeout_secs),
            ("fetch.request_timeout_secs", self.fetch.request_timeout_secs),
            ("fetch.fetch_concurrency", self.fetch.fetch_concurrency as u64),
        ];
        if let Some((name, _)) = nonzero.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Zero(*name));
        }
        if self.fetch.politeness_min_ms > self.fetch.politeness_max_ms {
            return Err(ConfigError::Politeness {
                min_ms: self.fetch.politeness_min_ms,
                max_ms: self.fetch.politeness_max_ms,
            });
        }
        if !self.harvest.search_url_template.contains("{query}") {
            return Err(ConfigError::SearchTemplate);
        }
        Ok(())
    }

    pub fn resolver(&self) -> Result<IdentityResolver, ConfigError> {
        let mut resolver = IdentityResolver::new(&self.identity.pattern)?
            .with_query_stripping(self.identity.strip_query);
        if let Some(suffix) = &self.identity.allowed_host_suffix {
            resolver = resolver.with_allowed_host_suffix(suffix.clone());
        }
        Ok(resolver)
    }

    pub fn harvest_settings(&self) -> HarvestSettings {
        HarvestSettings {
            max_pages: self.harvest.max_pages,
            stagnation_threshold: self.harvest.stagnation_threshold,
            max_cycles_per_page: self.harvest.max_cycles_per_page,
            stop_on_empty_page: self.harvest.stop_on_empty_page,
            call_timeout: Duration::from_secs(self.harvest.call_timeout_secs),
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_secs(self.fetch.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.fetch.request_timeout_secs),
            redirect_limit: self.fetch.redirect_limit,
            max_bytes: self.fetch.max_bytes,
            allowed_content_types: self.fetch.allowed_content_types.clone(),
            user_agent: self.fetch.user_agent.clone(),
        }
    }

    /// The one pacer every fetcher of a run must share.
    pub fn pacer(&self) -> Arc<Pacer> {
        Arc::new(Pacer::new(
            Duration::from_millis(self.fetch.politeness_min_ms),
            Duration::from_millis(self.fetch.politeness_max_ms),
        ))
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            recheck_rediscovered: self.sync.recheck_rediscovered,
        }
    }
}
