//! Loads the RON configuration file and layers CLI overrides on top.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracker_engine::TrackerConfig;
use tracker_logging::{track_debug, track_info};

use crate::cli::{CollectArgs, SyncArgs};

pub fn load_config(path: Option<&Path>) -> Result<TrackerConfig> {
    let Some(path) = path else {
        track_debug!("no config file given; using defaults");
        return Ok(TrackerConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let config = parse_config(&text)
        .with_context(|| format!("parsing config file {}", path.display()))?;
    track_info!("loaded config from {}", path.display());
    Ok(config)
}

pub fn parse_config(text: &str) -> Result<TrackerConfig> {
    Ok(ron::from_str(text)?)
}

pub fn apply_sync_overrides(config: &mut TrackerConfig, args: &SyncArgs) {
    if let Some(max_pages) = args.max_pages {
        config.harvest.max_pages = max_pages;
    }
    if let Some(data_dir) = &args.data_dir {
        config.store.data_dir = data_dir.clone();
    }
    if let Some(archive_dir) = &args.archive_dir {
        config.store.archive_dir = Some(archive_dir.clone());
    }
    if let Some(concurrency) = args.fetch_concurrency {
        config.fetch.fetch_concurrency = concurrency;
    }
    if args.recheck_rediscovered {
        config.sync.recheck_rediscovered = true;
    }
}

pub fn apply_collect_overrides(config: &mut TrackerConfig, args: &CollectArgs) {
    if let Some(max_pages) = args.max_pages {
        config.harvest.max_pages = max_pages;
    }
}
