use std::time::Duration;

use pretty_assertions::assert_eq;
use tracker_engine::{ConfigError, TrackerConfig};

#[test]
fn defaults_are_valid_and_match_the_daily_checker() {
    let config = TrackerConfig::default();
    config.validate().expect("defaults validate");

    assert_eq!(config.harvest.stagnation_threshold, 2);
    assert!(config.harvest.stop_on_empty_page);
    assert_eq!(config.fetch.request_timeout_secs, 30);
    assert_eq!(config.fetch.fetch_concurrency, 1);
    assert_eq!(
        config.pacer().bounds(),
        (Duration::from_millis(600), Duration::from_millis(1200))
    );
    assert_eq!(config.status.required_label_threshold, 3);
    assert!(!config.sync_options().recheck_rediscovered);
}

#[test]
fn resolver_follows_identity_section() {
    let mut config = TrackerConfig::default();
    config.identity.pattern = r"listing/(\w+)".into();
    config.identity.strip_query = true;
    let resolver = config.resolver().unwrap();

    assert_eq!(
        resolver
            .extract_identifier("https://x/listing/ab12?ref=1")
            .map(|id| id.to_string()),
        Some("ab12".to_string())
    );
}

#[test]
fn pattern_without_capture_group_is_rejected() {
    let mut config = TrackerConfig::default();
    config.identity.pattern = r"id-\d+".into();
    assert!(matches!(config.validate(), Err(ConfigError::Identity(_))));

    config.identity.pattern = "id-(".into();
    assert!(matches!(config.validate(), Err(ConfigError::Identity(_))));
}

#[test]
fn inverted_politeness_bounds_are_rejected() {
    let mut config = TrackerConfig::default();
    config.fetch.politeness_min_ms = 2000;
    config.fetch.politeness_max_ms = 100;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::Politeness {
            min_ms: 2000,
            max_ms: 100
        })
    ));
}

#[test]
fn zero_limits_are_rejected() {
    let mut config = TrackerConfig::default();
    config.fetch.fetch_concurrency = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::Zero("fetch.fetch_concurrency"))
    ));

    let mut config = TrackerConfig::default();
    config.harvest.stagnation_threshold = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::Zero("harvest.stagnation_threshold"))
    ));
}

#[test]
fn search_template_needs_query_placeholder() {
    let mut config = TrackerConfig::default();
    config.harvest.search_url_template = "https://x/search".into();
    assert!(matches!(config.validate(), Err(ConfigError::SearchTemplate)));
}

#[test]
fn partial_json_config_keeps_other_defaults() {
    let config: TrackerConfig =
        serde_json::from_str(r#"{"harvest": {"max_pages": 3}, "sync": {"recheck_rediscovered": true}}"#)
            .unwrap();
    assert_eq!(config.harvest.max_pages, 3);
    assert_eq!(config.harvest.max_cycles_per_page, 50);
    assert!(config.sync.recheck_rediscovered);
    assert_eq!(config.identity, TrackerConfig::default().identity);
}
