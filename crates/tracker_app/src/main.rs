//! `listing-tracker`: daily harvest-and-reconcile of listing pages.

mod cli;
mod settings;
mod summary;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracker_core::{IdentityResolver, ResourceId, SyncState};
use tracker_engine::{
    Harvester, HttpPageCollector, HttpSnapshotExtractor, JsonFileStore, PageFetcher,
    ReqwestFetcher, SnapshotExtractor, SyncRunner, TrackerConfig,
};
use tracker_logging::{track_error, track_info, track_warn, LevelFilter};

use crate::cli::{Cli, CollectArgs, Command, ScrapeArgs, SyncArgs};

fn main() {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    tracker_logging::initialize(cli.log, level);

    if let Err(err) = run(cli) {
        track_error!("{err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = settings::load_config(cli.config.as_deref())?;
    match &cli.command {
        Command::Sync(args) => settings::apply_sync_overrides(&mut config, args),
        Command::Collect(args) => settings::apply_collect_overrides(&mut config, args),
        Command::ScrapeUrl(_) => {}
    }
    config.validate().context("invalid configuration")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;

    runtime.block_on(async move {
        let cancel = CancellationToken::new();
        let watcher = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            track_warn!("interrupt received; skipping remaining fetches and saving (again to quit)");
            watcher.cancel();
            if tokio::signal::ctrl_c().await.is_ok() {
                track_error!("second interrupt; exiting without saving");
                std::process::exit(130);
            }
        });

        match cli.command {
            Command::Sync(args) => sync(&config, &args, cancel).await,
            Command::Collect(args) => collect(&config, &args, cancel).await,
            Command::ScrapeUrl(args) => scrape(&config, &args).await,
        }
    })
}

fn fetcher(config: &TrackerConfig) -> Result<Arc<dyn PageFetcher>> {
    let fetcher = ReqwestFetcher::new(config.fetch_settings(), config.pacer())
        .context("building http client")?;
    Ok(Arc::new(fetcher))
}

fn harvester(
    config: &TrackerConfig,
    resolver: &IdentityResolver,
    cancel: CancellationToken,
) -> Harvester {
    Harvester::new(resolver.clone(), config.harvest_settings()).with_cancellation(cancel)
}

fn collector(
    config: &TrackerConfig,
    fetcher: Arc<dyn PageFetcher>,
    resolver: &IdentityResolver,
) -> HttpPageCollector {
    HttpPageCollector::new(
        fetcher,
        resolver.clone(),
        config.harvest.search_url_template.clone(),
    )
}

async fn sync(config: &TrackerConfig, args: &SyncArgs, cancel: CancellationToken) -> Result<()> {
    let resolver = config.resolver()?;
    let fetcher = fetcher(config)?;

    let mut store = JsonFileStore::new(&config.store.data_dir)
        .with_events_file(&config.store.events_file)
        .with_status_file(&config.store.status_file);
    if let Some(archive_dir) = &config.store.archive_dir {
        store = store.with_archive_dir(archive_dir);
    }
    track_info!(
        "syncing `{}` into {}",
        args.query,
        store.table_path(&args.query).display()
    );

    let extractor = HttpSnapshotExtractor::new(Arc::clone(&fetcher), config.status.clone());
    let mut runner = SyncRunner::new(
        harvester(config, &resolver, cancel.clone()),
        Box::new(collector(config, fetcher, &resolver)),
        Arc::new(extractor),
        Arc::new(store),
    )
    .with_cancellation(cancel)
    .with_fetch_concurrency(config.fetch.fetch_concurrency);

    let state = SyncState::new(&args.query, resolver, config.sync_options());
    let report = runner.run(state).await;
    print!("{}", summary::render_report(&report));
    if !report.failures.is_empty() {
        track_warn!("run finished with {} soft failures", report.failures.len());
    }
    Ok(())
}

async fn collect(
    config: &TrackerConfig,
    args: &CollectArgs,
    cancel: CancellationToken,
) -> Result<()> {
    let resolver = config.resolver()?;
    let mut collector = collector(config, fetcher(config)?, &resolver);
    let outcome = harvester(config, &resolver, cancel)
        .harvest(&mut collector, &args.query)
        .await;
    track_info!(
        "harvest stopped after {} pages: {}",
        outcome.stats.pages_visited,
        outcome.stats.stop
    );
    let canonical = resolver.canonicalize(outcome.all_urls());
    print!("{}", summary::render_canonical(&canonical));
    Ok(())
}

async fn scrape(config: &TrackerConfig, args: &ScrapeArgs) -> Result<()> {
    let resolver = config.resolver()?;
    let identifier = resolver
        .extract_identifier(&args.url)
        .unwrap_or_else(|| ResourceId::new(args.url.clone()));
    let extractor = HttpSnapshotExtractor::new(fetcher(config)?, config.status.clone());
    let snapshot = extractor
        .fetch_snapshot(&identifier, &args.url)
        .await
        .with_context(|| format!("fetching {}", args.url))?;
    print!("{}", summary::render_snapshot(&snapshot));
    Ok(())
}
