//! Command-line surface of `listing-tracker`.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use tracker_logging::LogDestination;

#[derive(Parser, Debug)]
#[command(
    name = "listing-tracker",
    version,
    about = "Harvest listing URLs and keep a versioned history of every listing"
)]
pub struct Cli {
    /// RON configuration file; missing sections use defaults
    #[arg(long, env = "TRACKER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Where log output goes: terminal, file or both
    #[arg(long, env = "TRACKER_LOG", default_value = "terminal", global = true)]
    pub log: LogDestination,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Recheck stored listings, discover new ones and write the merged table
    Sync(SyncArgs),
    /// Harvest and canonicalise listing URLs without fetching or writing anything
    Collect(CollectArgs),
    /// Fetch one listing and print its snapshot
    ScrapeUrl(ScrapeArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct SyncArgs {
    /// Search query, e.g. a city name
    #[arg(long, env = "TRACKER_QUERY")]
    pub query: String,

    #[arg(long, env = "TRACKER_MAX_PAGES")]
    pub max_pages: Option<u32>,

    #[arg(long, env = "TRACKER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Keep a dated copy of every written table here
    #[arg(long, env = "TRACKER_ARCHIVE_DIR")]
    pub archive_dir: Option<PathBuf>,

    #[arg(long, env = "TRACKER_FETCH_CONCURRENCY")]
    pub fetch_concurrency: Option<usize>,

    /// Refetch discovered listings that are stored as inactive or unknown
    #[arg(long)]
    pub recheck_rediscovered: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CollectArgs {
    #[arg(long, env = "TRACKER_QUERY")]
    pub query: String,

    #[arg(long, env = "TRACKER_MAX_PAGES")]
    pub max_pages: Option<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct ScrapeArgs {
    #[arg(long)]
    pub url: String,
}
