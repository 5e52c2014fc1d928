use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[command(
    version = "0.1.0",
    author = "Alexander Heilmeier <alexander.heilmeier@tum.de>",
    name = "racefeed",
    about = "A live next-to-go race feed with countdowns, written in Rust"
)]
pub struct FeedOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Fetch once (with retries), print the requested page and exit
    #[arg(short, long)]
    pub once: bool,

    /// Request races through the configured relay instead of the upstream API
    #[arg(long)]
    pub use_proxy: bool,

    /// Hide races that have already started
    #[arg(long)]
    pub hide_started: bool,

    /// Show expired races that were not swept yet
    #[arg(long)]
    pub show_expired: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set path to the feed parameter file (defaults are used if omitted)
    #[arg(short, long)]
    pub parfile_path: Option<PathBuf>,

    /// Set path to a persisted filter selection (JSON)
    #[arg(long)]
    pub filters_path: Option<PathBuf>,

    /// Set number of races requested per fetch, should be in the range [1, 100]
    #[arg(short = 'c', long)]
    pub fetch_count: Option<u32>,

    /// Set number of races per page, should be in the range [1, 100]
    #[arg(short = 's', long)]
    pub page_size: Option<usize>,

    /// Set page to display (only relevant in case --once is set)
    #[arg(long, default_value_t = 1)]
    pub page: usize,

    /// Show only races of this category (name or id, can be repeated)
    #[arg(long = "category")]
    pub categories: Vec<String>,

    /// Set refresh interval in seconds
    #[arg(short, long)]
    pub refresh_interval: Option<u64>,
}
