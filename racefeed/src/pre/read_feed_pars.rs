use crate::core::poller::TimingPars;
use crate::core::repository::BoardPars;
use crate::fetch::source::ApiPars;
use crate::pre::feed_opts::FeedOpts;
use anyhow::Context;
use serde::Deserialize;
use std::fs::OpenOptions;
use std::path::Path;

/// FeedPars is used to store all other parameter structs. Every part is optional in the parameter
/// file, missing parts take their defaults.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FeedPars {
    pub api_pars: ApiPars,
    pub timing_pars: TimingPars,
    pub board_pars: BoardPars,
}

impl FeedPars {
    /// apply_opts overwrites parameters with the values given on the command line.
    pub fn apply_opts(&mut self, feed_opts: &FeedOpts) {
        if let Some(fetch_count) = feed_opts.fetch_count {
            self.board_pars.fetch_count = fetch_count;
        }
        if let Some(page_size) = feed_opts.page_size {
            self.board_pars.page_size = page_size;
        }
        if let Some(refresh_interval) = feed_opts.refresh_interval {
            self.timing_pars.refresh_interval_ms = refresh_interval.saturating_mul(1000);
        }
    }
}

/// read_feed_pars reads the JSON file and decodes the JSON string into the feed parameters struct.
pub fn read_feed_pars(filepath: &Path) -> anyhow::Result<FeedPars> {
    // open file
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .with_context(|| format!("Failed to open parameter file {}!", filepath.display()))?;

    // read and parse parameter file content
    let pars = serde_json::from_reader(&fh)
        .with_context(|| format!("Failed to parse parameter file {}!", filepath.display()))?;
    Ok(pars)
}
