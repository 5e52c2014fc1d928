use clap::Parser;
use racefeed::core::clock::SystemClock;
use racefeed::core::filter::FilterState;
use racefeed::core::handle_feed::{fetch_board_once, handle_feed};
use racefeed::core::race::Category;
use racefeed::fetch::client::RaceClient;
use racefeed::fetch::source::HttpRaceSource;
use racefeed::post::board_print::format_board;
use racefeed::pre::check_feed_opts_pars::check_feed_opts_pars;
use racefeed::pre::feed_opts::FeedOpts;
use racefeed::pre::read_feed_pars::{read_feed_pars, FeedPars};
use std::fs;
use tracing::{info, warn};
use tracing_subscriber::filter::EnvFilter;

/// init_logging writes logs to stderr such that the board on stdout stays readable.
fn init_logging(debug: bool) {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// build_filter restores the persisted filter selection (if any) and applies the command line
/// selection on top.
fn build_filter(feed_opts: &FeedOpts) -> FilterState {
    let persisted = feed_opts.filters_path.as_ref().and_then(|path| {
        fs::read_to_string(path)
            .map_err(|e| warn!(path = %path.display(), error = %e, "cannot read persisted filters"))
            .ok()
    });

    let mut filter = FilterState::from_persisted(persisted.as_deref());

    if feed_opts.filters_path.is_none() {
        filter.show_started = true;
    }
    if feed_opts.hide_started {
        filter.show_started = false;
    }
    if feed_opts.show_expired {
        filter.show_expired = true;
    }

    let categories: Vec<String> = feed_opts
        .categories
        .iter()
        .filter_map(|c| Category::from_name_or_id(c))
        .map(|c| c.id().to_owned())
        .collect();

    if !categories.is_empty() {
        filter.select_categories(&categories);
    }

    filter
}

fn main() -> anyhow::Result<()> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get feed options from the command line arguments and read feed parameters
    let feed_opts: FeedOpts = FeedOpts::parse();
    init_logging(feed_opts.debug);

    let mut feed_pars = match &feed_opts.parfile_path {
        Some(parfile_path) => read_feed_pars(parfile_path.as_path())?,
        None => FeedPars::default(),
    };
    feed_pars.apply_opts(&feed_opts);

    // check feed options and parameters
    check_feed_opts_pars(&feed_opts, &feed_pars)?;

    let filter = build_filter(&feed_opts);
    let source = HttpRaceSource::new(&feed_pars.api_pars, feed_opts.use_proxy)?;
    let client = RaceClient::new(source);

    info!(
        fetch_count = feed_pars.board_pars.fetch_count,
        page_size = feed_pars.board_pars.page_size,
        relay = feed_opts.use_proxy,
        "starting race feed"
    );

    // the feed runs on a single thread, timers and fetches interleave cooperatively
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    // EXECUTION -----------------------------------------------------------------------------------
    if feed_opts.once {
        // SINGLE PASS -----------------------------------------------------------------------------
        let board = runtime.block_on(fetch_board_once(
            &client,
            &SystemClock,
            &feed_pars,
            &filter,
            feed_opts.page,
        ))?;
        print!("{}", format_board(&board));
    } else {
        // LIVE FEED -------------------------------------------------------------------------------
        // create channel for communication between the feed and the board printer
        let (tx, rx) = flume::unbounded();

        runtime.block_on(async {
            let printer = tokio::spawn(async move {
                while let Ok(board) = rx.recv_async().await {
                    // clear screen and move the cursor home before redrawing
                    print!("\x1B[2J\x1B[H{}", format_board(&board));
                }
            });

            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "cannot listen for ctrl-c, stopping right away");
                }
            };

            let result = handle_feed(client, SystemClock, &feed_pars, filter, tx, shutdown).await;

            // the sender is gone with the poller, so the printer ends on its own
            let _ = printer.await;
            result
        })?;
    }

    Ok(())
}
