use crate::core::clock::Clock;
use crate::core::filter::FilterState;
use crate::core::poller::Poller;
use crate::core::repository::RaceRepository;
use crate::fetch::client::RaceClient;
use crate::fetch::source::RaceSource;
use crate::interfaces::board_interface::BoardState;
use crate::pre::read_feed_pars::FeedPars;
use anyhow::Context;
use flume::Sender;
use std::future::Future;
use std::time::Duration;
use tracing::info;

/// handle_feed creates a poller on the basis of the inserted parameters and runs it until shutdown
/// resolves. Every change of the board is published through board_tx.
pub async fn handle_feed<S, C, F>(
    client: RaceClient<S>,
    clock: C,
    feed_pars: &FeedPars,
    filter: FilterState,
    board_tx: Sender<BoardState>,
    shutdown: F,
) -> anyhow::Result<()>
where
    S: RaceSource + Send + Sync + 'static,
    C: Clock,
    F: Future,
{
    let mut poller = Poller::new(client, clock, feed_pars, filter, Some(board_tx));

    poller.run_until(shutdown).await;

    info!(
        held = poller.repository().len(),
        in_flight = poller.fetches_in_flight(),
        "feed shut down"
    );
    Ok(())
}

/// fetch_board_once fetches a single batch (with retries), drops the expired races and returns the
/// requested page as a board.
pub async fn fetch_board_once<S, C>(
    client: &RaceClient<S>,
    clock: &C,
    feed_pars: &FeedPars,
    filter: &FilterState,
    page: usize,
) -> anyhow::Result<BoardState>
where
    S: RaceSource,
    C: Clock,
{
    let batch = client
        .retry_fetch(
            feed_pars.board_pars.fetch_count,
            feed_pars.api_pars.max_retries,
            Duration::from_millis(feed_pars.api_pars.retry_delay_ms),
        )
        .await
        .context("Failed to fetch races!")?;

    // no refill channel: a single pass never fetches again
    let mut repository = RaceRepository::new(&feed_pars.board_pars, Duration::ZERO, None);
    repository.set_filter(Some(filter.to_owned()));
    let now = clock.now();
    let removed = repository.update_race_list(batch.races, now);

    info!(
        held = repository.len(),
        removed,
        rejected = batch.rejected.len(),
        "race batch loaded"
    );

    repository
        .page(page, feed_pars.board_pars.page_size, now)
        .with_context(|| format!("Cannot show page {}!", page))?;

    Ok(BoardState::from_repository(
        &repository,
        None,
        feed_pars.timing_pars.remove_threshold(),
        now,
    ))
}
