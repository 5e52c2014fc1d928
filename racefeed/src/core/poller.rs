use crate::core::clock::Clock;
use crate::core::countdown::CountdownEngine;
use crate::core::filter::FilterState;
use crate::core::repository::{RaceRepository, RefreshRequest};
use crate::core::scheduler::{Scheduler, TimerId};
use crate::errors::FeedError;
use crate::fetch::client::RaceClient;
use crate::fetch::source::{ApiPars, RaceSource};
use crate::fetch::validate::ValidatedBatch;
use crate::interfaces::board_interface::BoardState;
use crate::pre::read_feed_pars::FeedPars;
use chrono::{DateTime, Utc};
use flume::{Receiver, Sender};
use helpers::buffer::RingBuffer;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// * `refresh_interval_ms` - (ms) Interval of the regular refresh fetch
/// * `expiration_check_interval_ms` - (ms) Interval of the regular expiration sweep
/// * `frequent_expiration_check_ms` - (ms) Interval of the additional sweep while races are
/// starting soon
/// * `countdown_update_interval_ms` - (ms) Tick interval of each race countdown
/// * `remove_threshold_s` - (s) Elapsed time after the start at which a countdown triggers a sweep.
/// Eviction itself always uses the fixed expire threshold, so this can only bring a sweep forward
/// and must not be below it
/// * `min_refill_spacing_ms` - (ms) Minimum spacing of low-water refill requests
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TimingPars {
    pub refresh_interval_ms: u64,
    pub expiration_check_interval_ms: u64,
    pub frequent_expiration_check_ms: u64,
    pub countdown_update_interval_ms: u64,
    pub remove_threshold_s: u64,
    pub min_refill_spacing_ms: u64,
}

impl Default for TimingPars {
    fn default() -> Self {
        TimingPars {
            refresh_interval_ms: 30_000,
            expiration_check_interval_ms: 10_000,
            frequent_expiration_check_ms: 5_000,
            countdown_update_interval_ms: 1_000,
            remove_threshold_s: 60,
            min_refill_spacing_ms: 10_000,
        }
    }
}

impl TimingPars {
    pub fn remove_threshold(&self) -> Duration {
        Duration::from_secs(self.remove_threshold_s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Merge,
    Replace,
}

#[derive(Debug)]
struct FetchOutcome {
    mode: FetchMode,
    duration: Duration,
    result: Result<ValidatedBatch, FeedError>,
}

/// Poller drives the feed: it owns the repository, the countdowns and all timers, and it is the
/// only place where they are mutated. Fetches run as separate tasks. Their results come back
/// through a channel and are merged on the poller's own flow, so a fetch that is still in flight
/// when the next one is triggered is not cancelled and both results get merged.
pub struct Poller<S, C> {
    client: Arc<RaceClient<S>>,
    clock: C,
    api_pars: ApiPars,
    timing_pars: TimingPars,
    fetch_count: u32,
    refresh_interval: Duration,
    repository: RaceRepository,
    engine: CountdownEngine,
    scheduler: Scheduler,
    started: bool,
    fetches_in_flight: usize,
    last_error: Option<FeedError>,
    last_fetch: Option<DateTime<Utc>>,
    fetch_durations: RingBuffer<u32>,
    outcome_tx: Sender<FetchOutcome>,
    outcome_rx: Receiver<FetchOutcome>,
    refill_rx: Receiver<RefreshRequest>,
    board_tx: Option<Sender<BoardState>>,
}

impl<S, C> Poller<S, C>
where
    S: RaceSource + Send + Sync + 'static,
    C: Clock,
{
    pub fn new(
        client: RaceClient<S>,
        clock: C,
        feed_pars: &FeedPars,
        filter: FilterState,
        board_tx: Option<Sender<BoardState>>,
    ) -> Poller<S, C> {
        let timing_pars = feed_pars.timing_pars.to_owned();
        let (outcome_tx, outcome_rx) = flume::unbounded();
        let (refill_tx, refill_rx) = flume::unbounded();

        let mut repository = RaceRepository::new(
            &feed_pars.board_pars,
            Duration::from_millis(timing_pars.min_refill_spacing_ms),
            Some(refill_tx),
        );
        repository.set_filter(Some(filter));

        Poller {
            client: Arc::new(client),
            clock,
            api_pars: feed_pars.api_pars.to_owned(),
            fetch_count: feed_pars.board_pars.fetch_count,
            refresh_interval: Duration::from_millis(timing_pars.refresh_interval_ms),
            repository,
            engine: CountdownEngine::new(
                Duration::from_millis(timing_pars.countdown_update_interval_ms),
                timing_pars.remove_threshold(),
            ),
            scheduler: Scheduler::new(),
            started: false,
            fetches_in_flight: 0,
            last_error: None,
            last_fetch: None,
            fetch_durations: RingBuffer::new(10),
            outcome_tx,
            outcome_rx,
            refill_rx,
            board_tx,
            timing_pars,
        }
    }

    // ---------------------------------------------------------------------------------------------
    // LIFECYCLE -----------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// start registers the refresh and sweep timers and triggers the initial (retrying) fetch.
    /// Starting a started poller does nothing and returns false. Fetches are spawned onto the
    /// current tokio runtime. Without one the timers are still registered, but the fetch is skipped
    /// and reported as last error.
    pub fn start(&mut self) -> bool {
        if self.started {
            return false;
        }
        self.started = true;

        let now = Instant::now();
        let sweep_interval = Duration::from_millis(self.timing_pars.expiration_check_interval_ms);
        let frequent_interval =
            Duration::from_millis(self.timing_pars.frequent_expiration_check_ms);

        self.scheduler
            .register(TimerId::Refresh, self.refresh_interval, now + self.refresh_interval);
        self.scheduler
            .register(TimerId::ExpirationSweep, sweep_interval, now + sweep_interval);
        self.scheduler
            .register(TimerId::FrequentSweep, frequent_interval, now + frequent_interval);

        info!(
            refresh_interval_ms = self.refresh_interval.as_millis() as u64,
            fetch_count = self.fetch_count,
            "poller started"
        );

        self.trigger_fetch(FetchMode::Merge, true);
        self.sync_countdowns();
        self.publish();
        true
    }

    /// stop cancels every timer, including all countdown timers. It is safe to call repeatedly and
    /// returns whether the poller was running. Fetches in flight are not cancelled, their results
    /// are discarded when they arrive.
    pub fn stop(&mut self) -> bool {
        let was_started = self.started;
        self.started = false;

        self.engine.teardown(&mut self.scheduler);
        self.scheduler.clear();

        if was_started {
            info!("poller stopped");
        }
        was_started
    }

    /// restart stops the poller and starts it again with a new refresh interval.
    pub fn restart(&mut self, refresh_interval: Duration) {
        self.stop();
        self.refresh_interval = refresh_interval;
        self.start();
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// run_until starts the poller and processes events until shutdown resolves. The poller is
    /// stopped afterwards.
    pub async fn run_until<F: Future>(&mut self, shutdown: F) {
        tokio::pin!(shutdown);
        self.start();

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = self.step() => {}
            }
        }

        self.stop();
    }

    /// step waits for the next event (due timers, a fetch result or a refill request) and handles
    /// it. Waiting is the only suspension point, handling runs to completion.
    pub async fn step(&mut self) {
        let deadline = self.scheduler.next_deadline();
        let idle_deadline = Instant::now() + self.refresh_interval;

        tokio::select! {
            _ = tokio::time::sleep_until(deadline.unwrap_or(idle_deadline)), if deadline.is_some() => {
                self.fire_due(Instant::now());
            }
            outcome = self.outcome_rx.recv_async() => {
                if let Ok(outcome) = outcome {
                    self.handle_fetch_outcome(outcome);
                }
            }
            request = self.refill_rx.recv_async() => {
                if let Ok(RefreshRequest::LowWater { remaining }) = request {
                    debug!(remaining, "refill requested by expiration sweep");
                    self.trigger_fetch(FetchMode::Merge, false);
                }
            }
        }
    }

    // ---------------------------------------------------------------------------------------------
    // TIMERS --------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// fire_due fires all timers due at now and returns how many fired. A timer cancelled by an
    /// earlier timer of the same batch does not fire.
    pub fn fire_due(&mut self, now: Instant) -> usize {
        let mut fired = 0;

        for id in self.scheduler.take_due(now) {
            if !self.scheduler.is_registered(&id) {
                continue;
            }
            self.fire(id);
            fired += 1;
        }

        if fired > 0 {
            self.publish();
        }
        fired
    }

    fn fire(&mut self, id: TimerId) {
        let now = self.clock.now();

        match id {
            TimerId::Refresh => self.trigger_fetch(FetchMode::Merge, false),
            TimerId::ExpirationSweep => {
                self.sweep();
            }
            TimerId::FrequentSweep => {
                if self.repository.has_starting_soon(now) {
                    self.sweep();
                }
            }
            TimerId::Countdown(race_id) => {
                let should_remove = self
                    .engine
                    .tick(&race_id, now)
                    .map_or(false, |state| state.should_remove);

                if should_remove {
                    debug!(race_id = %race_id, "countdown signals removal");
                    self.sweep();
                }
            }
        }
    }

    // ---------------------------------------------------------------------------------------------
    // FETCHING ------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// refresh triggers a merging fetch right away.
    pub fn refresh(&mut self) {
        self.trigger_fetch(FetchMode::Merge, false);
    }

    /// set_fetch_count changes the number of races per fetch, resets the page and replaces all held
    /// races with a fresh batch.
    pub fn set_fetch_count(&mut self, fetch_count: u32) {
        self.fetch_count = fetch_count;
        self.repository.reset_page();
        self.trigger_fetch(FetchMode::Replace, false);
    }

    fn trigger_fetch(&mut self, mode: FetchMode, retry: bool) {
        let client = Arc::clone(&self.client);
        let tx = self.outcome_tx.clone();
        let count = self.fetch_count;
        let max_attempts = self.api_pars.max_retries;
        let base_delay = Duration::from_millis(self.api_pars.retry_delay_ms);

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(error = %e, "no tokio runtime to run the race fetch on, skipping it");
                self.last_error = Some(FeedError::Network(format!("fetch not started: {}", e)));
                return;
            }
        };

        self.fetches_in_flight += 1;

        runtime.spawn(async move {
            let t_start = Instant::now();
            let result = if retry {
                client.retry_fetch(count, max_attempts, base_delay).await
            } else {
                client.fetch(count).await
            };

            // the poller may be gone by now, the result is dropped then
            let _ = tx.send(FetchOutcome {
                mode,
                duration: t_start.elapsed(),
                result,
            });
        });
    }

    fn handle_fetch_outcome(&mut self, outcome: FetchOutcome) {
        self.fetches_in_flight = self.fetches_in_flight.saturating_sub(1);

        if !self.started {
            debug!("discarding fetch result of a stopped poller");
            return;
        }

        self.fetch_durations
            .push(outcome.duration.as_millis().min(u32::MAX as u128) as u32);
        let now = self.clock.now();

        match outcome.result {
            Ok(batch) => {
                let fetched = batch.races.len();
                let inserted = match outcome.mode {
                    FetchMode::Merge => self.repository.merge_fetch(batch.races),
                    FetchMode::Replace => {
                        self.repository.replace_all(batch.races);
                        fetched
                    }
                };

                self.last_fetch = Some(now);
                self.last_error = None;

                info!(
                    fetched,
                    inserted,
                    held = self.repository.len(),
                    avg_fetch_ms = self.fetch_durations.get_avg().unwrap_or(0.0) as u64,
                    "races updated"
                );
            }
            Err(e) => {
                warn!(error = %e, "race fetch failed, keeping schedule");
                self.last_error = Some(e);
            }
        }

        self.sweep();
        self.publish();
    }

    // ---------------------------------------------------------------------------------------------
    // REPOSITORY ----------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    fn sweep(&mut self) -> usize {
        let removed = self.repository.sweep_expired(self.clock.now());
        self.sync_countdowns();
        removed
    }

    fn sync_countdowns(&mut self) {
        if !self.started {
            return;
        }

        let (added, removed) = self.engine.sync(
            self.repository.races(),
            &mut self.scheduler,
            self.clock.now(),
            Instant::now(),
        );

        if added > 0 || removed > 0 {
            debug!(added, removed, tracked = self.engine.len(), "countdowns synced");
        }
    }

    pub fn go_to_page(&mut self, page_number: usize) -> Result<(), FeedError> {
        self.repository.go_to_page(page_number, self.clock.now())?;
        self.publish();
        Ok(())
    }

    pub fn next_page(&mut self) -> bool {
        let moved = self.repository.next_page(self.clock.now());
        if moved {
            self.publish();
        }
        moved
    }

    pub fn previous_page(&mut self) -> bool {
        let moved = self.repository.previous_page();
        if moved {
            self.publish();
        }
        moved
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.repository.set_page_size(page_size);
        self.publish();
    }

    /// set_filter replaces the read filter of the board and moves back to the first page.
    pub fn set_filter(&mut self, filter: FilterState) {
        self.repository.set_filter(Some(filter));
        self.publish();
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    // ---------------------------------------------------------------------------------------------
    // OBSERVATION ---------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub fn repository(&self) -> &RaceRepository {
        &self.repository
    }

    pub fn engine(&self) -> &CountdownEngine {
        &self.engine
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn last_error(&self) -> Option<&FeedError> {
        self.last_error.as_ref()
    }

    pub fn last_fetch(&self) -> Option<DateTime<Utc>> {
        self.last_fetch
    }

    pub fn fetches_in_flight(&self) -> usize {
        self.fetches_in_flight
    }

    pub fn snapshot(&self) -> BoardState {
        let mut board = BoardState::from_repository(
            &self.repository,
            Some(&self.engine),
            self.timing_pars.remove_threshold(),
            self.clock.now(),
        );
        board.fetches_in_flight = self.fetches_in_flight;
        board.last_error = self.last_error.as_ref().map(|e| e.to_string());
        board
    }

    fn publish(&self) {
        if let Some(tx) = &self.board_tx {
            // a closed render layer is not an error of the feed
            let _ = tx.send(self.snapshot());
        }
    }
}
