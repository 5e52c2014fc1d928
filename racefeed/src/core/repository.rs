use crate::core::filter::FilterState;
use crate::core::race::Race;
use crate::core::status::{EXPIRE_THRESHOLD_S, STARTING_SOON_THRESHOLD_S};
use crate::errors::FeedError;
use chrono::{DateTime, Utc};
use flume::Sender;
use helpers::general::{argsort, ceil_div, SortOrder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

/// (s) Races within this many seconds before their removal count as expiring.
const EXPIRING_WARNING_S: i64 = 10;

/// * `fetch_count` - Number of races requested from the upstream API per fetch
/// * `page_size` - Number of races per page
/// * `low_water_mark` - A sweep that leaves fewer held races than this requests a refill
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BoardPars {
    pub fetch_count: u32,
    pub page_size: usize,
    pub low_water_mark: usize,
}

impl Default for BoardPars {
    fn default() -> Self {
        BoardPars {
            fetch_count: 80,
            page_size: 5,
            low_water_mark: 10,
        }
    }
}

/// RefreshRequest is sent by the repository to whoever drives the fetches. Sending never blocks the
/// repository, the request is fire-and-forget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshRequest {
    LowWater { remaining: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current_page: usize,
    pub items_per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

/// RaceRepository owns the authoritative set of races. Races are unique by id and kept in insertion
/// order, which is the tie-breaker when sorting races with equal advertised starts. The optional
/// read filter narrows what is paginated, it never removes races.
#[derive(Debug)]
pub struct RaceRepository {
    races: Vec<Race>,
    ids: HashSet<String>,
    filter: Option<FilterState>,
    current_page: usize,
    items_per_page: usize,
    low_water_mark: usize,
    min_refill_spacing: Duration,
    last_refill_request: Option<DateTime<Utc>>,
    refill_tx: Option<Sender<RefreshRequest>>,
}

impl RaceRepository {
    pub fn new(
        board_pars: &BoardPars,
        min_refill_spacing: Duration,
        refill_tx: Option<Sender<RefreshRequest>>,
    ) -> RaceRepository {
        RaceRepository {
            races: Vec::new(),
            ids: HashSet::new(),
            filter: None,
            current_page: 1,
            items_per_page: board_pars.page_size.max(1),
            low_water_mark: board_pars.low_water_mark,
            min_refill_spacing,
            last_refill_request: None,
            refill_tx,
        }
    }

    // ---------------------------------------------------------------------------------------------
    // MUTATIONS -----------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// merge_fetch inserts all races whose id is not held yet and returns the number of inserted
    /// races. A race that is already held keeps its original entry, even if the new one carries
    /// updated display data.
    pub fn merge_fetch(&mut self, new_races: Vec<Race>) -> usize {
        let mut inserted = 0;

        for race in new_races {
            if self.ids.contains(&race.race_id) {
                continue;
            }
            self.ids.insert(race.race_id.to_owned());
            self.races.push(race);
            inserted += 1;
        }

        inserted
    }

    /// replace_all discards all held races and installs the new set. Duplicates within the new set
    /// are dropped (first one wins).
    pub fn replace_all(&mut self, new_races: Vec<Race>) {
        self.races.clear();
        self.ids.clear();
        self.merge_fetch(new_races);
    }

    /// update_race_list replaces all races and removes the expired ones right away.
    pub fn update_race_list(&mut self, new_races: Vec<Race>, now: DateTime<Utc>) -> usize {
        self.replace_all(new_races);
        self.sweep_expired(now)
    }

    /// sweep_expired removes every race that started at least the expire threshold ago and returns
    /// the number of removed races. If the sweep removed races and fewer than the low-water mark
    /// remain, a refill is requested (at most once per refill spacing).
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> usize {
        let initial_count = self.races.len();

        self.races.retain(|race| race.is_active(now));

        let removed = initial_count - self.races.len();
        if removed == 0 {
            return 0;
        }

        let ids: HashSet<String> = self.races.iter().map(|r| r.race_id.to_owned()).collect();
        self.ids = ids;
        self.clamp_page(now);

        info!(
            removed,
            remaining = self.races.len(),
            "removed expired races"
        );

        if self.races.len() < self.low_water_mark {
            self.request_refill(now);
        }

        removed
    }

    fn request_refill(&mut self, now: DateTime<Utc>) {
        let tx = match &self.refill_tx {
            Some(tx) => tx,
            None => return,
        };

        if let Some(last) = self.last_refill_request {
            let since_last = now.signed_duration_since(last).to_std().unwrap_or_default();

            if since_last < self.min_refill_spacing {
                debug!(
                    since_last_ms = since_last.as_millis() as u64,
                    "refill request suppressed, previous request too recent"
                );
                return;
            }
        }

        let remaining = self.races.len();

        // the receiver may be gone after teardown, which is fine
        if tx.try_send(RefreshRequest::LowWater { remaining }).is_ok() {
            info!(remaining, low_water_mark = self.low_water_mark, "requested race refill");
        }
        self.last_refill_request = Some(now);
    }

    // ---------------------------------------------------------------------------------------------
    // QUERIES -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// active_races returns all races that started less than the expire threshold ago, in insertion
    /// order.
    pub fn active_races(&self, now: DateTime<Utc>) -> Vec<&Race> {
        self.races.iter().filter(|race| race.is_active(now)).collect()
    }

    /// sorted_races returns all held races sorted by advertised start (ascending). Races with equal
    /// starts keep their insertion order.
    pub fn sorted_races(&self) -> Vec<&Race> {
        sort_by_start(self.races.iter().collect())
    }

    /// sorted_active_races returns the active races sorted by advertised start.
    pub fn sorted_active_races(&self, now: DateTime<Utc>) -> Vec<&Race> {
        sort_by_start(self.active_races(now))
    }

    /// visible_races returns the sorted active races that pass the read filter (all of them if no
    /// filter is set). This is the set that pagination works on.
    pub fn visible_races(&self, now: DateTime<Utc>) -> Vec<&Race> {
        let sorted = self.sorted_active_races(now);

        match &self.filter {
            Some(filter) => filter.apply(sorted, now),
            None => sorted,
        }
    }

    pub fn by_id(&self, race_id: &str) -> Option<&Race> {
        self.races.iter().find(|race| race.race_id == race_id)
    }

    pub fn by_category(&self, category_id: &str) -> Vec<&Race> {
        self.races
            .iter()
            .filter(|race| race.category_id == category_id)
            .collect()
    }

    /// expiring_races returns the races that will be removed within the next few seconds.
    pub fn expiring_races(&self, now: DateTime<Utc>) -> Vec<&Race> {
        self.races
            .iter()
            .filter(|race| {
                let since_start = race.secs_since_start(now);
                since_start > EXPIRE_THRESHOLD_S - EXPIRING_WARNING_S
                    && since_start < EXPIRE_THRESHOLD_S
            })
            .collect()
    }

    /// has_starting_soon checks if any held race starts within the starting-soon window.
    pub fn has_starting_soon(&self, now: DateTime<Utc>) -> bool {
        self.races.iter().any(|race| {
            let until_start = -race.secs_since_start(now);
            until_start > 0 && until_start <= STARTING_SOON_THRESHOLD_S
        })
    }

    /// needs_more_races checks if there are fewer active races than fit on a page.
    pub fn needs_more_races(&self, now: DateTime<Utc>) -> bool {
        self.active_races(now).len() < self.items_per_page
    }

    pub fn races(&self) -> &[Race] {
        &self.races
    }

    pub fn len(&self) -> usize {
        self.races.len()
    }

    pub fn is_empty(&self) -> bool {
        self.races.is_empty()
    }

    // ---------------------------------------------------------------------------------------------
    // PAGINATION ----------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub fn pagination(&self, now: DateTime<Utc>) -> Pagination {
        let total_items = self.visible_races(now).len();

        Pagination {
            current_page: self.current_page,
            items_per_page: self.items_per_page,
            total_items,
            total_pages: ceil_div(total_items, self.items_per_page),
        }
    }

    /// page moves the cursor to page_number with page_size races per page and returns that page of
    /// the visible races. Page 1 is always valid, any other page outside [1, total_pages] is
    /// rejected and leaves the cursor unchanged.
    pub fn page(
        &mut self,
        page_number: usize,
        page_size: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<&Race>, FeedError> {
        let page_size = page_size.max(1);
        let total_pages = ceil_div(self.visible_races(now).len(), page_size);

        if page_number != 1 && (page_number < 1 || page_number > total_pages) {
            return Err(FeedError::InvalidPageRequest {
                requested: page_number,
                total_pages,
            });
        }

        self.current_page = page_number;
        self.items_per_page = page_size;

        Ok(slice_page(self.visible_races(now), page_number, page_size))
    }

    /// display_races returns the current page of the visible races.
    pub fn display_races(&self, now: DateTime<Utc>) -> Vec<&Race> {
        slice_page(
            self.visible_races(now),
            self.current_page,
            self.items_per_page,
        )
    }

    /// go_to_page moves the cursor without changing the page size.
    pub fn go_to_page(&mut self, page_number: usize, now: DateTime<Utc>) -> Result<(), FeedError> {
        let total_pages = self.pagination(now).total_pages;

        if page_number != 1 && (page_number < 1 || page_number > total_pages) {
            return Err(FeedError::InvalidPageRequest {
                requested: page_number,
                total_pages,
            });
        }

        self.current_page = page_number;
        Ok(())
    }

    pub fn next_page(&mut self, now: DateTime<Utc>) -> bool {
        if self.current_page < self.pagination(now).total_pages {
            self.current_page += 1;
            return true;
        }
        false
    }

    pub fn previous_page(&mut self) -> bool {
        if self.current_page > 1 {
            self.current_page -= 1;
            return true;
        }
        false
    }

    /// set_page_size changes the number of races per page and resets the cursor to the first page.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.items_per_page = page_size.max(1);
        self.current_page = 1;
    }

    pub fn reset_page(&mut self) {
        self.current_page = 1;
    }

    /// set_filter installs the read filter (None shows every active race) and resets the cursor to
    /// the first page, since the page count may have changed.
    pub fn set_filter(&mut self, filter: Option<FilterState>) {
        self.filter = filter;
        self.current_page = 1;
    }

    /// clamp_page pulls the cursor back onto the last page if removals made the current page
    /// vanish.
    fn clamp_page(&mut self, now: DateTime<Utc>) {
        let last_page = self.pagination(now).total_pages.max(1);

        if self.current_page > last_page {
            self.current_page = last_page;
        }
    }
}

fn sort_by_start(races: Vec<&Race>) -> Vec<&Race> {
    let starts: Vec<i64> = races.iter().map(|r| r.advertised_start.timestamp()).collect();

    argsort(&starts, SortOrder::Ascending)
        .into_iter()
        .map(|idx| races[idx])
        .collect()
}

fn slice_page(sorted: Vec<&Race>, page_number: usize, page_size: usize) -> Vec<&Race> {
    sorted
        .into_iter()
        .skip(page_number.saturating_sub(1) * page_size)
        .take(page_size)
        .collect()
}
