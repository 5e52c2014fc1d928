use crate::core::race::Race;
use crate::core::scheduler::{Scheduler, TimerId};
use crate::core::status::{delta_ms, CRITICAL_THRESHOLD_MS, STARTING_SOON_THRESHOLD_MS};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

const MS_PER_SECOND: u64 = 1000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: u64 = 24 * MS_PER_HOUR;

/// Display granularities of a countdown.
///
/// * `Full` -> "1d 2h 30m", "2h 5m 3s", "4m 10s", "45s", once started "+1m 5s"
/// * `Compact` -> "5:03:07", "04:10", once started "+01:05"
/// * `Minimal` -> "4m", "45s", once started "Started"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayFormat {
    #[default]
    Full,
    Compact,
    Minimal,
}

/// CountdownState is the decomposition of the time until a race starts. Before the start, days to
/// seconds hold the remaining time. Once the start has passed, they are zero and the elapsed time
/// is held in elapsed_minutes/elapsed_seconds instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CountdownState {
    pub time_until_start_ms: i64,
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub elapsed_minutes: u64,
    pub elapsed_seconds: u64,
    pub is_expired: bool,
    pub starting_soon: bool,
    pub critical: bool,
    pub should_remove: bool,
}

impl CountdownState {
    pub fn compute(
        advertised_start: DateTime<Utc>,
        now: DateTime<Utc>,
        remove_threshold_ms: i64,
    ) -> CountdownState {
        CountdownState::from_delta(delta_ms(advertised_start, now), remove_threshold_ms)
    }

    pub fn from_delta(delta_ms: i64, remove_threshold_ms: i64) -> CountdownState {
        let mut state = CountdownState {
            time_until_start_ms: delta_ms,
            ..Default::default()
        };

        if delta_ms <= 0 {
            // race has started -> count the elapsed time instead
            let elapsed = delta_ms.unsigned_abs();
            state.is_expired = true;
            state.elapsed_minutes = elapsed / MS_PER_MINUTE;
            state.elapsed_seconds = (elapsed % MS_PER_MINUTE) / MS_PER_SECOND;
            state.should_remove = elapsed as i128 > remove_threshold_ms as i128;
        } else {
            let remaining = delta_ms as u64;
            state.days = remaining / MS_PER_DAY;
            state.hours = (remaining % MS_PER_DAY) / MS_PER_HOUR;
            state.minutes = (remaining % MS_PER_HOUR) / MS_PER_MINUTE;
            state.seconds = (remaining % MS_PER_MINUTE) / MS_PER_SECOND;
            state.starting_soon = delta_ms <= STARTING_SOON_THRESHOLD_MS;
            state.critical = delta_ms <= CRITICAL_THRESHOLD_MS;
        }

        state
    }

    pub fn display(&self, format: DisplayFormat) -> String {
        match format {
            DisplayFormat::Full => self.full_display(),
            DisplayFormat::Compact => self.compact_display(),
            DisplayFormat::Minimal => self.minimal_display(),
        }
    }

    pub fn full_display(&self) -> String {
        if self.is_expired {
            return if self.elapsed_minutes > 0 {
                format!("+{}m {}s", self.elapsed_minutes, self.elapsed_seconds)
            } else {
                format!("+{}s", self.elapsed_seconds)
            };
        }

        if self.days > 0 {
            format!("{}d {}h {}m", self.days, self.hours, self.minutes)
        } else if self.hours > 0 {
            format!("{}h {}m {}s", self.hours, self.minutes, self.seconds)
        } else if self.minutes > 0 {
            format!("{}m {}s", self.minutes, self.seconds)
        } else {
            format!("{}s", self.seconds)
        }
    }

    /// compact_display folds whole days into the hour field, such that a race two days ahead
    /// reads "53:00:00" rather than losing the days.
    pub fn compact_display(&self) -> String {
        if self.is_expired {
            return format!(
                "+{:02}:{:02}",
                self.elapsed_minutes, self.elapsed_seconds
            );
        }

        let hours = self.days * 24 + self.hours;

        if hours > 0 {
            format!("{}:{:02}:{:02}", hours, self.minutes, self.seconds)
        } else {
            format!("{:02}:{:02}", self.minutes, self.seconds)
        }
    }

    pub fn minimal_display(&self) -> String {
        if self.is_expired {
            return "Started".to_owned();
        }

        let total_minutes = (self.days * 24 + self.hours) * 60 + self.minutes;

        if total_minutes > 0 {
            format!("{}m", total_minutes)
        } else {
            format!("{}s", self.seconds)
        }
    }
}

/// Countdown keeps the live countdown state of a single race.
#[derive(Debug, Clone)]
pub struct Countdown {
    pub race_id: String,
    advertised_start: DateTime<Utc>,
    remove_threshold_ms: i64,
    state: CountdownState,
}

impl Countdown {
    pub fn new(
        race_id: &str,
        advertised_start: DateTime<Utc>,
        remove_threshold_ms: i64,
        now: DateTime<Utc>,
    ) -> Countdown {
        Countdown {
            race_id: race_id.to_owned(),
            advertised_start,
            remove_threshold_ms,
            state: CountdownState::compute(advertised_start, now, remove_threshold_ms),
        }
    }

    /// tick recomputes the countdown state for the current time.
    pub fn tick(&mut self, now: DateTime<Utc>) -> &CountdownState {
        self.state = CountdownState::compute(self.advertised_start, now, self.remove_threshold_ms);
        &self.state
    }

    pub fn state(&self) -> &CountdownState {
        &self.state
    }
}

/// CountdownEngine holds one countdown per tracked race and keeps exactly one recurring countdown
/// timer per tracked race registered in the scheduler.
#[derive(Debug)]
pub struct CountdownEngine {
    countdowns: HashMap<String, Countdown>,
    tick_interval: Duration,
    remove_threshold_ms: i64,
}

impl CountdownEngine {
    pub fn new(tick_interval: Duration, remove_threshold: Duration) -> CountdownEngine {
        CountdownEngine {
            countdowns: HashMap::new(),
            tick_interval,
            remove_threshold_ms: remove_threshold.as_millis() as i64,
        }
    }

    /// sync starts tracking every race that is not tracked yet and stops tracking (including the
    /// timer) every race that is no longer in the inserted set. It returns the number of added and
    /// removed countdowns.
    pub fn sync<'a>(
        &mut self,
        races: impl IntoIterator<Item = &'a Race>,
        scheduler: &mut Scheduler,
        now: DateTime<Utc>,
        now_instant: Instant,
    ) -> (usize, usize) {
        let mut held: HashSet<&str> = HashSet::new();
        let mut added = 0;

        for race in races {
            held.insert(race.race_id.as_str());

            if self.countdowns.contains_key(&race.race_id) {
                continue;
            }

            self.countdowns.insert(
                race.race_id.to_owned(),
                Countdown::new(
                    &race.race_id,
                    race.advertised_start,
                    self.remove_threshold_ms,
                    now,
                ),
            );
            scheduler.register(
                TimerId::Countdown(race.race_id.to_owned()),
                self.tick_interval,
                now_instant + self.tick_interval,
            );
            added += 1;
        }

        let gone: Vec<String> = self
            .countdowns
            .keys()
            .filter(|race_id| !held.contains(race_id.as_str()))
            .cloned()
            .collect();

        for race_id in gone.iter() {
            self.untrack(race_id, scheduler);
        }

        (added, gone.len())
    }

    /// untrack stops the countdown of a race and cancels its timer.
    pub fn untrack(&mut self, race_id: &str, scheduler: &mut Scheduler) -> bool {
        scheduler.cancel(&TimerId::Countdown(race_id.to_owned()));
        self.countdowns.remove(race_id).is_some()
    }

    /// teardown stops all countdowns, no countdown timer survives it.
    pub fn teardown(&mut self, scheduler: &mut Scheduler) {
        for race_id in self.countdowns.keys() {
            scheduler.cancel(&TimerId::Countdown(race_id.to_owned()));
        }
        self.countdowns.clear();
    }

    pub fn tick(&mut self, race_id: &str, now: DateTime<Utc>) -> Option<CountdownState> {
        self.countdowns
            .get_mut(race_id)
            .map(|countdown| *countdown.tick(now))
    }

    pub fn state(&self, race_id: &str) -> Option<&CountdownState> {
        self.countdowns.get(race_id).map(|countdown| countdown.state())
    }

    pub fn is_tracking(&self, race_id: &str) -> bool {
        self.countdowns.contains_key(race_id)
    }

    pub fn len(&self) -> usize {
        self.countdowns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countdowns.is_empty()
    }
}
