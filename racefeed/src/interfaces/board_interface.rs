use crate::core::countdown::{CountdownEngine, CountdownState};
use crate::core::race::{Category, Race};
use crate::core::repository::{Pagination, RaceRepository};
use crate::core::status::RaceStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// RaceCard contains everything the render layer needs to show one race.
#[derive(Debug, Clone, Serialize)]
pub struct RaceCard {
    pub race_id: String,
    pub race_name: String,
    pub race_number: Option<u32>,
    pub meeting_name: String,
    pub venue_state: String,
    pub category: Option<Category>,
    pub advertised_start: DateTime<Utc>,
    pub status: RaceStatus,
    pub countdown: CountdownState,
    pub full_display: String,
    pub compact_display: String,
    pub minimal_display: String,
    pub race_class: String,
}

impl RaceCard {
    pub fn new(race: &Race, countdown: CountdownState, now: DateTime<Utc>) -> RaceCard {
        RaceCard {
            race_id: race.race_id.to_owned(),
            race_name: race.race_name.to_owned(),
            race_number: race.race_number,
            meeting_name: race.meeting_name.to_owned(),
            venue_state: race.venue.state.to_owned(),
            category: race.category(),
            advertised_start: race.advertised_start,
            status: race.status(now),
            countdown,
            full_display: countdown.full_display(),
            compact_display: countdown.compact_display(),
            minimal_display: countdown.minimal_display(),
            race_class: race.race_class(),
        }
    }
}

/// BoardState is the snapshot published to the render layer after every change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BoardState {
    pub generated_at: Option<DateTime<Utc>>,
    pub cards: Vec<RaceCard>,
    pub pagination: Option<Pagination>,
    pub held_races: usize,
    pub expiring_races: usize,
    pub fetches_in_flight: usize,
    pub last_error: Option<String>,
}

impl BoardState {
    /// from_repository builds the snapshot of the current page. The repository's read filter is
    /// applied before paginating, so the cards and the page counts describe the same set of races.
    /// Countdowns of tracked races are taken from the engine, untracked ones are computed on the
    /// spot.
    pub fn from_repository(
        repository: &RaceRepository,
        engine: Option<&CountdownEngine>,
        remove_threshold: Duration,
        now: DateTime<Utc>,
    ) -> BoardState {
        let remove_threshold_ms = remove_threshold.as_millis() as i64;

        let cards = repository
            .display_races(now)
            .into_iter()
            .map(|race| {
                let countdown = engine
                    .and_then(|engine| engine.state(&race.race_id).copied())
                    .unwrap_or_else(|| {
                        CountdownState::compute(race.advertised_start, now, remove_threshold_ms)
                    });
                RaceCard::new(race, countdown, now)
            })
            .collect();

        BoardState {
            generated_at: Some(now),
            cards,
            pagination: Some(repository.pagination(now)),
            held_races: repository.len(),
            expiring_races: repository.expiring_races(now).len(),
            fetches_in_flight: 0,
            last_error: None,
        }
    }
}
