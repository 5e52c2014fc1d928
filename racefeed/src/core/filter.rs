use crate::core::race::{Category, Race};
use crate::core::status::RaceStatus;
use crate::errors::FeedError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Key under which the persistence collaborator stores the filter state.
pub const FILTERS_STORAGE_KEY: &str = "race-filters";

/// FilterState is the user's selection of categories and status toggles. The feed only reads it,
/// the selection itself is owned and persisted by the user interface.
///
/// * `selected_categories` - Selected category ids, an empty selection shows all categories
/// * `show_expired` - Show races that are past the expire threshold but not swept yet
/// * `show_started` - Show races that started less than the expire threshold ago
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterState {
    pub selected_categories: Vec<String>,
    pub show_expired: bool,
    pub show_started: bool,
}

impl FilterState {
    // ---------------------------------------------------------------------------------------------
    // PERSISTENCE BOUNDARY ------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub fn try_from_persisted(raw: &str) -> Result<FilterState, FeedError> {
        serde_json::from_str(raw).map_err(|e| FeedError::PersistenceRead(e.to_string()))
    }

    /// from_persisted restores the filter state from its persisted JSON. Missing or corrupted data
    /// counts as "nothing persisted" and yields the default state.
    pub fn from_persisted(raw: Option<&str>) -> FilterState {
        let raw = match raw {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => return FilterState::default(),
        };

        match FilterState::try_from_persisted(raw) {
            Ok(filters) => filters,
            Err(e) => {
                warn!(key = FILTERS_STORAGE_KEY, error = %e, "ignoring persisted filters");
                FilterState::default()
            }
        }
    }

    pub fn to_persisted(&self) -> String {
        // a struct of strings and bools always serializes
        serde_json::to_string(self).unwrap_or_default()
    }

    // ---------------------------------------------------------------------------------------------
    // SELECTION -----------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub fn toggle_category(&mut self, category_id: &str) {
        match self
            .selected_categories
            .iter()
            .position(|id| id == category_id)
        {
            Some(idx) => {
                self.selected_categories.remove(idx);
            }
            None => self.selected_categories.push(category_id.to_owned()),
        }
    }

    pub fn select_category(&mut self, category_id: &str) {
        self.selected_categories = vec![category_id.to_owned()];
    }

    pub fn select_categories(&mut self, category_ids: &[String]) {
        self.selected_categories = category_ids.to_vec();
    }

    pub fn select_all_categories(&mut self) {
        self.selected_categories = Category::ALL.iter().map(|c| c.id().to_owned()).collect();
    }

    pub fn clear_categories(&mut self) {
        self.selected_categories.clear();
    }

    pub fn toggle_show_expired(&mut self) {
        self.show_expired = !self.show_expired;
    }

    pub fn toggle_show_started(&mut self) {
        self.show_started = !self.show_started;
    }

    pub fn reset(&mut self) {
        *self = FilterState::default();
    }

    pub fn has_active_filters(&self) -> bool {
        !self.selected_categories.is_empty()
    }

    pub fn is_category_selected(&self, category_id: &str) -> bool {
        self.selected_categories.iter().any(|id| id == category_id)
    }

    pub fn selected_category_objects(&self) -> Vec<Category> {
        Category::ALL
            .iter()
            .copied()
            .filter(|c| self.is_category_selected(c.id()))
            .collect()
    }

    // ---------------------------------------------------------------------------------------------
    // FILTERING -----------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// matches checks if a race passes the category selection and the status toggles at now.
    pub fn matches(&self, race: &Race, now: DateTime<Utc>) -> bool {
        if self.has_active_filters() && !self.is_category_selected(&race.category_id) {
            return false;
        }

        match race.status(now) {
            RaceStatus::Started => self.show_started,
            RaceStatus::Expired => self.show_expired,
            _ => true,
        }
    }

    pub fn apply<'a>(&self, races: Vec<&'a Race>, now: DateTime<Utc>) -> Vec<&'a Race> {
        races
            .into_iter()
            .filter(|race| self.matches(race, now))
            .collect()
    }
}
