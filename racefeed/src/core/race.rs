use crate::core::status::{classify, RaceStatus, EXPIRE_THRESHOLD_S};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category is the fixed set of race codes served by the upstream API, identified by the API's
/// category ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Greyhound,
    Harness,
    Horse,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Greyhound, Category::Harness, Category::Horse];

    pub fn id(&self) -> &'static str {
        match self {
            Category::Greyhound => "9daef0d7-bf3c-4f50-921d-8e818c60fe61",
            Category::Harness => "161d9be2-e909-4326-8c2c-35ed71fb460b",
            Category::Horse => "4a2788f8-e825-4d36-9894-efd4baf1cfae",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Category::Greyhound => "Greyhound",
            Category::Harness => "Harness",
            Category::Horse => "Horse",
        }
    }

    pub fn from_id(category_id: &str) -> Option<Category> {
        Category::ALL.iter().copied().find(|c| c.id() == category_id)
    }

    /// from_name_or_id accepts either the upstream id or the display name (case-insensitive),
    /// which is what a user types on the command line.
    pub fn from_name_or_id(s: &str) -> Option<Category> {
        let s = s.trim();
        Category::from_id(s).or_else(|| {
            Category::ALL
                .iter()
                .copied()
                .find(|c| c.name().eq_ignore_ascii_case(s))
        })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// NamedRef is the `{id, name, short_name}` triple the API uses for lookup values such as the
/// track condition or the weather.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NamedRef {
    pub id: String,
    pub name: String,
    pub short_name: String,
}

/// * `distance` - Race distance in units of `distance_type`
/// * `track_condition` - Track rating, e.g. Good (4)
/// * `weather` - Weather at the venue, e.g. Fine
/// * `race_comment` - Free text, contains the race class
/// * `additional_data` - JSON string with revealed race information (prize money, surface)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RaceForm {
    pub distance: Option<f64>,
    pub distance_type: Option<NamedRef>,
    pub track_condition: Option<NamedRef>,
    pub weather: Option<NamedRef>,
    pub race_comment: Option<String>,
    pub additional_data: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Venue {
    pub id: String,
    pub name: String,
    pub state: String,
    pub country: String,
}

/// Race is an immutable record of one upcoming race. Only `race_id` and `advertised_start` take
/// part in lifecycle decisions, everything else is display data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Race {
    pub race_id: String,
    pub race_name: String,
    pub race_number: Option<u32>,
    pub meeting_id: String,
    pub meeting_name: String,
    pub category_id: String,
    pub advertised_start: DateTime<Utc>,
    pub venue: Venue,
    pub race_form: RaceForm,
}

impl Race {
    pub fn category(&self) -> Option<Category> {
        Category::from_id(&self.category_id)
    }

    pub fn status(&self, now: DateTime<Utc>) -> RaceStatus {
        classify(self.advertised_start, now)
    }

    /// (s) Whole seconds elapsed since the advertised start, negative before the start.
    pub fn secs_since_start(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp() - self.advertised_start.timestamp()
    }

    /// A race is active until a full expire threshold has elapsed since its start.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.secs_since_start(now) < EXPIRE_THRESHOLD_S
    }

    /// race_class extracts the class from the race comment, e.g. "MDN" -> "Maiden". Races without a
    /// recognizable class are open races.
    pub fn race_class(&self) -> String {
        let comment = match &self.race_form.race_comment {
            Some(comment) => comment,
            None => return "Open".to_owned(),
        };

        for token in comment
            .split(|c: char| !c.is_ascii_alphanumeric())
            .map(|t| t.to_ascii_uppercase())
        {
            let label = match token.as_str() {
                "MDN" | "MAID" => Some("Maiden".to_owned()),
                "LR" => Some("Listed".to_owned()),
                t if t.len() == 3 && t.starts_with("CL") && ('1'..='6').contains(&t_last(t)) => {
                    Some(format!("Class {}", t_last(t)))
                }
                t if t.len() == 2 && t.starts_with('G') && ('1'..='3').contains(&t_last(t)) => {
                    Some(format!("Group {}", t_last(t)))
                }
                t if t.len() > 2
                    && t.starts_with("BM")
                    && t[2..].chars().all(|c| c.is_ascii_digit()) =>
                {
                    Some(t.to_owned())
                }
                _ => None,
            };

            if let Some(label) = label {
                return label;
            }
        }

        "Open".to_owned()
    }

    /// prize_money returns the total prize money formatted as "$12,345", or None if the additional
    /// data does not carry it.
    pub fn prize_money(&self) -> Option<String> {
        let total = self
            .revealed_race_info()?
            .get("prizemonies")?
            .get("total_value")?
            .as_f64()?;

        if total <= 0.0 {
            return None;
        }
        Some(format!("${}", group_thousands(total.round() as u64)))
    }

    /// surface returns the track surface in display terms, turf being the default.
    pub fn surface(&self) -> String {
        let surface = self
            .revealed_race_info()
            .and_then(|info| info.get("track_surface")?.as_str().map(str::to_owned));

        match surface.as_deref() {
            Some("Turf") => "Grass".to_owned(),
            Some("All Weather") => "Synthetic".to_owned(),
            Some(other) => other.to_owned(),
            None => "Turf".to_owned(),
        }
    }

    fn revealed_race_info(&self) -> Option<serde_json::Value> {
        let raw = self.race_form.additional_data.as_deref()?;
        let mut data: serde_json::Value = serde_json::from_str(raw).ok()?;
        Some(data.get_mut("revealed_race_info")?.take())
    }
}

fn t_last(t: &str) -> char {
    t.chars().last().unwrap_or_default()
}

fn group_thousands(val: u64) -> String {
    let digits = val.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
