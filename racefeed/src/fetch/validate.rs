use crate::core::race::{Race, RaceForm, Venue};
use crate::errors::FeedError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, warn};

/// Rejection is the reason why a single race of a batch was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    MissingRaceId,
    MissingMeetingName,
    MissingCategoryId,
    MissingAdvertisedStart,
    InvalidAdvertisedStart(String),
    Undecodable(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Rejection::MissingRaceId => write!(f, "race_id is missing or empty"),
            Rejection::MissingMeetingName => write!(f, "meeting_name is missing or empty"),
            Rejection::MissingCategoryId => write!(f, "category_id is missing or empty"),
            Rejection::MissingAdvertisedStart => write!(f, "advertised_start.seconds is missing"),
            Rejection::InvalidAdvertisedStart(raw) => {
                write!(f, "advertised_start.seconds {} is not a valid instant", raw)
            }
            Rejection::Undecodable(e) => write!(f, "race could not be decoded: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRace {
    pub listed_id: String,
    pub reason: Rejection,
}

/// ValidatedBatch is the outcome of normalizing one upstream response.
///
/// * `races` - Accepted races in the order of `next_to_go_ids`
/// * `rejected` - Races that were present but failed validation
/// * `missing_ids` - Ids listed in `next_to_go_ids` without an entry in `race_summaries`
/// * `batch_size` - Number of ids listed in `next_to_go_ids`
#[derive(Debug, Clone, Default)]
pub struct ValidatedBatch {
    pub races: Vec<Race>,
    pub rejected: Vec<RejectedRace>,
    pub missing_ids: Vec<String>,
    pub batch_size: usize,
}

impl ValidatedBatch {
    pub fn has_warnings(&self) -> bool {
        !self.rejected.is_empty() || !self.missing_ids.is_empty()
    }
}

/// LooseNumber accepts numbers the API sometimes sends as strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum LooseNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

impl LooseNumber {
    fn as_i64(&self) -> Option<i64> {
        match self {
            LooseNumber::Int(v) => Some(*v),
            LooseNumber::Float(v) if v.is_finite() => Some(v.trunc() as i64),
            LooseNumber::Float(_) => None,
            LooseNumber::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v as i64))
            }
        }
    }

    fn raw(&self) -> String {
        match self {
            LooseNumber::Int(v) => v.to_string(),
            LooseNumber::Float(v) => v.to_string(),
            LooseNumber::Text(s) => format!("{:?}", s),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStart {
    seconds: Option<LooseNumber>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRace {
    race_id: Option<String>,
    race_name: Option<String>,
    race_number: Option<LooseNumber>,
    meeting_id: Option<String>,
    meeting_name: Option<String>,
    category_id: Option<String>,
    advertised_start: Option<RawStart>,
    race_form: Option<Value>,
    venue_id: Option<String>,
    venue_name: Option<String>,
    venue_state: Option<String>,
    venue_country: Option<String>,
}

fn non_empty(field: Option<String>) -> Option<String> {
    field
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

/// validate_race decodes a single race summary and checks the fields the lifecycle depends on.
pub fn validate_race(raw: &Value) -> Result<Race, Rejection> {
    let raw: RawRace =
        RawRace::deserialize(raw).map_err(|e| Rejection::Undecodable(e.to_string()))?;

    let race_id = non_empty(raw.race_id).ok_or(Rejection::MissingRaceId)?;
    let meeting_name = non_empty(raw.meeting_name).ok_or(Rejection::MissingMeetingName)?;
    let category_id = non_empty(raw.category_id).ok_or(Rejection::MissingCategoryId)?;

    let seconds = raw
        .advertised_start
        .and_then(|start| start.seconds)
        .ok_or(Rejection::MissingAdvertisedStart)?;
    let advertised_start = seconds
        .as_i64()
        .filter(|&secs| secs > 0)
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .ok_or_else(|| Rejection::InvalidAdvertisedStart(seconds.raw()))?;

    let race_number = raw
        .race_number
        .and_then(|n| n.as_i64())
        .and_then(|n| u32::try_from(n).ok());

    // display-only data must never cost us the race
    let race_form = match raw.race_form {
        Some(form) => RaceForm::deserialize(&form).unwrap_or_else(|e| {
            debug!(race_id = %race_id, error = %e, "ignoring undecodable race form");
            RaceForm::default()
        }),
        None => RaceForm::default(),
    };

    Ok(Race {
        race_id,
        race_name: raw.race_name.unwrap_or_default(),
        race_number,
        meeting_id: raw.meeting_id.unwrap_or_default(),
        meeting_name,
        category_id,
        advertised_start,
        venue: Venue {
            id: raw.venue_id.unwrap_or_default(),
            name: raw.venue_name.unwrap_or_default(),
            state: raw.venue_state.unwrap_or_default(),
            country: raw.venue_country.unwrap_or_default(),
        },
        race_form,
    })
}

/// split_response extracts race_summaries and next_to_go_ids from the response body. The body is
/// either the full `{status, data, message}` envelope or just its data part.
pub fn split_response(body: &str) -> Result<(Map<String, Value>, Vec<String>), FeedError> {
    let mut root: Value = serde_json::from_str(body)
        .map_err(|e| FeedError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    let root_obj = root
        .as_object_mut()
        .ok_or_else(|| FeedError::MalformedResponse("response is not a JSON object".to_owned()))?;

    let mut data = match root_obj.remove("data") {
        Some(Value::Object(data)) => data,
        Some(_) => {
            return Err(FeedError::MalformedResponse(
                "data is not an object".to_owned(),
            ))
        }
        None if root_obj.contains_key("race_summaries")
            || root_obj.contains_key("next_to_go_ids") =>
        {
            std::mem::take(root_obj)
        }
        None => return Err(FeedError::MalformedResponse("missing data".to_owned())),
    };

    let summaries = match data.remove("race_summaries") {
        Some(Value::Object(summaries)) => summaries,
        _ => {
            return Err(FeedError::MalformedResponse(
                "missing race_summaries".to_owned(),
            ))
        }
    };

    let listed = match data.remove("next_to_go_ids") {
        Some(Value::Array(listed)) => listed,
        _ => {
            return Err(FeedError::MalformedResponse(
                "missing next_to_go_ids".to_owned(),
            ))
        }
    };

    let mut ids = Vec::with_capacity(listed.len());

    for id in listed {
        match id {
            Value::String(id) => ids.push(id),
            other => warn!(id = %other, "ignoring non-string entry in next_to_go_ids"),
        }
    }

    Ok((summaries, ids))
}

/// normalize_batch validates every listed race. Ids without a summary and invalid races are
/// dropped with a warning, they never fail the batch.
pub fn normalize_batch(summaries: &Map<String, Value>, ids: &[String]) -> ValidatedBatch {
    let mut batch = ValidatedBatch {
        races: Vec::with_capacity(ids.len()),
        batch_size: ids.len(),
        ..Default::default()
    };

    for race_id in ids.iter() {
        let raw = match summaries.get(race_id) {
            Some(raw) => raw,
            None => {
                warn!(race_id = %race_id, available = summaries.len(), "race data missing for listed id");
                batch.missing_ids.push(race_id.to_owned());
                continue;
            }
        };

        match validate_race(raw) {
            Ok(race) => batch.races.push(race),
            Err(reason) => {
                warn!(race_id = %race_id, reason = %reason, "invalid race data");
                batch.rejected.push(RejectedRace {
                    listed_id: race_id.to_owned(),
                    reason,
                });
            }
        }
    }

    if batch.has_warnings() {
        warn!(
            accepted = batch.races.len(),
            rejected = batch.rejected.len(),
            missing = batch.missing_ids.len(),
            "race batch contained invalid entries"
        );
    }

    batch
}

/// validate_response turns a response body into a validated batch. A batch without a single valid
/// race is an error.
pub fn validate_response(body: &str) -> Result<ValidatedBatch, FeedError> {
    let (summaries, ids) = split_response(body)?;
    let batch = normalize_batch(&summaries, &ids);

    if batch.races.is_empty() {
        warn!(batch_size = batch.batch_size, "no valid races found after processing");
        return Err(FeedError::NoValidData {
            batch_size: batch.batch_size,
            rejected: batch.rejected.len() + batch.missing_ids.len(),
        });
    }

    Ok(batch)
}
