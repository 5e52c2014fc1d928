use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// (ms) A race is expired once it started more than this long ago.
pub const EXPIRE_THRESHOLD_MS: i64 = 60_000;
/// (ms) Final window before the advertised start.
pub const CRITICAL_THRESHOLD_MS: i64 = 60_000;
/// (ms) Window before the advertised start in which a race is starting soon.
pub const STARTING_SOON_THRESHOLD_MS: i64 = 300_000;

/// (s) Expire threshold in whole seconds, used for the repository's second-resolution checks.
pub const EXPIRE_THRESHOLD_S: i64 = EXPIRE_THRESHOLD_MS / 1000;
/// (s) Starting-soon window in whole seconds.
pub const STARTING_SOON_THRESHOLD_S: i64 = STARTING_SOON_THRESHOLD_MS / 1000;

/// RaceStatus is the temporal status of a race relative to its advertised start. It is never
/// stored with a race but always derived from `(advertised_start, now)`.
///
/// * `Upcoming` -> 300s or more before start
/// * `StartingSoon` -> [60s, 300s) before start
/// * `Critical` -> [0s, 60s) before start, includes the exact start instant
/// * `Started` -> up to 60s after start, includes exactly 60s after start
/// * `Expired` -> more than 60s after start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RaceStatus {
    Upcoming,
    StartingSoon,
    Critical,
    Started,
    Expired,
}

impl RaceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RaceStatus::Upcoming => "upcoming",
            RaceStatus::StartingSoon => "starting-soon",
            RaceStatus::Critical => "critical",
            RaceStatus::Started => "started",
            RaceStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for RaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// classify_delta maps the signed time until start (ms, negative once started) to a status. The
/// five ranges partition the whole i64 line.
pub fn classify_delta(delta_ms: i64) -> RaceStatus {
    if delta_ms < -EXPIRE_THRESHOLD_MS {
        RaceStatus::Expired
    } else if delta_ms < 0 {
        RaceStatus::Started
    } else if delta_ms < CRITICAL_THRESHOLD_MS {
        RaceStatus::Critical
    } else if delta_ms < STARTING_SOON_THRESHOLD_MS {
        RaceStatus::StartingSoon
    } else {
        RaceStatus::Upcoming
    }
}

/// classify returns the status of a race starting at start_time as seen at now.
pub fn classify(start_time: DateTime<Utc>, now: DateTime<Utc>) -> RaceStatus {
    classify_delta(delta_ms(start_time, now))
}

/// delta_ms returns the signed number of milliseconds from now until start_time.
pub fn delta_ms(start_time: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    start_time
        .signed_duration_since(now)
        .num_milliseconds()
}
