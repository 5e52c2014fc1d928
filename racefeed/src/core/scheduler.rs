use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// TimerId names every recurring timer the feed can own. Countdown timers are keyed by race id such
/// that a race can never hold more than one of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerId {
    Refresh,
    ExpirationSweep,
    FrequentSweep,
    Countdown(String),
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TimerId::Refresh => write!(f, "refresh"),
            TimerId::ExpirationSweep => write!(f, "expiration-sweep"),
            TimerId::FrequentSweep => write!(f, "frequent-sweep"),
            TimerId::Countdown(race_id) => write!(f, "countdown:{}", race_id),
        }
    }
}

#[derive(Debug, Clone)]
struct Timer {
    period: Duration,
    next_due: Instant,
}

/// Scheduler owns all named, cancellable timers. It does not sleep by itself: the owner asks for
/// the next deadline, waits until then and collects the due timers. Missed periods are skipped
/// instead of being fired in a burst.
#[derive(Debug, Default)]
pub struct Scheduler {
    timers: HashMap<TimerId, Timer>,
}

impl Scheduler {
    pub fn new() -> Scheduler {
        Scheduler::default()
    }

    /// register adds a recurring timer that fires first at first_due and then every period. A
    /// timer that is already registered under the same id is left untouched and false is returned.
    pub fn register(&mut self, id: TimerId, period: Duration, first_due: Instant) -> bool {
        if self.timers.contains_key(&id) {
            return false;
        }

        // a zero period would make the timer due forever
        let period = period.max(Duration::from_millis(1));

        self.timers.insert(
            id,
            Timer {
                period,
                next_due: first_due,
            },
        );
        true
    }

    /// cancel removes the timer immediately. Once it returns, the timer is never reported as due
    /// again, not even from a batch that was collected before.
    pub fn cancel(&mut self, id: &TimerId) -> bool {
        self.timers.remove(id).is_some()
    }

    pub fn is_registered(&self, id: &TimerId) -> bool {
        self.timers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// clear cancels every timer.
    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|timer| timer.next_due).min()
    }

    /// take_due returns the ids of all timers due at now, ordered by due time (ties by id), and
    /// advances each of them to its next period after now.
    pub fn take_due(&mut self, now: Instant) -> Vec<TimerId> {
        let mut due: Vec<(Instant, TimerId)> = Vec::new();

        for (id, timer) in self.timers.iter_mut() {
            if timer.next_due > now {
                continue;
            }

            due.push((timer.next_due, id.to_owned()));

            // skip missed periods, restart from now if the skip does not fit into an Instant
            let behind = now.duration_since(timer.next_due);
            let periods = behind.as_nanos() / timer.period.as_nanos() + 1;
            let next_due = u32::try_from(periods)
                .ok()
                .and_then(|periods| timer.period.checked_mul(periods))
                .and_then(|skip| timer.next_due.checked_add(skip));
            timer.next_due = next_due.unwrap_or(now + timer.period);
        }

        due.sort();
        due.into_iter().map(|(_, id)| id).collect()
    }
}
