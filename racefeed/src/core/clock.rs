use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Clock provides the wall time all status decisions are based on.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// InstantClock is a wall clock anchored at a fixed instant that advances with the runtime's
/// monotonic clock. With a paused tokio clock it advances only when the runtime's time does, which
/// makes timer-driven behavior reproducible.
#[derive(Debug, Clone, Copy)]
pub struct InstantClock {
    anchor_wall: DateTime<Utc>,
    anchor_instant: Instant,
}

impl InstantClock {
    pub fn new(anchor_wall: DateTime<Utc>) -> InstantClock {
        InstantClock {
            anchor_wall,
            anchor_instant: Instant::now(),
        }
    }
}

impl Clock for InstantClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.anchor_instant.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.anchor_wall + elapsed
    }
}
