//! Time source for the run loop
//!
//! Live feeds use arrival time. Replays can use the generation time carried in
//! each SBS message instead, so prediction and eviction behave as they did
//! when the feed was recorded. BaseStation timestamps are local time.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedClock {
    Wall,
    /// Driven by message timestamps; never runs backwards
    Message { last: Option<DateTime<Utc>> },
}

impl FeedClock {
    pub fn new(message_clock: bool) -> Self {
        if message_clock {
            FeedClock::Message { last: None }
        } else {
            FeedClock::Wall
        }
    }

    pub fn is_message_clock(&self) -> bool {
        matches!(self, FeedClock::Message { .. })
    }

    /// Current time without new input
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            FeedClock::Wall => Utc::now(),
            FeedClock::Message { last } => last.unwrap_or_else(Utc::now),
        }
    }

    /// Time for a message generated at `generated_at` (local time)
    pub fn observe(&mut self, generated_at: Option<NaiveDateTime>) -> DateTime<Utc> {
        match self {
            FeedClock::Wall => Utc::now(),
            FeedClock::Message { last } => {
                let stamped = generated_at.and_then(local_to_utc);
                let now = match (stamped, *last) {
                    (Some(t), Some(prev)) if t < prev => {
                        trace!("Message time {} is behind clock {}, holding", t, prev);
                        prev
                    }
                    (Some(t), _) => t,
                    (None, Some(prev)) => prev,
                    (None, None) => Utc::now(),
                };
                *last = Some(now);
                now
            }
        }
    }
}

fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_message_clock_follows_messages() {
        let mut clock = FeedClock::new(true);
        let t1 = clock.observe(Some(at(12, 0, 0)));
        let t2 = clock.observe(Some(at(12, 0, 5)));
        assert_eq!(t2 - t1, Duration::seconds(5));
        assert_eq!(clock.now(), t2);
    }

    #[test]
    fn test_message_clock_never_goes_backwards() {
        let mut clock = FeedClock::new(true);
        let t1 = clock.observe(Some(at(12, 0, 5)));
        assert_eq!(clock.observe(Some(at(12, 0, 0))), t1);
        assert_eq!(clock.observe(None), t1);
    }

    #[test]
    fn test_wall_clock_ignores_messages() {
        let mut clock = FeedClock::new(false);
        let before = Utc::now();
        let t = clock.observe(Some(at(1, 0, 0)));
        assert!(t >= before);
        assert!(!clock.is_message_clock());
    }
}
