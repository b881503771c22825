//! Pure trigger transitions
//!
//! Both functions take the current state and the latest observation and return
//! the next state plus whether to announce. They never look at the clock or the
//! registry, so every edge can be tested directly.

use chrono::{DateTime, Utc};

use crate::track::{AnnouncementState, Emergency};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossingTransition {
    pub next: AnnouncementState,
    pub fire: bool,
}

impl CrossingTransition {
    fn stay(next: AnnouncementState) -> Self {
        Self { next, fire: false }
    }

    fn fire(next: AnnouncementState) -> Self {
        Self { next, fire: true }
    }
}

/// Advance the angle-crossing trigger.
///
/// `predicted` is the extrapolated instant the elevation reaches the
/// threshold, only ever `Some` in wait mode. An elevation equal to the
/// threshold counts as a crossing.
///
/// A crossing announced on prediction alone stays announced while the
/// aircraft is still predicted to reach the threshold, and only becomes an
/// ordinary announced pass once a report shows it at or above. A late report
/// just under the threshold therefore cannot re-arm the trigger mid-pass.
pub fn next_crossing_state(
    current: AnnouncementState,
    elevation_deg: f64,
    threshold_deg: f64,
    now: DateTime<Utc>,
    predicted: Option<DateTime<Utc>>,
) -> CrossingTransition {
    let above = elevation_deg >= threshold_deg;

    match current {
        AnnouncementState::Unseen | AnnouncementState::BelowThreshold => {
            if above {
                return CrossingTransition::fire(AnnouncementState::Announced);
            }
            schedule(predicted, now)
        }
        AnnouncementState::Scheduled { due } => {
            if above {
                return CrossingTransition::fire(AnnouncementState::Announced);
            }
            if now >= due {
                return CrossingTransition::fire(AnnouncementState::AnnouncedAhead);
            }
            schedule(predicted, now)
        }
        AnnouncementState::AnnouncedAhead => {
            if above {
                CrossingTransition::stay(AnnouncementState::Announced)
            } else if predicted.is_some() {
                CrossingTransition::stay(AnnouncementState::AnnouncedAhead)
            } else {
                CrossingTransition::stay(AnnouncementState::BelowThreshold)
            }
        }
        AnnouncementState::Announced => {
            if above {
                CrossingTransition::stay(AnnouncementState::Announced)
            } else {
                CrossingTransition::stay(AnnouncementState::BelowThreshold)
            }
        }
    }
}

fn schedule(predicted: Option<DateTime<Utc>>, now: DateTime<Utc>) -> CrossingTransition {
    match predicted {
        Some(due) if due <= now => CrossingTransition::fire(AnnouncementState::AnnouncedAhead),
        Some(due) => CrossingTransition::stay(AnnouncementState::Scheduled { due }),
        None => CrossingTransition::stay(AnnouncementState::BelowThreshold),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmergencyTransition {
    /// Emergency recorded as announced for the current period
    pub next: Option<Emergency>,
    /// Emergency to announce now
    pub fire: Option<Emergency>,
}

/// Advance the emergency trigger.
///
/// A new or changed emergency squawk fires once; a non-emergency squawk ends
/// the period so the next onset fires again.
pub fn next_emergency_state(
    announced: Option<Emergency>,
    current: Option<Emergency>,
) -> EmergencyTransition {
    match current {
        Some(emergency) if announced != Some(emergency) => EmergencyTransition {
            next: Some(emergency),
            fire: Some(emergency),
        },
        Some(emergency) => EmergencyTransition {
            next: Some(emergency),
            fire: None,
        },
        None => EmergencyTransition {
            next: None,
            fire: None,
        },
    }
}
