pub mod crossing;
pub mod engine;
pub mod prediction;
pub mod utterance;

use chrono::{DateTime, Utc};

use crate::track::Emergency;

pub use crossing::{CrossingTransition, EmergencyTransition, next_crossing_state, next_emergency_state};
pub use engine::{AnnouncementEngine, CrossingMode, DecisionConfig};
pub use prediction::{PredictionWindow, predict_crossing};
pub use utterance::Detail;

/// What triggered an announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnouncementKind {
    Crossing,
    Emergency(Emergency),
}

/// A single thing to say about a single aircraft
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    pub identifier: String,
    pub callsign: Option<String>,
    pub kind: AnnouncementKind,
    pub utterance: String,
    pub at: DateTime<Utc>,
}

impl Announcement {
    pub fn is_emergency(&self) -> bool {
        matches!(self.kind, AnnouncementKind::Emergency(_))
    }
}

impl std::fmt::Display for Announcement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.identifier, self.utterance)
    }
}
