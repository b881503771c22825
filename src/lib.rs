//! overhead - speaks up when aircraft pass overhead
//!
//! Reads an ADS-B BaseStation (SBS) feed, merges the sparse messages into
//! per-aircraft tracks, and announces aircraft that climb above a chosen
//! elevation angle or squawk an emergency code.

pub mod announcement;
pub mod clock;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod geometry;
pub mod live;
pub mod log_format;
pub mod registry;
pub mod sbs;
pub mod track;

pub use announcement::{Announcement, AnnouncementEngine, AnnouncementKind, DecisionConfig};
pub use dispatcher::{Announcer, LogAnnouncer, SpeechDispatcher};
pub use registry::TrackRegistry;
pub use track::AircraftTrack;
