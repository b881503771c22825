//! Shared helpers for scripted-feed integration tests
//!
//! `Script` builds BaseStation lines for one aircraft the way dump1090 emits
//! them (22 columns, data spread over MSG,1 / MSG,3 / MSG,4 / MSG,6), and
//! `RecordingAnnouncer` keeps every announcement the engine dispatches.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use overhead::announcement::{
    Announcement, AnnouncementEngine, AnnouncementKind, CrossingMode, DecisionConfig,
};
use overhead::dispatcher::Announcer;
use overhead::geometry::GeoPoint;
use std::sync::{Arc, Mutex};

pub const ICAO: &str = "A1B2C3";

/// Observer on the ground at 37N 122W; the scripted aircraft flies north
/// along 122W at 5000 ft and passes directly overhead at 37.0.
pub fn observer() -> GeoPoint {
    GeoPoint::new(37.0, -122.0, 0.0)
}

/// Latitudes of the overflight with elevations of roughly
/// 15, 25, 42, 54, 70, 90, 54, 34 and 19 degrees
pub const OVERFLIGHT: [f64; 9] = [
    36.95, 36.97, 36.985, 36.99, 36.995, 37.0, 37.01, 37.02, 37.04,
];

const STAMP: &str = "2024/06/01,12:00:00.000,2024/06/01,12:00:00.000";

pub fn callsign_line(icao: &str, callsign: &str) -> String {
    format!("MSG,1,1,1,{icao},1,{STAMP},{callsign},,,,,,,,,,,")
}

pub fn position_line(icao: &str, latitude: f64, altitude_ft: i32) -> String {
    format!("MSG,3,1,1,{icao},1,{STAMP},,{altitude_ft},,,{latitude},-122.0,,,0,0,0,0")
}

pub fn velocity_line(icao: &str, ground_speed_kt: f64, track_deg: f64, vertical_rate: i32) -> String {
    format!("MSG,4,1,1,{icao},1,{STAMP},,,{ground_speed_kt},{track_deg},,,{vertical_rate},,0,0,0,0")
}

pub fn squawk_line(icao: &str, squawk: &str) -> String {
    format!("MSG,6,1,1,{icao},1,{STAMP},,,,,,,,{squawk},0,0,0,0")
}

/// The reference fixture: identification, squawk, then the overflight
pub fn overflight_script(squawk: &str) -> Vec<String> {
    let mut lines = vec![
        callsign_line(ICAO, "SWA123"),
        squawk_line(ICAO, squawk),
    ];
    lines.extend(OVERFLIGHT.iter().map(|&lat| position_line(ICAO, lat, 5000)));
    lines
}

#[derive(Debug, Default)]
pub struct RecordingAnnouncer {
    announcements: Mutex<Vec<Announcement>>,
}

impl RecordingAnnouncer {
    pub fn announcements(&self) -> Vec<Announcement> {
        self.announcements.lock().unwrap().clone()
    }

    pub fn count(&self, kind: AnnouncementKind) -> usize {
        self.announcements
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.kind == kind)
            .count()
    }

    pub fn crossings(&self) -> usize {
        self.count(AnnouncementKind::Crossing)
    }

    pub fn emergencies(&self) -> usize {
        self.announcements
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.is_emergency())
            .count()
    }
}

impl Announcer for RecordingAnnouncer {
    fn announce(&self, announcement: Announcement) {
        self.announcements.lock().unwrap().push(announcement);
    }
}

pub fn config(threshold_deg: f64) -> DecisionConfig {
    let mut config = DecisionConfig::new(observer());
    config.threshold_deg = threshold_deg;
    config
}

pub fn recording_engine(config: DecisionConfig) -> (AnnouncementEngine<Arc<RecordingAnnouncer>>, Arc<RecordingAnnouncer>) {
    let recorder = Arc::new(RecordingAnnouncer::default());
    (AnnouncementEngine::new(config, recorder.clone()), recorder)
}

/// Feed lines one second apart starting at `start`; returns how many
/// announcements each line produced
pub fn play<A: Announcer>(
    engine: &AnnouncementEngine<A>,
    lines: &[String],
    start: DateTime<Utc>,
) -> Vec<usize> {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| engine.process_line(line, start + Duration::seconds(i as i64)).len())
        .collect()
}

pub fn is_predictive(config: &DecisionConfig) -> bool {
    matches!(config.mode, CrossingMode::Predictive(_))
}
