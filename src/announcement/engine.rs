use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, info_span, trace};

use super::crossing::{next_crossing_state, next_emergency_state};
use super::prediction::{PredictionWindow, current_position, predict_crossing};
use super::utterance::{Detail, crossing_utterance, emergency_utterance};
use super::{Announcement, AnnouncementKind};
use crate::dispatcher::Announcer;
use crate::geometry::{GeoPoint, LookAngles, look_angles};
use crate::registry::TrackRegistry;
use crate::sbs::{SbsMessage, parse_sbs_message};
use crate::track::{AircraftTrack, AnnouncementState, Emergency};

/// When a crossing is announced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossingMode {
    /// As soon as an update shows the aircraft at or above the threshold
    Immediate,
    /// At the extrapolated crossing instant, if it falls inside the window
    Predictive(PredictionWindow),
}

#[derive(Debug, Clone)]
pub struct DecisionConfig {
    pub observer: GeoPoint,
    /// Elevation threshold in degrees; may be negative
    pub threshold_deg: f64,
    pub mode: CrossingMode,
    /// Treat squawk 7600 as an emergency
    pub radio_failure: bool,
    pub detail: Detail,
    /// Suppress a re-crossing announced again within this interval; zero disables
    pub repeat_interval: Duration,
    /// Evict tracks not updated within this long
    pub max_age: Duration,
}

impl DecisionConfig {
    pub fn new(observer: GeoPoint) -> Self {
        Self {
            observer,
            threshold_deg: 45.0,
            mode: CrossingMode::Immediate,
            radio_failure: false,
            detail: Detail::default(),
            repeat_interval: Duration::zero(),
            max_age: Duration::seconds(300),
        }
    }
}

/// Merges SBS messages into tracks and decides what to announce
///
/// Every produced announcement is handed to the announcer and also returned
/// to the caller.
pub struct AnnouncementEngine<A: Announcer> {
    config: DecisionConfig,
    registry: TrackRegistry,
    announcer: A,
}

impl<A: Announcer> AnnouncementEngine<A> {
    pub fn new(config: DecisionConfig, announcer: A) -> Self {
        Self {
            config,
            registry: TrackRegistry::new(),
            announcer,
        }
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    pub fn registry(&self) -> &TrackRegistry {
        &self.registry
    }

    pub fn announcer(&self) -> &A {
        &self.announcer
    }

    /// Give back the announcer, e.g. to drain a speech queue
    pub fn into_announcer(self) -> A {
        self.announcer
    }

    /// Parse one raw feed line and process it. Malformed lines are dropped.
    pub fn process_line(&self, line: &str, now: DateTime<Utc>) -> Vec<Announcement> {
        if line.trim().is_empty() {
            return Vec::new();
        }

        match parse_sbs_message(line) {
            Ok(msg) => {
                metrics::counter!("overhead.sbs.parsed_total").increment(1);
                self.process_message(&msg, now)
            }
            Err(e) => {
                debug!("Dropping line {:?}: {}", line.trim_end(), e);
                metrics::counter!("overhead.sbs.parse_failed_total").increment(1);
                Vec::new()
            }
        }
    }

    /// Merge a message and evaluate both triggers for its aircraft
    pub fn process_message(&self, msg: &SbsMessage, now: DateTime<Utc>) -> Vec<Announcement> {
        let span = info_span!("aircraft", icao = %msg.aircraft_id);
        let _guard = span.enter();

        let announcements = {
            let mut track = self.registry.merge(msg, now);
            if track.is_position_complete() {
                self.evaluate(&mut track, now)
            } else {
                trace!("Position incomplete, pending");
                Vec::new()
            }
        };

        self.dispatch(&announcements);
        announcements
    }

    /// Fire scheduled crossings that have come due
    pub fn tick(&self, now: DateTime<Utc>) -> Vec<Announcement> {
        let mut announcements = Vec::new();

        self.registry.for_each_mut(|track| {
            let AnnouncementState::Scheduled { due } = track.announcement_state else {
                return;
            };
            if now < due {
                return;
            }

            let span = info_span!("aircraft", icao = %track.identifier);
            let _guard = span.enter();

            track.announcement_state = AnnouncementState::AnnouncedAhead;
            let Some(position) = current_position(track, now) else {
                return;
            };
            let angles = look_angles(&self.config.observer, &position);
            debug!(
                "Scheduled crossing due {} fired at elevation {:.1}",
                due, angles.elevation_deg
            );
            if self.record_crossing(track, now) {
                announcements.push(self.crossing_announcement(track, &angles, now));
            }
        });

        self.dispatch(&announcements);
        announcements
    }

    /// Evict tracks idle longer than `max_age`
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<String> {
        self.registry.sweep(now, self.config.max_age)
    }

    fn evaluate(&self, track: &mut AircraftTrack, now: DateTime<Utc>) -> Vec<Announcement> {
        let Some(position) = track.position() else {
            return Vec::new();
        };
        let angles = look_angles(&self.config.observer, &position);
        let threshold = self.config.threshold_deg;

        let predicted = match self.config.mode {
            CrossingMode::Predictive(ref window) if angles.elevation_deg < threshold => {
                predict_crossing(&self.config.observer, track, threshold, now, window)
            }
            _ => None,
        };

        let crossing = next_crossing_state(
            track.announcement_state,
            angles.elevation_deg,
            threshold,
            now,
            predicted,
        );
        if crossing.next != track.announcement_state {
            trace!(
                "Crossing state {:?} -> {:?} at elevation {:.1}",
                track.announcement_state, crossing.next, angles.elevation_deg
            );
        }
        track.announcement_state = crossing.next;
        let crossing_fires = crossing.fire && self.record_crossing(track, now);

        let emergency = next_emergency_state(
            track.emergency_announced,
            track.emergency(self.config.radio_failure),
        );
        if track.emergency_announced.is_some() && emergency.next.is_none() {
            info!("Emergency squawk cleared");
        }
        track.emergency_announced = emergency.next;

        match (emergency.fire, crossing_fires) {
            (Some(kind), _) => vec![self.emergency_announcement(track, kind, &angles, now)],
            (None, true) => vec![self.crossing_announcement(track, &angles, now)],
            (None, false) => Vec::new(),
        }
    }

    /// Note a crossing for repeat suppression; false if it should stay silent
    fn record_crossing(&self, track: &mut AircraftTrack, now: DateTime<Utc>) -> bool {
        let interval = self.config.repeat_interval;
        if interval > Duration::zero()
            && let Some(last) = track.last_crossing_announcement
            && now - last < interval
        {
            debug!("Re-crossing within {}s of last announcement, suppressed", interval.num_seconds());
            metrics::counter!("overhead.announcements.suppressed_total").increment(1);
            return false;
        }
        track.last_crossing_announcement = Some(now);
        true
    }

    fn crossing_announcement(
        &self,
        track: &AircraftTrack,
        angles: &LookAngles,
        now: DateTime<Utc>,
    ) -> Announcement {
        info!(
            "Crossing: {} at elevation {:.1}, bearing {:.0}",
            track, angles.elevation_deg, angles.bearing_deg
        );
        Announcement {
            identifier: track.identifier.clone(),
            callsign: track.callsign.clone(),
            kind: AnnouncementKind::Crossing,
            utterance: crossing_utterance(track, angles, self.config.detail),
            at: now,
        }
    }

    fn emergency_announcement(
        &self,
        track: &AircraftTrack,
        emergency: Emergency,
        angles: &LookAngles,
        now: DateTime<Utc>,
    ) -> Announcement {
        info!("Emergency: {} squawking {}", track, emergency);
        Announcement {
            identifier: track.identifier.clone(),
            callsign: track.callsign.clone(),
            kind: AnnouncementKind::Emergency(emergency),
            utterance: emergency_utterance(track, emergency, angles, self.config.detail),
            at: now,
        }
    }

    fn dispatch(&self, announcements: &[Announcement]) {
        for announcement in announcements {
            let kind = if announcement.is_emergency() {
                "emergency"
            } else {
                "crossing"
            };
            metrics::counter!("overhead.announcements_total", "kind" => kind).increment(1);
            self.announcer.announce(announcement.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Announcement>>);

    impl Announcer for Recorder {
        fn announce(&self, announcement: Announcement) {
            self.0.lock().unwrap().push(announcement);
        }
    }

    fn engine(threshold: f64) -> AnnouncementEngine<Recorder> {
        let mut config = DecisionConfig::new(GeoPoint::new(37.0, -122.0, 0.0));
        config.threshold_deg = threshold;
        AnnouncementEngine::new(config, Recorder::default())
    }

    fn position(lat: f64) -> String {
        format!("MSG,3,,,A1B2C3,,,,,,,5000,,,{lat},-122.0,,,0,0,0,0")
    }

    #[test]
    fn test_incomplete_track_is_pending() {
        let engine = engine(-90.0);
        let now = Utc::now();
        assert!(engine.process_line("MSG,1,,,A1B2C3,,,,,,SWA123,,,,,,,,0,0,0,0", now).is_empty());
        assert!(engine.process_line("MSG,5,,,A1B2C3,,,,,,,5000,,,,,,,0,0,0,0", now).is_empty());
        assert_eq!(engine.process_line(&position(36.9), now).len(), 1);
    }

    #[test]
    fn test_crossing_dispatches_once() {
        let engine = engine(45.0);
        let now = Utc::now();
        let mut total = 0;
        for lat in [36.95, 36.97, 36.985, 36.99, 36.995, 37.0, 37.01] {
            total += engine.process_line(&position(lat), now).len();
        }
        assert_eq!(total, 1);

        let recorded = engine.announcer().0.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].kind, AnnouncementKind::Crossing);
        assert!(recorded[0].utterance.starts_with("aircraft alfa one bravo two charlie tree"));
    }

    #[test]
    fn test_malformed_lines_are_dropped() {
        let engine = engine(45.0);
        let now = Utc::now();
        assert!(engine.process_line("garbage", now).is_empty());
        assert!(engine.process_line("", now).is_empty());
        assert!(engine.registry().is_empty());
    }

    #[test]
    fn test_emergency_wins_simultaneous_crossing() {
        let engine = engine(45.0);
        let now = Utc::now();
        engine.process_line("MSG,6,,,A1B2C3,,,,,,,,,,,,,7700,0,0,0,0", now);
        let out = engine.process_line(&position(36.995), now);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, AnnouncementKind::Emergency(Emergency::General));

        let track = engine.registry().get("A1B2C3").unwrap();
        assert_eq!(track.announcement_state, AnnouncementState::Announced);
    }

    #[test]
    fn test_repeat_interval_suppresses_recrossing() {
        let mut config = DecisionConfig::new(GeoPoint::new(37.0, -122.0, 0.0));
        config.repeat_interval = Duration::seconds(60);
        let engine = AnnouncementEngine::new(config, Recorder::default());
        let t0 = Utc::now();

        assert_eq!(engine.process_line(&position(36.995), t0).len(), 1);
        engine.process_line(&position(36.95), t0 + Duration::seconds(10));
        assert!(engine.process_line(&position(36.995), t0 + Duration::seconds(20)).is_empty());

        engine.process_line(&position(36.95), t0 + Duration::seconds(70));
        assert_eq!(engine.process_line(&position(36.995), t0 + Duration::seconds(80)).len(), 1);
    }
}
