//! Per-aircraft merged state
//!
//! SBS sends callsign, position, velocity and squawk in separate message types.
//! An `AircraftTrack` accumulates them: a field is only ever overwritten by a
//! newer value, never cleared by a message that does not carry it.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::geometry::GeoPoint;
use crate::sbs::SbsMessage;

/// Mode-A transponder code, four octal digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Squawk(u16);

impl Squawk {
    /// Parse a squawk column; anything but exactly four octal digits is `None`
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.len() != 4 || !raw.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
            return None;
        }
        raw.parse().ok().map(Squawk)
    }

    /// The code as written, e.g. 7700
    pub fn code(&self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for Squawk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// Internationally reserved distress squawks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emergency {
    /// 7500
    Hijack,
    /// 7600, only when radio failure reporting is enabled
    RadioFailure,
    /// 7700
    General,
}

impl Emergency {
    pub fn from_squawk(squawk: Squawk, include_radio_failure: bool) -> Option<Self> {
        match squawk.code() {
            7500 => Some(Emergency::Hijack),
            7600 if include_radio_failure => Some(Emergency::RadioFailure),
            7700 => Some(Emergency::General),
            _ => None,
        }
    }

    /// Word used in announcements
    pub fn spoken(&self) -> &'static str {
        match self {
            Emergency::Hijack => "hijacked",
            Emergency::RadioFailure => "nordo",
            Emergency::General => "emergency",
        }
    }
}

impl std::fmt::Display for Emergency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Emergency::Hijack => write!(f, "hijack"),
            Emergency::RadioFailure => write!(f, "radio failure"),
            Emergency::General => write!(f, "general emergency"),
        }
    }
}

/// Angle-crossing state of one aircraft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnnouncementState {
    /// No complete position evaluated yet
    #[default]
    Unseen,
    /// Elevation below the threshold, trigger armed
    BelowThreshold,
    /// Still below, but predicted to cross; announce at `due` (wait mode only)
    Scheduled { due: DateTime<Utc> },
    /// Announced at the predicted instant, no report at or above the
    /// threshold yet
    AnnouncedAhead,
    /// Announced for the current above-threshold span
    Announced,
}

/// Ground speed, track and climb used for extrapolation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    pub ground_speed_kt: f64,
    pub track_deg: f64,
    pub vertical_rate_fpm: f64,
}

/// Merged state of a single aircraft
#[derive(Debug, Clone)]
pub struct AircraftTrack {
    /// ICAO hex address, upper case
    pub identifier: String,
    pub callsign: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// When latitude/longitude were last updated (extrapolation origin)
    pub position_time: Option<DateTime<Utc>>,
    pub altitude_ft: Option<i32>,
    pub squawk: Option<Squawk>,
    pub ground_speed_kt: Option<f64>,
    pub track_deg: Option<f64>,
    pub vertical_rate_fpm: Option<i32>,
    pub on_ground: Option<bool>,

    pub first_seen: DateTime<Utc>,
    pub last_update_time: DateTime<Utc>,
    pub message_count: u64,

    pub announcement_state: AnnouncementState,
    /// Emergency already announced for the current emergency period
    pub emergency_announced: Option<Emergency>,
    pub last_crossing_announcement: Option<DateTime<Utc>>,
}

impl AircraftTrack {
    pub fn new(identifier: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            identifier: identifier.into(),
            callsign: None,
            latitude: None,
            longitude: None,
            position_time: None,
            altitude_ft: None,
            squawk: None,
            ground_speed_kt: None,
            track_deg: None,
            vertical_rate_fpm: None,
            on_ground: None,
            first_seen: timestamp,
            last_update_time: timestamp,
            message_count: 0,
            announcement_state: AnnouncementState::Unseen,
            emergency_announced: None,
            last_crossing_announcement: None,
        }
    }

    /// Overwrite every field the message carries; leave the rest alone
    pub fn apply(&mut self, msg: &SbsMessage, timestamp: DateTime<Utc>) {
        if let Some(ref callsign) = msg.callsign {
            self.callsign = Some(callsign.clone());
        }

        if let (Some(lat), Some(lon)) = (msg.latitude, msg.longitude) {
            if is_valid_position(lat, lon) {
                self.latitude = Some(lat);
                self.longitude = Some(lon);
                self.position_time = Some(timestamp);
            } else {
                debug!("Ignoring invalid position {:.5},{:.5}", lat, lon);
                metrics::counter!("overhead.track.invalid_position_total").increment(1);
            }
        }

        if let Some(altitude) = msg.altitude {
            self.altitude_ft = Some(altitude);
        }
        if let Some(squawk) = msg.squawk {
            self.squawk = Some(squawk);
        }
        if let Some(speed) = msg.ground_speed {
            self.ground_speed_kt = Some(speed);
        }
        if let Some(track) = msg.track {
            self.track_deg = Some(track);
        }
        if let Some(rate) = msg.vertical_rate {
            self.vertical_rate_fpm = Some(rate);
        }
        if let Some(on_ground) = msg.on_ground {
            self.on_ground = Some(on_ground);
        }

        self.last_update_time = timestamp;
        self.message_count += 1;
    }

    /// Latitude, longitude and altitude are all known
    pub fn is_position_complete(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some() && self.altitude_ft.is_some()
    }

    pub fn position(&self) -> Option<GeoPoint> {
        Some(GeoPoint {
            latitude: self.latitude?,
            longitude: self.longitude?,
            altitude_ft: self.altitude_ft? as f64,
        })
    }

    /// Speed and track are required; a missing vertical rate counts as level
    pub fn kinematics(&self) -> Option<Kinematics> {
        Some(Kinematics {
            ground_speed_kt: self.ground_speed_kt?,
            track_deg: self.track_deg?,
            vertical_rate_fpm: self.vertical_rate_fpm.unwrap_or(0) as f64,
        })
    }

    pub fn emergency(&self, include_radio_failure: bool) -> Option<Emergency> {
        self.squawk
            .and_then(|squawk| Emergency::from_squawk(squawk, include_radio_failure))
    }

    pub fn emergency_flag(&self, include_radio_failure: bool) -> bool {
        self.emergency(include_radio_failure).is_some()
    }

    pub fn is_stale(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_update_time) > max_age
    }
}

impl std::fmt::Display for AircraftTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identifier)?;
        if let Some(ref cs) = self.callsign {
            write!(f, " ({cs})")?;
        }
        if let (Some(lat), Some(lon)) = (self.latitude, self.longitude) {
            write!(f, " pos={lat:.5},{lon:.5}")?;
        }
        if let Some(alt) = self.altitude_ft {
            write!(f, " alt={alt}ft")?;
        }
        if let Some(squawk) = self.squawk {
            write!(f, " squawk={squawk}")?;
        }
        Ok(())
    }
}

/// Reject (0, 0), which some decoders emit for an undecoded position, and out-of-range values
fn is_valid_position(latitude: f64, longitude: f64) -> bool {
    if latitude.abs() < 0.001 && longitude.abs() < 0.001 {
        return false;
    }
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}
