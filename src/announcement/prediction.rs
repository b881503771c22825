//! Short-horizon extrapolation for wait mode
//!
//! The aircraft is assumed to keep its ground track, ground speed and vertical
//! rate. Positions are sampled every `step` over the look-ahead window and the
//! first sample at or above the threshold is refined by linear interpolation
//! against the previous sample.

use chrono::{DateTime, Duration, Utc};

use crate::geometry::{
    GeoPoint, METERS_PER_SECOND_PER_KNOT, destination, look_angles,
};
use crate::track::{AircraftTrack, Kinematics};

/// Look-ahead window and sampling step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionWindow {
    pub look_ahead: Duration,
    pub step: Duration,
}

impl Default for PredictionWindow {
    fn default() -> Self {
        Self {
            look_ahead: Duration::seconds(5),
            step: Duration::milliseconds(500),
        }
    }
}

/// Position after `elapsed` seconds of straight flight
pub fn extrapolate(origin: &GeoPoint, kinematics: &Kinematics, elapsed_secs: f64) -> GeoPoint {
    let distance_m = kinematics.ground_speed_kt * METERS_PER_SECOND_PER_KNOT * elapsed_secs;
    let (latitude, longitude) = destination(
        origin.latitude,
        origin.longitude,
        kinematics.track_deg,
        distance_m,
    );
    GeoPoint {
        latitude,
        longitude,
        altitude_ft: origin.altitude_ft + kinematics.vertical_rate_fpm * elapsed_secs / 60.0,
    }
}

/// Best estimate of where the track is at `now`: the last position moved
/// forward by the time since it was received, when kinematics are known.
pub fn current_position(track: &AircraftTrack, now: DateTime<Utc>) -> Option<GeoPoint> {
    let origin = track.position()?;
    match (track.kinematics(), track.position_time) {
        (Some(kinematics), Some(position_time)) if now > position_time => {
            let elapsed = (now - position_time).num_milliseconds() as f64 / 1000.0;
            Some(extrapolate(&origin, &kinematics, elapsed))
        }
        _ => Some(origin),
    }
}

/// Predict the instant the track's elevation reaches `threshold_deg`.
///
/// Returns `None` without kinematics, or when the crossing is not reached
/// within `window.look_ahead` of `now`. Returns `now` if it already has.
pub fn predict_crossing(
    observer: &GeoPoint,
    track: &AircraftTrack,
    threshold_deg: f64,
    now: DateTime<Utc>,
    window: &PredictionWindow,
) -> Option<DateTime<Utc>> {
    let origin = track.position()?;
    let kinematics = track.kinematics()?;
    let base = track.position_time?;

    let step_ms = window.step.num_milliseconds();
    if step_ms <= 0 {
        return None;
    }
    let start_ms = (now - base).num_milliseconds().max(0);
    let end_ms = start_ms + window.look_ahead.num_milliseconds();

    let elevation_at = |offset_ms: i64| {
        let position = extrapolate(&origin, &kinematics, offset_ms as f64 / 1000.0);
        look_angles(observer, &position).elevation_deg
    };

    let mut prev_ms = start_ms;
    let mut prev_elevation = elevation_at(start_ms);
    if prev_elevation >= threshold_deg {
        return Some(now);
    }

    let mut offset_ms = start_ms;
    while offset_ms < end_ms {
        offset_ms = (offset_ms + step_ms).min(end_ms);
        let elevation = elevation_at(offset_ms);
        if elevation >= threshold_deg {
            let fraction = (threshold_deg - prev_elevation) / (elevation - prev_elevation);
            let crossing_ms = prev_ms + ((offset_ms - prev_ms) as f64 * fraction).round() as i64;
            return Some(base + Duration::milliseconds(crossing_ms));
        }
        prev_ms = offset_ms;
        prev_elevation = elevation;
    }

    None
}
