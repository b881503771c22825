//! Periodically redrawn table of tracked aircraft (`--live`)

use chrono::{DateTime, Utc};
use std::fmt;

use crate::geometry::{GeoPoint, METERS_PER_STATUTE_MILE, look_angles};
use crate::registry::TrackRegistry;
use crate::track::AircraftTrack;

/// Rows shown before the rest are summarised
pub const MAX_ROWS: usize = 30;

/// Tracks updated within the same bucket sort together by identifier, so the
/// table does not reshuffle on every message.
const AGE_BUCKET_SECS: i64 = 15;

/// Clear screen and home the cursor
pub const CLEAR_SCREEN: &str = "\x1b[H\x1b[J";

const HEADER: &str = "  ICAO  FLIGHT  SQWK       LAT        LON     ALT        VS  TRK   GS   BRG  ELEV    DIST    AGE";

/// One aircraft as shown in the table
#[derive(Debug, Clone, PartialEq)]
pub struct LiveRow {
    pub identifier: String,
    pub callsign: Option<String>,
    pub squawk: Option<String>,
    pub emergency: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude_ft: Option<i32>,
    pub vertical_rate_fpm: Option<i32>,
    pub track_deg: Option<f64>,
    pub ground_speed_kt: Option<f64>,
    pub bearing_deg: Option<f64>,
    pub elevation_deg: Option<f64>,
    pub distance_mi: Option<f64>,
    pub age_secs: i64,
}

impl LiveRow {
    fn from_track(
        track: &AircraftTrack,
        observer: &GeoPoint,
        radio_failure: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let angles = track
            .position()
            .map(|position| look_angles(observer, &position));
        Self {
            identifier: track.identifier.clone(),
            callsign: track.callsign.clone(),
            squawk: track.squawk.map(|squawk| squawk.to_string()),
            emergency: track.emergency_flag(radio_failure),
            latitude: track.latitude,
            longitude: track.longitude,
            altitude_ft: track.altitude_ft,
            vertical_rate_fpm: track.vertical_rate_fpm,
            track_deg: track.track_deg,
            ground_speed_kt: track.ground_speed_kt,
            bearing_deg: angles.map(|a| a.bearing_deg),
            elevation_deg: angles.map(|a| a.elevation_deg),
            distance_mi: angles.map(|a| a.range_m / METERS_PER_STATUTE_MILE),
            age_secs: (now - track.last_update_time).num_seconds().max(0),
        }
    }
}

/// Snapshot of the registry, ready to print
#[derive(Debug, Clone, PartialEq)]
pub struct LiveTable {
    pub rows: Vec<LiveRow>,
    /// Tracks left out past `MAX_ROWS`
    pub omitted: usize,
}

impl LiveTable {
    pub fn capture(
        registry: &TrackRegistry,
        observer: &GeoPoint,
        radio_failure: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let mut rows: Vec<LiveRow> = registry
            .snapshot()
            .iter()
            .map(|track| LiveRow::from_track(track, observer, radio_failure, now))
            .collect();
        rows.sort_by(|a, b| {
            (a.age_secs / AGE_BUCKET_SECS)
                .cmp(&(b.age_secs / AGE_BUCKET_SECS))
                .then_with(|| a.identifier.cmp(&b.identifier))
        });

        let omitted = rows.len().saturating_sub(MAX_ROWS);
        rows.truncate(MAX_ROWS);
        Self { rows, omitted }
    }
}

fn or_dash<T>(value: Option<T>, width: usize, f: impl FnOnce(T) -> String) -> String {
    match value {
        Some(value) => format!("{:>width$}", f(value), width = width),
        None => format!("{:>width$}", "-", width = width),
    }
}

impl fmt::Display for LiveRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let squawk = match (&self.squawk, self.emergency) {
            (Some(code), true) => format!("{code}!"),
            (Some(code), false) => code.clone(),
            (None, _) => "-".to_string(),
        };
        write!(
            f,
            "{:>6}  {:<7} {:>5} {} {} {} {} {} {} {} {} {} {:>5}s",
            self.identifier,
            self.callsign.as_deref().unwrap_or("-"),
            squawk,
            or_dash(self.latitude, 9, |v| format!("{v:+.5}")),
            or_dash(self.longitude, 10, |v| format!("{v:+.5}")),
            or_dash(self.altitude_ft, 7, |v| format!("{v}ft")),
            or_dash(self.vertical_rate_fpm, 9, |v| format!("{v:+}fpm")),
            or_dash(self.track_deg, 4, |v| format!("{v:.0}")),
            or_dash(self.ground_speed_kt, 4, |v| format!("{v:.0}")),
            or_dash(self.bearing_deg, 5, |v| format!("{v:.0}")),
            or_dash(self.elevation_deg, 5, |v| format!("{v:.0}")),
            or_dash(self.distance_mi, 7, |v| format!("{v:.1}mi")),
            self.age_secs,
        )
    }
}

impl fmt::Display for LiveTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{HEADER}")?;
        writeln!(f, "{}", "-".repeat(HEADER.len()))?;
        for row in &self.rows {
            writeln!(f, "{row}")?;
        }
        if self.omitted > 0 {
            writeln!(f, "...{} more omitted", self.omitted)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sbs::parse_sbs_message;
    use chrono::Duration;

    const OBSERVER: GeoPoint = GeoPoint {
        latitude: 37.0,
        longitude: -122.0,
        altitude_ft: 0.0,
    };

    fn merge(registry: &TrackRegistry, line: &str, at: DateTime<Utc>) {
        registry.merge(&parse_sbs_message(line).unwrap(), at);
    }

    #[test]
    fn test_rows_carry_geometry_and_flags() {
        let registry = TrackRegistry::new();
        let now = Utc::now();
        merge(&registry, "MSG,1,1,1,A1B2C3,1,,,,,SWA123,,,,,,,,0,0,0,0", now);
        merge(&registry, "MSG,3,1,1,A1B2C3,1,,,,,,5000,,,37.0,-122.0,,,0,0,0,0", now);
        merge(&registry, "MSG,6,1,1,A1B2C3,1,,,,,,,,,,,,7700,0,0,0,0", now);
        merge(&registry, "MSG,5,1,1,C0FFEE,1,,,,,,12000,,,,,,,0,0,0,0", now - Duration::seconds(40));

        let table = LiveTable::capture(&registry, &OBSERVER, false, now);
        assert_eq!(table.omitted, 0);
        assert_eq!(table.rows.len(), 2);

        let overhead = &table.rows[0];
        assert_eq!(overhead.identifier, "A1B2C3");
        assert!(overhead.emergency);
        assert_eq!(overhead.elevation_deg, Some(90.0));
        assert_eq!(overhead.distance_mi, Some(0.0));

        let partial = &table.rows[1];
        assert_eq!(partial.identifier, "C0FFEE");
        assert_eq!(partial.age_secs, 40);
        assert!(partial.elevation_deg.is_none());

        let text = table.to_string();
        assert!(text.starts_with(HEADER));
        assert!(text.contains("SWA123"));
        assert!(text.contains("7700!"));
        assert!(text.contains("12000ft"));
    }

    #[test]
    fn test_recent_tracks_first_and_overflow_summarised() {
        let registry = TrackRegistry::new();
        let now = Utc::now();
        for i in 0..(MAX_ROWS + 3) {
            let line = format!("MSG,5,1,1,{:06X},1,,,,,,9000,,,,,,,0,0,0,0", 0xA00000 + i);
            merge(&registry, &line, now - Duration::seconds(60));
        }
        merge(&registry, "MSG,5,1,1,FFFFFF,1,,,,,,9000,,,,,,,0,0,0,0", now);

        let table = LiveTable::capture(&registry, &OBSERVER, false, now);
        assert_eq!(table.rows.len(), MAX_ROWS);
        assert_eq!(table.omitted, 4);
        assert_eq!(table.rows[0].identifier, "FFFFFF");
        assert_eq!(table.rows[1].identifier, "A00000");
        assert!(table.to_string().ends_with("...4 more omitted\n"));
    }
}
