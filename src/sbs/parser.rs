use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::str::FromStr;
use tracing::debug;

use crate::track::Squawk;

/// Columns up to and including the squawk column (index 17).
/// dump1090 always emits 22, the trailing flag columns are optional here.
pub const MIN_FIELD_COUNT: usize = 18;

/// SBS message types (MSG,1 through MSG,8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbsMessageType {
    /// MSG,1: ES Identification and Category (callsign)
    EsIdentification = 1,
    /// MSG,2: ES Surface Position Message (surface position)
    EsSurfacePosition = 2,
    /// MSG,3: ES Airborne Position Message (altitude, lat/lon)
    EsAirbornePosition = 3,
    /// MSG,4: ES Airborne Velocity Message (speed, track, vertical rate)
    EsAirborneVelocity = 4,
    /// MSG,5: Surveillance Alt Message (altitude only)
    SurveillanceAlt = 5,
    /// MSG,6: Surveillance ID Message (squawk)
    SurveillanceId = 6,
    /// MSG,7: Air To Air Message (altitude)
    AirToAir = 7,
    /// MSG,8: All Call Reply (no data)
    AllCallReply = 8,
}

impl TryFrom<u8> for SbsMessageType {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        let message_type = match value {
            1 => Self::EsIdentification,
            2 => Self::EsSurfacePosition,
            3 => Self::EsAirbornePosition,
            4 => Self::EsAirborneVelocity,
            5 => Self::SurveillanceAlt,
            6 => Self::SurveillanceId,
            7 => Self::AirToAir,
            8 => Self::AllCallReply,
            other => anyhow::bail!("transmission type {} is outside MSG,1..MSG,8", other),
        };
        Ok(message_type)
    }
}

/// Data columns a message may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SbsField {
    Callsign,
    Altitude,
    GroundSpeed,
    Track,
    Latitude,
    Longitude,
    VerticalRate,
    Squawk,
    OnGround,
}

impl std::fmt::Display for SbsField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SbsField::Callsign => "callsign",
            SbsField::Altitude => "altitude",
            SbsField::GroundSpeed => "ground_speed",
            SbsField::Track => "track",
            SbsField::Latitude => "latitude",
            SbsField::Longitude => "longitude",
            SbsField::VerticalRate => "vertical_rate",
            SbsField::Squawk => "squawk",
            SbsField::OnGround => "on_ground",
        };
        f.write_str(name)
    }
}

/// A single parsed SBS line. Every data field is optional because each
/// transmission type only fills a subset of the columns.
#[derive(Debug, Clone, PartialEq)]
pub struct SbsMessage {
    pub message_type: SbsMessageType,
    /// ICAO hex address, upper case (e.g. "A04424")
    pub aircraft_id: String,
    /// Date/time generated (columns 6 and 7), in the decoder's local time
    pub generated_at: Option<NaiveDateTime>,
    pub callsign: Option<String>,
    /// Mode-C altitude in feet
    pub altitude: Option<i32>,
    /// Ground speed in knots
    pub ground_speed: Option<f64>,
    /// Track over ground in degrees
    pub track: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Vertical rate in feet/minute
    pub vertical_rate: Option<i32>,
    pub squawk: Option<Squawk>,
    pub on_ground: Option<bool>,
}

impl SbsMessage {
    /// Check if this message contains position data
    pub fn has_position(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// The data fields this message populates
    pub fn present_fields(&self) -> Vec<SbsField> {
        let mut fields = Vec::new();
        if self.callsign.is_some() {
            fields.push(SbsField::Callsign);
        }
        if self.altitude.is_some() {
            fields.push(SbsField::Altitude);
        }
        if self.ground_speed.is_some() {
            fields.push(SbsField::GroundSpeed);
        }
        if self.track.is_some() {
            fields.push(SbsField::Track);
        }
        if self.latitude.is_some() {
            fields.push(SbsField::Latitude);
        }
        if self.longitude.is_some() {
            fields.push(SbsField::Longitude);
        }
        if self.vertical_rate.is_some() {
            fields.push(SbsField::VerticalRate);
        }
        if self.squawk.is_some() {
            fields.push(SbsField::Squawk);
        }
        if self.on_ground.is_some() {
            fields.push(SbsField::OnGround);
        }
        fields
    }
}

/// Parse an SBS CSV line into an SbsMessage
///
/// SBS format: MSG,<type>,<session_id>,<aircraft_db_id>,<icao>,<flight_id>,
///             <date_gen>,<time_gen>,<date_log>,<time_log>,<callsign>,<altitude>,
///             <ground_speed>,<track>,<latitude>,<longitude>,<vertical_rate>,<squawk>,
///             <alert>,<emergency>,<spi>,<on_ground>
pub fn parse_sbs_message(line: &str) -> Result<SbsMessage> {
    let line = line.trim_end_matches(['\r', '\n']);
    let fields: Vec<&str> = line.split(',').collect();

    if fields.len() < MIN_FIELD_COUNT {
        anyhow::bail!(
            "{} columns, need {} to reach the squawk",
            fields.len(),
            MIN_FIELD_COUNT
        );
    }

    if fields[0] != "MSG" {
        anyhow::bail!("not a transmission line ({})", fields[0]);
    }

    let message_type = fields[1]
        .trim()
        .parse::<u8>()
        .with_context(|| format!("transmission type '{}'", fields[1]))
        .and_then(SbsMessageType::try_from)?;

    let aircraft_id = fields[4].trim().to_ascii_uppercase();
    if aircraft_id.is_empty() {
        anyhow::bail!("missing hex ident");
    }

    let generated_at = parse_generated_at(fields[6], fields[7]);

    let callsign = Some(fields[10].trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let altitude = parse_numeric::<i32>(&fields, 11, "altitude")?;
    let ground_speed = parse_numeric::<f64>(&fields, 12, "ground speed")?;
    let track = parse_numeric::<f64>(&fields, 13, "track")?;
    let latitude = parse_numeric::<f64>(&fields, 14, "latitude")?;
    let longitude = parse_numeric::<f64>(&fields, 15, "longitude")?;
    let vertical_rate = parse_numeric::<i32>(&fields, 16, "vertical rate")?;

    let squawk = match fields[17].trim() {
        "" => None,
        raw => {
            let squawk = Squawk::parse(raw);
            if squawk.is_none() {
                debug!("Ignoring malformed squawk '{}' from {}", raw, aircraft_id);
            }
            squawk
        }
    };

    let on_ground = parse_optional_bool(fields.get(21).copied());

    Ok(SbsMessage {
        message_type,
        aircraft_id,
        generated_at,
        callsign,
        altitude,
        ground_speed,
        track,
        latitude,
        longitude,
        vertical_rate,
        squawk,
        on_ground,
    })
}

/// Empty columns are absent; anything else must parse.
fn parse_numeric<T>(fields: &[&str], index: usize, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = fields.get(index).map(|s| s.trim()).unwrap_or_default();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<T>()
        .map(Some)
        .with_context(|| format!("Invalid {} in column {}: '{}'", name, index, raw))
}

fn parse_generated_at(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y/%m/%d").ok()?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M:%S%.3f").ok()?;
    Some(date.and_time(time))
}

fn parse_optional_bool(field: Option<&str>) -> Option<bool> {
    field
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| match s {
            "0" => Some(false),
            "-1" | "1" => Some(true),
            _ => None,
        })
}
