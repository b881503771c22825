//! Spoken text for announcements
//!
//! Text is written for a speech synthesizer: callsigns are spelled in the ICAO
//! radiotelephony alphabet and known airline prefixes are spoken by name.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::geometry::{LookAngles, METERS_PER_STATUTE_MILE, cardinal};
use crate::track::{AircraftTrack, Emergency};

/// ICAO airline designator followed by a flight number, e.g. UAL814
static FLIGHT_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z]{3})([0-9][0-9A-Z]*)$").expect("valid regex"));

/// How much of the aircraft's state goes into a crossing announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Detail {
    /// Identity and direction
    Brief,
    /// Adds elevation, distance and altitude
    #[default]
    Standard,
    /// Adds track, ground speed and vertical rate
    Full,
}

fn phonetic_word(c: char) -> Option<&'static str> {
    let word = match c.to_ascii_uppercase() {
        'A' => "alfa",
        'B' => "bravo",
        'C' => "charlie",
        'D' => "delta",
        'E' => "echo",
        'F' => "foxtrot",
        'G' => "golf",
        'H' => "hotel",
        'I' => "india",
        'J' => "juliet",
        'K' => "kilo",
        'L' => "lima",
        'M' => "mike",
        'N' => "november",
        'O' => "oscar",
        'P' => "papa",
        'Q' => "quebec",
        'R' => "romeo",
        'S' => "sierra",
        'T' => "tango",
        'U' => "uniform",
        'V' => "victor",
        'W' => "whisky",
        'X' => "x-ray",
        'Y' => "yankee",
        'Z' => "zulu",
        '0' => "zero",
        '1' => "one",
        '2' => "two",
        '3' => "tree",
        '4' => "four",
        '5' => "fife",
        '6' => "six",
        '7' => "seven",
        '8' => "eight",
        '9' => "niner",
        '/' => "slash",
        '.' => "point",
        '-' => "minus",
        _ => return None,
    };
    Some(word)
}

/// Spell a string in the radiotelephony alphabet; unknown characters are skipped
pub fn phonetic(text: &str) -> String {
    text.chars()
        .filter_map(phonetic_word)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Spoken name for an ICAO airline designator, if known
pub fn airline_name(designator: &str) -> Option<&'static str> {
    let name = match designator {
        "AAL" => "American",
        "ABX" => "Airborne Express",
        "ACA" => "Air Canada",
        "AFR" => "Air France",
        "AIC" => "Air India",
        "AMX" => "Aeromexico",
        "ANZ" => "Air New Zealand",
        "ASA" => "Alaska",
        "BAW" => "British Airways",
        "CAL" => "China Airlines",
        "CCA" => "Air China",
        "CES" => "China Eastern Airlines",
        "CMP" | "CPA" => "Copa Airlines",
        "CSC" => "Sichuan Airlines",
        "CSN" => "China Southern Airlines",
        "DAL" => "Delta",
        "DLH" => "Lufthansa",
        "EIN" => "Aer Lingus",
        "EJA" => "Netjets",
        "EVA" => "EVA Air",
        "FDX" => "FedEx",
        "FDY" => "Southern Airways Express",
        "FFL" => "Foreflight",
        "FFT" => "Frontier",
        "HAL" => "Hawaiian",
        "HVN" => "National Airlines",
        "JBU" => "Jet Blue",
        "JSX" => "Jay Ess Ex",
        "KAL" => "Korean Air",
        "KLM" => "Kay El Em",
        "LXJ" => "Flexjet",
        "MXY" => "Breeze Airways",
        "NKS" => "Spirit Wings",
        "PAL" => "Philippine Airlines",
        "QFA" => "Qantas",
        "QTR" => "Qatar Airways",
        "QXE" => "Horizon Air",
        "SKW" => "Skywest",
        "SWA" => "Southwest",
        "UAE" => "Emirates",
        "UAL" => "United",
        "UPS" => "You Pee Ess",
        "USC" => "AirNet Express",
        "VIR" => "Virgin Atlantic",
        "VOI" => "Volaris",
        "WJA" => "West Jet",
        _ => return None,
    };
    Some(name)
}

/// Best spoken identity for a track
pub fn spoken_identity(track: &AircraftTrack) -> String {
    let Some(callsign) = track.callsign.as_deref() else {
        return format!("aircraft {}", phonetic(&track.identifier));
    };

    if let Some(caps) = FLIGHT_NUMBER_RE.captures(callsign) {
        let designator = &caps[1];
        let number = &caps[2];
        let carrier = airline_name(designator)
            .map(str::to_string)
            .unwrap_or_else(|| phonetic(designator));
        return format!("{} flight {}", carrier, phonetic(number));
    }

    phonetic(callsign)
}

fn round_down(value: i64, step: i64) -> i64 {
    value.div_euclid(step) * step
}

fn detail_phrases(track: &AircraftTrack, angles: &LookAngles, detail: Detail) -> Vec<String> {
    let mut phrases = Vec::new();
    if detail == Detail::Brief {
        return phrases;
    }

    phrases.push(format!(
        "{} degrees above the horizon",
        phonetic(&(angles.elevation_deg.trunc() as i64).to_string())
    ));
    phrases.push(format!(
        "distance {:.1} miles",
        angles.slant_range_m / METERS_PER_STATUTE_MILE
    ));
    if let Some(alt) = track.altitude_ft {
        phrases.push(format!("altitude {} feet", round_down(alt as i64, 100)));
    }

    if detail == Detail::Full {
        let heading = track
            .track_deg
            .map(cardinal)
            .unwrap_or("unknown");
        let speed = track
            .ground_speed_kt
            .map(|kt| format!("{} knots", round_down(kt as i64, 10)))
            .unwrap_or_else(|| "unknown velocity".to_string());
        phrases.push(format!("tracking {heading} at {speed}"));

        match track.vertical_rate_fpm.map(|r| round_down(r as i64, 100)) {
            Some(r) if r > 0 => phrases.push(format!("climbing at {r} feet per minute")),
            Some(r) if r < 0 => phrases.push(format!("descending at {} feet per minute", -r)),
            Some(_) => phrases.push("in level flight".to_string()),
            None => phrases.push("vertical speed unknown".to_string()),
        }
    }

    phrases
}

/// Text for an angle-crossing announcement
pub fn crossing_utterance(track: &AircraftTrack, angles: &LookAngles, detail: Detail) -> String {
    let mut phrases = vec![format!(
        "{} in sight to the {}",
        spoken_identity(track),
        cardinal(angles.bearing_deg)
    )];
    phrases.extend(detail_phrases(track, angles, detail));
    phrases.join(", ")
}

/// Text for an emergency announcement; always includes at least standard detail
pub fn emergency_utterance(
    track: &AircraftTrack,
    emergency: Emergency,
    angles: &LookAngles,
    detail: Detail,
) -> String {
    let ident = spoken_identity(track);
    let word = emergency.spoken();
    let detail = if detail == Detail::Brief {
        Detail::Standard
    } else {
        detail
    };

    let mut phrases = vec![
        "ATTENTION, ATTENTION, ATTENTION".to_string(),
        "AIRCRAFT DISTRESS TRANSPONDER CODE".to_string(),
        format!("{ident} squawks {word}"),
        format!(
            "I, SAY, AGAIN, {}, {}, squawks, {}",
            word.to_uppercase(),
            ident,
            word.to_uppercase()
        ),
        format!("The {} aircraft is to the {}", word, cardinal(angles.bearing_deg)),
    ];
    phrases.extend(detail_phrases(track, angles, detail));
    phrases.join(", ")
}
