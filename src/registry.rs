//! Identifier-keyed store of merged aircraft tracks

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::one::{Ref, RefMut};
use tracing::{debug, trace};

use crate::sbs::SbsMessage;
use crate::track::AircraftTrack;

/// Thread-safe registry of aircraft tracks
///
/// Uses DashMap for concurrent per-key access: tracks for different aircraft
/// never contend on a global lock, and a `RefMut` returned by `merge` keeps
/// the track locked until the caller is done evaluating it.
#[derive(Debug, Default)]
pub struct TrackRegistry {
    tracks: DashMap<String, AircraftTrack>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self {
            tracks: DashMap::new(),
        }
    }

    /// Merge a message into its aircraft's track, creating the track on first sight.
    ///
    /// Returns the post-merge track, still locked. Do not call back into the
    /// registry while holding it.
    pub fn merge(&self, msg: &SbsMessage, timestamp: DateTime<Utc>) -> RefMut<'_, String, AircraftTrack> {
        let mut entry = self
            .tracks
            .entry(msg.aircraft_id.clone())
            .or_insert_with(|| {
                debug!("New aircraft {}", msg.aircraft_id);
                metrics::counter!("overhead.registry.created_total").increment(1);
                AircraftTrack::new(msg.aircraft_id.clone(), timestamp)
            });

        entry.value_mut().apply(msg, timestamp);
        trace!(
            "Merged {:?} into {}",
            msg.present_fields(),
            entry.value()
        );
        metrics::counter!("overhead.registry.merged_total").increment(1);

        entry
    }

    pub fn get(&self, identifier: &str) -> Option<Ref<'_, String, AircraftTrack>> {
        self.tracks.get(identifier)
    }

    /// Remove tracks not updated within `max_age`; returns the evicted identifiers
    pub fn sweep(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> Vec<String> {
        let mut evicted = Vec::new();

        self.tracks.retain(|identifier, track| {
            let keep = !track.is_stale(now, max_age);
            if !keep {
                evicted.push(identifier.clone());
            }
            keep
        });

        if !evicted.is_empty() {
            debug!("Evicted {} stale aircraft: {:?}", evicted.len(), evicted);
            metrics::counter!("overhead.registry.evicted_total").increment(evicted.len() as u64);
        }
        metrics::gauge!("overhead.registry.tracked").set(self.tracks.len() as f64);

        evicted
    }

    /// Run `f` over every track with write access (used to fire scheduled announcements)
    pub fn for_each_mut(&self, mut f: impl FnMut(&mut AircraftTrack)) {
        for mut entry in self.tracks.iter_mut() {
            f(entry.value_mut());
        }
    }

    /// Copies of every track, each taken under its own lock
    pub fn snapshot(&self) -> Vec<AircraftTrack> {
        self.tracks.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
