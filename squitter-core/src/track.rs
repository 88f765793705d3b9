//! Per-aircraft track cache with CPR frame pairing.
//!
//! Pure logic, no I/O. The session feeds it decoded messages in arrival
//! order; the cache keeps the latest even and odd CPR frame per aircraft,
//! resolves positions globally when a fresh pair exists, and falls back to
//! local decoding against a recent fix or the receiver location.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, trace};

use crate::config::SessionConfig;
use crate::cpr::{self, CprError};
use crate::types::*;

/// A CPR frame together with the time it arrived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimedCpr {
    pub frame: CprFrame,
    pub time: f64,
}

/// A resolved position and the arrival time of the frame that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Fix {
    pub position: ResolvedPosition,
    pub time: f64,
}

// ---------------------------------------------------------------------------
// Track entry
// ---------------------------------------------------------------------------

/// Everything remembered about one aircraft.
#[derive(Debug, Clone, Serialize)]
pub struct TrackEntry {
    pub icao: IcaoAddress,
    pub callsign: Option<String>,
    pub altitude_ft: Option<i32>,

    // Velocity
    pub speed_kts: Option<f64>,
    pub heading_deg: Option<f64>,
    pub vertical_rate_fpm: Option<i32>,

    // Latest CPR frame of each parity
    pub even: Option<TimedCpr>,
    pub odd: Option<TimedCpr>,

    /// Most recent resolved position, the local-decode reference.
    pub last_fix: Option<Fix>,

    pub first_seen: f64,
    pub last_seen: f64,
    pub messages: u64,
}

impl TrackEntry {
    pub fn new(icao: IcaoAddress, time: f64) -> Self {
        TrackEntry {
            icao,
            callsign: None,
            altitude_ft: None,
            speed_kts: None,
            heading_deg: None,
            vertical_rate_fpm: None,
            even: None,
            odd: None,
            last_fix: None,
            first_seen: time,
            last_seen: time,
            messages: 0,
        }
    }

    /// Cached frame of the given parity.
    pub fn cpr(&self, format: CprFormat) -> Option<&TimedCpr> {
        match format {
            CprFormat::Even => self.even.as_ref(),
            CprFormat::Odd => self.odd.as_ref(),
        }
    }

    fn slot_mut(&mut self, format: CprFormat) -> &mut Option<TimedCpr> {
        match format {
            CprFormat::Even => &mut self.even,
            CprFormat::Odd => &mut self.odd,
        }
    }

    pub fn position(&self) -> Option<Coordinates> {
        self.last_fix.map(|fix| fix.position.coords)
    }

    pub fn age(&self, now: f64) -> f64 {
        now - self.last_seen
    }

    pub fn is_idle(&self, now: f64, timeout: f64) -> bool {
        self.age(now) > timeout
    }

    fn seen(&mut self, time: f64) {
        if time > self.last_seen {
            self.last_seen = time;
        }
        self.messages += 1;
    }

    fn record_fix(&mut self, coords: Coordinates, method: ResolveMethod, time: f64) -> ResolvedPosition {
        let position = ResolvedPosition { coords, method };
        self.last_fix = Some(Fix { position, time });
        trace!(
            icao = %self.icao,
            lat = coords.lat,
            lon = coords.lon,
            ?method,
            "position resolved"
        );
        position
    }
}

// ---------------------------------------------------------------------------
// Track cache
// ---------------------------------------------------------------------------

/// Aircraft keyed by ICAO address.
///
/// Owned by a single session; not shared between threads.
#[derive(Debug, Clone)]
pub struct TrackCache {
    entries: HashMap<IcaoAddress, TrackEntry>,
    config: SessionConfig,
    /// Pairs rejected as inconsistent since creation.
    pub inconsistent_pairs: u64,
    /// Entries removed by idle pruning since creation.
    pub evicted: u64,
}

impl Default for TrackCache {
    fn default() -> Self {
        TrackCache::new(SessionConfig::default())
    }
}

impl TrackCache {
    pub fn new(config: SessionConfig) -> Self {
        TrackCache {
            entries: HashMap::new(),
            config,
            inconsistent_pairs: 0,
            evicted: 0,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, icao: IcaoAddress) -> Option<&TrackEntry> {
        self.entries.get(&icao)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackEntry> {
        self.entries.values()
    }

    /// Record that `icao` was heard at `time`, creating the entry if needed.
    pub fn touch(&mut self, icao: IcaoAddress, time: f64) -> &mut TrackEntry {
        let entry = self
            .entries
            .entry(icao)
            .or_insert_with(|| TrackEntry::new(icao, time));
        entry.seen(time);
        entry
    }

    pub fn note_identification(&mut self, msg: &Identification, time: f64) {
        let entry = self.touch(msg.header.icao, time);
        if !msg.callsign.is_empty() {
            entry.callsign = Some(msg.callsign.clone());
        }
    }

    pub fn note_velocity(&mut self, msg: &Velocity, time: f64) {
        let entry = self.touch(msg.header.icao, time);
        if let Some(speed) = msg.speed_kts {
            entry.speed_kts = Some(speed);
        }
        if let Some(heading) = msg.heading_deg {
            entry.heading_deg = Some(heading);
        }
        if let Some(rate) = msg.vertical_rate_fpm {
            entry.vertical_rate_fpm = Some(rate);
        }
    }

    /// Feed an airborne position frame and try to resolve it.
    ///
    /// The frame replaces the cached frame of the same parity. If the other
    /// parity arrived within the pairing window a global decode is tried; a
    /// pair that fails the consistency checks drops the older frame. Without
    /// a usable pair the frame is decoded locally against the aircraft's
    /// last fix (if younger than the reference age limit) or the receiver
    /// location.
    pub fn observe(&mut self, msg: &Position, time: f64) -> Option<ResolvedPosition> {
        let icao = msg.header.icao;
        let frame = msg.cpr;
        let format = frame.format;

        let entry = self
            .entries
            .entry(icao)
            .or_insert_with(|| TrackEntry::new(icao, time));
        entry.seen(time);
        if let Some(alt) = msg.altitude_ft {
            entry.altitude_ft = Some(alt);
        }

        let other = match format {
            CprFormat::Even => CprFormat::Odd,
            CprFormat::Odd => CprFormat::Even,
        };
        let partner = entry.cpr(other).copied();
        *entry.slot_mut(format) = Some(TimedCpr { frame, time });

        if let Some(partner) = partner {
            let gap = (time - partner.time).abs();
            if gap <= self.config.pair_window_secs {
                let (even, odd) = match format {
                    CprFormat::Even => (frame, partner.frame),
                    CprFormat::Odd => (partner.frame, frame),
                };
                match cpr::global_decode(&even, &odd, format, gap) {
                    Ok(coords) => return Some(entry.record_fix(coords, ResolveMethod::Global, time)),
                    Err(err) => {
                        debug!(%icao, %err, dropped = ?other, "discarding CPR pair");
                        *entry.slot_mut(other) = None;
                        self.inconsistent_pairs += 1;
                    }
                }
            }
        }

        let reference = match entry.last_fix {
            Some(fix) if time - fix.time < self.config.reference_max_age_secs => {
                Some((fix.position.coords, ResolveMethod::Local))
            }
            Some(fix) => {
                debug!(%icao, age = time - fix.time, "reference position expired");
                None
            }
            None => None,
        }
        .or_else(|| self.config.receiver.map(|r| (r, ResolveMethod::Receiver)));

        let (reference, method) = reference?;
        match cpr::local_decode(&frame, reference) {
            Ok(coords) => Some(entry.record_fix(coords, method, time)),
            Err(CprError::ReferenceTooFar) => {
                debug!(%icao, ?method, "local decode too far from reference");
                None
            }
            Err(err) => {
                debug!(%icao, %err, "local decode failed");
                None
            }
        }
    }

    /// Tracks heard within the idle timeout, most recent first.
    pub fn active(&self, now: f64) -> Vec<&TrackEntry> {
        let timeout = self.config.idle_timeout_secs;
        let mut active: Vec<_> = self
            .entries
            .values()
            .filter(|entry| !entry.is_idle(now, timeout))
            .collect();
        active.sort_by(|a, b| b.last_seen.total_cmp(&a.last_seen));
        active
    }

    /// Drop tracks silent for longer than the idle timeout. Returns count removed.
    pub fn prune_idle(&mut self, now: f64) -> usize {
        let timeout = self.config.idle_timeout_secs;
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_idle(now, timeout));
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "evicted idle tracks");
            self.evicted += removed as u64;
        }
        removed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
