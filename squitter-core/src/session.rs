//! Decoding session: frames in, reports out.
//!
//! A session owns one [`TrackCache`] and processes frames strictly in arrival
//! order. A frame that fails to decode is reported and leaves the cache
//! untouched; it never stops the session.

use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::error;

use crate::config::SessionConfig;
use crate::crc;
use crate::decode::decode;
use crate::track::TrackCache;
use crate::types::*;

/// One line of feed input: raw hex and its arrival time in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub raw_hex: String,
    pub arrival_time: f64,
}

impl FrameRecord {
    pub fn new(raw_hex: impl Into<String>, arrival_time: f64) -> Self {
        FrameRecord {
            raw_hex: raw_hex.into(),
            arrival_time,
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Outcome of one input frame, keeping the raw text it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub raw: String,
    pub time: f64,
    pub outcome: Result<DecodedMessage, DecodeError>,
}

impl Report {
    pub fn message(&self) -> Option<&DecodedMessage> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&DecodeError> {
        self.outcome.as_ref().err()
    }
}

/// `<TC> <ICAO> <raw> <summary>`, with `-` for fields a frame doesn't carry.
/// Failures render as `error <raw> <reason>`.
impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match &self.outcome {
            Ok(msg) => msg,
            Err(err) => return write!(f, "error {} {}", self.raw, err),
        };

        match msg.type_code() {
            Some(tc) => write!(f, "{tc} ")?,
            None => f.write_str("- ")?,
        }
        match msg.icao() {
            Some(icao) => write!(f, "{icao} ")?,
            None => f.write_str("------ ")?,
        }
        f.write_str(&self.raw)?;

        match msg {
            DecodedMessage::Identification(m) => write!(f, " ident {}", m.callsign),
            DecodedMessage::Position(m) => match m.coords() {
                Some(c) => write!(f, " position {} {}", c.lat, c.lon),
                None => f.write_str(" position unresolved"),
            },
            DecodedMessage::Velocity(m) => {
                f.write_str(" heading ")?;
                opt(f, m.heading_deg)?;
                f.write_str(" velocity ")?;
                opt(f, m.speed_kts)
            }
            DecodedMessage::Unclassified(_) => Ok(()),
        }
    }
}

fn opt(f: &mut fmt::Formatter<'_>, val: Option<f64>) -> fmt::Result {
    match val {
        Some(v) => write!(f, "{v}"),
        None => f.write_str("-"),
    }
}

impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Report", 3)?;
        state.serialize_field("raw", &self.raw)?;
        state.serialize_field("time", &self.time)?;
        match &self.outcome {
            Ok(msg) => state.serialize_field("message", msg)?,
            Err(err) => state.serialize_field("error", &err.to_string())?,
        }
        state.end()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Running counters for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub frames: u64,
    pub decoded: u64,
    pub failed: u64,
    pub unclassified: u64,
    pub global_fixes: u64,
    pub local_fixes: u64,
    pub unresolved: u64,
    pub inconsistent_pairs: u64,
    pub evicted: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    cache: TrackCache,
    require_crc: bool,
    stats: SessionStats,
    last_prune: Option<f64>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Session {
            require_crc: config.require_crc,
            cache: TrackCache::new(config),
            stats: SessionStats::default(),
            last_prune: None,
        }
    }

    /// Decode one frame and fold it into the track cache.
    pub fn process(&mut self, raw: &RawFrame, time: f64) -> Result<DecodedMessage, DecodeError> {
        self.stats.frames += 1;
        let result = self.track(raw, time);
        self.account(&result, &raw.hex());
        self.maybe_prune(time);
        result
    }

    /// Parse and process one hex frame, keeping the text for the report.
    pub fn process_hex(&mut self, hex: &str, time: f64) -> Report {
        let raw = hex.trim();
        let outcome = match RawFrame::from_hex(raw) {
            Ok(frame) => self.process(&frame, time),
            Err(err) => {
                self.stats.frames += 1;
                let result = Err(err);
                self.account(&result, raw);
                result
            }
        };
        Report {
            raw: raw.to_string(),
            time,
            outcome,
        }
    }

    pub fn process_record(&mut self, record: &FrameRecord) -> Report {
        self.process_hex(&record.raw_hex, record.arrival_time)
    }

    /// Counters so far, including the cache's pair and eviction counts.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            inconsistent_pairs: self.cache.inconsistent_pairs,
            evicted: self.cache.evicted,
            ..self.stats
        }
    }

    pub fn tracks(&self) -> &TrackCache {
        &self.cache
    }

    fn track(&mut self, raw: &RawFrame, time: f64) -> Result<DecodedMessage, DecodeError> {
        let mut msg = decode(raw)?;

        if self.require_crc && msg.header().is_some_and(|h| !h.crc_ok) {
            return Err(DecodeError::CrcMismatch {
                residual: crc::crc24(raw.as_bytes()),
            });
        }

        match &mut msg {
            DecodedMessage::Identification(m) => self.cache.note_identification(m, time),
            DecodedMessage::Position(m) => {
                m.resolved = self.cache.observe(m, time);
                match m.resolved.map(|r| r.method) {
                    Some(ResolveMethod::Global) => self.stats.global_fixes += 1,
                    Some(ResolveMethod::Local | ResolveMethod::Receiver) => {
                        self.stats.local_fixes += 1
                    }
                    None => self.stats.unresolved += 1,
                }
            }
            DecodedMessage::Velocity(m) => self.cache.note_velocity(m, time),
            DecodedMessage::Unclassified(m) => {
                // An extended squitter carries its address in the clear.
                // Addresses recovered from parity are only trusted for
                // aircraft already being tracked
                if let Some(icao) = m.icao {
                    if is_extended_squitter(m.df) || self.cache.lookup(icao).is_some() {
                        self.cache.touch(icao, time);
                    }
                }
            }
        }
        Ok(msg)
    }

    fn account(&mut self, result: &Result<DecodedMessage, DecodeError>, raw: &str) {
        match result {
            Ok(DecodedMessage::Unclassified(_)) => self.stats.unclassified += 1,
            Ok(_) => self.stats.decoded += 1,
            Err(err) => {
                self.stats.failed += 1;
                if err.is_internal() {
                    error!(raw, %err, "internal decoder fault");
                }
            }
        }
    }

    /// Evict idle tracks, at most once per idle interval of feed time.
    fn maybe_prune(&mut self, now: f64) {
        let interval = self.cache.config().idle_timeout_secs;
        if self.last_prune.is_some_and(|last| now - last < interval) {
            return;
        }
        self.cache.prune_idle(now);
        self.last_prune = Some(now);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const KLM_IDENT: &str = "8D4840D6202CC371C32CE0576098";
    const EVEN: &str = "8D48502058C382D690C8AC361B59";
    const ODD: &str = "8D48502058C386435CC412775228";
    const VELOCITY: &str = "8D485020994409940838175B284F";

    #[test]
    fn test_identification_report() {
        let mut session = Session::default();
        let report = session.process_hex(KLM_IDENT, 1.0);
        assert_eq!(report.to_string(), format!("4 4840D6 {KLM_IDENT} ident KLM1023"));

        let entry = session.tracks().lookup(IcaoAddress::new(0x4840D6)).unwrap();
        assert_eq!(entry.callsign.as_deref(), Some("KLM1023"));
    }

    #[test]
    fn test_position_pair_report() {
        let mut session = Session::default();
        let first = session.process_hex(EVEN, 0.0);
        assert_eq!(first.to_string(), format!("11 485020 {EVEN} position unresolved"));

        let second = session.process_hex(ODD, 3.0);
        assert_eq!(second.to_string(), format!("11 485020 {ODD} position 52.26578 3.938913"));

        let stats = session.stats();
        assert_eq!(stats.global_fixes, 1);
        assert_eq!(stats.unresolved, 1);
    }

    #[test]
    fn test_velocity_report() {
        let mut session = Session::default();
        let report = session.process_hex(VELOCITY, 0.0);
        assert_eq!(
            report.to_string(),
            format!("19 485020 {VELOCITY} heading 182.88 velocity 159.2")
        );
        let entry = session.tracks().lookup(IcaoAddress::new(0x485020)).unwrap();
        assert_eq!(entry.vertical_rate_fpm, Some(-832));
    }

    #[test]
    fn test_unclassified_report_has_empty_summary() {
        let mut session = Session::default();
        let report = session.process_hex("5D4840D6F8740F", 0.0);
        assert_eq!(report.to_string(), "- 4840D6 5D4840D6F8740F");
        assert_eq!(session.stats().unclassified, 1);
    }

    #[test]
    fn test_failure_keeps_raw_text() {
        let mut session = Session::default();
        let report = session.process_hex("  8D4840D6 ", 0.0);
        assert_eq!(report.raw, "8D4840D6");
        assert_eq!(report.error(), Some(&DecodeError::Truncated { bits: 32 }));
        assert!(report.to_string().starts_with("error 8D4840D6 truncated frame"));
        assert_eq!(session.stats().failed, 1);
        assert!(session.tracks().is_empty());
    }

    #[test]
    fn test_failure_does_not_stop_session() {
        let mut session = Session::default();
        session.process_hex("not hex at all", 0.0);
        let report = session.process_hex(KLM_IDENT, 1.0);
        assert!(report.message().is_some());

        let stats = session.stats();
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.decoded, 1);
    }

    #[test]
    fn test_require_crc_rejects_corrupt_frame() {
        let mut session = Session::new(SessionConfig {
            require_crc: true,
            ..SessionConfig::default()
        });
        // Flip a callsign bit
        let report = session.process_hex("8D4840D6202CC371C32CE1576098", 0.0);
        assert!(matches!(report.error(), Some(DecodeError::CrcMismatch { .. })));
        assert!(session.tracks().is_empty());
    }

    #[test]
    fn test_crc_not_required_by_default() {
        let mut session = Session::default();
        let report = session.process_hex("8D4840D6202CC371C32CE1576098", 0.0);
        let header = report.message().and_then(|m| m.header()).copied().unwrap();
        assert!(!header.crc_ok);
    }

    #[test]
    fn test_unclassified_only_refreshes_known_tracks() {
        let mut session = Session::default();
        session.process_hex("5D4840D6F8740F", 0.0);
        assert!(session.tracks().is_empty());

        session.process_hex(KLM_IDENT, 1.0);
        session.process_hex("5D4840D6F8740F", 2.0);
        let entry = session.tracks().lookup(IcaoAddress::new(0x4840D6)).unwrap();
        assert_eq!(entry.messages, 2);
        assert_eq!(entry.last_seen, 2.0);
    }

    #[test]
    fn test_unclassified_squitter_creates_track() {
        let mut session = Session::default();
        // DF17 TC 28 (aircraft status)
        session.process_hex("8D4840D6E1000000000000DE52AB", 0.0);
        assert_eq!(session.tracks().len(), 1);

        let entry = session.tracks().lookup(IcaoAddress::new(0x4840D6)).unwrap();
        assert_eq!(entry.messages, 1);
        assert_eq!(session.stats().unclassified, 1);
    }

    #[test]
    fn test_idle_tracks_evicted() {
        let mut session = Session::new(SessionConfig {
            idle_timeout_secs: 60.0,
            ..SessionConfig::default()
        });
        session.process_hex(KLM_IDENT, 0.0);
        session.process_hex(VELOCITY, 30.0);
        assert_eq!(session.tracks().len(), 2);

        session.process_hex(VELOCITY, 61.0);
        assert_eq!(session.tracks().len(), 1);
        assert_eq!(session.stats().evicted, 1);
    }

    #[test]
    fn test_report_json() {
        let mut session = Session::default();
        let report = session.process_hex(KLM_IDENT, 1.5);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["raw"], KLM_IDENT);
        assert_eq!(json["time"], 1.5);
        assert_eq!(json["message"]["type"], "Identification");
        assert_eq!(json["message"]["icao"], "4840D6");
        assert_eq!(json["message"]["callsign"], "KLM1023");

        let failed = session.process_hex("8D", 2.0);
        let json = serde_json::to_value(&failed).unwrap();
        assert!(json["error"].as_str().unwrap().contains("truncated"));
    }
}
