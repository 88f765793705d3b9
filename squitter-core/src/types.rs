//! Shared types, error enum, and decoded message types for squitter-core.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Per-frame decode failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("truncated frame: expected 56 or 112 bits, got {bits}")]
    Truncated { bits: usize },
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    #[error("bit field {start}+{width} exceeds {len}-bit buffer")]
    OutOfRange { start: usize, width: u32, len: usize },
    #[error("CRC mismatch (residual {residual:06X})")]
    CrcMismatch { residual: u32 },
}

impl DecodeError {
    /// True for failures that indicate broken decoder logic rather than bad
    /// input. Callers should not keep going after one of these.
    pub fn is_internal(&self) -> bool {
        matches!(self, DecodeError::OutOfRange { .. })
    }
}

// ---------------------------------------------------------------------------
// Downlink Formats
// ---------------------------------------------------------------------------

/// True for the extended squitter formats this crate decodes.
pub fn is_extended_squitter(df: u8) -> bool {
    df == 17 || df == 18
}

// ---------------------------------------------------------------------------
// ICAO address
// ---------------------------------------------------------------------------

/// 24-bit ICAO aircraft address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IcaoAddress(u32);

impl IcaoAddress {
    /// Build from the low 24 bits of `val`.
    pub fn new(val: u32) -> Self {
        IcaoAddress(val & 0xFF_FFFF)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for IcaoAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06X}", self.0)
    }
}

impl FromStr for IcaoAddress {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 6 {
            return Err(DecodeError::InvalidHex(s.to_string()));
        }
        u32::from_str_radix(s, 16)
            .map(IcaoAddress::new)
            .map_err(|_| DecodeError::InvalidHex(s.to_string()))
    }
}

impl Serialize for IcaoAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// Hex utilities
// ---------------------------------------------------------------------------

/// Decode a hex string into bytes. Case-insensitive, must be even length.
pub fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return None;
    }
    hex.as_bytes()
        .chunks(2)
        .map(|pair| Some((hex_digit(pair[0])? << 4) | hex_digit(pair[1])?))
        .collect()
}

/// Encode bytes as uppercase hex string.
pub fn hex_encode(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 2);
    for &b in data {
        s.push(HEX_CHARS[(b >> 4) as usize] as char);
        s.push(HEX_CHARS[(b & 0x0F) as usize] as char);
    }
    s
}

const HEX_CHARS: &[u8; 16] = b"0123456789ABCDEF";

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Raw frames
// ---------------------------------------------------------------------------

/// Short (surveillance) frame length in bits.
pub const SHORT_FRAME_BITS: usize = 56;

/// Extended squitter frame length in bits.
pub const LONG_FRAME_BITS: usize = 112;

/// A 56- or 112-bit Mode S frame. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    bytes: Vec<u8>,
}

impl RawFrame {
    /// Wrap raw bytes, rejecting anything that isn't 7 or 14 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let bits = bytes.len() * 8;
        if bits != SHORT_FRAME_BITS && bits != LONG_FRAME_BITS {
            return Err(DecodeError::Truncated { bits });
        }
        Ok(RawFrame {
            bytes: bytes.to_vec(),
        })
    }

    /// Parse 14 or 28 hex characters (surrounding whitespace ignored).
    pub fn from_hex(hex: &str) -> Result<Self, DecodeError> {
        let hex = hex.trim();
        if hex.len() % 2 != 0 {
            return Err(DecodeError::Truncated {
                bits: hex.len() * 4,
            });
        }
        let bytes = hex_decode(hex).ok_or_else(|| DecodeError::InvalidHex(hex.to_string()))?;
        RawFrame::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Frame length in bits (56 or 112).
    pub fn bits(&self) -> usize {
        self.bytes.len() * 8
    }

    pub fn is_long(&self) -> bool {
        self.bits() == LONG_FRAME_BITS
    }

    /// Downlink Format (first 5 bits).
    pub fn df(&self) -> u8 {
        self.bytes[0] >> 3
    }

    /// Uppercase hex rendering of the frame.
    pub fn hex(&self) -> String {
        hex_encode(&self.bytes)
    }
}

impl FromStr for RawFrame {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RawFrame::from_hex(s)
    }
}

impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

// ---------------------------------------------------------------------------
// ADS-B callsign character set
// ---------------------------------------------------------------------------

/// ADS-B character set for callsign encoding (6 bits per character).
/// `#` marks codes with no assigned character.
pub const CALLSIGN_CHARSET: &[u8; 64] =
    b"#ABCDEFGHIJKLMNOPQRSTUVWXYZ##### ###############0123456789######";

/// Filler appended after the last real callsign character.
pub const CALLSIGN_FILL: &[char] = &[' ', '#'];

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// CPR frame parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CprFormat {
    Even,
    Odd,
}

impl CprFormat {
    /// The `i` term of the CPR equations (0 for even, 1 for odd).
    pub fn index(&self) -> u32 {
        match self {
            CprFormat::Even => 0,
            CprFormat::Odd => 1,
        }
    }
}

/// One CPR-encoded airborne position (17-bit fractions of a zone).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CprFrame {
    pub format: CprFormat,
    pub lat: u32,
    pub lon: u32,
}

/// WGS-84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, serde::Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Coordinates { lat, lon }
    }
}

/// How a CPR position was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResolveMethod {
    /// Even/odd pair, no reference needed.
    Global,
    /// Single frame relative to the aircraft's last fix.
    Local,
    /// Single frame relative to the receiver location.
    Receiver,
}

/// A resolved CPR position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedPosition {
    pub coords: Coordinates,
    pub method: ResolveMethod,
}

// ---------------------------------------------------------------------------
// Decoded message types
// ---------------------------------------------------------------------------

/// Fields common to every decoded extended squitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Header {
    pub df: u8,
    pub icao: IcaoAddress,
    pub type_code: u8,
    pub crc_ok: bool,
}

/// TC 1-4: Aircraft identification (callsign).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identification {
    #[serde(flatten)]
    pub header: Header,
    /// Callsign with trailing fill removed.
    pub callsign: String,
}

/// TC 9-18: Airborne position with barometric altitude.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    #[serde(flatten)]
    pub header: Header,
    pub altitude_ft: Option<i32>,
    pub surveillance_status: u8,
    pub cpr: CprFrame,
    /// Filled in by the session when CPR resolution succeeds.
    pub resolved: Option<ResolvedPosition>,
}

impl Position {
    pub fn coords(&self) -> Option<Coordinates> {
        self.resolved.map(|r| r.coords)
    }
}

/// Speed type for velocity messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpeedType {
    Ground,
    IAS,
    TAS,
}

/// Source of the vertical rate field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VerticalRateSource {
    Gnss,
    Baro,
}

/// TC 19: Airborne velocity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Velocity {
    #[serde(flatten)]
    pub header: Header,
    pub subtype: u8,
    pub speed_kts: Option<f64>,
    pub speed_type: SpeedType,
    /// Track over ground (subtypes 1-2) or magnetic heading (3-4), in [0, 360).
    pub heading_deg: Option<f64>,
    pub vertical_rate_fpm: Option<i32>,
    pub vertical_rate_source: VerticalRateSource,
}

/// Anything outside the decoded set: other downlink formats, or
/// extended squitters with a type code this crate doesn't decode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unclassified {
    pub df: u8,
    pub icao: Option<IcaoAddress>,
    pub type_code: Option<u8>,
}

/// Union type for all decoded messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum DecodedMessage {
    Identification(Identification),
    Position(Position),
    Velocity(Velocity),
    Unclassified(Unclassified),
}

impl DecodedMessage {
    /// Header of a classified message.
    pub fn header(&self) -> Option<&Header> {
        match self {
            DecodedMessage::Identification(m) => Some(&m.header),
            DecodedMessage::Position(m) => Some(&m.header),
            DecodedMessage::Velocity(m) => Some(&m.header),
            DecodedMessage::Unclassified(_) => None,
        }
    }

    pub fn df(&self) -> u8 {
        match self {
            DecodedMessage::Unclassified(m) => m.df,
            _ => self.header().map(|h| h.df).unwrap_or_default(),
        }
    }

    /// ICAO address, when the frame carries one.
    pub fn icao(&self) -> Option<IcaoAddress> {
        match self {
            DecodedMessage::Unclassified(m) => m.icao,
            _ => self.header().map(|h| h.icao),
        }
    }

    pub fn type_code(&self) -> Option<u8> {
        match self {
            DecodedMessage::Unclassified(m) => m.type_code,
            _ => self.header().map(|h| h.type_code),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icao_roundtrip() {
        let icao: IcaoAddress = "4840D6".parse().unwrap();
        assert_eq!(icao.value(), 0x4840D6);
        assert_eq!(icao.to_string(), "4840D6");
    }

    #[test]
    fn test_icao_masks_to_24_bits() {
        assert_eq!(IcaoAddress::new(0xFF4840D6).value(), 0x4840D6);
    }

    #[test]
    fn test_icao_parse_rejects_bad_input() {
        assert!("4840D".parse::<IcaoAddress>().is_err());
        assert!("ZZZZZZ".parse::<IcaoAddress>().is_err());
    }

    #[test]
    fn test_hex_decode() {
        assert_eq!(hex_decode("4840D6"), Some(vec![0x48, 0x40, 0xD6]));
        assert_eq!(hex_decode("4840d6"), Some(vec![0x48, 0x40, 0xD6]));
        assert_eq!(hex_decode("odd"), None);
        assert_eq!(hex_decode("ZZZZ"), None);
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode(&[0x48, 0x40, 0xD6]), "4840D6");
    }

    #[test]
    fn test_raw_frame_long() {
        let frame = RawFrame::from_hex("8D4840D6202CC371C32CE0576098").unwrap();
        assert_eq!(frame.bits(), 112);
        assert!(frame.is_long());
        assert_eq!(frame.df(), 17);
        assert_eq!(frame.to_string(), "8D4840D6202CC371C32CE0576098");
    }

    #[test]
    fn test_raw_frame_short() {
        let frame = RawFrame::from_hex("5D4840D6F8740F").unwrap();
        assert_eq!(frame.bits(), 56);
        assert_eq!(frame.df(), 11);
    }

    #[test]
    fn test_raw_frame_lowercase_and_whitespace() {
        let frame = RawFrame::from_hex("  8d4840d6202cc371c32ce0576098\n").unwrap();
        assert_eq!(frame.hex(), "8D4840D6202CC371C32CE0576098");
    }

    #[test]
    fn test_raw_frame_truncated() {
        assert_eq!(
            RawFrame::from_hex("8D4840D6"),
            Err(DecodeError::Truncated { bits: 32 })
        );
        assert_eq!(RawFrame::from_hex(""), Err(DecodeError::Truncated { bits: 0 }));
        assert_eq!(
            RawFrame::from_hex("8D4840D6202CC371C32CE057609"),
            Err(DecodeError::Truncated { bits: 108 })
        );
        assert_eq!(
            RawFrame::from_bytes(&[0u8; 13]),
            Err(DecodeError::Truncated { bits: 104 })
        );
    }

    #[test]
    fn test_raw_frame_invalid_hex() {
        assert!(matches!(
            RawFrame::from_hex("ZZZZZZZZZZZZZZ"),
            Err(DecodeError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_extended_squitter_formats() {
        assert!(is_extended_squitter(17));
        assert!(is_extended_squitter(18));
        assert!(!is_extended_squitter(11));
    }

    #[test]
    fn test_only_internal_errors_are_fatal() {
        assert!(!DecodeError::Truncated { bits: 8 }.is_internal());
        assert!(!DecodeError::CrcMismatch { residual: 1 }.is_internal());
        assert!(DecodeError::OutOfRange {
            start: 0,
            width: 8,
            len: 0
        }
        .is_internal());
    }
}
