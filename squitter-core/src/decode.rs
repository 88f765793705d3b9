//! Decode Mode S frames into typed aircraft messages.
//!
//! Extended squitters (DF17 ADS-B, DF18 TIS-B) are split by Type Code:
//! - TC 1-4:  Aircraft identification (callsign)
//! - TC 9-18: Airborne position (barometric alt + CPR-encoded lat/lon)
//! - TC 19:   Airborne velocity (ground speed or airspeed + heading)
//!
//! Every other downlink format and type code comes back as
//! `DecodedMessage::Unclassified`, never as an error.

use crate::altitude::decode_ac12;
use crate::bits::{read_bits, read_flag};
use crate::crc;
use crate::types::*;

// Field offsets within a 112-bit extended squitter
const DF_BIT: usize = 0;
const ICAO_BIT: usize = 8;
const TC_BIT: usize = 32;
const ME_BIT: usize = 32;

/// Decode one frame.
///
/// Fails only when the frame is too short for its downlink format or when a
/// field read falls outside the buffer (an internal fault).
pub fn decode(raw: &RawFrame) -> Result<DecodedMessage, DecodeError> {
    let buf = raw.as_bytes();
    let df = read_bits(buf, DF_BIT, 5)? as u8;

    if !is_extended_squitter(df) {
        return Ok(DecodedMessage::Unclassified(Unclassified {
            df,
            icao: address_of(raw, df)?,
            type_code: None,
        }));
    }

    if !raw.is_long() {
        return Err(DecodeError::Truncated { bits: raw.bits() });
    }

    let header = Header {
        df,
        icao: IcaoAddress::new(read_bits(buf, ICAO_BIT, 24)?),
        type_code: read_bits(buf, TC_BIT, 5)? as u8,
        crc_ok: crc::crc24(buf) == 0,
    };

    let msg = match header.type_code {
        1..=4 => DecodedMessage::Identification(decode_identification(buf, header)?),
        9..=18 => DecodedMessage::Position(decode_position(buf, header)?),
        19 => match decode_velocity(buf, header)? {
            Some(v) => DecodedMessage::Velocity(v),
            None => unclassified(header),
        },
        _ => unclassified(header),
    };
    Ok(msg)
}

fn unclassified(header: Header) -> DecodedMessage {
    DecodedMessage::Unclassified(Unclassified {
        df: header.df,
        icao: Some(header.icao),
        type_code: Some(header.type_code),
    })
}

/// Address carried by a non-squitter frame, if it has one.
///
/// DF11 carries it explicitly; the surveillance and Comm-B replies overlay it
/// on the parity field, so it falls out as the CRC remainder.
fn address_of(raw: &RawFrame, df: u8) -> Result<Option<IcaoAddress>, DecodeError> {
    let buf = raw.as_bytes();
    let icao = match df {
        11 => Some(IcaoAddress::new(read_bits(buf, ICAO_BIT, 24)?)),
        0 | 4 | 5 | 16 | 20 | 21 => Some(IcaoAddress::new(crc::crc24(buf))),
        _ => None,
    };
    Ok(icao)
}

/// TC 1-4: eight 6-bit characters in bits 40-87.
pub fn decode_identification(buf: &[u8], header: Header) -> Result<Identification, DecodeError> {
    let mut callsign = String::with_capacity(8);
    for i in 0..8 {
        let idx = read_bits(buf, ME_BIT + 8 + i * 6, 6)? as usize;
        callsign.push(CALLSIGN_CHARSET[idx] as char);
    }

    // Only trailing fill is dropped; internal spaces are part of the callsign
    let trimmed = callsign.trim_end_matches(CALLSIGN_FILL).len();
    callsign.truncate(trimmed);

    Ok(Identification { header, callsign })
}

/// TC 9-18: altitude, CPR parity, and the raw 17-bit CPR fields.
pub fn decode_position(buf: &[u8], header: Header) -> Result<Position, DecodeError> {
    let surveillance_status = read_bits(buf, ME_BIT + 5, 2)? as u8;
    let altitude_ft = decode_ac12(read_bits(buf, ME_BIT + 8, 12)?);
    let format = if read_flag(buf, ME_BIT + 21)? {
        CprFormat::Odd
    } else {
        CprFormat::Even
    };

    Ok(Position {
        header,
        altitude_ft,
        surveillance_status,
        cpr: CprFrame {
            format,
            lat: read_bits(buf, ME_BIT + 22, 17)?,
            lon: read_bits(buf, ME_BIT + 39, 17)?,
        },
        resolved: None,
    })
}

/// TC 19: airborne velocity. `None` for reserved subtypes (0, 5-7).
pub fn decode_velocity(buf: &[u8], header: Header) -> Result<Option<Velocity>, DecodeError> {
    let subtype = read_bits(buf, ME_BIT + 5, 3)? as u8;
    // Supersonic subtypes count in 4 kt steps
    let scale = match subtype {
        1 | 3 => 1,
        2 | 4 => 4,
        _ => return Ok(None),
    };

    let vertical_rate_source = if read_flag(buf, ME_BIT + 35)? {
        VerticalRateSource::Baro
    } else {
        VerticalRateSource::Gnss
    };
    let vr_down = read_flag(buf, ME_BIT + 36)?;
    let vr_raw = read_bits(buf, ME_BIT + 37, 9)? as i32;
    let vertical_rate_fpm = (vr_raw > 0).then(|| {
        let rate = (vr_raw - 1) * 64;
        if vr_down {
            -rate
        } else {
            rate
        }
    });

    let a_flag = read_flag(buf, ME_BIT + 13)?;
    let a_raw = read_bits(buf, ME_BIT + 14, 10)? as i32;
    let b_flag = read_flag(buf, ME_BIT + 24)?;
    let b_raw = read_bits(buf, ME_BIT + 25, 10)? as i32;

    let (speed_kts, speed_type, heading_deg) = if subtype <= 2 {
        // East-west / north-south components; direction bit set = west / south
        let (speed, heading) = if a_raw > 0 && b_raw > 0 {
            let vx = ((a_raw - 1) * scale) as f64 * if a_flag { -1.0 } else { 1.0 };
            let vy = ((b_raw - 1) * scale) as f64 * if b_flag { -1.0 } else { 1.0 };
            let speed = (vx * vx + vy * vy).sqrt();
            let heading = vx.atan2(vy).to_degrees();
            (Some(round2(speed)), Some(normalize_heading(round2(heading))))
        } else {
            (None, None)
        };
        (speed, SpeedType::Ground, heading)
    } else {
        // Heading status / magnetic heading, airspeed type / airspeed
        let heading = a_flag.then(|| normalize_heading(round2(a_raw as f64 * 360.0 / 1024.0)));
        let speed = (b_raw > 0).then(|| ((b_raw - 1) * scale) as f64);
        let speed_type = if b_flag { SpeedType::TAS } else { SpeedType::IAS };
        (speed, speed_type, heading)
    };

    Ok(Some(Velocity {
        header,
        subtype,
        speed_kts,
        speed_type,
        heading_deg,
        vertical_rate_fpm,
        vertical_rate_source,
    }))
}

/// Wrap into [0, 360).
fn normalize_heading(deg: f64) -> f64 {
    let h = deg.rem_euclid(360.0);
    if h >= 360.0 {
        0.0
    } else {
        h
    }
}

/// Round to 2 decimal places.
fn round2(val: f64) -> f64 {
    (val * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
