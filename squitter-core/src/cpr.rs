//! Compact Position Reporting: CPR decode for airborne ADS-B positions.
//!
//! Two decode modes:
//! - Global: an even+odd frame pair. No reference needed.
//! - Local: single frame + reference position within ~180 nmi.
//!
//! Key constants:
//! - NZ = 15 (latitude zones per hemisphere for even frames)
//! - Nb = 17 (bits per coordinate)
//! - Dlat_even = 360 / (4 * NZ) = 6.0 degrees
//! - Dlat_odd = 360 / (4 * NZ - 1) ≈ 6.1017 degrees
//!
//! The track cache decides which frames are fresh enough to combine. Global
//! decode only needs the gap between them to bound how far apart the two
//! frames may place the aircraft.

use thiserror::Error;

use crate::types::{Coordinates, CprFormat, CprFrame};

/// Number of latitude zones per hemisphere.
const NZ: f64 = 15.0;

/// Bits per CPR coordinate.
pub const NB: u32 = 17;

/// Encoded coordinate range (2^17 = 131072).
const CPR_MAX: f64 = (1u32 << NB) as f64;

/// Degrees of arc per second at 1000 kt, the fastest drift a pair may imply.
const MAX_DRIFT_DEG_PER_SEC: f64 = 1000.0 / 3600.0 / 60.0;

/// Allowance for encoding quantization between frames sent from one spot.
const AGREEMENT_SLACK_DEG: f64 = 0.002;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CprError {
    /// The two frames disagree on the latitude band, place the aircraft
    /// further apart than it could fly in the gap between them, or put it
    /// off the globe. Almost always a stale or mismatched pair.
    #[error("inconsistent CPR pair (even lat {even_lat:.4}, odd lat {odd_lat:.4})")]
    Inconsistent { even_lat: f64, odd_lat: f64 },
    /// A local decode near a pole landed past 90 degrees.
    #[error("CPR position too far from reference")]
    ReferenceTooFar,
}

/// Latitudes at which the longitude zone count drops by one, starting at
/// NL=59 at the equator. Precomputed from
/// `floor(2π / acos(1 - (1 - cos(π / 2NZ)) / cos²(π/180 · lat)))`.
const NL_TRANSITIONS: [f64; 58] = [
    10.47047130,
    14.82817437,
    18.18626357,
    21.02939493,
    23.54504487,
    25.82924707,
    27.93898710,
    29.91135686,
    31.77209708,
    33.53993436,
    35.22899598,
    36.85025108,
    38.41241892,
    39.92256684,
    41.38651832,
    42.80914012,
    44.19454951,
    45.54626723,
    46.86733252,
    48.16039128,
    49.42776439,
    50.67150166,
    51.89342469,
    53.09516153,
    54.27817472,
    55.44378444,
    56.59318756,
    57.72747354,
    58.84763776,
    59.95459277,
    61.04917774,
    62.13216659,
    63.20427479,
    64.26616523,
    65.31845310,
    66.36171008,
    67.39646774,
    68.42322022,
    69.44242631,
    70.45451075,
    71.45986473,
    72.45884545,
    73.45177442,
    74.43893416,
    75.42056257,
    76.39684391,
    77.36789461,
    78.33374083,
    79.29428225,
    80.24923213,
    81.19801349,
    82.13956981,
    83.07199445,
    84.00000000,
    84.89166191,
    85.75541621,
    86.53536998,
    87.00000000,
];

/// Number of longitude zones at a given latitude (NL function).
///
/// Ranges from 59 at the equator down to 1 at the poles.
pub fn nl(lat: f64) -> u32 {
    let lat = lat.abs();
    let crossed = NL_TRANSITIONS.iter().take_while(|&&t| lat >= t).count();
    59 - crossed as u32
}

/// Modulo that always returns a non-negative result.
fn modulo(x: f64, y: f64) -> f64 {
    x - y * (x / y).floor()
}

/// Latitude zone size for a frame parity.
fn dlat(format: CprFormat) -> f64 {
    360.0 / (4.0 * NZ - format.index() as f64)
}

/// Longitude zone count for a parity at a latitude, never below 1.
fn n_lon(lat: f64, format: CprFormat) -> u32 {
    nl(lat).saturating_sub(format.index()).max(1)
}

/// Wrap longitude into (-180, 180].
fn normalize_lon(lon: f64) -> f64 {
    lon - 360.0 * ((lon - 180.0) / 360.0).ceil()
}

/// Global CPR decode from an even/odd frame pair.
///
/// `latest` names the frame that arrived last; its latitude and longitude
/// zone are the ones reported. `elapsed_secs` is the gap between the two
/// frames: each frame is decoded on its own grid and the pair is rejected
/// when the two positions are further apart than 1000 kt covers in that
/// time.
///
/// The check is statistical. Frames from the wrong zone usually decode to
/// points far apart, but the longer the gap, the more mismatched pairs slip
/// under the bound.
pub fn global_decode(
    even: &CprFrame,
    odd: &CprFrame,
    latest: CprFormat,
    elapsed_secs: f64,
) -> Result<Coordinates, CprError> {
    debug_assert_eq!(even.format, CprFormat::Even);
    debug_assert_eq!(odd.format, CprFormat::Odd);

    let lat_even_cpr = even.lat as f64 / CPR_MAX;
    let lon_even_cpr = even.lon as f64 / CPR_MAX;
    let lat_odd_cpr = odd.lat as f64 / CPR_MAX;
    let lon_odd_cpr = odd.lon as f64 / CPR_MAX;

    // Latitude zone index; the 59/60 asymmetry comes from the odd grid
    // having one zone fewer
    let j = (59.0 * lat_even_cpr - 60.0 * lat_odd_cpr + 0.5).floor();

    let mut lat_e = dlat(CprFormat::Even) * (modulo(j, 60.0) + lat_even_cpr);
    let mut lat_o = dlat(CprFormat::Odd) * (modulo(j, 59.0) + lat_odd_cpr);

    // Southern hemisphere comes out in [270, 360)
    if lat_e >= 270.0 {
        lat_e -= 360.0;
    }
    if lat_o >= 270.0 {
        lat_o -= 360.0;
    }

    let inconsistent = CprError::Inconsistent {
        even_lat: lat_e,
        odd_lat: lat_o,
    };
    if lat_e.abs() > 90.0 || lat_o.abs() > 90.0 {
        return Err(inconsistent);
    }
    // Both latitudes must fall in the same longitude band
    if nl(lat_e) != nl(lat_o) {
        return Err(inconsistent);
    }

    let bound = MAX_DRIFT_DEG_PER_SEC * elapsed_secs.abs() + AGREEMENT_SLACK_DEG;
    if (lat_e - lat_o).abs() > bound {
        return Err(inconsistent);
    }

    let nl_val = nl(lat_e) as f64;
    let m = (lon_even_cpr * (nl_val - 1.0) - lon_odd_cpr * nl_val + 0.5).floor();
    let lon_at = |format: CprFormat, lat: f64, lon_cpr: f64| {
        let ni = n_lon(lat, format) as f64;
        (360.0 / ni) * (modulo(m, ni) + lon_cpr)
    };
    let lon_e = lon_at(CprFormat::Even, lat_e, lon_even_cpr);
    let lon_o = lon_at(CprFormat::Odd, lat_o, lon_odd_cpr);

    // East-west distance in degrees of arc
    let spread = modulo(lon_e - lon_o + 180.0, 360.0) - 180.0;
    let mean_lat = ((lat_e + lat_o) / 2.0).to_radians();
    if (spread * mean_lat.cos()).abs() > bound {
        return Err(inconsistent);
    }

    let (lat, lon) = match latest {
        CprFormat::Even => (lat_e, lon_e),
        CprFormat::Odd => (lat_o, lon_o),
    };
    Ok(Coordinates::new(round6(lat), round6(normalize_lon(lon))))
}

/// Local CPR decode using a reference position.
///
/// The zone nearest the reference always wins, so the result is within
/// half a zone of it by construction. A reference that has drifted more than
/// half a zone (~180 nmi) from the aircraft yields a position in the wrong
/// zone rather than an error; reference freshness is the only guard, and the
/// caller must enforce it.
pub fn local_decode(frame: &CprFrame, reference: Coordinates) -> Result<Coordinates, CprError> {
    let dlat = dlat(frame.format);
    let lat_cpr = frame.lat as f64 / CPR_MAX;
    let lon_cpr = frame.lon as f64 / CPR_MAX;

    let j = (reference.lat / dlat).floor()
        + (modulo(reference.lat, dlat) / dlat - lat_cpr + 0.5).floor();
    let lat = dlat * (j + lat_cpr);

    if lat.abs() > 90.0 {
        return Err(CprError::ReferenceTooFar);
    }

    let dlon = 360.0 / n_lon(lat, frame.format) as f64;
    let m = (reference.lon / dlon).floor()
        + (modulo(reference.lon, dlon) / dlon - lon_cpr + 0.5).floor();
    let lon = dlon * (m + lon_cpr);

    Ok(Coordinates::new(round6(lat), round6(normalize_lon(lon))))
}

/// Encode a position into an airborne CPR frame of the given parity.
pub fn encode(coords: Coordinates, format: CprFormat) -> CprFrame {
    let dlat = dlat(format);
    let yz = (CPR_MAX * modulo(coords.lat, dlat) / dlat + 0.5).floor();
    let rlat = dlat * (yz / CPR_MAX + (coords.lat / dlat).floor());

    let dlon = 360.0 / n_lon(rlat, format) as f64;
    let xz = (CPR_MAX * modulo(coords.lon, dlon) / dlon + 0.5).floor();

    let mask = (1u32 << NB) - 1;
    CprFrame {
        format,
        lat: yz as u32 & mask,
        lon: xz as u32 & mask,
    }
}

/// Round to 6 decimal places (~0.1 m).
fn round6(val: f64) -> f64 {
    (val * 1_000_000.0).round() / 1_000_000.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
