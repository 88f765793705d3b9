//! CRC-24 parity for Mode S frames.
//!
//! ICAO standard polynomial: x^24 + x^23 + x^22 + ... + x^10 + x^3 + 1
//! Generator: 0xFFF409
//!
//! For DF17/18 the last 24 bits are pure parity, so a clean frame leaves a
//! remainder of 0. For DF0/4/5/16/20/21 the parity is overlaid with the
//! aircraft address, which the remainder then recovers.

const GENERATOR: u32 = 0xFFF409;

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 16;
        let mut bit = 0;
        while bit < 8 {
            if crc & 0x800000 != 0 {
                crc = (crc << 1) ^ GENERATOR;
            } else {
                crc <<= 1;
            }
            crc &= 0xFFFFFF;
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static CRC_TABLE: [u32; 256] = build_crc_table();

/// Polynomial division of `data`, no parity handling.
pub fn crc24_payload(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |crc, &byte| {
        ((crc << 8) ^ CRC_TABLE[(((crc >> 16) ^ byte as u32) & 0xFF) as usize]) & 0xFFFFFF
    })
}

/// Remainder of a full frame: payload CRC XOR the trailing 24-bit parity field.
pub fn crc24(frame: &[u8]) -> u32 {
    if frame.len() <= 3 {
        return frame.iter().fold(0u32, |v, &b| (v << 8) | b as u32) & 0xFFFFFF;
    }
    let n = frame.len() - 3;
    let parity = (frame[n] as u32) << 16 | (frame[n + 1] as u32) << 8 | frame[n + 2] as u32;
    crc24_payload(&frame[..n]) ^ parity
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
