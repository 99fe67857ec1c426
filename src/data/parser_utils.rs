//! Shared parsing utilities used across the container, entity table, and model parsers.

use std::f64::consts::TAU;

use glam::Vec3;
use winnow::Parser;
use winnow::binary::{Endianness, le_f32, le_i32};
use winnow::error::{ContextError, ErrMode};

/// Common result type for winnow parsers.
pub type WResult<T> = Result<T, winnow::error::ErrMode<ContextError>>;

/// Error type fed to winnow parsers run through a [`Cursor`](crate::data::cursor::Cursor).
pub type WError = ErrMode<ContextError>;

/// Raw angle value corresponding to one full turn.
pub const ANGLE_FULL_TURN: f64 = 65535.0;

/// Convert a raw 16-bit-scaled angle (`0xFFFF` is one full turn) to radians.
pub fn angle_to_radians(raw: i32) -> f32 {
    (raw as f64 * TAU / ANGLE_FULL_TURN) as f32
}

/// Re-quantize an angle in radians to the 16-bit-scaled raw representation.
pub fn radians_to_angle(radians: f32) -> i32 {
    (radians as f64 / TAU * ANGLE_FULL_TURN).round() as i32
}

/// Parse three little-endian `f32`s.
pub fn parse_vec3(input: &mut &[u8]) -> WResult<Vec3> {
    let x = le_f32.parse_next(input)?;
    let y = le_f32.parse_next(input)?;
    let z = le_f32.parse_next(input)?;
    Ok(Vec3::new(x, y, z))
}

/// Parse three little-endian raw angles into a vector of radians.
pub fn parse_angles(input: &mut &[u8]) -> WResult<Vec3> {
    let x = le_i32.parse_next(input)?;
    let y = le_i32.parse_next(input)?;
    let z = le_i32.parse_next(input)?;
    Ok(Vec3::new(
        angle_to_radians(x),
        angle_to_radians(y),
        angle_to_radians(z),
    ))
}

/// How a fixed-width string field is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringFormat {
    /// Stop at the first NUL character.
    pub null_terminated: bool,
    /// Drop trailing NUL and space padding.
    pub trim_padding: bool,
}

impl StringFormat {
    /// Keep every byte of the field.
    pub const RAW: StringFormat = StringFormat {
        null_terminated: false,
        trim_padding: false,
    };

    /// Cut at the first NUL.
    pub const NULL_TERMINATED: StringFormat = StringFormat {
        null_terminated: true,
        trim_padding: false,
    };

    /// Cut at the first NUL and drop any right-hand padding.
    pub const PADDED: StringFormat = StringFormat {
        null_terminated: true,
        trim_padding: true,
    };
}

fn finish_string(mut s: String, format: StringFormat) -> String {
    if format.trim_padding {
        let trimmed = s.trim_end_matches(['\0', ' ']).len();
        s.truncate(trimmed);
    }
    s
}

/// Decode a fixed-width single-byte string field.
///
/// Bytes outside the ASCII range are mapped 1:1 to the corresponding Latin-1
/// code point so no information is lost.
pub fn decode_ascii(bytes: &[u8], format: StringFormat) -> String {
    let bytes = if format.null_terminated {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        &bytes[..end]
    } else {
        bytes
    };

    finish_string(bytes.iter().map(|&b| char::from(b)).collect(), format)
}

/// Decode a fixed-width UTF-16 string field.
pub fn decode_utf16(bytes: &[u8], endianness: Endianness, format: StringFormat) -> String {
    let units = bytes.chunks_exact(2).map(|pair| {
        let pair = [pair[0], pair[1]];
        match endianness {
            Endianness::Big => u16::from_be_bytes(pair),
            Endianness::Little => u16::from_le_bytes(pair),
            Endianness::Native => u16::from_ne_bytes(pair),
        }
    });

    let units: Vec<u16> = if format.null_terminated {
        units.take_while(|&unit| unit != 0).collect()
    } else {
        units.collect()
    };

    let s = char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    finish_string(s, format)
}
