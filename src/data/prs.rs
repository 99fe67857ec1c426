//! PRS compression, the LZ77 variant applied to the `.dat` and `.bin` files
//! stored inside quest containers.
//!
//! The stream interleaves control bits with data bytes. Control bits are
//! consumed LSB-first from a flag byte, and the next flag byte is pulled from
//! the stream the moment the previous one runs dry:
//!
//! - `1`: copy one literal byte.
//! - `00` + 2 bits: short copy of `2..=5` bytes. One byte follows holding
//!   `256 - distance`.
//! - `01`: long copy. A little-endian `u16` follows; its high 13 bits hold
//!   `8192 - distance` and its low 3 bits `length - 2`. A zero length field
//!   means an extra byte with `length - 1` follows. A zero word ends the stream.

use std::collections::HashMap;

use thiserror::Error;

use crate::data::cursor::{Cursor, CursorError};

const SHORT_WINDOW: usize = 256;
/// Distance 8192 is representable but would collide with the terminator word.
const LONG_WINDOW: usize = 8191;
const MAX_LENGTH: usize = 256;
const MAX_INLINE_LONG_LENGTH: usize = 9;
const MAX_CHAIN: usize = 256;

#[derive(Debug, Error)]
pub enum PrsError {
    #[error("compressed stream ended unexpectedly")]
    Truncated(#[from] CursorError),
    #[error("copy at output position {position} reaches {distance} bytes back")]
    InvalidOffset { position: usize, distance: usize },
}

struct Decoder<'a> {
    cursor: Cursor<'a>,
    flags: u8,
    bits_left: u8,
}

impl Decoder<'_> {
    fn bit(&mut self) -> Result<bool, CursorError> {
        if self.bits_left == 0 {
            self.flags = self.cursor.u8()?;
            self.bits_left = 8;
        }
        let bit = self.flags & 1 != 0;
        self.flags >>= 1;
        self.bits_left -= 1;
        Ok(bit)
    }
}

/// Decompress a PRS stream.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, PrsError> {
    let mut decoder = Decoder {
        cursor: Cursor::new_le(data),
        flags: 0,
        bits_left: 0,
    };
    let mut out = Vec::with_capacity(data.len() * 2);

    loop {
        if decoder.bit()? {
            out.push(decoder.cursor.u8()?);
            continue;
        }

        let (distance, length) = if decoder.bit()? {
            let word = decoder.cursor.u16()?;
            if word == 0 {
                break;
            }
            let distance = 8192 - (word >> 3) as usize;
            let length = match word & 7 {
                0 => decoder.cursor.u8()? as usize + 1,
                n => n as usize + 2,
            };
            (distance, length)
        } else {
            let high = decoder.bit()? as usize;
            let low = decoder.bit()? as usize;
            let distance = SHORT_WINDOW - decoder.cursor.u8()? as usize;
            (distance, (high << 1 | low) + 2)
        };

        if distance > out.len() {
            return Err(PrsError::InvalidOffset {
                position: out.len(),
                distance,
            });
        }

        // Source and destination may overlap, so copy byte by byte.
        let start = out.len() - distance;
        for i in 0..length {
            let byte = out[start + i];
            out.push(byte);
        }
    }

    Ok(out)
}

struct Encoder {
    out: Vec<u8>,
    flag_pos: usize,
    bits_used: u8,
}

impl Encoder {
    fn new(capacity: usize) -> Self {
        let mut out = Vec::with_capacity(capacity);
        out.push(0);
        Encoder {
            out,
            flag_pos: 0,
            bits_used: 0,
        }
    }

    fn bit(&mut self, bit: bool) {
        if self.bits_used == 8 {
            self.flag_pos = self.out.len();
            self.out.push(0);
            self.bits_used = 0;
        }
        if bit {
            self.out[self.flag_pos] |= 1 << self.bits_used;
        }
        self.bits_used += 1;
    }

    fn literal(&mut self, byte: u8) {
        self.bit(true);
        self.out.push(byte);
    }

    fn short_copy(&mut self, distance: usize, length: usize) {
        let n = length - 2;
        self.bit(false);
        self.bit(false);
        self.bit(n & 2 != 0);
        self.bit(n & 1 != 0);
        self.out.push((SHORT_WINDOW - distance) as u8);
    }

    fn long_copy(&mut self, distance: usize, length: usize) {
        self.bit(false);
        self.bit(true);
        let word = ((8192 - distance) as u16) << 3;
        if length <= MAX_INLINE_LONG_LENGTH {
            self.out
                .extend_from_slice(&(word | (length - 2) as u16).to_le_bytes());
        } else {
            self.out.extend_from_slice(&word.to_le_bytes());
            self.out.push((length - 1) as u8);
        }
    }

    fn finish(mut self) -> Vec<u8> {
        self.bit(false);
        self.bit(true);
        self.out.extend_from_slice(&[0, 0]);
        self.out
    }
}

fn common_prefix(data: &[u8], candidate: usize, pos: usize, max_len: usize) -> usize {
    (0..max_len)
        .take_while(|&k| data[candidate + k] == data[pos + k])
        .count()
}

/// Best `(distance, length)` back-reference for `data[pos..]`, if any.
fn longest_match(
    data: &[u8],
    pos: usize,
    chains: &HashMap<[u8; 3], Vec<usize>>,
) -> Option<(usize, usize)> {
    let max_len = (data.len() - pos).min(MAX_LENGTH);
    let mut best: Option<(usize, usize)> = None;

    if max_len >= 3 {
        let key = [data[pos], data[pos + 1], data[pos + 2]];
        if let Some(candidates) = chains.get(&key) {
            for &candidate in candidates.iter().rev().take(MAX_CHAIN) {
                let distance = pos - candidate;
                if distance > LONG_WINDOW {
                    break;
                }
                let length = common_prefix(data, candidate, pos, max_len);
                if best.is_none_or(|(_, best_len)| length > best_len) {
                    best = Some((distance, length));
                    if length == max_len {
                        break;
                    }
                }
            }
        }
    }

    if best.is_none() && max_len >= 2 {
        let low = pos.saturating_sub(SHORT_WINDOW);
        return (low..pos)
            .rev()
            .find(|&candidate| data[candidate] == data[pos] && data[candidate + 1] == data[pos + 1])
            .map(|candidate| (pos - candidate, 2));
    }

    best
}

/// Compress `data` into a PRS stream with a greedy hash-chain matcher.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = Encoder::new(data.len() / 2 + 16);
    let mut chains: HashMap<[u8; 3], Vec<usize>> = HashMap::new();
    let mut pos = 0;

    while pos < data.len() {
        let step = match longest_match(data, pos, &chains) {
            Some((distance, length)) if distance <= SHORT_WINDOW && length <= 5 => {
                encoder.short_copy(distance, length);
                length
            }
            Some((distance, length)) if length >= 3 => {
                encoder.long_copy(distance, length);
                length
            }
            _ => {
                encoder.literal(data[pos]);
                1
            }
        };

        for p in pos..pos + step {
            if p + 3 <= data.len() {
                chains
                    .entry([data[p], data[p + 1], data[p + 2]])
                    .or_default()
                    .push(p);
            }
        }
        pos += step;
    }

    encoder.finish()
}
