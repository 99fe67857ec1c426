//! Positioned, bounds-checked views over byte buffers.
//!
//! [`Cursor`] reads from a shared buffer and [`CursorMut`] writes into an
//! exclusive one. Both carry a fixed [`Endianness`] and refuse any access that
//! would cross the end of their buffer. `take`/`take_mut` hand out sub-cursors
//! that alias the next `n` bytes of the parent's buffer with their own
//! position, then advance the parent past them.

use thiserror::Error;
use winnow::Parser;
use winnow::binary;
use winnow::token::take;

pub use winnow::binary::Endianness;

use crate::data::parser_utils::{StringFormat, WError, decode_ascii, decode_utf16};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    #[error(
        "out of bounds: {requested} bytes requested at position 0x{position:X} of a 0x{size:X}-byte buffer"
    )]
    OutOfBounds {
        position: usize,
        requested: usize,
        size: usize,
    },
    #[error("seek to {target} is outside of the 0x{size:X}-byte buffer")]
    SeekOutOfBounds { target: isize, size: usize },
    #[error("string of {len} bytes does not fit in a {max}-byte field")]
    StringTooLong { len: usize, max: usize },
}

/// Read cursor over a borrowed byte buffer.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    position: usize,
    endianness: Endianness,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8], endianness: Endianness) -> Self {
        Cursor {
            data,
            position: 0,
            endianness,
        }
    }

    pub fn new_le(data: &'a [u8]) -> Self {
        Cursor::new(data, Endianness::Little)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn bytes_left(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// The unread part of the buffer. Does not advance the cursor.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    fn check(&self, requested: usize) -> Result<(), CursorError> {
        if requested > self.bytes_left() {
            return Err(CursorError::OutOfBounds {
                position: self.position,
                requested,
                size: self.data.len(),
            });
        }
        Ok(())
    }

    /// Run a winnow parser over exactly the next `width` bytes.
    ///
    /// The parser never sees bytes past `width`; the cursor advances by
    /// `width` regardless of how much of the span the parser consumed.
    pub fn parse_fixed<T, P>(&mut self, width: usize, mut parser: P) -> Result<T, CursorError>
    where
        P: Parser<&'a [u8], T, WError>,
    {
        self.check(width)?;
        let data: &'a [u8] = self.data;
        let mut input = &data[self.position..self.position + width];
        let value = parser
            .parse_next(&mut input)
            .map_err(|_| CursorError::OutOfBounds {
                position: self.position,
                requested: width,
                size: data.len(),
            })?;
        self.position += width;
        Ok(value)
    }

    pub fn u8(&mut self) -> Result<u8, CursorError> {
        self.parse_fixed(1, binary::u8)
    }

    pub fn i8(&mut self) -> Result<i8, CursorError> {
        self.parse_fixed(1, binary::i8)
    }

    pub fn u16(&mut self) -> Result<u16, CursorError> {
        let endian = self.endianness;
        self.parse_fixed(2, binary::u16(endian))
    }

    pub fn i16(&mut self) -> Result<i16, CursorError> {
        let endian = self.endianness;
        self.parse_fixed(2, binary::i16(endian))
    }

    pub fn u32(&mut self) -> Result<u32, CursorError> {
        let endian = self.endianness;
        self.parse_fixed(4, binary::u32(endian))
    }

    pub fn i32(&mut self) -> Result<i32, CursorError> {
        let endian = self.endianness;
        self.parse_fixed(4, binary::i32(endian))
    }

    pub fn f32(&mut self) -> Result<f32, CursorError> {
        let endian = self.endianness;
        self.parse_fixed(4, binary::f32(endian))
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], CursorError> {
        self.parse_fixed(len, take(len))
    }

    pub fn u8_array(&mut self, len: usize) -> Result<Vec<u8>, CursorError> {
        Ok(self.bytes(len)?.to_vec())
    }

    /// Read a fixed-length byte span into an array.
    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], CursorError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub fn u16_array(&mut self, count: usize) -> Result<Vec<u16>, CursorError> {
        (0..count).map(|_| self.u16()).collect()
    }

    pub fn i32_array(&mut self, count: usize) -> Result<Vec<i32>, CursorError> {
        (0..count).map(|_| self.i32()).collect()
    }

    /// Read a `len`-byte single-byte string field.
    pub fn string_ascii(
        &mut self,
        len: usize,
        format: StringFormat,
    ) -> Result<String, CursorError> {
        Ok(decode_ascii(self.bytes(len)?, format))
    }

    /// Read a `len`-byte UTF-16 string field.
    pub fn string_utf16(
        &mut self,
        len: usize,
        format: StringFormat,
    ) -> Result<String, CursorError> {
        let endian = self.endianness;
        Ok(decode_utf16(self.bytes(len)?, endian, format))
    }

    /// Move the cursor relative to its current position.
    pub fn seek(&mut self, offset: isize) -> Result<(), CursorError> {
        let target = self.position as isize + offset;
        if target < 0 || target as usize > self.data.len() {
            return Err(CursorError::SeekOutOfBounds {
                target,
                size: self.data.len(),
            });
        }
        self.position = target as usize;
        Ok(())
    }

    /// Move the cursor to an absolute position.
    pub fn seek_start(&mut self, position: usize) -> Result<(), CursorError> {
        if position > self.data.len() {
            return Err(CursorError::SeekOutOfBounds {
                target: position as isize,
                size: self.data.len(),
            });
        }
        self.position = position;
        Ok(())
    }

    /// Sub-cursor over the next `len` bytes, starting at position 0.
    ///
    /// The parent advances past those bytes immediately.
    pub fn take(&mut self, len: usize) -> Result<Cursor<'a>, CursorError> {
        let endianness = self.endianness;
        let data = self.bytes(len)?;
        Ok(Cursor {
            data,
            position: 0,
            endianness,
        })
    }
}

macro_rules! write_number {
    ($($name:ident: $ty:ty),+ $(,)?) => {
        $(
            pub fn $name(&mut self, value: $ty) -> Result<(), CursorError> {
                let bytes = match self.endianness {
                    Endianness::Big => value.to_be_bytes(),
                    Endianness::Little => value.to_le_bytes(),
                    Endianness::Native => value.to_ne_bytes(),
                };
                self.write_bytes(&bytes)
            }
        )+
    };
}

/// Write cursor over an exclusively borrowed, fixed-size byte buffer.
#[derive(Debug)]
pub struct CursorMut<'a> {
    data: &'a mut [u8],
    position: usize,
    endianness: Endianness,
}

impl<'a> CursorMut<'a> {
    pub fn new(data: &'a mut [u8], endianness: Endianness) -> Self {
        CursorMut {
            data,
            position: 0,
            endianness,
        }
    }

    pub fn new_le(data: &'a mut [u8]) -> Self {
        CursorMut::new(data, Endianness::Little)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn bytes_left(&self) -> usize {
        self.data.len() - self.position
    }

    fn check(&self, requested: usize) -> Result<(), CursorError> {
        if requested > self.bytes_left() {
            return Err(CursorError::OutOfBounds {
                position: self.position,
                requested,
                size: self.data.len(),
            });
        }
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), CursorError> {
        self.check(bytes.len())?;
        self.data[self.position..self.position + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
        Ok(())
    }

    /// Write `len` zero bytes.
    pub fn write_zeros(&mut self, len: usize) -> Result<(), CursorError> {
        self.check(len)?;
        self.data[self.position..self.position + len].fill(0);
        self.position += len;
        Ok(())
    }

    write_number! {
        write_u8: u8,
        write_i8: i8,
        write_u16: u16,
        write_i16: i16,
        write_u32: u32,
        write_i32: i32,
        write_f32: f32,
    }

    /// Write `s` into a `len`-byte field, zero-padding the rest.
    pub fn write_string_ascii(&mut self, s: &str, len: usize) -> Result<(), CursorError> {
        let bytes = s.as_bytes();
        if bytes.len() > len {
            return Err(CursorError::StringTooLong {
                len: bytes.len(),
                max: len,
            });
        }
        self.check(len)?;
        self.write_bytes(bytes)?;
        self.write_zeros(len - bytes.len())
    }

    /// Write `s` as UTF-16 into a `len`-byte field, zero-padding the rest.
    pub fn write_string_utf16(&mut self, s: &str, len: usize) -> Result<(), CursorError> {
        let units: Vec<u16> = s.encode_utf16().collect();
        if units.len() * 2 > len {
            return Err(CursorError::StringTooLong {
                len: units.len() * 2,
                max: len,
            });
        }
        self.check(len)?;
        for unit in &units {
            self.write_u16(*unit)?;
        }
        self.write_zeros(len - units.len() * 2)
    }

    pub fn seek(&mut self, offset: isize) -> Result<(), CursorError> {
        let target = self.position as isize + offset;
        if target < 0 || target as usize > self.data.len() {
            return Err(CursorError::SeekOutOfBounds {
                target,
                size: self.data.len(),
            });
        }
        self.position = target as usize;
        Ok(())
    }

    pub fn seek_start(&mut self, position: usize) -> Result<(), CursorError> {
        if position > self.data.len() {
            return Err(CursorError::SeekOutOfBounds {
                target: position as isize,
                size: self.data.len(),
            });
        }
        self.position = position;
        Ok(())
    }

    /// Sub-cursor writing into the next `len` bytes of this buffer.
    ///
    /// The parent is advanced past the span and stays borrowed until the
    /// sub-cursor is dropped.
    pub fn take_mut(&mut self, len: usize) -> Result<CursorMut<'_>, CursorError> {
        self.check(len)?;
        let start = self.position;
        self.position += len;
        Ok(CursorMut {
            data: &mut self.data[start..start + len],
            position: 0,
            endianness: self.endianness,
        })
    }
}
