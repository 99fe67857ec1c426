//! Parser and writer for `.bin` quest script files.
//!
//! Layout:
//! - `0x000` `u32` object code offset
//! - `0x004` `u32` function offset table offset
//! - `0x008` `u32` file size
//! - `0x00C` `u32` always `0xFFFFFFFF`
//! - `0x010` `u32` quest id
//! - `0x014` `u32` language
//! - `0x018` UTF-16 quest name, 64 bytes
//! - `0x058` UTF-16 short description, 256 bytes
//! - `0x158` UTF-16 long description, 576 bytes
//! - `0x398` shop items up to the object code (kept opaque)
//!
//! The object code runs up to the function offset table, which holds `i32`
//! offsets into the object code until the end of the file.

use thiserror::Error;

use crate::data::cursor::{Cursor, CursorError, CursorMut};
use crate::data::parser_utils::StringFormat;
use crate::diagnostics::{Diagnostics, Warning};

pub const BIN_HEADER_SIZE: usize = 920;
pub const DEFAULT_OBJECT_CODE_OFFSET: usize = 4652;

const NAME_LEN: usize = 64;
const SHORT_DESCRIPTION_LEN: usize = 256;
const LONG_DESCRIPTION_LEN: usize = 576;
const HEADER_MARKER: u32 = 0xFFFF_FFFF;

#[derive(Debug, Error)]
pub enum BinError {
    #[error(
        "inconsistent offsets: object code at {object_code_offset}, function offset table at {function_offset_table_offset}, file size {size}"
    )]
    InvalidOffsets {
        object_code_offset: u32,
        function_offset_table_offset: u32,
        size: usize,
    },
    #[error("malformed script file: {0}")]
    Cursor(#[from] CursorError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BinFile {
    pub quest_id: u32,
    pub language: u32,
    pub name: String,
    pub short_description: String,
    pub long_description: String,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub shop_items: Vec<u8>,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub object_code: Vec<u8>,
    pub function_offsets: Vec<i32>,
}

pub fn parse_bin(data: &[u8], file: &str, diag: &mut Diagnostics) -> Result<BinFile, BinError> {
    let mut cursor = Cursor::new_le(data);

    let object_code_offset = cursor.u32()?;
    let function_offset_table_offset = cursor.u32()?;
    let size = cursor.u32()?;
    cursor.seek(4)?;
    let quest_id = cursor.u32()?;
    let language = cursor.u32()?;
    let name = cursor.string_utf16(NAME_LEN, StringFormat::PADDED)?;
    let short_description = cursor.string_utf16(SHORT_DESCRIPTION_LEN, StringFormat::PADDED)?;
    let long_description = cursor.string_utf16(LONG_DESCRIPTION_LEN, StringFormat::PADDED)?;

    if size as usize != data.len() {
        diag.warn(Warning::BinSizeMismatch {
            file: file.to_string(),
            declared: size,
            actual: data.len(),
        });
    }

    let code_start = object_code_offset as usize;
    let table_start = function_offset_table_offset as usize;
    if code_start < BIN_HEADER_SIZE || table_start < code_start || table_start > data.len() {
        return Err(BinError::InvalidOffsets {
            object_code_offset,
            function_offset_table_offset,
            size: data.len(),
        });
    }

    let shop_items = cursor.u8_array(code_start - BIN_HEADER_SIZE)?;
    let object_code = cursor.u8_array(table_start - code_start)?;
    let function_offsets = cursor.i32_array(cursor.bytes_left() / 4)?;

    Ok(BinFile {
        quest_id,
        language,
        name,
        short_description,
        long_description,
        shop_items,
        object_code,
        function_offsets,
    })
}

/// Write a script file. The object code starts at offset 4652 unless the shop
/// items need more room.
pub fn write_bin(bin: &BinFile) -> Result<Vec<u8>, BinError> {
    let code_start = DEFAULT_OBJECT_CODE_OFFSET.max(BIN_HEADER_SIZE + bin.shop_items.len());
    let table_start = code_start + bin.object_code.len();
    let size = table_start + 4 * bin.function_offsets.len();

    let mut out = vec![0u8; size];
    let mut cursor = CursorMut::new_le(&mut out);

    cursor.write_u32(code_start as u32)?;
    cursor.write_u32(table_start as u32)?;
    cursor.write_u32(size as u32)?;
    cursor.write_u32(HEADER_MARKER)?;
    cursor.write_u32(bin.quest_id)?;
    cursor.write_u32(bin.language)?;
    cursor.write_string_utf16(&bin.name, NAME_LEN)?;
    cursor.write_string_utf16(&bin.short_description, SHORT_DESCRIPTION_LEN)?;
    cursor.write_string_utf16(&bin.long_description, LONG_DESCRIPTION_LEN)?;
    cursor.write_bytes(&bin.shop_items)?;

    cursor.seek_start(code_start)?;
    cursor.write_bytes(&bin.object_code)?;
    for offset in &bin.function_offsets {
        cursor.write_i32(*offset)?;
    }

    Ok(out)
}
