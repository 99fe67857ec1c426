/// Bounds-checked read and write cursors over byte buffers
pub mod cursor;
/// Shared parsing helpers: winnow aliases, angle quantization, string fields
pub mod parser_utils;
/// PRS compression used by the files stored inside quest containers
pub mod prs;
/// The `.qst` quest container format
pub mod qst;
