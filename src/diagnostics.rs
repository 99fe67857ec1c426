//! Tolerable anomalies found while decoding.
//!
//! Structural problems abort a parse with a typed error. Everything else is
//! recorded here as a [`Warning`] naming the file, record, or chunk it came
//! from, and decoding carries on with a best-effort result.

use thiserror::Error;
use tracing::warn;

use crate::quest::dat::EntityKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Warning {
    #[error("chunk {chunk_no} of file {file} declares {size} data bytes, reading just 1024")]
    OversizedChunk { file: String, chunk_no: u8, size: u32 },
    #[error("chunk {chunk_no} of file {file} was already encountered, overwriting previous chunk")]
    DuplicateChunk { file: String, chunk_no: u8 },
    #[error("file {file} is missing chunk {chunk_no}")]
    MissingChunk { file: String, chunk_no: usize },
    #[error("file {file} has an actual size of {actual} instead of the expected size {expected}")]
    FileSizeMismatch {
        file: String,
        expected: u32,
        actual: usize,
    },
    #[error("file {file} declares {declared} bytes, more than the {max} its chunks can address")]
    DeclaredSizeTooLarge { file: String, declared: u32, max: usize },
    #[error("container holds more than one {extension} file, ignoring {ignored}")]
    DuplicateSubFile { extension: String, ignored: String },
    #[error(
        "read {read} bytes instead of expected {expected} for {kind:?} block in area {area_id} of {file}"
    )]
    RecordDrift {
        file: String,
        kind: EntityKind,
        area_id: u32,
        expected: u32,
        read: usize,
    },
    #[error("value {declared} in size field of {file} does not match actual size {actual}")]
    BinSizeMismatch {
        file: String,
        declared: u32,
        actual: usize,
    },
    #[error("chunk type {type_id} at offset 0x{offset:X} is not implemented")]
    UnknownChunk { type_id: u8, offset: usize },
    #[error("draw directive at offset 0x{offset:X} references empty cache slot {store_index}")]
    EmptyCacheSlot { store_index: u8, offset: usize },
    #[error("object code could not be decoded: {reason}")]
    UndecodableScript { reason: String },
    #[error("script contains no functions")]
    NoFunctions,
    #[error("function 0 offset {offset} does not start an instruction")]
    MissingFunction0 { offset: i32 },
    #[error("function 0 has no set_episode instruction")]
    MissingSetEpisode,
    #[error("set_episode argument {raw} is not a known episode, defaulting to episode 1")]
    UnknownEpisode { raw: i64 },
    #[error("map designate instruction at offset {offset} has unusable arguments")]
    InvalidMapDesignate { offset: usize },
}

/// Collects warnings for one decoding session and mirrors them to `tracing`.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, warning: Warning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}
