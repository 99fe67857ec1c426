//! Episode and area variant extraction from decoded quest scripts.
//!
//! Turning object code into instructions is the job of an
//! [`ObjectCodeDecoder`]. This module only looks at the instructions of
//! function 0, the quest's initialization routine.

use std::collections::BTreeMap;
use std::fmt;

use crate::diagnostics::{Diagnostics, Warning};
use crate::recognized::Recognized;

pub const OPCODE_RET: u16 = 1;
pub const SET_EPISODE: &str = "set_episode";
pub const MAP_DESIGNATE: &str = "BB_Map_Designate";

#[derive(Clone, Debug, PartialEq, variantly::Variantly)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InstructionArg {
    Int(i64),
    Float(f32),
    Register(u8),
    String(String),
}

impl InstructionArg {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Register(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_i64().and_then(|v| u32::try_from(v).ok())
    }
}

/// One decoded instruction.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    pub mnemonic: String,
    pub opcode: u16,
    /// Encoded size in bytes.
    pub size: usize,
    pub args: Vec<InstructionArg>,
}

impl Instruction {
    pub fn new(
        mnemonic: impl Into<String>,
        opcode: u16,
        size: usize,
        args: Vec<InstructionArg>,
    ) -> Self {
        Instruction {
            mnemonic: mnemonic.into(),
            opcode,
            size,
            args,
        }
    }
}

/// Decodes raw object code into an instruction stream.
pub trait ObjectCodeDecoder {
    fn decode(&self, object_code: &[u8]) -> Result<Vec<Instruction>, String>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Episode {
    #[default]
    I,
    II,
    IV,
}

impl Episode {
    pub fn from_raw(raw: i64) -> Recognized<Episode> {
        match raw {
            0 => Recognized::Known(Episode::I),
            1 => Recognized::Known(Episode::II),
            2 => Recognized::Known(Episode::IV),
            other => Recognized::Unknown(other),
        }
    }

    /// The episode's number: 1, 2 or 4.
    pub fn number(self) -> u8 {
        match self {
            Episode::I => 1,
            Episode::II => 2,
            Episode::IV => 4,
        }
    }
}

impl fmt::Display for Episode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Facts extracted from a script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScriptFacts {
    pub episode: Episode,
    pub area_variants: BTreeMap<u32, u32>,
}

/// The instructions of function 0, up to and including its first `ret`.
///
/// Returns `None` when no instruction starts at `function_0_offset`.
pub fn function_instructions(
    instructions: &[Instruction],
    function_0_offset: usize,
) -> Option<&[Instruction]> {
    let mut offset = 0;
    let start = instructions.iter().position(|instruction| {
        let found = offset == function_0_offset;
        offset += instruction.size;
        found
    })?;

    let end = instructions[start..]
        .iter()
        .position(|instruction| instruction.opcode == OPCODE_RET)
        .map_or(instructions.len(), |ret| start + ret + 1);

    Some(&instructions[start..end])
}

/// Episode set by the first `set_episode` in `func_0`, defaulting to episode I.
pub fn episode(func_0: &[Instruction], diag: &mut Diagnostics) -> Episode {
    let set_episode = func_0.iter().find(|instruction| instruction.mnemonic == SET_EPISODE);
    let Some(instruction) = set_episode else {
        diag.warn(Warning::MissingSetEpisode);
        return Episode::default();
    };

    // A missing or non-integer argument is reported as -1.
    let raw = instruction.args.first().and_then(InstructionArg::as_i64).unwrap_or(-1);
    Episode::from_raw(raw).unwrap_or_else(|raw| {
        diag.warn(Warning::UnknownEpisode { raw });
        Episode::default()
    })
}

/// Area id to variant id, from every `BB_Map_Designate` in `func_0`.
///
/// A later designation of the same area replaces an earlier one.
pub fn area_variants(func_0: &[Instruction], diag: &mut Diagnostics) -> BTreeMap<u32, u32> {
    let mut variants = BTreeMap::new();
    let mut offset = 0;

    for instruction in func_0 {
        if instruction.mnemonic == MAP_DESIGNATE {
            let area_id = instruction.args.first().and_then(InstructionArg::as_u32);
            let variant_id = instruction.args.get(2).and_then(InstructionArg::as_u32);
            match (area_id, variant_id) {
                (Some(area_id), Some(variant_id)) => {
                    variants.insert(area_id, variant_id);
                }
                _ => diag.warn(Warning::InvalidMapDesignate { offset }),
            }
        }
        offset += instruction.size;
    }

    variants
}

/// Extract episode and area variants from a decoded instruction stream.
///
/// Any condition that prevents locating function 0 yields the defaults.
pub fn scan(
    instructions: &[Instruction],
    function_offsets: &[i32],
    diag: &mut Diagnostics,
) -> ScriptFacts {
    let Some(&offset) = function_offsets.first() else {
        diag.warn(Warning::NoFunctions);
        return ScriptFacts::default();
    };

    let func_0 = usize::try_from(offset)
        .ok()
        .and_then(|start| function_instructions(instructions, start));
    let Some(func_0) = func_0 else {
        diag.warn(Warning::MissingFunction0 { offset });
        return ScriptFacts::default();
    };

    ScriptFacts {
        episode: episode(func_0, diag),
        area_variants: area_variants(func_0, diag),
    }
}

/// Decode `object_code` and scan it. A decoder failure is reported as a
/// warning and yields the defaults.
pub fn scan_object_code(
    decoder: &dyn ObjectCodeDecoder,
    object_code: &[u8],
    function_offsets: &[i32],
    diag: &mut Diagnostics,
) -> ScriptFacts {
    match decoder.decode(object_code) {
        Ok(instructions) => scan(&instructions, function_offsets, diag),
        Err(reason) => {
            diag.warn(Warning::UndecodableScript { reason });
            ScriptFacts::default()
        }
    }
}
