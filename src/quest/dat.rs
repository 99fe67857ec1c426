//! Parser and writer for `.dat` entity tables.
//!
//! The table is a run of blocks, each starting with a 16-byte header of four
//! little-endian `u32`s: entity type, total block size, area id, and the size
//! of the entity data that follows. A block of type 0 ends the table.

use glam::Vec3;
use itertools::Itertools;
use thiserror::Error;

use crate::data::cursor::{Cursor, CursorError, CursorMut};
use crate::data::parser_utils::{parse_angles, parse_vec3, radians_to_angle};
use crate::diagnostics::{Diagnostics, Warning};

pub const BLOCK_HEADER_SIZE: usize = 16;
pub const OBJECT_SIZE: usize = 68;
pub const NPC_SIZE: usize = 72;

const OBJECT_TYPE: u32 = 1;
const NPC_TYPE: u32 = 2;

#[derive(Debug, Error)]
pub enum DatError {
    #[error(
        "block of type {entity_type} in area {area_id} declares {entities_size} entity bytes but a total size of {total_size}"
    )]
    SizeMismatch {
        entity_type: u32,
        area_id: u32,
        total_size: u32,
        entities_size: u32,
    },
    #[error("malformed entity table: {0}")]
    Cursor(#[from] CursorError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntityKind {
    Object,
    Npc,
}

impl EntityKind {
    pub fn entity_type(self) -> u32 {
        match self {
            EntityKind::Object => OBJECT_TYPE,
            EntityKind::Npc => NPC_TYPE,
        }
    }
}

/// A placed object. Rotation is in radians.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DatObject {
    pub type_id: u16,
    pub section_id: u16,
    pub area_id: u32,
    pub position: Vec3,
    pub rotation: Vec3,
    pub unknown_1: [u8; 10],
    pub unknown_2: [u8; 2],
    pub unknown_3: [u8; 28],
}

/// A placed NPC. Rotation is in radians.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DatNpc {
    pub type_id: u16,
    pub section_id: u16,
    pub area_id: u32,
    pub position: Vec3,
    pub rotation: Vec3,
    pub skin: u32,
    pub unknown_1: [u8; 10],
    pub unknown_2: [u8; 6],
    pub unknown_3: [u8; 20],
    pub unknown_4: [u8; 4],
}

/// A block of any other entity type, kept byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DatUnknown {
    pub entity_type: u32,
    pub area_id: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DatFile {
    pub objs: Vec<DatObject>,
    pub npcs: Vec<DatNpc>,
    pub unknowns: Vec<DatUnknown>,
}

trait DatRecord: Sized {
    const KIND: EntityKind;
    const SIZE: usize;

    fn area_id(&self) -> u32;
    fn read(cursor: &mut Cursor<'_>, area_id: u32) -> Result<Self, CursorError>;
    fn write(&self, cursor: &mut CursorMut<'_>) -> Result<(), CursorError>;
}

fn write_vec3(cursor: &mut CursorMut<'_>, v: Vec3) -> Result<(), CursorError> {
    cursor.write_f32(v.x)?;
    cursor.write_f32(v.y)?;
    cursor.write_f32(v.z)
}

fn write_angles(cursor: &mut CursorMut<'_>, v: Vec3) -> Result<(), CursorError> {
    cursor.write_i32(radians_to_angle(v.x))?;
    cursor.write_i32(radians_to_angle(v.y))?;
    cursor.write_i32(radians_to_angle(v.z))
}

impl DatRecord for DatObject {
    const KIND: EntityKind = EntityKind::Object;
    const SIZE: usize = OBJECT_SIZE;

    fn area_id(&self) -> u32 {
        self.area_id
    }

    fn read(cursor: &mut Cursor<'_>, area_id: u32) -> Result<Self, CursorError> {
        let type_id = cursor.u16()?;
        let unknown_1 = cursor.array()?;
        let section_id = cursor.u16()?;
        let unknown_2 = cursor.array()?;
        let position = cursor.parse_fixed(12, parse_vec3)?;
        let rotation = cursor.parse_fixed(12, parse_angles)?;
        let unknown_3 = cursor.array()?;

        Ok(DatObject {
            type_id,
            section_id,
            area_id,
            position,
            rotation,
            unknown_1,
            unknown_2,
            unknown_3,
        })
    }

    fn write(&self, cursor: &mut CursorMut<'_>) -> Result<(), CursorError> {
        cursor.write_u16(self.type_id)?;
        cursor.write_bytes(&self.unknown_1)?;
        cursor.write_u16(self.section_id)?;
        cursor.write_bytes(&self.unknown_2)?;
        write_vec3(cursor, self.position)?;
        write_angles(cursor, self.rotation)?;
        cursor.write_bytes(&self.unknown_3)
    }
}

impl DatRecord for DatNpc {
    const KIND: EntityKind = EntityKind::Npc;
    const SIZE: usize = NPC_SIZE;

    fn area_id(&self) -> u32 {
        self.area_id
    }

    fn read(cursor: &mut Cursor<'_>, area_id: u32) -> Result<Self, CursorError> {
        let type_id = cursor.u16()?;
        let unknown_1 = cursor.array()?;
        let section_id = cursor.u16()?;
        let unknown_2 = cursor.array()?;
        let position = cursor.parse_fixed(12, parse_vec3)?;
        let rotation = cursor.parse_fixed(12, parse_angles)?;
        let unknown_3 = cursor.array()?;
        let skin = cursor.u32()?;
        let unknown_4 = cursor.array()?;

        Ok(DatNpc {
            type_id,
            section_id,
            area_id,
            position,
            rotation,
            skin,
            unknown_1,
            unknown_2,
            unknown_3,
            unknown_4,
        })
    }

    fn write(&self, cursor: &mut CursorMut<'_>) -> Result<(), CursorError> {
        cursor.write_u16(self.type_id)?;
        cursor.write_bytes(&self.unknown_1)?;
        cursor.write_u16(self.section_id)?;
        cursor.write_bytes(&self.unknown_2)?;
        write_vec3(cursor, self.position)?;
        write_angles(cursor, self.rotation)?;
        cursor.write_bytes(&self.unknown_3)?;
        cursor.write_u32(self.skin)?;
        cursor.write_bytes(&self.unknown_4)
    }
}

fn parse_records<T: DatRecord>(
    block: &mut Cursor<'_>,
    file: &str,
    area_id: u32,
    entities_size: u32,
    out: &mut Vec<T>,
    diag: &mut Diagnostics,
) -> Result<(), CursorError> {
    let count = block.size() / T::SIZE;
    out.reserve(count);
    for _ in 0..count {
        out.push(T::read(block, area_id)?);
    }

    if block.position() != entities_size as usize {
        diag.warn(Warning::RecordDrift {
            file: file.to_string(),
            kind: T::KIND,
            area_id,
            expected: entities_size,
            read: block.position(),
        });
    }
    Ok(())
}

/// Parse an entity table.
///
/// Record runs whose size is not a whole number of records are read as far
/// as they go and reported through `diag`; parsing resumes at the next block.
pub fn parse_dat(data: &[u8], file: &str, diag: &mut Diagnostics) -> Result<DatFile, DatError> {
    let mut cursor = Cursor::new_le(data);
    let mut dat = DatFile::default();

    while cursor.bytes_left() > 0 {
        let entity_type = cursor.u32()?;
        if entity_type == 0 {
            break;
        }
        let total_size = cursor.u32()?;
        let area_id = cursor.u32()?;
        let entities_size = cursor.u32()?;

        if total_size.checked_sub(BLOCK_HEADER_SIZE as u32) != Some(entities_size) {
            return Err(DatError::SizeMismatch {
                entity_type,
                area_id,
                total_size,
                entities_size,
            });
        }

        let mut block = cursor.take(entities_size as usize)?;
        match entity_type {
            OBJECT_TYPE => {
                parse_records(&mut block, file, area_id, entities_size, &mut dat.objs, diag)?
            }
            NPC_TYPE => {
                parse_records(&mut block, file, area_id, entities_size, &mut dat.npcs, diag)?
            }
            _ => dat.unknowns.push(DatUnknown {
                entity_type,
                area_id,
                data: block.remaining().to_vec(),
            }),
        }
    }

    Ok(dat)
}

fn group_by_area<T: DatRecord>(records: &[T]) -> Vec<(u32, Vec<&T>)> {
    records
        .iter()
        .into_group_map_by(|record| record.area_id())
        .into_iter()
        .sorted_by_key(|(area_id, _)| *area_id)
        .collect()
}

fn write_block_header(
    cursor: &mut CursorMut<'_>,
    entity_type: u32,
    area_id: u32,
    entities_size: usize,
) -> Result<(), CursorError> {
    cursor.write_u32(entity_type)?;
    cursor.write_u32((BLOCK_HEADER_SIZE + entities_size) as u32)?;
    cursor.write_u32(area_id)?;
    cursor.write_u32(entities_size as u32)
}

fn write_record_blocks<T: DatRecord>(
    cursor: &mut CursorMut<'_>,
    groups: &[(u32, Vec<&T>)],
) -> Result<(), CursorError> {
    for (area_id, records) in groups {
        write_block_header(cursor, T::KIND.entity_type(), *area_id, records.len() * T::SIZE)?;
        for record in records {
            record.write(cursor)?;
        }
    }
    Ok(())
}

/// Write an entity table: object blocks, then NPC blocks, each grouped per
/// area in ascending order, then the opaque blocks and a terminator.
pub fn write_dat(dat: &DatFile) -> Result<Vec<u8>, DatError> {
    let obj_groups = group_by_area(&dat.objs);
    let npc_groups = group_by_area(&dat.npcs);

    let size = (obj_groups.len() + npc_groups.len() + dat.unknowns.len() + 1) * BLOCK_HEADER_SIZE
        + dat.objs.len() * OBJECT_SIZE
        + dat.npcs.len() * NPC_SIZE
        + dat.unknowns.iter().map(|unknown| unknown.data.len()).sum::<usize>();
    let mut out = vec![0u8; size];
    let mut cursor = CursorMut::new_le(&mut out);

    write_record_blocks(&mut cursor, &obj_groups)?;
    write_record_blocks(&mut cursor, &npc_groups)?;

    for unknown in &dat.unknowns {
        write_block_header(&mut cursor, unknown.entity_type, unknown.area_id, unknown.data.len())?;
        cursor.write_bytes(&unknown.data)?;
    }

    cursor.write_zeros(BLOCK_HEADER_SIZE)?;
    Ok(out)
}
