//! The Ninja chunk stream grammar shared by vertex and polygon lists.
//!
//! Every chunk starts with a type id byte and a flags byte. Most chunk kinds
//! follow with a `u16` that gives their remaining length in 2- or 4-byte units,
//! which lets kinds we don't decode be skipped.

use glam::Vec3;
use variantly::Variantly;

use crate::data::cursor::Cursor;
use crate::data::parser_utils::parse_vec3;
use crate::diagnostics::{Diagnostics, Warning};
use crate::models::nj::{MAX_POLYGON_LIST_REPLAYS, MAX_TRAVERSAL_DEPTH, NjError};

const CACHE_POLYGON_LIST: u8 = 4;
const DRAW_POLYGON_LIST: u8 = 5;
const END: u8 = 255;

/// Only vertices of this set are decoded.
const VERTEX_SET_MASK: u8 = 0b11;

#[derive(Debug, Clone, PartialEq, Variantly)]
pub enum Chunk {
    Null,
    Bits(u8),
    /// Store index the rest of the stream was bookmarked under.
    CachePolygonList(u8),
    /// Store index of the replayed stream.
    DrawPolygonList(u8),
    Tiny(u8),
    Material(u8),
    Vertex(Vec<ChunkVertex>),
    Volume(u8),
    Strip(Vec<ChunkTriangleStrip>),
    End,
    Unknown(u8),
}

/// A vertex in model space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkVertex {
    pub index: usize,
    pub position: Vec3,
    pub normal: Option<Vec3>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkTriangleStrip {
    pub clockwise_winding: bool,
    pub indices: Vec<u16>,
}

/// Stream offsets bookmarked by cache chunks, keyed by store index.
///
/// Also counts replays of bookmarked streams across one model parse, capped
/// at [`MAX_POLYGON_LIST_REPLAYS`].
#[derive(Debug, Clone)]
pub struct ChunkCache {
    offsets: [Option<usize>; 256],
    replays: usize,
}

impl Default for ChunkCache {
    fn default() -> Self {
        ChunkCache {
            offsets: [None; 256],
            replays: 0,
        }
    }
}

impl ChunkCache {
    pub fn store(&mut self, index: u8, offset: usize) {
        self.offsets[index as usize] = Some(offset);
    }

    pub fn get(&self, index: u8) -> Option<usize> {
        self.offsets[index as usize]
    }

    /// Account for one replay of a bookmarked stream by the draw chunk at `offset`.
    fn begin_replay(&mut self, offset: usize) -> Result<(), NjError> {
        self.replays += 1;
        if self.replays > MAX_POLYGON_LIST_REPLAYS {
            return Err(NjError::TraversalBudgetExceeded { offset });
        }
        Ok(())
    }
}

/// Parse one chunk stream, stopping after an end or cache chunk.
///
/// `wide_end_chunks` is set for vertex lists, where the end chunk carries two
/// padding bytes. Draw chunks replay the bookmarked stream in place, at most
/// [`MAX_TRAVERSAL_DEPTH`] levels deep.
pub fn parse_chunks(
    cursor: &mut Cursor<'_>,
    cache: &mut ChunkCache,
    wide_end_chunks: bool,
    depth: usize,
    diag: &mut Diagnostics,
) -> Result<Vec<Chunk>, NjError> {
    if depth > MAX_TRAVERSAL_DEPTH {
        return Err(NjError::TooDeep {
            offset: cursor.position(),
        });
    }

    let mut chunks = Vec::new();
    loop {
        let type_id = cursor.u8()?;
        let flags = cursor.u8()?;
        let chunk_start = cursor.position();
        let mut size = 0;
        let mut done = false;

        match type_id {
            0 => chunks.push(Chunk::Null),
            1..=3 => chunks.push(Chunk::Bits(type_id)),
            CACHE_POLYGON_LIST => {
                cache.store(flags, chunk_start);
                chunks.push(Chunk::CachePolygonList(flags));
                done = true;
            }
            DRAW_POLYGON_LIST => {
                match cache.get(flags) {
                    Some(offset) => {
                        cache.begin_replay(chunk_start - 2)?;
                        cursor.seek_start(offset)?;
                        chunks.extend(parse_chunks(cursor, cache, false, depth + 1, diag)?);
                    }
                    None => diag.warn(Warning::EmptyCacheSlot {
                        store_index: flags,
                        offset: chunk_start - 2,
                    }),
                }
                chunks.push(Chunk::DrawPolygonList(flags));
            }
            8..=9 => {
                size = 2;
                chunks.push(Chunk::Tiny(type_id));
            }
            17..=31 => {
                size = 2 + 2 * cursor.u16()? as usize;
                chunks.push(Chunk::Material(type_id));
            }
            32..=50 => {
                size = 2 + 4 * cursor.u16()? as usize;
                chunks.push(Chunk::Vertex(parse_vertex_chunk(cursor, type_id, flags)?));
            }
            56..=58 => {
                size = 2 + 2 * cursor.u16()? as usize;
                chunks.push(Chunk::Volume(type_id));
            }
            64..=75 => {
                size = 2 + 2 * cursor.u16()? as usize;
                chunks.push(Chunk::Strip(parse_triangle_strip_chunk(cursor, type_id)?));
            }
            END => {
                size = if wide_end_chunks { 2 } else { 0 };
                chunks.push(Chunk::End);
                done = true;
            }
            _ => {
                size = 2 + 2 * cursor.u16()? as usize;
                diag.warn(Warning::UnknownChunk {
                    type_id,
                    offset: chunk_start - 2,
                });
                chunks.push(Chunk::Unknown(type_id));
            }
        }

        cursor.seek_start(chunk_start + size)?;
        if done {
            break;
        }
    }

    Ok(chunks)
}

fn read_vec3(cursor: &mut Cursor<'_>) -> Result<Vec3, NjError> {
    Ok(cursor.parse_fixed(12, parse_vec3)?)
}

fn parse_vertex_chunk(
    cursor: &mut Cursor<'_>,
    type_id: u8,
    flags: u8,
) -> Result<Vec<ChunkVertex>, NjError> {
    if flags & VERTEX_SET_MASK != 0 {
        return Ok(Vec::new());
    }

    let start = cursor.u16()? as usize;
    let count = cursor.u16()? as usize;
    let mut vertices = Vec::with_capacity(count);

    for i in 0..count {
        let mut vertex = ChunkVertex {
            index: start + i,
            position: read_vec3(cursor)?,
            normal: None,
        };

        match type_id {
            32 => cursor.seek(4)?,
            33 => {
                cursor.seek(4)?;
                vertex.normal = Some(read_vec3(cursor)?);
                cursor.seek(4)?;
            }
            35..=40 => {
                if type_id == 37 {
                    vertex.index = start + cursor.u16()? as usize;
                    cursor.seek(2)?;
                } else {
                    cursor.seek(4)?;
                }
            }
            41..=47 => {
                vertex.normal = Some(read_vec3(cursor)?);
                if type_id == 44 {
                    vertex.index = start + cursor.u16()? as usize;
                    cursor.seek(2)?;
                } else if type_id >= 42 {
                    cursor.seek(4)?;
                }
            }
            48.. => {
                cursor.seek(4)?;
                if type_id >= 49 {
                    cursor.seek(4)?;
                }
            }
            _ => {}
        }

        vertices.push(vertex);
    }

    Ok(vertices)
}

/// Optional per-index fields of a strip chunk.
#[derive(Debug, Clone, Copy, Default)]
struct StripFeatures {
    texture_coords: bool,
    color: bool,
    normal: bool,
    texture_coords_hires: bool,
}

impl StripFeatures {
    fn for_type(type_id: u8) -> Self {
        let mut features = StripFeatures::default();
        match type_id {
            65 | 66 => features.texture_coords = true,
            67 => features.normal = true,
            68 | 69 => {
                features.texture_coords = true;
                features.normal = true;
            }
            70 => features.color = true,
            71 | 72 => {
                features.texture_coords = true;
                features.color = true;
            }
            74 | 75 => features.texture_coords_hires = true,
            _ => {}
        }
        features
    }

    fn stride(self) -> isize {
        let mut stride = 0;
        if self.texture_coords {
            stride += 4;
        }
        if self.color {
            stride += 4;
        }
        if self.normal {
            stride += 6;
        }
        if self.texture_coords_hires {
            stride += 8;
        }
        stride
    }
}

fn parse_triangle_strip_chunk(
    cursor: &mut Cursor<'_>,
    type_id: u8,
) -> Result<Vec<ChunkTriangleStrip>, NjError> {
    let stride = StripFeatures::for_type(type_id).stride();

    let header = cursor.u16()?;
    let user_flags_size = 2 * (header >> 14) as isize;
    let strip_count = (header & 0x3FFF) as usize;

    let mut strips = Vec::with_capacity(strip_count);
    for _ in 0..strip_count {
        let winding_and_count = cursor.i16()?;
        let index_count = winding_and_count.unsigned_abs() as usize;

        let mut indices = Vec::with_capacity(index_count);
        for j in 0..index_count {
            indices.push(cursor.u16()?);
            cursor.seek(stride)?;
            if j >= 2 {
                cursor.seek(user_flags_size)?;
            }
        }

        strips.push(ChunkTriangleStrip {
            clockwise_winding: winding_and_count < 1,
            indices,
        });
    }

    Ok(strips)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(bytes: &[u8], wide_end_chunks: bool, diag: &mut Diagnostics) -> Vec<Chunk> {
        let mut cursor = Cursor::new_le(bytes);
        parse_chunks(&mut cursor, &mut ChunkCache::default(), wide_end_chunks, 0, diag).unwrap()
    }

    fn push_vec3(out: &mut Vec<u8>, v: [f32; 3]) {
        for c in v {
            out.extend_from_slice(&c.to_le_bytes());
        }
    }

    #[test]
    fn vertex_chunk_with_normals_and_index_override() {
        // type 44: position, normal, inline index, 2 padding bytes
        let mut bytes = vec![44, 0];
        bytes.extend_from_slice(&15u16.to_le_bytes());
        bytes.extend_from_slice(&10u16.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        for (i, inline) in [(0.0f32, 5u16), (1.0, 3)] {
            push_vec3(&mut bytes, [i, 0.0, 0.0]);
            push_vec3(&mut bytes, [0.0, 0.0, 1.0]);
            bytes.extend_from_slice(&inline.to_le_bytes());
            bytes.extend_from_slice(&[0, 0]);
        }
        bytes.extend_from_slice(&[END, 0, 0, 0]);

        let chunks = parse(&bytes, true, &mut Diagnostics::new());
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].is_end());

        let vertices = chunks[0].clone().vertex().unwrap();
        assert_eq!(vertices[0].index, 15);
        assert_eq!(vertices[1].index, 13);
        assert_eq!(vertices[1].position, Vec3::X);
        assert_eq!(vertices[1].normal, Some(Vec3::Z));
    }

    #[test]
    fn vertex_chunk_outside_set_0_is_ignored() {
        let mut bytes = vec![32, 1];
        bytes.extend_from_slice(&5u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        push_vec3(&mut bytes, [1.0, 2.0, 3.0]);
        bytes.extend_from_slice(&1.0f32.to_le_bytes());
        bytes.extend_from_slice(&[END, 0, 0, 0]);

        let chunks = parse(&bytes, true, &mut Diagnostics::new());
        assert_eq!(chunks, [Chunk::Vertex(vec![]), Chunk::End]);
    }

    #[test]
    fn strip_chunk_skips_optional_fields() {
        // type 65: texture coordinates; one user flag word from the third index on
        let mut body = Vec::new();
        body.extend_from_slice(&(1u16 << 14 | 2).to_le_bytes());
        body.extend_from_slice(&(-3i16).to_le_bytes());
        for (j, index) in [7u16, 8, 9].into_iter().enumerate() {
            body.extend_from_slice(&index.to_le_bytes());
            body.extend_from_slice(&[0xEE; 4]);
            if j >= 2 {
                body.extend_from_slice(&[0xDD; 2]);
            }
        }
        body.extend_from_slice(&4i16.to_le_bytes());
        for (j, index) in [1u16, 2, 3, 4].into_iter().enumerate() {
            body.extend_from_slice(&index.to_le_bytes());
            body.extend_from_slice(&[0xEE; 4]);
            if j >= 2 {
                body.extend_from_slice(&[0xDD; 2]);
            }
        }

        let mut bytes = vec![65, 0];
        bytes.extend_from_slice(&(body.len() as u16 / 2).to_le_bytes());
        bytes.extend_from_slice(&body);
        bytes.extend_from_slice(&[END, 0]);

        let chunks = parse(&bytes, false, &mut Diagnostics::new());
        let strips = chunks[0].clone().strip().unwrap();
        assert_eq!(
            strips,
            [
                ChunkTriangleStrip {
                    clockwise_winding: true,
                    indices: vec![7, 8, 9]
                },
                ChunkTriangleStrip {
                    clockwise_winding: false,
                    indices: vec![1, 2, 3, 4]
                },
            ]
        );
        assert_eq!(chunks[1], Chunk::End);
    }

    #[test]
    fn unknown_chunks_are_skipped_with_a_warning() {
        let bytes = [0, 0, 8, 0, 0xAA, 0xBB, 100, 0, 1, 0, 0xCC, 0xCC, 20, 0, 0, 0, END, 0];
        let mut diag = Diagnostics::new();
        let chunks = parse(&bytes, false, &mut diag);
        assert_eq!(
            chunks,
            [
                Chunk::Null,
                Chunk::Tiny(8),
                Chunk::Unknown(100),
                Chunk::Material(20),
                Chunk::End
            ]
        );
        assert_eq!(diag.warnings(), [Warning::UnknownChunk { type_id: 100, offset: 6 }]);
    }

    #[test]
    fn draw_replays_cached_stream() {
        let mut bytes = vec![CACHE_POLYGON_LIST, 3];
        bytes.extend_from_slice(&[64, 0, 5, 0, 1, 0, 3, 0, 0, 0, 1, 0, 2, 0]);
        bytes.extend_from_slice(&[END, 0]);
        let draw_at = bytes.len();
        bytes.extend_from_slice(&[DRAW_POLYGON_LIST, 3, DRAW_POLYGON_LIST, 9, END, 0]);

        let mut cache = ChunkCache::default();
        let mut diag = Diagnostics::new();
        let mut cursor = Cursor::new_le(&bytes);
        let first = parse_chunks(&mut cursor, &mut cache, false, 0, &mut diag).unwrap();
        assert_eq!(first, [Chunk::CachePolygonList(3)]);
        assert_eq!(cache.get(3), Some(2));

        cursor.seek_start(draw_at).unwrap();
        let second = parse_chunks(&mut cursor, &mut cache, false, 0, &mut diag).unwrap();
        assert_eq!(second.len(), 5);
        assert!(second[0].is_strip());
        assert_eq!(second[1], Chunk::End);
        assert_eq!(second[2], Chunk::DrawPolygonList(3));
        assert_eq!(second[3], Chunk::DrawPolygonList(9));
        assert_eq!(second[4], Chunk::End);
        assert_eq!(
            diag.warnings(),
            [Warning::EmptyCacheSlot {
                store_index: 9,
                offset: draw_at + 2
            }]
        );
    }

    #[test]
    fn fanned_out_replays_exhaust_the_budget() {
        // Slot k's stream draws slot k + 1 twice, so drawing slot 0 means 2^32 replays.
        let slots = 32u8;
        let mut bytes = Vec::new();
        let mut stream_starts = Vec::new();
        for k in 0..slots {
            stream_starts.push(bytes.len());
            bytes.extend_from_slice(&[CACHE_POLYGON_LIST, k]);
            if k + 1 < slots {
                bytes.extend_from_slice(&[DRAW_POLYGON_LIST, k + 1, DRAW_POLYGON_LIST, k + 1]);
            }
            bytes.extend_from_slice(&[END, 0]);
        }
        let draw_at = bytes.len();
        bytes.extend_from_slice(&[DRAW_POLYGON_LIST, 0, END, 0]);

        let mut cache = ChunkCache::default();
        let mut diag = Diagnostics::new();
        let mut cursor = Cursor::new_le(&bytes);
        for start in stream_starts {
            cursor.seek_start(start).unwrap();
            parse_chunks(&mut cursor, &mut cache, false, 0, &mut diag).unwrap();
        }

        cursor.seek_start(draw_at).unwrap();
        assert!(matches!(
            parse_chunks(&mut cursor, &mut cache, false, 0, &mut diag),
            Err(NjError::TraversalBudgetExceeded { .. })
        ));
    }

    #[test]
    fn vertex_chunk_with_inline_index() {
        // type 37: position, inline index, 2 padding bytes
        let mut bytes = vec![37, 0];
        bytes.extend_from_slice(&9u16.to_le_bytes());
        bytes.extend_from_slice(&100u16.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        for (x, inline) in [(1.0f32, 7u16), (2.0, 0)] {
            push_vec3(&mut bytes, [x, 0.0, 0.0]);
            bytes.extend_from_slice(&inline.to_le_bytes());
            bytes.extend_from_slice(&[0xFF, 0xFF]);
        }
        bytes.extend_from_slice(&[END, 0, 0, 0]);

        let chunks = parse(&bytes, true, &mut Diagnostics::new());
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].is_end());

        let vertices = chunks[0].clone().vertex().unwrap();
        assert_eq!(vertices[0].index, 107);
        assert_eq!(vertices[0].position, Vec3::X);
        assert_eq!(vertices[1].index, 100);
        assert_eq!(vertices[1].normal, None);
    }

    #[test]
    fn vertex_chunk_skips_trailing_words() {
        // type 49: position and two 4-byte words per vertex
        let mut bytes = vec![49, 0];
        bytes.extend_from_slice(&11u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        for y in [1.0f32, 2.0] {
            push_vec3(&mut bytes, [0.0, y, 0.0]);
            bytes.extend_from_slice(&[0xAA; 8]);
        }
        let end_at = bytes.len();
        bytes.extend_from_slice(&[END, 0, 0, 0]);

        let mut cursor = Cursor::new_le(&bytes);
        let mut diag = Diagnostics::new();
        let mut cache = ChunkCache::default();
        let chunks = parse_chunks(&mut cursor, &mut cache, true, 0, &mut diag).unwrap();
        assert!(diag.is_empty());
        assert_eq!(cursor.position(), end_at + 4);
        assert_eq!(chunks[1], Chunk::End);

        let vertices = chunks[0].clone().vertex().unwrap();
        assert_eq!(
            vertices.iter().map(|v| (v.index, v.position)).collect::<Vec<_>>(),
            [(0, Vec3::Y), (1, Vec3::new(0.0, 2.0, 0.0))]
        );
    }

    #[test]
    fn self_replaying_cache_hits_depth_limit() {
        let bytes = [CACHE_POLYGON_LIST, 0, DRAW_POLYGON_LIST, 0, END, 0];
        let mut cache = ChunkCache::default();
        let mut diag = Diagnostics::new();
        let mut cursor = Cursor::new_le(&bytes);
        parse_chunks(&mut cursor, &mut cache, false, 0, &mut diag).unwrap();
        assert!(matches!(
            parse_chunks(&mut cursor, &mut cache, false, 0, &mut diag),
            Err(NjError::TooDeep { .. })
        ));
    }
}
