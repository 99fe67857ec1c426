//! Ninja chunk models (`.nj`).
//!
//! A file is a sequence of IFF chunks. Only the first `NJCM` chunk is used;
//! it holds a scene graph of nodes linked by child and sibling offsets, each
//! optionally pointing at a model made of a vertex list and a polygon list.
//! Offsets are relative to the start of the `NJCM` chunk body.

use glam::{Mat3, Mat4, Vec3};
use rootcause::Report;
use thiserror::Error;
use tracing::debug;
use winnow::Parser;
use winnow::binary::le_u32;

use crate::data::cursor::{Cursor, CursorError};
use crate::data::parser_utils::{WResult, parse_angles, parse_vec3};
use crate::diagnostics::Diagnostics;
use crate::models::chunks::{Chunk, ChunkCache, ChunkTriangleStrip, parse_chunks};

/// Deepest nesting of scene nodes or replayed polygon lists accepted.
pub const MAX_TRAVERSAL_DEPTH: usize = 512;
/// Most scene nodes one parse may visit, counting every revisit of a shared node.
pub const MAX_NODE_VISITS: usize = 1 << 16;
/// Most cached polygon lists one parse may replay.
pub const MAX_POLYGON_LIST_REPLAYS: usize = 1 << 12;

const NJCM: &[u8; 4] = b"NJCM";
const NODE_SIZE: usize = 52;

const EVAL_NO_TRANSLATE: u32 = 1 << 0;
const EVAL_NO_ROTATE: u32 = 1 << 1;
const EVAL_NO_SCALE: u32 = 1 << 2;
const EVAL_HIDDEN: u32 = 1 << 3;
const EVAL_BREAK_CHILD_TRACE: u32 = 1 << 4;
const EVAL_ZXY_ROTATION_ORDER: u32 = 1 << 5;

#[derive(Debug, Error)]
pub enum NjError {
    #[error("malformed model data: {0}")]
    Cursor(#[from] CursorError),
    #[error("traversal nested too deeply at offset 0x{offset:X}")]
    TooDeep { offset: usize },
    #[error("traversal budget exhausted at offset 0x{offset:X}")]
    TraversalBudgetExceeded { offset: usize },
}

/// Triangle soup in world space: 3 floats per vertex, 3 vertices per triangle.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NjGeometry {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
}

impl NjGeometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.vertex_count() / 3
    }
}

struct NjNode {
    eval_flags: u32,
    model_offset: u32,
    position: Vec3,
    rotation: Vec3,
    scale: Vec3,
    child_offset: u32,
    sibling_offset: u32,
}

fn parse_node(input: &mut &[u8]) -> WResult<NjNode> {
    let eval_flags = le_u32.parse_next(input)?;
    let model_offset = le_u32.parse_next(input)?;
    let position = parse_vec3(input)?;
    let rotation = parse_angles(input)?;
    let scale = parse_vec3(input)?;
    let child_offset = le_u32.parse_next(input)?;
    let sibling_offset = le_u32.parse_next(input)?;

    Ok(NjNode {
        eval_flags,
        model_offset,
        position,
        rotation,
        scale,
        child_offset,
        sibling_offset,
    })
}

impl NjNode {
    fn has(&self, flag: u32) -> bool {
        self.eval_flags & flag != 0
    }

    fn local_matrix(&self) -> Mat4 {
        let translation = if self.has(EVAL_NO_TRANSLATE) {
            Mat4::IDENTITY
        } else {
            Mat4::from_translation(self.position)
        };

        let rotation = if self.has(EVAL_NO_ROTATE) {
            Mat4::IDENTITY
        } else {
            let Vec3 { x, y, z } = self.rotation;
            let rotation = if self.has(EVAL_ZXY_ROTATION_ORDER) {
                Mat3::from_rotation_z(z) * Mat3::from_rotation_x(x) * Mat3::from_rotation_y(y)
            } else {
                Mat3::from_rotation_z(z) * Mat3::from_rotation_y(y) * Mat3::from_rotation_x(x)
            };
            Mat4::from_mat3(rotation)
        };

        let scale = if self.has(EVAL_NO_SCALE) {
            Mat4::IDENTITY
        } else {
            Mat4::from_scale(self.scale)
        };

        translation * rotation * scale
    }
}

/// Inverse transpose of the upper 3x3, or zero when it is singular.
fn normal_matrix(matrix: &Mat4) -> Mat3 {
    let upper = Mat3::from_mat4(*matrix);
    if upper.determinant() == 0.0 {
        return Mat3::ZERO;
    }
    upper.inverse().transpose()
}

#[derive(Debug, Clone, Copy)]
struct WorldVertex {
    position: Vec3,
    normal: Vec3,
}

/// State shared by every node of one model parse.
#[derive(Default)]
struct NjContext {
    vertices: Vec<Option<WorldVertex>>,
    cache: ChunkCache,
    geometry: NjGeometry,
    node_visits: usize,
}

impl NjContext {
    fn visit_node(&mut self, offset: usize) -> Result<(), NjError> {
        self.node_visits += 1;
        if self.node_visits > MAX_NODE_VISITS {
            return Err(NjError::TraversalBudgetExceeded { offset });
        }
        Ok(())
    }

    fn set_vertex(&mut self, index: usize, vertex: WorldVertex) {
        if index >= self.vertices.len() {
            self.vertices.resize(index + 1, None);
        }
        self.vertices[index] = Some(vertex);
    }

    fn vertex(&self, index: u16) -> Option<WorldVertex> {
        self.vertices.get(index as usize).copied().flatten()
    }

    /// Emit the strip's triangles whose vertices have all been defined.
    fn emit_strip(&mut self, strip: &ChunkTriangleStrip) {
        let indices = &strip.indices;
        for j in 2..indices.len() {
            let corners = [j - 2, j - 1, j].map(|k| self.vertex(indices[k]));
            let [Some(a), Some(b), Some(c)] = corners else {
                continue;
            };

            let triangle = if j % 2 == usize::from(strip.clockwise_winding) {
                [a, b, c]
            } else {
                [b, a, c]
            };
            for vertex in triangle {
                self.geometry.positions.extend(vertex.position.to_array());
                self.geometry.normals.extend(vertex.normal.to_array());
            }
        }
    }
}

fn parse_model(
    cursor: &mut Cursor<'_>,
    matrix: &Mat4,
    ctx: &mut NjContext,
    depth: usize,
    diag: &mut Diagnostics,
) -> Result<(), NjError> {
    let vlist_offset = cursor.u32()? as usize;
    let plist_offset = cursor.u32()? as usize;
    let normal_matrix = normal_matrix(matrix);

    if vlist_offset != 0 {
        cursor.seek_start(vlist_offset)?;
        let chunks = parse_chunks(cursor, &mut ctx.cache, true, depth, diag)?;
        for vertex in chunks.into_iter().filter_map(Chunk::vertex).flatten() {
            ctx.set_vertex(
                vertex.index,
                WorldVertex {
                    position: matrix.transform_point3(vertex.position),
                    normal: normal_matrix * vertex.normal.unwrap_or(Vec3::Y),
                },
            );
        }
    }

    if plist_offset != 0 {
        cursor.seek_start(plist_offset)?;
        let chunks = parse_chunks(cursor, &mut ctx.cache, false, depth, diag)?;
        for strip in chunks.into_iter().filter_map(Chunk::strip).flatten() {
            ctx.emit_strip(&strip);
        }
    }

    Ok(())
}

/// Parse the node at the cursor with its children, then each following
/// sibling in turn. Siblings are placed relative to `parent_matrix`.
fn parse_sibling_objects(
    cursor: &mut Cursor<'_>,
    parent_matrix: &Mat4,
    ctx: &mut NjContext,
    depth: usize,
    diag: &mut Diagnostics,
) -> Result<(), NjError> {
    if depth > MAX_TRAVERSAL_DEPTH {
        return Err(NjError::TooDeep {
            offset: cursor.position(),
        });
    }

    let mut offset = cursor.position();
    loop {
        ctx.visit_node(offset)?;
        cursor.seek_start(offset)?;
        let node = cursor.parse_fixed(NODE_SIZE, parse_node)?;
        let matrix = *parent_matrix * node.local_matrix();

        if node.model_offset != 0 && !node.has(EVAL_HIDDEN) {
            cursor.seek_start(node.model_offset as usize)?;
            parse_model(cursor, &matrix, ctx, depth, diag)?;
        }

        if node.child_offset != 0 && !node.has(EVAL_BREAK_CHILD_TRACE) {
            cursor.seek_start(node.child_offset as usize)?;
            parse_sibling_objects(cursor, &matrix, ctx, depth + 1, diag)?;
        }

        if node.sibling_offset == 0 {
            return Ok(());
        }
        offset = node.sibling_offset as usize;
    }
}

fn find_njcm<'a>(cursor: &mut Cursor<'a>) -> Result<Option<Cursor<'a>>, NjError> {
    while cursor.bytes_left() >= 8 {
        let tag: [u8; 4] = cursor.array()?;
        let size = cursor.u32()? as usize;
        if &tag == NJCM {
            debug!(offset = cursor.position(), size, "found NJCM chunk");
            return Ok(Some(cursor.take(size)?));
        }
        cursor.seek_start(cursor.position() + size)?;
    }
    Ok(None)
}

fn load_nj(data: &[u8], diag: &mut Diagnostics) -> Result<Option<NjGeometry>, NjError> {
    let mut cursor = Cursor::new_le(data);
    let Some(mut body) = find_njcm(&mut cursor)? else {
        return Ok(None);
    };

    let mut ctx = NjContext::default();
    parse_sibling_objects(&mut body, &Mat4::IDENTITY, &mut ctx, 0, diag)?;
    Ok(Some(ctx.geometry))
}

/// Parse a Ninja chunk model into world-space triangles.
///
/// Returns `Ok(None)` when the data holds no `NJCM` chunk.
pub fn parse_nj(
    data: &[u8],
    diag: &mut Diagnostics,
) -> Result<Option<NjGeometry>, Report<NjError>> {
    load_nj(data, diag).map_err(Report::new)
}
