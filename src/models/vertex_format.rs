//! Fixed-size vertex record layouts used by `submesh_vertices` chunks.
//!
//! Both generations share the same leading attributes and a trailing block of
//! skinning data (4 x u32 bone indices, 4 x f32 weights) that is read and
//! discarded. The second generation inserts one extra `f32 x 4` vector after
//! the color.
//!
//! ```text
//! v1 (128 bytes)                      v2 (144 bytes)
//! 0x00 position  f32 x 3              0x00 position  f32 x 3
//! 0x0C normal    f32 x 3              0x0C normal    f32 x 3
//! 0x18 uv[4]     f32 x 2 each         0x18 uv[4]     f32 x 2 each
//! 0x38 tangent   f32 x 3              0x38 tangent   f32 x 3
//! 0x44 binormal  f32 x 3              0x44 binormal  f32 x 3
//! 0x50 color     f32 x 4              0x50 color     f32 x 4
//! 0x60 bones     u32 x 4              0x60 extra     f32 x 4
//! 0x70 weights   f32 x 4              0x70 bones     u32 x 4
//!                                     0x80 weights   f32 x 4
//! ```

use winnow::Parser;
use winnow::binary::{le_f32, le_u32};
use winnow::combinator::repeat;

use crate::data::parser_utils::{WResult, parse_color, parse_vec2, parse_vec3, parse_vec4};
use crate::models::model::Vertex;

/// Which generation of vertex record a submesh stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexLayout {
    V1,
    V2,
}

impl VertexLayout {
    /// Size of one record in bytes.
    pub const fn stride(self) -> usize {
        match self {
            VertexLayout::V1 => 128,
            VertexLayout::V2 => 144,
        }
    }

    /// Parse a single vertex record in this layout.
    pub fn parse_vertex(self, input: &mut &[u8]) -> WResult<Vertex> {
        let position = parse_vec3(input)?;
        let normal = parse_vec3(input)?;
        let uv = [
            parse_vec2(input)?,
            parse_vec2(input)?,
            parse_vec2(input)?,
            parse_vec2(input)?,
        ];
        let tangent = parse_vec3(input)?;
        let binormal = parse_vec3(input)?;
        let color = parse_color(input)?;

        if self == VertexLayout::V2 {
            let _extra = parse_vec4(input)?;
        }
        let _bone_indices: Vec<u32> = repeat(4, le_u32).parse_next(input)?;
        let _bone_weights: Vec<f32> = repeat(4, le_f32).parse_next(input)?;

        Ok(Vertex {
            position,
            normal,
            uv,
            tangent,
            binormal,
            color,
        })
    }
}
