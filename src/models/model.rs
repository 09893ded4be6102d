//! Decoder for chunked model files (`.ALO`).
//!
//! A model is a sequence of top-level `mesh` containers. Each mesh carries its
//! name and a small info record, then one `submesh` container (geometry) and
//! one `shader_info` container (material) per material, paired by position.
//! Shader parameters are stored as minichunk sequences inside data chunks.

use std::fmt;
use std::io::{Cursor, Read, Seek};

use itertools::Itertools;
use rootcause::Report;
use tracing::{debug, trace};
use winnow::Parser;
use winnow::binary::{le_f32, le_i32, le_u16, le_u32};

use crate::data::chunk::{ChunkId, ChunkReader, read_container, read_data_chunk};
use crate::data::minichunk::MinichunkReader;
use crate::data::parser_utils::{
    ColorRgba, Vec2, Vec3, Vec4, WResult, null_terminated_string, parse_vec3, parse_vec4,
    preallocate,
};
use crate::error::{Error, FormatError};
use crate::models::vertex_format::VertexLayout;

const MESH: ChunkId = 0x400;
const MESH_NAME: ChunkId = 0x401;
const MESH_INFO: ChunkId = 0x402;
const SUBMESH: ChunkId = 0x10000;
const SUBMESH_INFO: ChunkId = 0x10001;
const SUBMESH_INDICES: ChunkId = 0x10004;
const SUBMESH_VERTICES_V1: ChunkId = 0x10005;
const SUBMESH_VERTICES_V2: ChunkId = 0x10007;
const SHADER_INFO: ChunkId = 0x10100;
const SHADER_NAME: ChunkId = 0x10101;
const SHADER_PARAM_INT: ChunkId = 0x10102;
const SHADER_PARAM_FLOAT: ChunkId = 0x10103;
const SHADER_PARAM_FLOAT3: ChunkId = 0x10104;
const SHADER_PARAM_TEXTURE: ChunkId = 0x10105;
const SHADER_PARAM_FLOAT4: ChunkId = 0x10106;

// Minichunk ids inside a shader parameter payload.
const PARAM_NAME: u8 = 1;
const PARAM_VALUE: u8 = 2;

/// Type of vertex indices.
pub type Index = u16;

/// The master vertex type. Which attributes a renderer uses depends on the material.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vertex {
    /// Object space.
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: [Vec2; 4],
    pub tangent: Vec3,
    pub binormal: Vec3,
    /// Linear color space.
    pub color: ColorRgba,
}

/// Value of a shader parameter.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParamValue {
    Int(i32),
    Float(f32),
    Float3(Vec3),
    Float4(Vec4),
    /// Name of a texture asset.
    Texture(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Float3(v) => write!(f, "({})", v.iter().join(", ")),
            ParamValue::Float4(v) => write!(f, "({})", v.iter().join(", ")),
            ParamValue::Texture(name) => write!(f, "\"{name}\""),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Param {
    pub name: String,
    pub value: ParamValue,
}

/// The part of a mesh drawn with a single material.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Material {
    /// Name of the shader.
    pub name: String,
    pub params: Vec<Param>,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<Index>,
}

/// A single object in a model that is controlled as a whole.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mesh {
    /// Name with any `_ALTn` / `_LODn` suffixes removed.
    pub name: String,
    /// Level of detail. Variants of a mesh share a name; higher is more detailed.
    pub lod: u32,
    /// Alternate state, e.g. a damaged version of the mesh.
    pub alt: u32,
    /// Initial visibility. Some meshes (collision boxes) are never visible.
    pub visible: bool,
    pub materials: Vec<Material>,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Model {
    pub meshes: Vec<Mesh>,
}

/// Decode a model from a seekable stream.
pub fn read_model<R: Read + Seek>(stream: R) -> Result<Model, Report<Error>> {
    let mut reader = ChunkReader::new(stream)?;
    Ok(decode_model(&mut reader)?)
}

/// Decode a model held entirely in memory.
pub fn parse_model(file_data: &[u8]) -> Result<Model, Report<Error>> {
    read_model(Cursor::new(file_data))
}

fn decode_model<R: Read + Seek>(reader: &mut ChunkReader<R>) -> Result<Model, Error> {
    let mut model = Model::default();
    while reader.has_chunk() {
        match reader.id()? {
            MESH => {
                let mesh = read_container(reader, read_mesh)?;
                debug!(
                    name = %mesh.name,
                    lod = mesh.lod,
                    alt = mesh.alt,
                    materials = mesh.materials.len(),
                    "decoded mesh"
                );
                model.meshes.push(mesh);
            }
            other => trace!("skipping model chunk 0x{other:X}"),
        }
        reader.next()?;
    }
    debug!(meshes = model.meshes.len(), "decoded model");
    Ok(model)
}

/// Split a raw mesh name into `(name, lod, alt)`.
///
/// `_ALT<n>` and `_LOD<n>` are recognised anywhere in the name as long as the
/// digits are followed by the end of the name or another `_`. Recognised
/// suffixes are removed from the returned name.
pub fn parse_mesh_name(raw: &str) -> (String, u32, u32) {
    let mut name = raw.to_string();
    let alt = take_numbered_suffix(&mut name, "_ALT").unwrap_or(0);
    let lod = take_numbered_suffix(&mut name, "_LOD").unwrap_or(0);
    (name, lod, alt)
}

fn take_numbered_suffix(name: &mut String, marker: &str) -> Option<u32> {
    let mut search_from = 0;
    while let Some(found) = name[search_from..].find(marker) {
        let at = search_from + found;
        let digits_start = at + marker.len();
        let digit_count = name[digits_start..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        let digits_end = digits_start + digit_count;
        let terminated = digits_end == name.len() || name.as_bytes()[digits_end] == b'_';

        if digit_count > 0 && terminated {
            if let Ok(value) = name[digits_start..digits_end].parse::<u32>() {
                name.replace_range(at..digits_end, "");
                return Some(value);
            }
        }
        search_from = digits_start;
    }
    None
}

/// Fixed prefix of a `mesh_info` payload.
struct MeshInfo {
    material_count: u32,
    _bounds_min: Vec3,
    _bounds_max: Vec3,
    _unknown: u32,
    hidden: u32,
}

fn parse_mesh_info(input: &mut &[u8]) -> WResult<MeshInfo> {
    let material_count = le_u32.parse_next(input)?;
    let bounds_min = parse_vec3(input)?;
    let bounds_max = parse_vec3(input)?;
    let unknown = le_u32.parse_next(input)?;
    let hidden = le_u32.parse_next(input)?;
    Ok(MeshInfo {
        material_count,
        _bounds_min: bounds_min,
        _bounds_max: bounds_max,
        _unknown: unknown,
        hidden,
    })
}

fn read_mesh<R: Read + Seek>(reader: &mut ChunkReader<R>) -> Result<Mesh, Error> {
    let mut mesh = Mesh::default();
    let mut submesh_idx = 0usize;
    let mut shader_idx = 0usize;

    while reader.has_chunk() {
        match reader.id()? {
            MESH_NAME => {
                let data = read_data_chunk(reader)?;
                (mesh.name, mesh.lod, mesh.alt) = parse_mesh_name(&null_terminated_string(&data));
            }
            MESH_INFO => {
                let data = read_data_chunk(reader)?;
                let info = parse_mesh_info(&mut &data[..])
                    .map_err(|e| FormatError::malformed("mesh info", e))?;
                mesh.materials = preallocate("material list", info.material_count as usize)?;
                mesh.visible = info.hidden == 0;
            }
            SUBMESH => {
                let count = mesh.materials.len();
                let material = mesh
                    .materials
                    .get_mut(submesh_idx)
                    .ok_or(FormatError::TooManyMaterials {
                        what: "submesh",
                        index: submesh_idx,
                        count,
                    })?;
                let (vertices, indices) = read_container(reader, read_submesh)?;
                material.vertices = vertices;
                material.indices = indices;
                submesh_idx += 1;
            }
            SHADER_INFO => {
                let count = mesh.materials.len();
                let material = mesh
                    .materials
                    .get_mut(shader_idx)
                    .ok_or(FormatError::TooManyMaterials {
                        what: "shader",
                        index: shader_idx,
                        count,
                    })?;
                let (name, params) = read_container(reader, read_shader_info)?;
                material.name = name;
                material.params = params;
                shader_idx += 1;
            }
            other => trace!("skipping mesh chunk 0x{other:X}"),
        }
        reader.next()?;
    }
    Ok(mesh)
}

fn read_submesh<R: Read + Seek>(
    reader: &mut ChunkReader<R>,
) -> Result<(Vec<Vertex>, Vec<Index>), Error> {
    let mut vertices: Vec<Vertex> = Vec::new();
    let mut indices: Vec<Index> = Vec::new();

    while reader.has_chunk() {
        match reader.id()? {
            SUBMESH_INFO => {
                let data = read_data_chunk(reader)?;
                let (vertex_count, triangle_count) = (le_u32, le_u32)
                    .parse_next(&mut &data[..])
                    .map_err(|e| FormatError::malformed("submesh info", e))?;
                vertices = preallocate("vertex buffer", vertex_count as usize)?;
                indices = preallocate("index buffer", triangle_count as usize * 3)?;
            }
            SUBMESH_VERTICES_V1 => {
                let data = read_data_chunk(reader)?;
                read_vertices(VertexLayout::V1, &data, &mut vertices)?;
            }
            SUBMESH_VERTICES_V2 => {
                let data = read_data_chunk(reader)?;
                read_vertices(VertexLayout::V2, &data, &mut vertices)?;
            }
            SUBMESH_INDICES => {
                let data = read_data_chunk(reader)?;
                let input = &mut &data[..];
                for index in indices.iter_mut() {
                    *index = le_u16
                        .parse_next(input)
                        .map_err(|e| FormatError::malformed("index buffer", e))?;
                }
            }
            other => trace!("skipping submesh chunk 0x{other:X}"),
        }
        reader.next()?;
    }
    Ok((vertices, indices))
}

/// Fill the preallocated `vertices` from a vertex payload in the given layout.
fn read_vertices(
    layout: VertexLayout,
    data: &[u8],
    vertices: &mut [Vertex],
) -> Result<(), Error> {
    let input = &mut &data[..];
    for vertex in vertices.iter_mut() {
        *vertex = layout
            .parse_vertex(input)
            .map_err(|e| FormatError::malformed("vertex buffer", e))?;
    }
    Ok(())
}

fn read_shader_info<R: Read + Seek>(
    reader: &mut ChunkReader<R>,
) -> Result<(String, Vec<Param>), Error> {
    let mut name = String::new();
    let mut params = Vec::new();

    while reader.has_chunk() {
        match reader.id()? {
            SHADER_NAME => {
                let data = read_data_chunk(reader)?;
                name = null_terminated_string(&data);
            }
            id => match ParamKind::from_chunk_id(id) {
                Some(kind) => {
                    let data = read_data_chunk(reader)?;
                    params.push(read_param(kind, &data)?);
                }
                None => trace!("skipping shader chunk 0x{id:X}"),
            },
        }
        reader.next()?;
    }
    Ok((name, params))
}

/// The value type of a shader parameter, selected by its chunk id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    Int,
    Float,
    Float3,
    Float4,
    Texture,
}

impl ParamKind {
    fn from_chunk_id(id: ChunkId) -> Option<Self> {
        match id {
            SHADER_PARAM_INT => Some(ParamKind::Int),
            SHADER_PARAM_FLOAT => Some(ParamKind::Float),
            SHADER_PARAM_FLOAT3 => Some(ParamKind::Float3),
            SHADER_PARAM_FLOAT4 => Some(ParamKind::Float4),
            SHADER_PARAM_TEXTURE => Some(ParamKind::Texture),
            _ => None,
        }
    }

    /// Value used when a parameter carries no value record.
    fn default_value(self) -> ParamValue {
        match self {
            ParamKind::Int => ParamValue::Int(0),
            ParamKind::Float => ParamValue::Float(0.0),
            ParamKind::Float3 => ParamValue::Float3([0.0; 3]),
            ParamKind::Float4 => ParamValue::Float4([0.0; 4]),
            ParamKind::Texture => ParamValue::Texture(String::new()),
        }
    }

    fn parse_value(self, data: &[u8]) -> Result<ParamValue, FormatError> {
        let input = &mut &data[..];
        let value: WResult<ParamValue> = match self {
            ParamKind::Int => le_i32.map(ParamValue::Int).parse_next(input),
            ParamKind::Float => le_f32.map(ParamValue::Float).parse_next(input),
            ParamKind::Float3 => parse_vec3.map(ParamValue::Float3).parse_next(input),
            ParamKind::Float4 => parse_vec4.map(ParamValue::Float4).parse_next(input),
            ParamKind::Texture => return Ok(ParamValue::Texture(null_terminated_string(data))),
        };
        value.map_err(|e| FormatError::malformed("shader parameter value", e))
    }
}

fn read_param(kind: ParamKind, data: &[u8]) -> Result<Param, Error> {
    let mut name = String::new();
    let mut value = None;

    let mut reader = MinichunkReader::new(data)?;
    while reader.has_chunk() {
        match reader.id()? {
            PARAM_NAME => name = null_terminated_string(reader.read_data()?),
            PARAM_VALUE => value = Some(kind.parse_value(reader.read_data()?)?),
            other => trace!("skipping shader parameter field {other}"),
        }
        reader.next()?;
    }

    Ok(Param {
        name,
        value: value.unwrap_or_else(|| kind.default_value()),
    })
}
