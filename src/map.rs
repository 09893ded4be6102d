//! Decoder for chunked map files (`.TED`).
//!
//! Only environment information is decoded. The layout is:
//!
//! ```text
//! map_info (data, minichunks)          0: format version
//! map_data (container)
//!   map_data_environment_set (container)
//!     map_data_environments (container)
//!       map_data_environment (data, minichunks) ...
//!     map_data_active_environment (data, minichunks)
//!                                      37: active environment index
//! ```

use std::io::{Cursor, Read, Seek};

use rootcause::Report;
use tracing::{debug, trace, warn};

use crate::data::chunk::{ChunkId, ChunkReader, read_container, read_data_chunk};
use crate::data::minichunk::MinichunkReader;
use crate::data::parser_utils::{exact_f32, exact_u32, null_terminated_string};
use crate::error::{Error, FormatError};

const MAP_INFO: ChunkId = 0x00;
const MAP_DATA: ChunkId = 0x01;
const MAP_DATA_ENVIRONMENTS: ChunkId = 0x04;
const MAP_DATA_ENVIRONMENT: ChunkId = 0x06;
const MAP_DATA_ACTIVE_ENVIRONMENT: ChunkId = 0x08;
const MAP_DATA_ENVIRONMENT_SET: ChunkId = 0x100;

/// The only map format version this decoder accepts.
pub const MAP_FORMAT_VERSION: u32 = 0x201;

// Minichunk field ids.
const HEADER_VERSION: u8 = 0;
const ENVIRONMENT_NAME: u8 = 20;
const SKYDOME_NAME: [u8; 2] = [25, 26];
const SKYDOME_SCALE: [u8; 2] = [27, 28];
const SKYDOME_TILT: [u8; 2] = [29, 30];
const SKYDOME_Z_ANGLE: [u8; 2] = [31, 32];
const ACTIVE_ENVIRONMENT: u8 = 37;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Header {
    /// Map format version.
    pub version: u32,
}

/// Backdrop rendered behind all other objects.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Skydome {
    /// Name of the skydome's game object.
    pub name: String,
    pub scale: f32,
    /// Rotation around the X axis, in radians.
    pub tilt: f32,
    /// Rotation around the Z axis, in radians.
    pub z_angle: f32,
}

impl Default for Skydome {
    fn default() -> Self {
        Skydome {
            name: String::new(),
            scale: 1.0,
            tilt: 0.0,
            z_angle: 0.0,
        }
    }
}

/// Physical characteristics of a scene: lighting, backdrop, weather.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Environment {
    pub name: String,
    /// Drawn in order, each on top of the previous one.
    pub skydomes: [Skydome; 2],
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Map {
    pub header: Header,
    pub environments: Vec<Environment>,
    /// Always a valid index into `environments`, or 0 if there are none.
    pub active_environment: u32,
}

impl Map {
    pub fn active_environment(&self) -> Option<&Environment> {
        self.environments.get(self.active_environment as usize)
    }
}

/// Decode a map from a seekable stream.
pub fn read_map<R: Read + Seek>(stream: R) -> Result<Map, Report<Error>> {
    let mut reader = ChunkReader::new(stream)?;
    Ok(decode_map(&mut reader)?)
}

/// Decode a map held entirely in memory.
pub fn parse_map(file_data: &[u8]) -> Result<Map, Report<Error>> {
    read_map(Cursor::new(file_data))
}

fn decode_map<R: Read + Seek>(reader: &mut ChunkReader<R>) -> Result<Map, Error> {
    let mut map = Map::default();
    while reader.has_chunk() {
        match reader.id()? {
            MAP_INFO => {
                let data = read_data_chunk(reader)?;
                map.header = read_header(&data)?;
                if map.header.version != MAP_FORMAT_VERSION {
                    return Err(FormatError::UnsupportedVersion {
                        actual: map.header.version,
                        expected: MAP_FORMAT_VERSION,
                    }
                    .into());
                }
            }
            MAP_DATA => read_container(reader, |reader| read_map_data(&mut map, reader))?,
            other => trace!("skipping map chunk 0x{other:X}"),
        }
        reader.next()?;
    }
    debug!(
        environments = map.environments.len(),
        active = map.active_environment,
        "decoded map"
    );
    Ok(map)
}

fn read_header(data: &[u8]) -> Result<Header, Error> {
    let mut header = Header::default();
    let mut reader = MinichunkReader::new(data)?;
    while reader.has_chunk() {
        match reader.id()? {
            HEADER_VERSION => header.version = exact_u32(HEADER_VERSION, reader.read_data()?)?,
            other => trace!("skipping map header field {other}"),
        }
        reader.next()?;
    }
    Ok(header)
}

fn read_map_data<R: Read + Seek>(map: &mut Map, reader: &mut ChunkReader<R>) -> Result<(), Error> {
    while reader.has_chunk() {
        match reader.id()? {
            MAP_DATA_ENVIRONMENT_SET => {
                read_container(reader, |reader| read_environment_set(map, reader))?
            }
            other => trace!("skipping map data chunk 0x{other:X}"),
        }
        reader.next()?;
    }
    Ok(())
}

fn read_environment_set<R: Read + Seek>(
    map: &mut Map,
    reader: &mut ChunkReader<R>,
) -> Result<(), Error> {
    while reader.has_chunk() {
        match reader.id()? {
            MAP_DATA_ENVIRONMENTS => {
                map.environments = read_container(reader, read_environments)?;
            }
            MAP_DATA_ACTIVE_ENVIRONMENT => {
                let data = read_data_chunk(reader)?;
                map.active_environment = read_active_environment(&data)?;
            }
            other => trace!("skipping environment set chunk 0x{other:X}"),
        }
        reader.next()?;
    }

    if map.active_environment as usize >= map.environments.len() {
        warn!(
            active = map.active_environment,
            environments = map.environments.len(),
            "active environment out of range, using 0"
        );
        map.active_environment = 0;
    }
    Ok(())
}

fn read_environments<R: Read + Seek>(
    reader: &mut ChunkReader<R>,
) -> Result<Vec<Environment>, Error> {
    let mut environments = Vec::new();
    while reader.has_chunk() {
        match reader.id()? {
            MAP_DATA_ENVIRONMENT => {
                let data = read_data_chunk(reader)?;
                let environment = read_environment(&data)?;
                debug!(name = %environment.name, "decoded environment");
                environments.push(environment);
            }
            other => trace!("skipping environments chunk 0x{other:X}"),
        }
        reader.next()?;
    }
    Ok(environments)
}

fn read_environment(data: &[u8]) -> Result<Environment, Error> {
    let mut environment = Environment::default();
    let mut reader = MinichunkReader::new(data)?;
    while reader.has_chunk() {
        let id = reader.id()?;
        let field = reader.read_data()?;
        match id {
            ENVIRONMENT_NAME => environment.name = null_terminated_string(field),
            _ => {
                if let Some(i) = SKYDOME_NAME.iter().position(|&f| f == id) {
                    environment.skydomes[i].name = null_terminated_string(field);
                } else if let Some(i) = SKYDOME_SCALE.iter().position(|&f| f == id) {
                    environment.skydomes[i].scale = exact_f32(id, field)?;
                } else if let Some(i) = SKYDOME_TILT.iter().position(|&f| f == id) {
                    environment.skydomes[i].tilt = exact_f32(id, field)?;
                } else if let Some(i) = SKYDOME_Z_ANGLE.iter().position(|&f| f == id) {
                    environment.skydomes[i].z_angle = exact_f32(id, field)?;
                } else {
                    trace!("skipping environment field {id}");
                }
            }
        }
        reader.next()?;
    }
    Ok(environment)
}

fn read_active_environment(data: &[u8]) -> Result<u32, Error> {
    let mut active_environment = 0;
    let mut reader = MinichunkReader::new(data)?;
    while reader.has_chunk() {
        match reader.id()? {
            ACTIVE_ENVIRONMENT => {
                active_environment = exact_u32(ACTIVE_ENVIRONMENT, reader.read_data()?)?
            }
            other => trace!("skipping active environment field {other}"),
        }
        reader.next()?;
    }
    Ok(active_environment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{ChunkBuilder, MinichunkBuilder};

    fn header(version: u32) -> Vec<u8> {
        MinichunkBuilder::new().u32(HEADER_VERSION, version).build()
    }

    fn environment(name: &str, sky: [(&str, f32, f32, f32); 2]) -> Vec<u8> {
        let mut b = MinichunkBuilder::new().string(ENVIRONMENT_NAME, name);
        for (i, (sky_name, scale, tilt, z_angle)) in sky.into_iter().enumerate() {
            b = b
                .string(SKYDOME_NAME[i], sky_name)
                .f32(SKYDOME_SCALE[i], scale)
                .f32(SKYDOME_TILT[i], tilt)
                .f32(SKYDOME_Z_ANGLE[i], z_angle);
        }
        // Unrelated environment fields (lighting, wind, ...) are ignored.
        b.field(40, &[0; 12]).build()
    }

    fn map_with(version: u32, environments: &[Vec<u8>], active: Option<u32>) -> Vec<u8> {
        ChunkBuilder::new()
            .data(MAP_INFO, &header(version))
            .container(MAP_DATA, |d| {
                d.data(0x2, b"terrain")
                    .container(MAP_DATA_ENVIRONMENT_SET, |set| {
                        let set = set.container(MAP_DATA_ENVIRONMENTS, |envs| {
                            environments
                                .iter()
                                .fold(envs, |envs, env| envs.data(MAP_DATA_ENVIRONMENT, env))
                        });
                        match active {
                            Some(index) => set.data(
                                MAP_DATA_ACTIVE_ENVIRONMENT,
                                &MinichunkBuilder::new()
                                    .u32(ACTIVE_ENVIRONMENT, index)
                                    .build(),
                            ),
                            None => set,
                        }
                    })
            })
            .data(0x200, b"objects")
            .build()
    }

    fn three_environments() -> Vec<Vec<u8>> {
        vec![
            environment(
                "Temperate",
                [("Sky_Blue", 1.0, 0.1, 0.2), ("Clouds", 2.0, 0.0, 1.5)],
            ),
            environment("Desert", [("Sky_Sand", 1.5, 0.0, 0.0), ("", 1.0, 0.0, 0.0)]),
            environment("Space", [("Stars", 10.0, 0.5, 3.0), ("Nebula", 8.0, 0.0, 0.25)]),
        ]
    }

    #[test]
    fn decodes_environments() {
        let map = parse_map(&map_with(MAP_FORMAT_VERSION, &three_environments(), Some(2))).unwrap();

        assert_eq!(map.header.version, MAP_FORMAT_VERSION);
        assert_eq!(map.environments.len(), 3);
        assert_eq!(map.active_environment, 2);
        assert_eq!(map.active_environment().unwrap().name, "Space");

        let temperate = &map.environments[0];
        assert_eq!(temperate.name, "Temperate");
        assert_eq!(
            temperate.skydomes[1],
            Skydome {
                name: "Clouds".into(),
                scale: 2.0,
                tilt: 0.0,
                z_angle: 1.5,
            }
        );
        assert_eq!(temperate.skydomes[0].tilt, 0.1);
    }

    #[test]
    fn out_of_range_active_environment_is_reset() {
        let map = parse_map(&map_with(MAP_FORMAT_VERSION, &three_environments(), Some(9))).unwrap();
        assert_eq!(map.environments.len(), 3);
        assert_eq!(map.active_environment, 0);
    }

    #[test]
    fn active_environment_without_environments_is_zero() {
        let map = parse_map(&map_with(MAP_FORMAT_VERSION, &[], Some(1))).unwrap();
        assert!(map.environments.is_empty());
        assert_eq!(map.active_environment, 0);
        assert!(map.active_environment().is_none());
    }

    #[test]
    fn missing_fields_keep_defaults() {
        let env = MinichunkBuilder::new().string(ENVIRONMENT_NAME, "Bare").build();
        let map = parse_map(&map_with(MAP_FORMAT_VERSION, &[env], None)).unwrap();
        assert_eq!(map.active_environment, 0);
        assert_eq!(map.environments[0].skydomes[0], Skydome::default());
        assert_eq!(map.environments[0].skydomes[1].scale, 1.0);
    }

    #[test]
    fn other_versions_are_rejected() {
        for version in [0, 0x200, 0x202, 0x10201] {
            let report = parse_map(&map_with(version, &three_environments(), Some(0))).unwrap_err();
            assert!(matches!(
                report.current_context(),
                Error::InvalidFormat(FormatError::UnsupportedVersion { actual, expected: 0x201 })
                    if *actual == version
            ));
        }
    }

    #[test]
    fn numeric_fields_must_be_four_bytes() {
        let env = MinichunkBuilder::new()
            .string(ENVIRONMENT_NAME, "Broken")
            .field(SKYDOME_SCALE[0], &[0, 0, 128])
            .build();
        let report = parse_map(&map_with(MAP_FORMAT_VERSION, &[env], None)).unwrap_err();
        assert!(matches!(
            report.current_context(),
            Error::InvalidFormat(FormatError::BadFieldSize {
                id: 27,
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn environment_set_must_be_a_container() {
        let bytes = ChunkBuilder::new()
            .data(MAP_INFO, &header(MAP_FORMAT_VERSION))
            .container(MAP_DATA, |d| d.data(MAP_DATA_ENVIRONMENT_SET, b""))
            .build();
        let report = parse_map(&bytes).unwrap_err();
        assert!(report.current_context().is_invalid_format());
    }

    #[test]
    fn corrupt_environment_payload_is_invalid() {
        // Declares a 200-byte name in a 5-byte payload.
        let bytes = map_with(MAP_FORMAT_VERSION, &[vec![ENVIRONMENT_NAME, 200, b'a', b'b', b'c']], None);
        let report = parse_map(&bytes).unwrap_err();
        assert!(matches!(
            report.current_context(),
            Error::InvalidFormat(FormatError::ChunkOutOfBounds { id: 20, .. })
        ));
    }
}
