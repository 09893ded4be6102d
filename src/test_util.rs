//! Builders for synthetic chunk streams used by the unit tests.

use crate::data::chunk::ChunkId;

const CONTAINER_FLAG: u32 = 0x8000_0000;

#[derive(Debug, Default)]
pub struct ChunkBuilder {
    bytes: Vec<u8>,
}

impl ChunkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(mut self, id: ChunkId, payload: &[u8]) -> Self {
        self.bytes.extend_from_slice(&id.to_le_bytes());
        self.bytes
            .extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.bytes.extend_from_slice(payload);
        self
    }

    pub fn container(mut self, id: ChunkId, children: impl FnOnce(Self) -> Self) -> Self {
        let body = children(Self::new()).build();
        self.bytes.extend_from_slice(&id.to_le_bytes());
        self.bytes
            .extend_from_slice(&(body.len() as u32 | CONTAINER_FLAG).to_le_bytes());
        self.bytes.extend_from_slice(&body);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

#[derive(Debug, Default)]
pub struct MinichunkBuilder {
    bytes: Vec<u8>,
}

impl MinichunkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, id: u8, payload: &[u8]) -> Self {
        self.bytes.push(id);
        self.bytes.push(payload.len() as u8);
        self.bytes.extend_from_slice(payload);
        self
    }

    /// Null-terminated string field.
    pub fn string(self, id: u8, value: &str) -> Self {
        let mut payload = value.as_bytes().to_vec();
        payload.push(0);
        self.field(id, &payload)
    }

    pub fn u32(self, id: u8, value: u32) -> Self {
        self.field(id, &value.to_le_bytes())
    }

    pub fn f32(self, id: u8, value: f32) -> Self {
        self.field(id, &value.to_le_bytes())
    }

    pub fn floats(self, id: u8, values: &[f32]) -> Self {
        let payload = le_floats(values);
        self.field(id, &payload)
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

pub fn le_floats(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn le_u32s(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}
