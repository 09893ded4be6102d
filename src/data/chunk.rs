//! Reader for the framed "chunk" container format.
//!
//! Every chunk starts with an 8-byte header:
//!
//! ```text
//! 0x00: id    u32 (LE)
//! 0x04: size  u32 (LE), bit 31 set = container, bits 0..31 = length
//! 0x08: payload (data chunk) or nested chunks (container chunk)
//! ```
//!
//! A [`ChunkReader`] walks one nesting level at a time. Containers are entered
//! with [`ChunkReader::open`] and left with [`ChunkReader::close`]; ancestors are
//! kept on an explicit stack so arbitrarily deep trees never grow the call stack.

use std::io::{Read, Seek, SeekFrom};

use winnow::Parser;
use winnow::binary::le_u32;

use crate::data::parser_utils::WResult;
use crate::error::{Error, FormatError, UsageError};

pub type ChunkId = u32;

pub const CHUNK_HEADER_SIZE: u64 = 8;
const CONTAINER_FLAG: u32 = 0x8000_0000;
const SIZE_MASK: u32 = 0x7fff_ffff;

/// Position and kind of a chunk. `start` and `end` bound the payload, not the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChunkInfo {
    id: ChunkId,
    data: bool,
    start: u64,
    end: u64,
}

/// Returns `(id, raw_size)` from an 8-byte chunk header.
fn parse_chunk_header(input: &mut &[u8]) -> WResult<(u32, u32)> {
    let id = le_u32.parse_next(input)?;
    let size = le_u32.parse_next(input)?;
    Ok((id, size))
}

/// Forward cursor over a tree of chunks in a seekable stream.
#[derive(Debug)]
pub struct ChunkReader<R> {
    stream: R,
    current: Option<ChunkInfo>,
    parents: Vec<ChunkInfo>,
}

impl<R: Read + Seek> ChunkReader<R> {
    /// Frames `stream` from byte 0, wherever it is currently positioned, and
    /// reads the first top-level chunk.
    pub fn new(mut stream: R) -> Result<Self, Error> {
        let stream_size = stream.seek(SeekFrom::End(0))?;
        stream.seek(SeekFrom::Start(0))?;

        // The top-level "chunk" is synthetic and spans the whole stream.
        let root = ChunkInfo {
            id: 0,
            data: false,
            start: 0,
            end: stream_size,
        };

        let mut reader = ChunkReader {
            stream,
            current: None,
            parents: vec![root],
        };
        reader.read_first_child(root)?;
        Ok(reader)
    }

    /// Gives back the underlying stream.
    pub fn into_inner(self) -> R {
        self.stream
    }

    /// Is there a current chunk at this nesting level?
    pub fn has_chunk(&self) -> bool {
        self.current.is_some()
    }

    pub fn id(&self) -> Result<ChunkId, Error> {
        Ok(self.current()?.id)
    }

    /// Does the current chunk hold a flat payload (as opposed to nested chunks)?
    pub fn has_data(&self) -> Result<bool, Error> {
        Ok(self.current()?.data)
    }

    /// Payload length of the current chunk, or the byte span of its children for a container.
    pub fn size(&self) -> Result<u64, Error> {
        let current = self.current()?;
        Ok(current.end - current.start)
    }

    /// Number of containers currently open.
    pub fn depth(&self) -> usize {
        self.parents.len() - 1
    }

    /// Reads the full payload of the current data chunk.
    pub fn read_data(&mut self) -> Result<Vec<u8>, Error> {
        let current = self.current()?;
        if !current.data {
            return Err(UsageError::NotDataChunk { id: current.id }.into());
        }

        let expected = (current.end - current.start) as usize;
        self.stream.seek(SeekFrom::Start(current.start))?;

        let mut data = Vec::with_capacity(expected);
        (&mut self.stream)
            .take(expected as u64)
            .read_to_end(&mut data)?;
        if data.len() != expected {
            return Err(FormatError::TruncatedRead {
                offset: current.start,
                expected,
                actual: data.len(),
            }
            .into());
        }
        Ok(data)
    }

    /// Advances to the next sibling. Leaves [`has_chunk`](Self::has_chunk) false
    /// once the parent's end is reached.
    pub fn next(&mut self) -> Result<(), Error> {
        let current = self.current.take().ok_or(UsageError::EndOfChunks)?;
        let parent_end = self.parent().end;

        if current.end < parent_end {
            self.stream.seek(SeekFrom::Start(current.end))?;
            self.read_next()?;
        }
        Ok(())
    }

    /// Descends into the current container chunk. Its first child, if any,
    /// becomes the current chunk.
    pub fn open(&mut self) -> Result<(), Error> {
        let current = self.current()?;
        if current.data {
            return Err(UsageError::NotContainerChunk { id: current.id }.into());
        }

        self.parents.push(current);
        self.current = None;
        self.read_first_child(current)
    }

    /// Leaves the innermost open container. The container becomes the current
    /// chunk again, so a following [`next`](Self::next) resumes with its sibling.
    pub fn close(&mut self) -> Result<(), Error> {
        if self.parents.len() == 1 {
            return Err(UsageError::NoParentChunk.into());
        }

        let closed = self.parents.pop().ok_or(UsageError::NoParentChunk)?;
        self.stream.seek(SeekFrom::Start(closed.start))?;
        self.current = Some(closed);
        Ok(())
    }

    fn current(&self) -> Result<ChunkInfo, Error> {
        self.current.ok_or_else(|| UsageError::EndOfChunks.into())
    }

    fn parent(&self) -> &ChunkInfo {
        // The synthetic root is never popped.
        &self.parents[self.parents.len() - 1]
    }

    fn read_first_child(&mut self, parent: ChunkInfo) -> Result<(), Error> {
        self.stream.seek(SeekFrom::Start(parent.start))?;
        if parent.start < parent.end {
            self.read_next()?;
        }
        Ok(())
    }

    /// Reads the header at the stream position and validates it against the
    /// innermost open container.
    fn read_next(&mut self) -> Result<(), Error> {
        let pos = self.stream.stream_position()?;
        let scope_end = self.parent().end;
        if pos + CHUNK_HEADER_SIZE > scope_end {
            return Err(FormatError::HeaderOutOfBounds {
                offset: pos,
                scope_end,
            }
            .into());
        }

        let mut header = Vec::with_capacity(CHUNK_HEADER_SIZE as usize);
        (&mut self.stream)
            .take(CHUNK_HEADER_SIZE)
            .read_to_end(&mut header)?;
        if header.len() != CHUNK_HEADER_SIZE as usize {
            return Err(FormatError::TruncatedRead {
                offset: pos,
                expected: CHUNK_HEADER_SIZE as usize,
                actual: header.len(),
            }
            .into());
        }
        let (id, raw_size) = parse_chunk_header(&mut &header[..])
            .map_err(|e| FormatError::malformed("chunk header", e))?;

        let data = raw_size & CONTAINER_FLAG == 0;
        let size = u64::from(raw_size & SIZE_MASK);
        let start = pos + CHUNK_HEADER_SIZE;
        if start + size > scope_end {
            return Err(FormatError::ChunkOutOfBounds {
                id,
                offset: pos,
                size,
                scope_end,
            }
            .into());
        }

        self.current = Some(ChunkInfo {
            id,
            data,
            start,
            end: start + size,
        });
        Ok(())
    }
}

/// Read the payload of the current chunk, which the format requires to be a data chunk.
pub fn read_data_chunk<R: Read + Seek>(reader: &mut ChunkReader<R>) -> Result<Vec<u8>, Error> {
    let id = reader.id()?;
    if !reader.has_data()? {
        return Err(FormatError::UnexpectedChunkKind {
            id,
            expected_data: true,
        }
        .into());
    }
    reader.read_data()
}

/// Run `f` over the children of the current chunk, which the format requires to
/// be a container, then close it again.
pub fn read_container<R, T, F>(reader: &mut ChunkReader<R>, f: F) -> Result<T, Error>
where
    R: Read + Seek,
    F: FnOnce(&mut ChunkReader<R>) -> Result<T, Error>,
{
    let id = reader.id()?;
    if reader.has_data()? {
        return Err(FormatError::UnexpectedChunkKind {
            id,
            expected_data: false,
        }
        .into());
    }
    reader.open()?;
    let value = f(reader)?;
    reader.close()?;
    Ok(value)
}
