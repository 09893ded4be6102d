//! Reader for "minichunks": the flat records packed inside some data chunk payloads.
//!
//! ```text
//! 0x00: id     u8
//! 0x01: length u8
//! 0x02: payload (length bytes)
//! ```
//!
//! Minichunks never nest, so there is no open/close.

use winnow::Parser;
use winnow::binary::le_u8;
use winnow::token::take;

use crate::data::parser_utils::WResult;
use crate::error::{Error, FormatError, UsageError};

pub type MinichunkId = u8;

const MINICHUNK_HEADER_SIZE: usize = 2;

#[derive(Debug, Clone, Copy)]
struct MinichunkInfo<'a> {
    id: MinichunkId,
    data: &'a [u8],
}

fn parse_minichunk<'a>(input: &mut &'a [u8]) -> WResult<MinichunkInfo<'a>> {
    let id = le_u8.parse_next(input)?;
    let len = le_u8.parse_next(input)?;
    let data = take(len as usize).parse_next(input)?;
    Ok(MinichunkInfo { id, data })
}

/// Forward cursor over the minichunks in a byte span.
#[derive(Debug, Clone)]
pub struct MinichunkReader<'a> {
    data: &'a [u8],
    pos: usize,
    current: Option<MinichunkInfo<'a>>,
}

impl<'a> MinichunkReader<'a> {
    /// Reads the first minichunk of `data`. An empty span has no minichunks.
    pub fn new(data: &'a [u8]) -> Result<Self, Error> {
        let mut reader = MinichunkReader {
            data,
            pos: 0,
            current: None,
        };
        if !data.is_empty() {
            reader.read_next()?;
        }
        Ok(reader)
    }

    pub fn has_chunk(&self) -> bool {
        self.current.is_some()
    }

    pub fn id(&self) -> Result<MinichunkId, Error> {
        Ok(self.current()?.id)
    }

    /// Borrows the current minichunk's payload from the underlying span.
    pub fn read_data(&self) -> Result<&'a [u8], Error> {
        Ok(self.current()?.data)
    }

    pub fn next(&mut self) -> Result<(), Error> {
        self.current.take().ok_or(UsageError::EndOfChunks)?;
        if self.pos < self.data.len() {
            self.read_next()?;
        }
        Ok(())
    }

    /// Bytes of the span not yet consumed by a header or payload.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn current(&self) -> Result<MinichunkInfo<'a>, Error> {
        self.current.ok_or_else(|| UsageError::EndOfChunks.into())
    }

    fn read_next(&mut self) -> Result<(), Error> {
        let scope_end = self.data.len() as u64;
        if self.pos + MINICHUNK_HEADER_SIZE > self.data.len() {
            return Err(FormatError::HeaderOutOfBounds {
                offset: self.pos as u64,
                scope_end,
            }
            .into());
        }

        let data: &'a [u8] = self.data;
        let pos = self.pos;
        let info =
            parse_minichunk(&mut &data[pos..]).map_err(|_| FormatError::ChunkOutOfBounds {
                id: u32::from(data[pos]),
                offset: pos as u64,
                size: u64::from(data[pos + 1]),
                scope_end,
            })?;

        self.pos += MINICHUNK_HEADER_SIZE + info.data.len();
        self.current = Some(info);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::MinichunkBuilder;

    #[test]
    fn reads_records_until_span_is_exhausted() {
        let bytes = MinichunkBuilder::new()
            .field(1, b"Diffuse\0")
            .field(2, &[1, 2, 3, 4])
            .field(9, &[])
            .build();

        let mut reader = MinichunkReader::new(&bytes).unwrap();
        let mut seen = Vec::new();
        while reader.has_chunk() {
            seen.push((reader.id().unwrap(), reader.read_data().unwrap().to_vec()));
            reader.next().unwrap();
        }

        assert_eq!(
            seen,
            vec![
                (1, b"Diffuse\0".to_vec()),
                (2, vec![1, 2, 3, 4]),
                (9, Vec::new()),
            ]
        );
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn payload_is_borrowed_from_the_span() {
        let bytes = MinichunkBuilder::new().field(0, &[7; 4]).build();
        let reader = MinichunkReader::new(&bytes).unwrap();
        let data = reader.read_data().unwrap();
        assert!(std::ptr::eq(data.as_ptr(), bytes[2..].as_ptr()));
    }

    #[test]
    fn empty_span_has_no_chunks() {
        let mut reader = MinichunkReader::new(&[]).unwrap();
        assert!(!reader.has_chunk());
        assert!(matches!(
            reader.next(),
            Err(Error::Usage(UsageError::EndOfChunks))
        ));
        assert!(reader.id().unwrap_err().is_usage());
        assert!(reader.read_data().unwrap_err().is_usage());
    }

    #[test]
    fn truncated_header_is_invalid() {
        let mut bytes = MinichunkBuilder::new().field(1, b"ab").build();
        bytes.push(5);

        let mut reader = MinichunkReader::new(&bytes).unwrap();
        assert!(matches!(
            reader.next(),
            Err(Error::InvalidFormat(FormatError::HeaderOutOfBounds {
                offset: 4,
                scope_end: 5
            }))
        ));
    }

    #[test]
    fn overlong_payload_is_invalid() {
        for len in 4u8..=255 {
            let bytes = [3, len, 0, 0, 0];
            let err = MinichunkReader::new(&bytes).unwrap_err();
            assert!(matches!(
                err,
                Error::InvalidFormat(FormatError::ChunkOutOfBounds { id: 3, .. })
            ));
        }
        let reader = MinichunkReader::new(&[3, 3, 0, 0, 0]).unwrap();
        assert_eq!(reader.read_data().unwrap().len(), 3);
        assert_eq!(reader.remaining(), 0);
    }
}
