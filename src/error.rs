use thiserror::Error;

/// All failures produced while framing or decoding a chunked asset.
#[derive(Error, Debug)]
pub enum Error {
    /// The input bytes are corrupt or not in a supported layout.
    #[error("invalid format: {0}")]
    InvalidFormat(#[from] FormatError),
    /// A reader was driven in a way its current state does not allow. This is a
    /// decoder bug, never a property of the input.
    #[error("reader misuse: {0}")]
    Usage(#[from] UsageError),
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn is_invalid_format(&self) -> bool {
        matches!(self, Error::InvalidFormat(_))
    }

    pub fn is_usage(&self) -> bool {
        matches!(self, Error::Usage(_))
    }
}

/// Structural corruption of a chunk stream or of a payload inside it.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FormatError {
    #[error("chunk header at 0x{offset:X} does not fit before scope end 0x{scope_end:X}")]
    HeaderOutOfBounds { offset: u64, scope_end: u64 },
    #[error(
        "chunk 0x{id:X} at 0x{offset:X} declares {size} bytes, overrunning scope end 0x{scope_end:X}"
    )]
    ChunkOutOfBounds {
        id: u32,
        offset: u64,
        size: u64,
        scope_end: u64,
    },
    #[error("short read at 0x{offset:X}: expected {expected} bytes, got {actual}")]
    TruncatedRead {
        offset: u64,
        expected: usize,
        actual: usize,
    },
    #[error("unsupported format version 0x{actual:X} (expected 0x{expected:X})")]
    UnsupportedVersion { actual: u32, expected: u32 },
    #[error("chunk 0x{id:X} must be a {} chunk", chunk_kind(.expected_data))]
    UnexpectedChunkKind { id: u32, expected_data: bool },
    #[error("{what} #{index} exceeds the declared material count {count}")]
    TooManyMaterials {
        what: &'static str,
        index: usize,
        count: usize,
    },
    #[error("field {id} must be {expected} bytes, found {actual}")]
    BadFieldSize {
        id: u8,
        expected: usize,
        actual: usize,
    },
    #[error("malformed {what}: {detail}")]
    Malformed { what: &'static str, detail: String },
}

/// Contract violations when driving a [`ChunkReader`](crate::data::chunk::ChunkReader)
/// or [`MinichunkReader`](crate::data::minichunk::MinichunkReader).
#[derive(Error, Debug, PartialEq, Eq)]
pub enum UsageError {
    #[error("end of chunks reached")]
    EndOfChunks,
    #[error("chunk 0x{id:X} is a container, not a data chunk")]
    NotDataChunk { id: u32 },
    #[error("chunk 0x{id:X} is a data chunk, not a container")]
    NotContainerChunk { id: u32 },
    #[error("no parent chunk to close")]
    NoParentChunk,
}

fn chunk_kind(data: &bool) -> &'static str {
    if *data { "data" } else { "container" }
}

impl FormatError {
    /// Wraps a winnow failure raised while decoding `what`.
    pub fn malformed(
        what: &'static str,
        e: winnow::error::ErrMode<winnow::error::ContextError>,
    ) -> Self {
        FormatError::Malformed {
            what,
            detail: format!("{e}"),
        }
    }
}

pub type IResult<T> = Result<T, Error>;
