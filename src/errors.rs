//! Definitions of error related things.

use std::fmt;

use thiserror::Error;

use crate::laszip::{CompressorType, LazItemType};

/// Errors of this crate
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LasZipError {
    /// The header or the items it lists cannot be handled
    #[error(transparent)]
    Format(#[from] FormatError),
    /// The compressed data is not consistent with itself
    #[error(transparent)]
    Corruption(#[from] CorruptionError),
    /// Wrapper around an io error from the std lib
    #[error("I/O error while {stage}{}: {source}", PointSuffix(.point_index))]
    Io {
        #[source]
        source: std::io::Error,
        point_index: Option<u64>,
        stage: Stage,
    },
    #[error(
        "The len of the buffer ({buffer_len}) is not a multiple of the point size {point_size}"
    )]
    BufferLenNotMultipleOfPointSize { buffer_len: usize, point_size: usize },
}

#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FormatError {
    #[error("Item with type code: {0} is unknown")]
    UnknownLazItem(u16),
    #[error("Item {0:?} with compression version: {1} is not supported")]
    UnsupportedLazItemVersion(LazItemType, u16),
    #[error("Compressor type {0} is not valid")]
    UnknownCompressorType(u16),
    #[error("Compressor type {0:?} is not supported")]
    UnsupportedCompressorType(CompressorType),
    #[error("Coder type {0} is not supported, only arithmetic coding (0) is")]
    UnsupportedCoder(u16),
    #[error("Point format {0} is not supported")]
    UnsupportedPointFormat(u8),
    #[error("Item {0:?} appears more than once in the item list")]
    DuplicateItem(LazItemType),
    #[error("Item {item_type:?} has a size of {found} bytes, expected {expected}")]
    ItemSizeMismatch {
        item_type: LazItemType,
        expected: u16,
        found: u16,
    },
    #[error("Point record has {found} extra bytes but the layout expects {expected}")]
    ExtraBytesMismatch { expected: usize, found: usize },
}

#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CorruptionError {
    #[error("Chunk {chunk_index} ends at byte {found} but the chunk table says {expected}")]
    ChunkStartMismatch {
        chunk_index: usize,
        expected: u64,
        found: u64,
    },
    #[error("Chunk table entry {chunk_index} does not start after the previous chunk")]
    NonIncreasingChunkStarts { chunk_index: usize },
    #[error("Chunk table version {0} is not supported")]
    BadChunkTableVersion(u32),
    #[error("Variable size chunks cannot be read without a chunk table")]
    AdaptiveChunksWithoutTable,
    #[error("Compressed data ended in the middle of point {point_index}")]
    Truncated { point_index: u64 },
}

/// What the codec was doing when an io error happened
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Stage {
    ReadingHeader,
    WritingHeader,
    Compressing,
    Decompressing,
    ReadingChunkTable,
    WritingChunkTable,
    Seeking,
    Other,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::ReadingHeader => "reading the laszip header",
            Stage::WritingHeader => "writing the laszip header",
            Stage::Compressing => "compressing",
            Stage::Decompressing => "decompressing",
            Stage::ReadingChunkTable => "reading the chunk table",
            Stage::WritingChunkTable => "writing the chunk table",
            Stage::Seeking => "seeking",
            Stage::Other => "performing i/o",
        };
        f.write_str(s)
    }
}

struct PointSuffix<'a>(&'a Option<u64>);

impl fmt::Display for PointSuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(index) => write!(f, " point {}", index),
            None => Ok(()),
        }
    }
}

impl From<std::io::Error> for LasZipError {
    fn from(e: std::io::Error) -> Self {
        LasZipError::Io {
            source: e,
            point_index: None,
            stage: Stage::Other,
        }
    }
}

impl LasZipError {
    pub(crate) fn io(source: std::io::Error, stage: Stage) -> Self {
        LasZipError::Io {
            source,
            point_index: None,
            stage,
        }
    }

    /// Returns true if the error comes from data that ended too early.
    pub fn is_truncation(&self) -> bool {
        match self {
            LasZipError::Corruption(CorruptionError::Truncated { .. }) => true,
            LasZipError::Io { source, .. } => source.kind() == std::io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}

/// Attaches the stage, and optionally the point, to io errors
pub(crate) trait IoResultExt<T> {
    fn at_stage(self, stage: Stage) -> crate::Result<T>;

    fn at_point(self, stage: Stage, point_index: u64) -> crate::Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at_stage(self, stage: Stage) -> crate::Result<T> {
        self.map_err(|e| LasZipError::io(e, stage))
    }

    fn at_point(self, stage: Stage, point_index: u64) -> crate::Result<T> {
        self.map_err(|source| {
            if stage == Stage::Decompressing && source.kind() == std::io::ErrorKind::UnexpectedEof
            {
                CorruptionError::Truncated { point_index }.into()
            } else {
                LasZipError::Io {
                    source,
                    point_index: Some(point_index),
                    stage,
                }
            }
        })
    }
}
