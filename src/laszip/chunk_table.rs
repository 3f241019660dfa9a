/*
===============================================================================

  PROGRAMMERS:

    martin.isenburg@rapidlasso.com  -  http://rapidlasso.com
    uday.karan@gmail.com - Hobu, Inc.

  COPYRIGHT:

    (c) 2007-2014, martin isenburg, rapidlasso - tools to catch reality
    (c) 2014, Uday Verma, Hobu, Inc.
    (c) 2019, Thomas Montaigu

    This is free software; you can redistribute and/or modify it under the
    terms of the GNU Lesser General Licence as published by the Free Software
    Foundation. See the COPYING file for more information.

    This software is distributed WITHOUT ANY WARRANTY and without even the
    implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.

  CHANGE HISTORY:
    6 June 2019: Translated to Rust

===============================================================================
*/

//! The table of chunks that gives random access to LAZ data.
//!
//! Chunked data starts with an `i64` pointer to the chunk table.
//! The table itself is
//!
//! - `u32` version (0)
//! - `u32` number of chunks
//! - when there are chunks, an arithmetic coded stream where each entry is
//!   predicted from the previous one. It holds the number of points of each
//!   chunk (only for variably sized chunks) and the number of bytes.
use std::io::Write;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, warn};

use crate::compressors::IntegerCompressorBuilder;
use crate::decoders::ArithmeticDecoder;
use crate::decompressors::IntegerDecompressorBuilder;
use crate::encoders::ArithmeticEncoder;
use crate::errors::{CorruptionError, IoResultExt, LasZipError, Stage};
use crate::io::ByteSource;
use crate::laszip::LazVlr;

const POINT_COUNT_CONTEXT: u32 = 0;
const BYTE_COUNT_CONTEXT: u32 = 1;

const CHUNK_TABLE_VERSION: u32 = 0;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkTableEntry {
    pub point_count: u64,
    pub byte_count: u64,
}

/// How much a reader knows about the chunks of the data it reads
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TableState {
    /// The table was found and decoded
    TablePresent,
    /// The writer did not get to write the table, chunks are
    /// discovered while decoding
    TableMissingRecoverable,
    /// The source cannot seek, points can only be read in order
    TableUnavailable,
}

/// Chunks of the data, in order, with the offset where each starts.
///
/// For fixed size chunks, every entry has the chunk size as `point_count`,
/// including the last one which may hold fewer points.
#[derive(Debug, Clone)]
pub struct ChunkTable {
    entries: Vec<ChunkTableEntry>,
    // one more value than entries: the end of the last chunk
    starts: Vec<u64>,
    first_points: Vec<u64>,
}

impl ChunkTable {
    /// Size in bytes of the pointer to the table, at the start of the data
    pub const OFFSET_SIZE: u64 = 8;

    /// An empty table whose first chunk starts at `data_start`
    pub fn new(data_start: u64) -> Self {
        Self {
            entries: Vec::new(),
            starts: vec![data_start],
            first_points: vec![0],
        }
    }

    pub fn push(&mut self, entry: ChunkTableEntry) {
        let start = self.end();
        let first_point = self.first_points[self.entries.len()];
        self.starts.push(start + entry.byte_count);
        self.first_points.push(first_point + entry.point_count);
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ChunkTableEntry] {
        &self.entries
    }

    /// Offset of the first chunk
    pub fn data_start(&self) -> u64 {
        self.starts[0]
    }

    /// Offset just after the last tabled chunk
    pub fn end(&self) -> u64 {
        self.starts[self.entries.len()]
    }

    /// Offset of a chunk, known for every tabled chunk and for the
    /// one that follows the last tabled chunk.
    pub fn chunk_start(&self, chunk_index: usize) -> Option<u64> {
        self.starts.get(chunk_index).copied()
    }

    /// Index of the first point of a chunk
    pub fn first_point_of(&self, chunk_index: usize) -> Option<u64> {
        self.first_points.get(chunk_index).copied()
    }

    /// Returns the tabled chunk holding the point, with the index of the
    /// first point of that chunk.
    pub fn chunk_of_point(&self, point_index: u64) -> Option<(usize, u64)> {
        // first_points is sorted, entries with 0 points never get tabled
        let after = self.first_points[1..].partition_point(|&first| first <= point_index);
        if after < self.entries.len() {
            Some((after, self.first_points[after]))
        } else {
            None
        }
    }

    /// Total number of points the entries account for
    pub fn point_count(&self) -> u64 {
        self.first_points[self.entries.len()]
    }

    /// Reads a table from the current position of `src`.
    ///
    /// Byte counts of 0 are rejected, as chunks must start one after another.
    pub fn read_from<R: ByteSource>(
        src: &mut R,
        data_start: u64,
        variably_sized: bool,
        chunk_size: u64,
    ) -> crate::Result<Self> {
        let version = src
            .read_u32::<LittleEndian>()
            .at_stage(Stage::ReadingChunkTable)?;
        if version != CHUNK_TABLE_VERSION {
            return Err(CorruptionError::BadChunkTableVersion(version).into());
        }
        let number_of_chunks = src
            .read_u32::<LittleEndian>()
            .at_stage(Stage::ReadingChunkTable)?;

        let mut table = Self::new(data_start);
        if number_of_chunks == 0 {
            return Ok(table);
        }

        let mut decompressor = IntegerDecompressorBuilder::new()
            .bits(32)
            .contexts(2)
            .build_initialized();
        let mut decoder = ArithmeticDecoder::new(&mut *src);
        decoder.read_init_bytes().at_stage(Stage::ReadingChunkTable)?;

        let mut previous = ChunkTableEntry::default();
        for chunk_index in 0..number_of_chunks as usize {
            let point_count = if variably_sized {
                let count = decompressor
                    .decompress(&mut decoder, previous.point_count as i32, POINT_COUNT_CONTEXT)
                    .at_stage(Stage::ReadingChunkTable)?;
                u64::from(count as u32)
            } else {
                chunk_size
            };
            let byte_count = decompressor
                .decompress(&mut decoder, previous.byte_count as i32, BYTE_COUNT_CONTEXT)
                .at_stage(Stage::ReadingChunkTable)?;
            let entry = ChunkTableEntry {
                point_count,
                byte_count: u64::from(byte_count as u32),
            };
            if entry.byte_count == 0 {
                return Err(CorruptionError::NonIncreasingChunkStarts { chunk_index }.into());
            }
            table.push(entry);
            previous = entry;
        }
        Ok(table)
    }

    pub fn write_to<W: Write>(&self, dst: &mut W, variably_sized: bool) -> std::io::Result<()> {
        dst.write_u32::<LittleEndian>(CHUNK_TABLE_VERSION)?;
        dst.write_u32::<LittleEndian>(self.entries.len() as u32)?;
        if self.entries.is_empty() {
            return Ok(());
        }

        let mut encoder = ArithmeticEncoder::new(&mut *dst);
        let mut compressor = IntegerCompressorBuilder::new()
            .bits(32)
            .contexts(2)
            .build_initialized();
        let mut previous = ChunkTableEntry::default();
        for entry in &self.entries {
            if variably_sized {
                compressor.compress(
                    &mut encoder,
                    previous.point_count as i32,
                    entry.point_count as i32,
                    POINT_COUNT_CONTEXT,
                )?;
            }
            compressor.compress(
                &mut encoder,
                previous.byte_count as i32,
                entry.byte_count as i32,
                BYTE_COUNT_CONTEXT,
            )?;
            previous = *entry;
        }
        encoder.done()
    }
}

impl<'a> IntoIterator for &'a ChunkTable {
    type Item = &'a ChunkTableEntry;
    type IntoIter = std::slice::Iter<'a, ChunkTableEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Where the pointer at the head of the data says the table is
enum TableLocation {
    Head(u64),
    Tail(u64),
    Missing,
}

/// Reads the pointer at the current position of `src`, then the table
/// it leads to.
///
/// `src` is left at the start of the first chunk.
pub(crate) fn read_chunk_table<R: ByteSource>(
    src: &mut R,
    vlr: &LazVlr,
) -> crate::Result<(TableState, ChunkTable)> {
    let pointer_position = src.position().at_stage(Stage::ReadingChunkTable)?;
    let pointer = src
        .read_i64::<LittleEndian>()
        .at_stage(Stage::ReadingChunkTable)?;
    let data_start = pointer_position + ChunkTable::OFFSET_SIZE;

    if !src.is_seekable() {
        warn!("Source cannot seek, chunks will only be read in order");
        return Ok((TableState::TableUnavailable, ChunkTable::new(data_start)));
    }

    let location = if pointer == -1 {
        match read_tail_pointer(src) {
            Ok(offset) if offset >= data_start as i64 => TableLocation::Tail(offset as u64),
            _ => TableLocation::Missing,
        }
    } else if pointer >= data_start as i64 {
        TableLocation::Head(pointer as u64)
    } else {
        // the writer only got to reserve the pointer
        TableLocation::Missing
    };

    let variably_sized = vlr.uses_variably_sized_chunks();
    let chunk_size = u64::from(vlr.chunk_size());
    let outcome = match location {
        TableLocation::Head(offset) => {
            match read_table_at(src, offset, data_start, variably_sized, chunk_size) {
                Err(LasZipError::Corruption(e)) => return Err(e.into()),
                other => other.ok(),
            }
        }
        // the tail pointer may well be the last bytes of an unfinished chunk
        TableLocation::Tail(offset) => {
            read_table_at(src, offset, data_start, variably_sized, chunk_size).ok()
        }
        TableLocation::Missing => None,
    };
    src.seek_to(data_start).at_stage(Stage::Seeking)?;

    match outcome {
        Some(table) => {
            debug!(
                "Read chunk table of {} chunks, data starts at {}",
                table.len(),
                data_start
            );
            Ok((TableState::TablePresent, table))
        }
        None => {
            warn!("Chunk table is missing, chunks will be discovered while decoding");
            Ok((TableState::TableMissingRecoverable, ChunkTable::new(data_start)))
        }
    }
}

fn read_tail_pointer<R: ByteSource>(src: &mut R) -> std::io::Result<i64> {
    src.seek_end(-(ChunkTable::OFFSET_SIZE as i64))?;
    src.read_i64::<LittleEndian>()
}

fn read_table_at<R: ByteSource>(
    src: &mut R,
    offset: u64,
    data_start: u64,
    variably_sized: bool,
    chunk_size: u64,
) -> crate::Result<ChunkTable> {
    src.seek_to(offset).at_stage(Stage::Seeking)?;
    let table = ChunkTable::read_from(src, data_start, variably_sized, chunk_size)?;
    if table.end() != offset {
        debug!(
            "Chunk table says chunks end at {} but the table is at {}",
            table.end(),
            offset
        );
    }
    Ok(table)
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;

    fn entry(point_count: u64, byte_count: u64) -> ChunkTableEntry {
        ChunkTableEntry {
            point_count,
            byte_count,
        }
    }

    #[test]
    fn test_chunk_starts_accumulate() {
        let mut table = ChunkTable::new(100);
        table.push(entry(10, 50));
        table.push(entry(10, 70));
        table.push(entry(4, 20));
        assert_eq!(table.chunk_start(0), Some(100));
        assert_eq!(table.chunk_start(1), Some(150));
        assert_eq!(table.chunk_start(3), Some(240));
        assert_eq!(table.chunk_start(4), None);
        assert_eq!(table.point_count(), 24);
    }

    #[test]
    fn test_chunk_of_point() {
        let mut table = ChunkTable::new(8);
        table.push(entry(10, 50));
        table.push(entry(5, 70));
        table.push(entry(10, 20));
        assert_eq!(table.chunk_of_point(0), Some((0, 0)));
        assert_eq!(table.chunk_of_point(9), Some((0, 0)));
        assert_eq!(table.chunk_of_point(10), Some((1, 10)));
        assert_eq!(table.chunk_of_point(14), Some((1, 10)));
        assert_eq!(table.chunk_of_point(15), Some((2, 15)));
        assert_eq!(table.chunk_of_point(25), None);
    }

    #[test]
    fn test_variable_table_round_trip() {
        let mut table = ChunkTable::new(8);
        table.push(entry(1_000, 12_345));
        table.push(entry(17, 300));
        table.push(entry(50_000, 1_234_567));
        let mut bytes = Vec::new();
        table.write_to(&mut bytes, true).unwrap();

        let read = ChunkTable::read_from(&mut Cursor::new(bytes), 8, true, 0).unwrap();
        assert_eq!(read.entries(), table.entries());
    }

    #[test]
    fn test_fixed_table_only_stores_byte_counts() {
        let mut table = ChunkTable::new(8);
        table.push(entry(100, 12_345));
        table.push(entry(100, 11_000));
        let mut bytes = Vec::new();
        table.write_to(&mut bytes, false).unwrap();

        let read = ChunkTable::read_from(&mut Cursor::new(bytes), 8, false, 100).unwrap();
        assert_eq!(read.entries(), table.entries());
        assert_eq!(read.chunk_start(2), Some(8 + 12_345 + 11_000));
    }

    #[test]
    fn test_empty_table_has_no_coded_stream() {
        let mut bytes = Vec::new();
        ChunkTable::new(8).write_to(&mut bytes, false).unwrap();
        assert_eq!(bytes, vec![0u8; 8]);
    }

    #[test]
    fn test_bad_version_is_corruption() {
        let bytes = vec![1u8, 0, 0, 0, 0, 0, 0, 0];
        let err = ChunkTable::read_from(&mut Cursor::new(bytes), 8, false, 100).unwrap_err();
        assert!(matches!(
            err,
            LasZipError::Corruption(CorruptionError::BadChunkTableVersion(1))
        ));
    }

    #[test]
    fn test_zero_sized_chunk_is_corruption() {
        let mut table = ChunkTable::new(8);
        table.push(entry(100, 10));
        table.push(entry(100, 0));
        let mut bytes = Vec::new();
        table.write_to(&mut bytes, false).unwrap();
        let err = ChunkTable::read_from(&mut Cursor::new(bytes), 8, false, 100).unwrap_err();
        assert!(matches!(
            err,
            LasZipError::Corruption(CorruptionError::NonIncreasingChunkStarts { chunk_index: 1 })
        ));
    }
}
