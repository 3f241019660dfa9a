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

use byteorder::{LittleEndian, WriteBytesExt};
use log::debug;

use crate::errors::{FormatError, IoResultExt, LasZipError, Stage};
use crate::io::ByteSink;
use crate::laszip::chunk_table::{ChunkTable, ChunkTableEntry};
use crate::laszip::registry::CompressorRegistry;
use crate::laszip::{LazItem, LazVlr};
use crate::point::{PointLayout, PointRecord};
use crate::record::RecordCompressor;

/// Compresses points into the given destination.
///
/// The [`LazVlr`] decides how the points are organized:
///
/// - `PointWise`: a single coding session, no chunk table.
/// - `PointWiseChunked` and `LayeredChunked` with a fixed chunk size:
///   use [`compress_one`] and/or [`compress_many`], chunks are managed
///   by the compressor.
/// - Variably sized chunks: use [`compress_chunks`], or call
///   [`finish_current_chunk`] after the points of each chunk.
///
/// Chunked data starts with a pointer to the chunk table. On a seekable
/// destination it is updated by [`done`], otherwise it is `-1` and the
/// pointer is repeated after the table.
///
/// [`compress_one`]: Self::compress_one
/// [`compress_many`]: Self::compress_many
/// [`compress_chunks`]: Self::compress_chunks
/// [`finish_current_chunk`]: Self::finish_current_chunk
/// [`done`]: Self::done
pub struct LasZipCompressor<'a, W: ByteSink + 'a> {
    vlr: LazVlr,
    layout: PointLayout,
    record_compressor: Box<dyn RecordCompressor<W> + 'a>,
    /// Where the pointer to the chunk table is, once reserved
    offset_position: Option<u64>,
    chunk_table: ChunkTable,
    current_chunk_entry: ChunkTableEntry,
    chunk_start_pos: u64,
    point_index: u64,
    scratch: PointRecord,
}

impl<'a, W: ByteSink + 'a> LasZipCompressor<'a, W> {
    /// Creates a compressor with the codecs of this crate
    pub fn new(output: W, vlr: LazVlr) -> crate::Result<Self> {
        Self::with_registry(output, vlr, &CompressorRegistry::standard())
    }

    pub fn with_registry(
        output: W,
        vlr: LazVlr,
        registry: &CompressorRegistry<'a, W>,
    ) -> crate::Result<Self> {
        let layout = PointLayout::from_items(vlr.items())?;
        let record_compressor =
            registry.record_compressor(vlr.compressor(), output, layout.clone())?;
        Ok(Self {
            scratch: layout.new_point(),
            vlr,
            layout,
            record_compressor,
            offset_position: None,
            chunk_table: ChunkTable::new(0),
            current_chunk_entry: ChunkTableEntry::default(),
            chunk_start_pos: 0,
            point_index: 0,
        })
    }

    /// Creates a compressor for the items with the default chunk size
    pub fn from_laz_items(output: W, items: Vec<LazItem>) -> crate::Result<Self> {
        Self::new(output, LazVlr::from_laz_items(items))
    }

    pub fn compress_one(&mut self, point: &PointRecord) -> crate::Result<()> {
        if point.extra_bytes.len() != self.layout.num_extra_bytes() {
            return Err(FormatError::ExtraBytesMismatch {
                expected: self.layout.num_extra_bytes(),
                found: point.extra_bytes.len(),
            }
            .into());
        }
        if self.vlr.compressor().is_chunked() {
            if self.offset_position.is_none() {
                self.reserve_offset_to_chunk_table()?;
            }
            // never reached with variably sized chunks
            if self.current_chunk_entry.point_count == u64::from(self.vlr.chunk_size()) {
                self.finish_current_chunk_impl()?;
            }
        }
        self.record_compressor
            .compress_next(point)
            .at_point(Stage::Compressing, self.point_index)?;
        self.current_chunk_entry.point_count += 1;
        self.point_index += 1;
        Ok(())
    }

    pub fn compress_many(&mut self, points: &[PointRecord]) -> crate::Result<()> {
        for point in points {
            self.compress_one(point)?;
        }
        Ok(())
    }

    /// Compresses points stored as in a LAS file, little endian and
    /// with the fields in the order of the items.
    pub fn compress_raw(&mut self, input: &[u8]) -> crate::Result<()> {
        let point_size = self.layout.size();
        if input.len() % point_size != 0 {
            return Err(LasZipError::BufferLenNotMultipleOfPointSize {
                buffer_len: input.len(),
                point_size,
            });
        }
        let mut point = std::mem::take(&mut self.scratch);
        let result = input.chunks_exact(point_size).try_for_each(|raw| {
            self.layout.unpack(raw, &mut point);
            self.compress_one(&point)
        });
        self.scratch = point;
        result
    }

    /// Compresses each item of `chunks` as its own chunk.
    ///
    /// Only for variably sized chunks.
    pub fn compress_chunks<Chunks, Chunk>(&mut self, chunks: Chunks) -> crate::Result<()>
    where
        Chunk: AsRef<[PointRecord]>,
        Chunks: IntoIterator<Item = Chunk>,
    {
        debug_assert!(self.vlr.uses_variably_sized_chunks());
        for chunk in chunks {
            self.compress_many(chunk.as_ref())?;
            self.finish_current_chunk_impl()?;
        }
        Ok(())
    }

    /// Ends the current chunk, the next points go to a new one.
    ///
    /// Only for variably sized chunks.
    pub fn finish_current_chunk(&mut self) -> crate::Result<()> {
        debug_assert!(
            self.vlr.uses_variably_sized_chunks(),
            "finish_current_chunk called without variably sized chunks"
        );
        self.finish_current_chunk_impl()
    }

    /// Writes the placeholder of the pointer to the chunk table.
    ///
    /// This is done on the first point, calling it earlier is useful when
    /// the destination has to be at the start of the point data.
    /// Does nothing for unchunked data or when already reserved.
    pub fn reserve_offset_to_chunk_table(&mut self) -> crate::Result<()> {
        if self.offset_position.is_some() || !self.vlr.compressor().is_chunked() {
            return Ok(());
        }
        let stream = self.record_compressor.get_mut();
        let position = stream.position().at_stage(Stage::WritingChunkTable)?;
        // A pointer to itself tells readers that the table never got written
        let placeholder = if stream.is_seekable() {
            position as i64
        } else {
            -1
        };
        stream
            .write_i64::<LittleEndian>(placeholder)
            .at_stage(Stage::WritingChunkTable)?;
        self.offset_position = Some(position);
        self.chunk_start_pos = position + ChunkTable::OFFSET_SIZE;
        self.chunk_table = ChunkTable::new(self.chunk_start_pos);
        Ok(())
    }

    /// Finishes the last chunk and writes the chunk table.
    ///
    /// Must be called once all points are compressed.
    pub fn done(&mut self) -> crate::Result<()> {
        if !self.vlr.compressor().is_chunked() {
            self.record_compressor
                .done()
                .at_stage(Stage::Compressing)?;
            debug!("Compressed {} points in one session", self.point_index);
            return self.record_compressor.get_mut().flush().at_stage(Stage::Other);
        }

        self.reserve_offset_to_chunk_table()?;
        self.finish_current_chunk_impl()?;
        let offset_position = self.offset_position.unwrap_or_default();
        let variably_sized = self.vlr.uses_variably_sized_chunks();
        let stream = self.record_compressor.get_mut();
        let table_position = stream.position().at_stage(Stage::WritingChunkTable)?;
        let mut write_table = || -> std::io::Result<()> {
            if stream.is_seekable() {
                stream.seek_to(offset_position)?;
                stream.write_i64::<LittleEndian>(table_position as i64)?;
                stream.seek_to(table_position)?;
                self.chunk_table.write_to(stream, variably_sized)?;
            } else {
                self.chunk_table.write_to(stream, variably_sized)?;
                stream.write_i64::<LittleEndian>(table_position as i64)?;
            }
            stream.flush()
        };
        write_table().at_stage(Stage::WritingChunkTable)?;
        debug!(
            "Wrote chunk table of {} chunks at {}",
            self.chunk_table.len(),
            table_position
        );
        Ok(())
    }

    pub fn vlr(&self) -> &LazVlr {
        &self.vlr
    }

    pub fn layout(&self) -> &PointLayout {
        &self.layout
    }

    /// Chunks finished so far
    pub fn chunk_table(&self) -> &ChunkTable {
        &self.chunk_table
    }

    pub fn into_inner(self) -> W {
        self.record_compressor.box_into_inner()
    }

    pub fn get_mut(&mut self) -> &mut W {
        self.record_compressor.get_mut()
    }

    fn finish_current_chunk_impl(&mut self) -> crate::Result<()> {
        if self.current_chunk_entry.point_count == 0 {
            return Ok(());
        }
        self.record_compressor
            .done()
            .at_stage(Stage::Compressing)?;
        let position = self
            .record_compressor
            .get_mut()
            .position()
            .at_stage(Stage::Compressing)?;
        self.current_chunk_entry.byte_count = position - self.chunk_start_pos;
        debug!(
            "Chunk {} has {} points in {} bytes",
            self.chunk_table.len(),
            self.current_chunk_entry.point_count,
            self.current_chunk_entry.byte_count
        );
        self.chunk_table.push(self.current_chunk_entry);
        self.chunk_start_pos = position;
        self.current_chunk_entry = ChunkTableEntry::default();
        self.record_compressor.reset();
        Ok(())
    }
}

/// Compresses points stored as in a LAS file.
///
/// The data written is
///  1) the pointer to the chunk table (i64), for chunked data
///  2) the compressed points
///  3) the chunk table
pub fn compress_buffer<W: ByteSink>(
    dst: W,
    uncompressed_points: &[u8],
    laz_vlr: LazVlr,
) -> crate::Result<()> {
    let mut compressor = LasZipCompressor::new(dst, laz_vlr)?;
    compressor.compress_raw(uncompressed_points)?;
    compressor.done()
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use byteorder::ReadBytesExt;

    use super::*;
    use crate::io::Sequential;
    use crate::las::test_utils::random_points;
    use crate::laszip::{CompressorType, LazItemType, LazVlrBuilder};

    fn items() -> Vec<LazItem> {
        vec![
            LazItem::new(LazItemType::Point10, 2),
            LazItem::new(LazItemType::GpsTime, 2),
        ]
    }

    fn vlr(chunk_size: u32) -> LazVlr {
        LazVlrBuilder::from_laz_items(items())
            .with_chunk_size(chunk_size)
            .build()
    }

    #[test]
    fn test_pointer_is_back_patched() {
        let points = random_points(&items(), 250, 1);
        let mut compressor = LasZipCompressor::new(Cursor::new(Vec::new()), vlr(100)).unwrap();
        compressor.compress_many(&points).unwrap();
        compressor.done().unwrap();
        assert_eq!(compressor.chunk_table().len(), 3);
        let table_start = compressor.chunk_table().end();

        let mut data = Cursor::new(compressor.into_inner().into_inner());
        assert_eq!(data.read_i64::<LittleEndian>().unwrap(), table_start as i64);
    }

    #[test]
    fn test_pointer_is_appended_without_seek() {
        let points = random_points(&items(), 150, 2);
        let mut compressor =
            LasZipCompressor::new(Sequential::new(Vec::new()), vlr(100)).unwrap();
        compressor.compress_many(&points).unwrap();
        compressor.done().unwrap();
        let table_start = compressor.chunk_table().end();

        let data = compressor.into_inner().into_inner();
        let mut head = Cursor::new(&data[..8]);
        assert_eq!(head.read_i64::<LittleEndian>().unwrap(), -1);
        let mut tail = Cursor::new(&data[data.len() - 8..]);
        assert_eq!(tail.read_i64::<LittleEndian>().unwrap(), table_start as i64);
    }

    #[test]
    fn test_variable_chunks_follow_the_slices() {
        let points = random_points(&items(), 60, 3);
        let vlr = LazVlrBuilder::from_laz_items(items())
            .with_variable_chunk_size()
            .build();
        let mut compressor = LasZipCompressor::new(Cursor::new(Vec::new()), vlr).unwrap();
        compressor
            .compress_chunks(vec![&points[..10], &points[10..11], &points[11..]])
            .unwrap();
        compressor.done().unwrap();
        let counts: Vec<u64> = compressor
            .chunk_table()
            .entries()
            .iter()
            .map(|entry| entry.point_count)
            .collect();
        assert_eq!(counts, vec![10, 1, 49]);
    }

    #[test]
    fn test_unchunked_data_has_no_pointer() {
        let points = random_points(&items(), 10, 4);
        let vlr = LazVlrBuilder::from_laz_items(items())
            .with_compressor(CompressorType::PointWise)
            .build();
        let mut compressor = LasZipCompressor::new(Cursor::new(Vec::new()), vlr).unwrap();
        compressor.compress_many(&points).unwrap();
        compressor.done().unwrap();
        let data = compressor.into_inner().into_inner();

        // the first point is stored raw, at the very start
        let layout = PointLayout::from_items(&items()).unwrap();
        let mut raw = vec![0u8; layout.size()];
        layout.pack(&points[0], &mut raw);
        assert_eq!(&data[..layout.size()], raw.as_slice());
    }

    #[test]
    fn test_extra_bytes_must_match_layout() {
        let mut compressor = LasZipCompressor::new(Cursor::new(Vec::new()), vlr(100)).unwrap();
        let point = PointRecord {
            extra_bytes: vec![1, 2],
            ..Default::default()
        };
        assert!(matches!(
            compressor.compress_one(&point),
            Err(LasZipError::Format(FormatError::ExtraBytesMismatch {
                expected: 0,
                found: 2
            }))
        ));
    }

    #[test]
    fn test_raw_buffer_len_is_checked() {
        let mut compressor = LasZipCompressor::new(Cursor::new(Vec::new()), vlr(100)).unwrap();
        assert!(matches!(
            compressor.compress_raw(&[0u8; 29]),
            Err(LasZipError::BufferLenNotMultipleOfPointSize {
                buffer_len: 29,
                point_size: 28
            })
        ));
    }
}
