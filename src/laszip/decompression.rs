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

use log::debug;

use crate::errors::{CorruptionError, IoResultExt, LasZipError, Stage};
use crate::io::ByteSource;
use crate::las::selective::DecompressionSelection;
use crate::laszip::chunk_table::{self, ChunkTable, ChunkTableEntry, TableState};
use crate::laszip::registry::DecompressorRegistry;
use crate::laszip::LazVlr;
use crate::point::{PointLayout, PointRecord};
use crate::record::RecordDecompressor;

fn end_of_data(point_index: u64) -> LasZipError {
    LasZipError::Io {
        source: std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "all the chunks of the data have been read",
        ),
        point_index: Some(point_index),
        stage: Stage::Decompressing,
    }
}

/// Decompresses points from a source of LAZ data.
///
/// The source must be positioned at the start of the point data.
///
/// Random access with [`seek`](Self::seek) needs a seekable source. When
/// the chunk table is missing because the writer was interrupted, chunks
/// are added to the table as they get decoded.
pub struct LasZipDecompressor<'a, R: ByteSource + 'a> {
    vlr: LazVlr,
    layout: PointLayout,
    record_decompressor: Box<dyn RecordDecompressor<R> + 'a>,
    table_state: TableState,
    chunk_table: ChunkTable,
    current_chunk: usize,
    chunk_points_read: u64,
    /// Known once the first point of the chunk is read
    points_in_chunk: Option<u64>,
    point_index: u64,
    scratch: PointRecord,
}

impl<'a, R: ByteSource + 'a> LasZipDecompressor<'a, R> {
    /// Creates a decompressor that decompresses every field
    pub fn new(source: R, vlr: LazVlr) -> crate::Result<Self> {
        Self::selective(source, vlr, DecompressionSelection::all())
    }

    /// Creates a decompressor that only decompresses the layers
    /// of the `selection`.
    pub fn selective(
        source: R,
        vlr: LazVlr,
        selection: DecompressionSelection,
    ) -> crate::Result<Self> {
        Self::with_registry(source, vlr, selection, &DecompressorRegistry::standard())
    }

    pub fn with_registry(
        mut source: R,
        vlr: LazVlr,
        selection: DecompressionSelection,
        registry: &DecompressorRegistry<'a, R>,
    ) -> crate::Result<Self> {
        let layout = PointLayout::from_items(vlr.items())?;
        let compressor = vlr.compressor();
        // unchunked data has no table to look for
        let (table_state, chunk_table) = if compressor.is_chunked() {
            chunk_table::read_chunk_table(&mut source, &vlr)?
        } else {
            let data_start = source.position().at_stage(Stage::ReadingHeader)?;
            (TableState::TableUnavailable, ChunkTable::new(data_start))
        };
        if compressor.is_chunked()
            && vlr.uses_variably_sized_chunks()
            && table_state != TableState::TablePresent
        {
            return Err(CorruptionError::AdaptiveChunksWithoutTable.into());
        }

        let record_decompressor =
            registry.record_decompressor(compressor, source, layout.clone(), selection)?;
        Ok(Self {
            scratch: layout.new_point(),
            vlr,
            layout,
            record_decompressor,
            table_state,
            chunk_table,
            current_chunk: 0,
            chunk_points_read: 0,
            points_in_chunk: None,
            point_index: 0,
        })
    }

    pub fn decompress_one(&mut self, point: &mut PointRecord) -> crate::Result<()> {
        if self.points_in_chunk == Some(self.chunk_points_read) {
            self.start_next_chunk()?;
        }

        self.record_decompressor
            .decompress_next(point)
            .at_point(Stage::Decompressing, self.point_index)?;
        if self.chunk_points_read == 0 {
            self.points_in_chunk = Some(self.points_in_current_chunk());
        }
        self.chunk_points_read += 1;
        self.point_index += 1;

        if self.points_in_chunk == Some(self.chunk_points_read) {
            self.finish_current_chunk()?;
        }
        Ok(())
    }

    /// Decompresses as many points as `points` holds
    pub fn decompress_many(&mut self, points: &mut [PointRecord]) -> crate::Result<()> {
        for point in points {
            self.decompress_one(point)?;
        }
        Ok(())
    }

    /// Decompresses points into `out` as they are stored in a LAS file
    pub fn decompress_raw(&mut self, out: &mut [u8]) -> crate::Result<()> {
        let point_size = self.layout.size();
        if out.len() % point_size != 0 {
            return Err(LasZipError::BufferLenNotMultipleOfPointSize {
                buffer_len: out.len(),
                point_size,
            });
        }
        let mut point = std::mem::take(&mut self.scratch);
        let result = out.chunks_exact_mut(point_size).try_for_each(|raw| -> crate::Result<()> {
            self.decompress_one(&mut point)?;
            self.layout.pack(&point, raw);
            Ok(())
        });
        self.scratch = point;
        result
    }

    /// Moves to the point at `point_index`, the next decompressed point
    /// will be this one.
    ///
    /// The chunk holding the point is decoded from its start up to the point.
    /// Seeking past the last chunk leaves the decompressor at the end
    /// of the data, the next read fails.
    ///
    /// The number of points of the last chunk of fixed size data is not
    /// stored, callers must not go past the point count of their header.
    pub fn seek(&mut self, point_index: u64) -> crate::Result<()> {
        if !self.record_decompressor.get_mut().is_seekable() {
            return Err(LasZipError::io(
                std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "seeking needs a seekable source",
                ),
                Stage::Seeking,
            ));
        }
        if !self.vlr.compressor().is_chunked() {
            self.restart_at(0, self.chunk_table.data_start(), 0)?;
            return self.skip_points(point_index);
        }

        let (chunk_index, first_point) = match self.chunk_table.chunk_of_point(point_index) {
            Some(found) => found,
            None if self.table_state == TableState::TableMissingRecoverable => {
                (self.chunk_table.len(), self.chunk_table.point_count())
            }
            None => return self.park_at_end(),
        };
        let start = self
            .chunk_table
            .chunk_start(chunk_index)
            .unwrap_or_else(|| self.chunk_table.end());
        debug!("Seeking to point {} in chunk {}", point_index, chunk_index);
        self.restart_at(chunk_index, start, first_point)?;
        self.skip_points(point_index - first_point)
    }

    pub fn vlr(&self) -> &LazVlr {
        &self.vlr
    }

    pub fn layout(&self) -> &PointLayout {
        &self.layout
    }

    pub fn chunk_table(&self) -> &ChunkTable {
        &self.chunk_table
    }

    pub fn table_state(&self) -> TableState {
        self.table_state
    }

    /// Number of chunks known, 0 when the table cannot be used
    pub fn number_chunks(&self) -> usize {
        match self.table_state {
            TableState::TableUnavailable => 0,
            _ => self.chunk_table.len(),
        }
    }

    pub fn into_inner(self) -> R {
        self.record_decompressor.box_into_inner()
    }

    pub fn get_mut(&mut self) -> &mut R {
        self.record_decompressor.get_mut()
    }

    fn points_in_current_chunk(&self) -> u64 {
        if !self.vlr.compressor().is_chunked() {
            return u64::MAX;
        }
        // layered chunks store their number of points
        if let Some(count) = self.record_decompressor.chunk_point_count() {
            return u64::from(count);
        }
        if self.vlr.uses_variably_sized_chunks() {
            self.chunk_table
                .entries()
                .get(self.current_chunk)
                .map_or(u64::MAX, |entry| entry.point_count)
        } else {
            u64::from(self.vlr.chunk_size())
        }
    }

    /// Checks that the chunk ends where the next one starts,
    /// or records where it ends when the table is being rebuilt.
    fn finish_current_chunk(&mut self) -> crate::Result<()> {
        let position = self
            .record_decompressor
            .get_mut()
            .position()
            .at_stage(Stage::Decompressing)?;
        match self.chunk_table.chunk_start(self.current_chunk + 1) {
            Some(expected) if expected != position => {
                return Err(CorruptionError::ChunkStartMismatch {
                    chunk_index: self.current_chunk,
                    expected,
                    found: position,
                }
                .into());
            }
            Some(_) => {}
            None if self.table_state == TableState::TableMissingRecoverable => {
                let start = self.chunk_table.end();
                self.chunk_table.push(ChunkTableEntry {
                    point_count: self.chunk_points_read,
                    byte_count: position - start,
                });
            }
            None => {}
        }
        debug!("Chunk {} ends at {}", self.current_chunk, position);
        Ok(())
    }

    fn start_next_chunk(&mut self) -> crate::Result<()> {
        let next = self.current_chunk + 1;
        if self.table_state == TableState::TablePresent && next >= self.chunk_table.len() {
            return Err(end_of_data(self.point_index));
        }
        self.current_chunk = next;
        self.chunk_points_read = 0;
        self.points_in_chunk = None;
        self.record_decompressor.reset();
        Ok(())
    }

    fn restart_at(
        &mut self,
        chunk_index: usize,
        start: u64,
        first_point: u64,
    ) -> crate::Result<()> {
        self.record_decompressor
            .get_mut()
            .seek_to(start)
            .at_stage(Stage::Seeking)?;
        self.record_decompressor.reset();
        self.current_chunk = chunk_index;
        self.chunk_points_read = 0;
        self.points_in_chunk = None;
        self.point_index = first_point;
        Ok(())
    }

    fn skip_points(&mut self, count: u64) -> crate::Result<()> {
        let mut point = std::mem::take(&mut self.scratch);
        let mut result = Ok(());
        for _ in 0..count {
            result = self.decompress_one(&mut point);
            if result.is_err() {
                break;
            }
        }
        self.scratch = point;
        match result {
            Err(e) if e.is_truncation() => self.park_at_end(),
            other => other,
        }
    }

    /// Moves to the end of the data so that the next read fails
    fn park_at_end(&mut self) -> crate::Result<()> {
        self.record_decompressor
            .get_mut()
            .seek_end(0)
            .at_stage(Stage::Seeking)?;
        self.current_chunk = self.chunk_table.len();
        self.chunk_points_read = 0;
        self.points_in_chunk = Some(0);
        Ok(())
    }
}

/// Decompresses all the points of `compressed_points_data` into
/// `decompressed_output`, as they are stored in a LAS file.
pub fn decompress_buffer(
    compressed_points_data: &[u8],
    decompressed_output: &mut [u8],
    laz_vlr: LazVlr,
) -> crate::Result<()> {
    let source = std::io::Cursor::new(compressed_points_data);
    let mut decompressor = LasZipDecompressor::new(source, laz_vlr)?;
    decompressor.decompress_raw(decompressed_output)
}
