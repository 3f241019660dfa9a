//! Field codec traits, and the record codecs driving them over a stream.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::decoders::ArithmeticDecoder;
use crate::encoders::ArithmeticEncoder;
use crate::io::ByteSource;
use crate::las::selective::DecompressionSelection;
use crate::laszip::LazItem;
use crate::point::{PointLayout, PointRecord};

/***************************************************************************************************
                    Field codec traits
***************************************************************************************************/

/// Compresses the fields of one item, sharing the encoder of the record.
///
/// The `context` is passed through unchanged by these codecs.
pub trait FieldCompressor<W: Write> {
    /// Seeds the codec with the first point of a chunk, which is stored raw.
    fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize;

    fn compress_with(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        point: &PointRecord,
        context: usize,
    ) -> std::io::Result<usize>;
}

pub trait FieldDecompressor<R: Read> {
    fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize;

    fn decompress_with(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
        point: &mut PointRecord,
        context: usize,
    ) -> std::io::Result<usize>;
}

/// Compresses the fields of one item into its own layers.
pub trait LayeredFieldCompressor<W: Write> {
    fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize;

    fn compress_with(&mut self, point: &PointRecord, context: usize) -> std::io::Result<usize>;

    fn write_layers_sizes(&mut self, dst: &mut W) -> std::io::Result<()>;

    fn write_layers(&mut self, dst: &mut W) -> std::io::Result<()>;
}

pub trait LayeredFieldDecompressor<R: ByteSource> {
    /// Called once the layers of the chunk are loaded
    fn init_first_point(&mut self, first_point: &mut PointRecord, context: usize) -> usize;

    fn decompress_with(&mut self, point: &mut PointRecord, context: usize)
        -> std::io::Result<usize>;

    fn read_layers_sizes(&mut self, src: &mut R) -> std::io::Result<()>;

    fn read_layers(&mut self, src: &mut R) -> std::io::Result<()>;
}

pub type FieldCompressorCtor<W> = fn(&LazItem) -> Box<dyn FieldCompressor<W>>;
pub type FieldDecompressorCtor<R> = fn(&LazItem) -> Box<dyn FieldDecompressor<R>>;
pub type LayeredFieldCompressorCtor<W> = fn(&LazItem) -> Box<dyn LayeredFieldCompressor<W>>;
pub type LayeredFieldDecompressorCtor<R> =
    fn(&LazItem, DecompressionSelection) -> Box<dyn LayeredFieldDecompressor<R>>;

/***************************************************************************************************
                    Record codec traits
***************************************************************************************************/

/// Compresses whole points, one chunk at a time.
///
/// Between two chunks, `done` must be called to finish the chunk
/// and `reset` to start the next one.
pub trait RecordCompressor<W> {
    fn record_size(&self) -> usize;

    /// Number of points compressed since the last reset
    fn point_count(&self) -> u32;

    fn compress_next(&mut self, point: &PointRecord) -> std::io::Result<()>;

    fn done(&mut self) -> std::io::Result<()>;

    fn reset(&mut self);

    fn get_mut(&mut self) -> &mut W;

    fn box_into_inner(self: Box<Self>) -> W;
}

pub trait RecordDecompressor<R> {
    fn record_size(&self) -> usize;

    fn decompress_next(&mut self, point: &mut PointRecord) -> std::io::Result<()>;

    /// Prepares the decompression of a new chunk, starting at the current position
    fn reset(&mut self);

    /// Number of points the chunk being decompressed says it holds,
    /// for the codecs that store it.
    fn chunk_point_count(&self) -> Option<u32> {
        None
    }

    fn get_mut(&mut self) -> &mut R;

    fn box_into_inner(self: Box<Self>) -> R;
}

/***************************************************************************************************
                    Sequential record codecs
***************************************************************************************************/

/// Compresses points through a single encoder shared by all the fields.
///
/// A chunk is organized as follows:
///
/// 1) 1 raw point
/// 2) the arithmetic coded stream of the n - 1 other points
pub struct SequentialPointRecordCompressor<W: Write> {
    layout: PointLayout,
    field_ctors: Vec<(LazItem, FieldCompressorCtor<W>)>,
    field_compressors: Vec<Box<dyn FieldCompressor<W>>>,
    encoder: ArithmeticEncoder<W>,
    point_count: u32,
}

impl<W: Write> SequentialPointRecordCompressor<W> {
    pub fn new(
        output: W,
        layout: PointLayout,
        field_ctors: Vec<(LazItem, FieldCompressorCtor<W>)>,
    ) -> Self {
        let field_compressors = field_ctors.iter().map(|(item, ctor)| ctor(item)).collect();
        Self {
            layout,
            field_ctors,
            field_compressors,
            encoder: ArithmeticEncoder::new(output),
            point_count: 0,
        }
    }
}

impl<W: Write> RecordCompressor<W> for SequentialPointRecordCompressor<W> {
    fn record_size(&self) -> usize {
        self.layout.size()
    }

    fn point_count(&self) -> u32 {
        self.point_count
    }

    fn compress_next(&mut self, point: &PointRecord) -> std::io::Result<()> {
        if self.point_count == 0 {
            self.layout.write_point(self.encoder.out_stream(), point)?;
            for field in &mut self.field_compressors {
                field.init_first_point(point, 0);
            }
        } else {
            for field in &mut self.field_compressors {
                field.compress_with(&mut self.encoder, point, 0)?;
            }
        }
        self.point_count += 1;
        Ok(())
    }

    fn done(&mut self) -> std::io::Result<()> {
        self.encoder.done()
    }

    fn reset(&mut self) {
        self.encoder.reset();
        self.field_compressors = self
            .field_ctors
            .iter()
            .map(|(item, ctor)| ctor(item))
            .collect();
        self.point_count = 0;
    }

    fn get_mut(&mut self) -> &mut W {
        self.encoder.out_stream()
    }

    fn box_into_inner(self: Box<Self>) -> W {
        self.encoder.into_stream()
    }
}

pub struct SequentialPointRecordDecompressor<R: Read> {
    layout: PointLayout,
    field_ctors: Vec<(LazItem, FieldDecompressorCtor<R>)>,
    field_decompressors: Vec<Box<dyn FieldDecompressor<R>>>,
    decoder: ArithmeticDecoder<R>,
    is_first_decompression: bool,
}

impl<R: Read> SequentialPointRecordDecompressor<R> {
    pub fn new(
        input: R,
        layout: PointLayout,
        field_ctors: Vec<(LazItem, FieldDecompressorCtor<R>)>,
    ) -> Self {
        let field_decompressors = field_ctors.iter().map(|(item, ctor)| ctor(item)).collect();
        Self {
            layout,
            field_ctors,
            field_decompressors,
            decoder: ArithmeticDecoder::new(input),
            is_first_decompression: true,
        }
    }
}

impl<R: Read> RecordDecompressor<R> for SequentialPointRecordDecompressor<R> {
    fn record_size(&self) -> usize {
        self.layout.size()
    }

    fn decompress_next(&mut self, point: &mut PointRecord) -> std::io::Result<()> {
        if self.is_first_decompression {
            self.layout.read_point(self.decoder.in_stream(), point)?;
            for field in &mut self.field_decompressors {
                field.init_first_point(point, 0);
            }
            // the coded stream starts right after the raw point
            self.decoder.read_init_bytes()?;
            self.is_first_decompression = false;
        } else {
            for field in &mut self.field_decompressors {
                field.decompress_with(&mut self.decoder, point, 0)?;
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.decoder.reset();
        self.field_decompressors = self
            .field_ctors
            .iter()
            .map(|(item, ctor)| ctor(item))
            .collect();
        self.is_first_decompression = true;
    }

    fn get_mut(&mut self) -> &mut R {
        self.decoder.in_stream()
    }

    fn box_into_inner(self: Box<Self>) -> R {
        self.decoder.into_stream()
    }
}

/***************************************************************************************************
                    Layered record codecs
***************************************************************************************************/

/// Compresses points into one set of layers per field.
///
/// A chunk is organized as follows:
///
/// 1) 1 raw point
/// 2) number of points in the chunk
/// 3) number of bytes of each layer
/// 4) data of the layers
pub struct LayeredPointRecordCompressor<W: Write> {
    layout: PointLayout,
    field_ctors: Vec<(LazItem, LayeredFieldCompressorCtor<W>)>,
    field_compressors: Vec<Box<dyn LayeredFieldCompressor<W>>>,
    point_count: u32,
    dst: W,
}

impl<W: Write> LayeredPointRecordCompressor<W> {
    pub fn new(
        dst: W,
        layout: PointLayout,
        field_ctors: Vec<(LazItem, LayeredFieldCompressorCtor<W>)>,
    ) -> Self {
        let field_compressors = field_ctors.iter().map(|(item, ctor)| ctor(item)).collect();
        Self {
            layout,
            field_ctors,
            field_compressors,
            point_count: 0,
            dst,
        }
    }
}

impl<W: Write> RecordCompressor<W> for LayeredPointRecordCompressor<W> {
    fn record_size(&self) -> usize {
        self.layout.size()
    }

    fn point_count(&self) -> u32 {
        self.point_count
    }

    fn compress_next(&mut self, point: &PointRecord) -> std::io::Result<()> {
        if self.point_count == 0 {
            self.layout.write_point(&mut self.dst, point)?;
            let mut context = 0;
            for field in &mut self.field_compressors {
                context = field.init_first_point(point, context);
            }
        } else {
            // every point starts over from context 0
            let mut context = 0;
            for field in &mut self.field_compressors {
                context = field.compress_with(point, context)?;
            }
        }
        self.point_count += 1;
        Ok(())
    }

    fn done(&mut self) -> std::io::Result<()> {
        if self.point_count > 0 {
            self.dst.write_u32::<LittleEndian>(self.point_count)?;
            for field in &mut self.field_compressors {
                field.write_layers_sizes(&mut self.dst)?;
            }
            for field in &mut self.field_compressors {
                field.write_layers(&mut self.dst)?;
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.field_compressors = self
            .field_ctors
            .iter()
            .map(|(item, ctor)| ctor(item))
            .collect();
        self.point_count = 0;
    }

    fn get_mut(&mut self) -> &mut W {
        &mut self.dst
    }

    fn box_into_inner(self: Box<Self>) -> W {
        self.dst
    }
}

pub struct LayeredPointRecordDecompressor<R: ByteSource> {
    layout: PointLayout,
    selection: DecompressionSelection,
    field_ctors: Vec<(LazItem, LayeredFieldDecompressorCtor<R>)>,
    field_decompressors: Vec<Box<dyn LayeredFieldDecompressor<R>>>,
    is_first_decompression: bool,
    chunk_point_count: u32,
    input: R,
}

impl<R: ByteSource> LayeredPointRecordDecompressor<R> {
    pub fn new(
        input: R,
        layout: PointLayout,
        selection: DecompressionSelection,
        field_ctors: Vec<(LazItem, LayeredFieldDecompressorCtor<R>)>,
    ) -> Self {
        let field_decompressors = field_ctors
            .iter()
            .map(|(item, ctor)| ctor(item, selection))
            .collect();
        Self {
            layout,
            selection,
            field_ctors,
            field_decompressors,
            is_first_decompression: true,
            chunk_point_count: 0,
            input,
        }
    }
}

impl<R: ByteSource> RecordDecompressor<R> for LayeredPointRecordDecompressor<R> {
    fn record_size(&self) -> usize {
        self.layout.size()
    }

    fn decompress_next(&mut self, point: &mut PointRecord) -> std::io::Result<()> {
        if self.is_first_decompression {
            self.layout.read_point(&mut self.input, point)?;
            self.chunk_point_count = self.input.read_u32::<LittleEndian>()?;
            for field in &mut self.field_decompressors {
                field.read_layers_sizes(&mut self.input)?;
            }
            for field in &mut self.field_decompressors {
                field.read_layers(&mut self.input)?;
            }
            let mut context = 0;
            for field in &mut self.field_decompressors {
                context = field.init_first_point(point, context);
            }
            self.is_first_decompression = false;
        } else {
            let mut context = 0;
            for field in &mut self.field_decompressors {
                context = field.decompress_with(point, context)?;
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        let selection = self.selection;
        self.field_decompressors = self
            .field_ctors
            .iter()
            .map(|(item, ctor)| ctor(item, selection))
            .collect();
        self.is_first_decompression = true;
    }

    fn chunk_point_count(&self) -> Option<u32> {
        if self.is_first_decompression {
            None
        } else {
            Some(self.chunk_point_count)
        }
    }

    fn get_mut(&mut self) -> &mut R {
        &mut self.input
    }

    fn box_into_inner(self: Box<Self>) -> R {
        self.input
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;
    use crate::las::point10;
    use crate::laszip::LazItemType;

    fn point10_v2_compressor<W: Write>(_item: &LazItem) -> Box<dyn FieldCompressor<W>> {
        Box::new(point10::v2::Point10Compressor::default())
    }

    fn point10_v2_decompressor<R: Read>(_item: &LazItem) -> Box<dyn FieldDecompressor<R>> {
        Box::new(point10::v2::Point10Decompressor::default())
    }

    fn compressor() -> SequentialPointRecordCompressor<Cursor<Vec<u8>>> {
        let item = LazItem::new(LazItemType::Point10, 2);
        SequentialPointRecordCompressor::new(
            Cursor::new(Vec::new()),
            PointLayout::from_items(&[item]).unwrap(),
            vec![(item, point10_v2_compressor as FieldCompressorCtor<_>)],
        )
    }

    #[test]
    fn test_empty_session() {
        let mut compressor = compressor();
        compressor.done().unwrap();
        let data = Box::new(compressor).box_into_inner().into_inner();
        assert_eq!(&data, &[1u8, 0u8, 0u8, 0u8]);
    }

    #[test]
    fn test_first_point_is_raw() {
        let mut compressor = compressor();
        let point = PointRecord {
            x: 17,
            intensity: 42,
            ..Default::default()
        };
        compressor.compress_next(&point).unwrap();
        compressor.done().unwrap();
        let data = Box::new(compressor).box_into_inner().into_inner();
        assert_eq!(data.len(), 24);
        assert_eq!(&data[..4], &[17u8, 0, 0, 0]);
        assert_eq!(&data[12..14], &[42u8, 0]);
        assert_eq!(&data[20..], &[1u8, 0, 0, 0]);
    }

    #[test]
    fn test_reset_restarts_chunks() {
        let item = LazItem::new(LazItemType::Point10, 2);
        let layout = PointLayout::from_items(&[item]).unwrap();
        let mut compressor = compressor();
        let points: Vec<PointRecord> = (0..10)
            .map(|i| PointRecord {
                x: i * 10,
                y: -i,
                z: i * i,
                return_number: 1,
                number_of_returns: 1,
                ..Default::default()
            })
            .collect();
        for chunk in points.chunks(4) {
            for p in chunk {
                compressor.compress_next(p).unwrap();
            }
            compressor.done().unwrap();
            compressor.reset();
        }
        let data = Box::new(compressor).box_into_inner().into_inner();

        let mut decompressor = SequentialPointRecordDecompressor::new(
            Cursor::new(data),
            layout.clone(),
            vec![(item, point10_v2_decompressor as FieldDecompressorCtor<_>)],
        );
        let mut decompressed = layout.new_point();
        for chunk in points.chunks(4) {
            for p in chunk {
                decompressor.decompress_next(&mut decompressed).unwrap();
                assert_eq!(&decompressed, p);
            }
            decompressor.reset();
        }
    }
}
