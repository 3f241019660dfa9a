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

//! Codecs of the extra bytes that follow the standard fields of a point.
//!
//! Every byte is coded independently, predicted from the same byte
//! of the previous point.

use crate::point::PointRecord;

#[inline]
fn byte_at(point: &PointRecord, i: usize) -> u8 {
    point.extra_bytes.get(i).copied().unwrap_or(0)
}

/// Copies the extra bytes of `point`, padded with zeros to `count`
fn bytes_of(point: &PointRecord, count: usize) -> Vec<u8> {
    (0..count).map(|i| byte_at(point, i)).collect()
}

fn set_bytes(point: &mut PointRecord, bytes: &[u8]) {
    point.extra_bytes.clear();
    point.extra_bytes.extend_from_slice(bytes);
}

pub mod v1 {
    //! One integer compressor context per byte.
    use std::io::{Read, Write};

    use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
    use crate::decoders::ArithmeticDecoder;
    use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
    use crate::encoders::ArithmeticEncoder;
    use crate::point::PointRecord;
    use crate::record::{FieldCompressor, FieldDecompressor};

    use super::{byte_at, bytes_of, set_bytes};

    pub struct ExtraBytesCompressor {
        last_bytes: Vec<u8>,
        ic_bytes: IntegerCompressor,
    }

    impl ExtraBytesCompressor {
        pub fn new(count: usize) -> Self {
            Self {
                last_bytes: vec![0u8; count],
                ic_bytes: IntegerCompressorBuilder::new()
                    .bits(8)
                    .contexts(count.max(1) as u32)
                    .build_initialized(),
            }
        }
    }

    impl<W: Write> FieldCompressor<W> for ExtraBytesCompressor {
        fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize {
            self.last_bytes = bytes_of(first_point, self.last_bytes.len());
            context
        }

        fn compress_with(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            point: &PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            for (i, last) in self.last_bytes.iter_mut().enumerate() {
                let current = byte_at(point, i);
                self.ic_bytes
                    .compress(encoder, i32::from(*last), i32::from(current), i as u32)?;
                *last = current;
            }
            Ok(context)
        }
    }

    pub struct ExtraBytesDecompressor {
        last_bytes: Vec<u8>,
        ic_bytes: IntegerDecompressor,
    }

    impl ExtraBytesDecompressor {
        pub fn new(count: usize) -> Self {
            Self {
                last_bytes: vec![0u8; count],
                ic_bytes: IntegerDecompressorBuilder::new()
                    .bits(8)
                    .contexts(count.max(1) as u32)
                    .build_initialized(),
            }
        }
    }

    impl<R: Read> FieldDecompressor<R> for ExtraBytesDecompressor {
        fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize {
            self.last_bytes = bytes_of(first_point, self.last_bytes.len());
            context
        }

        fn decompress_with(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            point: &mut PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            for (i, last) in self.last_bytes.iter_mut().enumerate() {
                *last = self
                    .ic_bytes
                    .decompress(decoder, i32::from(*last), i as u32)? as u8;
            }
            set_bytes(point, &self.last_bytes);
            Ok(context)
        }
    }
}

pub mod v2 {
    //! One symbol model per byte, coding the wrapping difference.
    use std::io::{Read, Write};

    use crate::decoders::ArithmeticDecoder;
    use crate::encoders::ArithmeticEncoder;
    use crate::models::{ArithmeticModel, ArithmeticModelBuilder};
    use crate::point::PointRecord;
    use crate::record::{FieldCompressor, FieldDecompressor};

    use super::{byte_at, bytes_of, set_bytes};

    pub(crate) fn byte_models(count: usize, compress: bool) -> Vec<ArithmeticModel> {
        (0..count)
            .map(|_| ArithmeticModelBuilder::new(256).compress(compress).build())
            .collect()
    }

    pub struct ExtraBytesCompressor {
        last_bytes: Vec<u8>,
        models: Vec<ArithmeticModel>,
    }

    impl ExtraBytesCompressor {
        pub fn new(count: usize) -> Self {
            Self {
                last_bytes: vec![0u8; count],
                models: byte_models(count, true),
            }
        }
    }

    impl<W: Write> FieldCompressor<W> for ExtraBytesCompressor {
        fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize {
            self.last_bytes = bytes_of(first_point, self.last_bytes.len());
            context
        }

        fn compress_with(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            point: &PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            for (i, (last, model)) in self
                .last_bytes
                .iter_mut()
                .zip(self.models.iter_mut())
                .enumerate()
            {
                let current = byte_at(point, i);
                encoder.encode_symbol(model, u32::from(current.wrapping_sub(*last)))?;
                *last = current;
            }
            Ok(context)
        }
    }

    pub struct ExtraBytesDecompressor {
        last_bytes: Vec<u8>,
        models: Vec<ArithmeticModel>,
    }

    impl ExtraBytesDecompressor {
        pub fn new(count: usize) -> Self {
            Self {
                last_bytes: vec![0u8; count],
                models: byte_models(count, false),
            }
        }
    }

    impl<R: Read> FieldDecompressor<R> for ExtraBytesDecompressor {
        fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize {
            self.last_bytes = bytes_of(first_point, self.last_bytes.len());
            context
        }

        fn decompress_with(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            point: &mut PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            for (last, model) in self.last_bytes.iter_mut().zip(self.models.iter_mut()) {
                let diff = decoder.decode_symbol(model)? as u8;
                *last = last.wrapping_add(diff);
            }
            set_bytes(point, &self.last_bytes);
            Ok(context)
        }
    }
}

pub mod v3 {
    //! Same coding as the version 2, each byte going into its own layer
    //! and with one set of models per scanner channel context.
    use std::io::Write;

    use crate::io::ByteSource;
    use crate::las::selective::DecompressionSelection;
    use crate::las::utils::ContextSwitch;
    use crate::layers::{LayerDecoder, LayerEncoder};
    use crate::models::ArithmeticModel;
    use crate::point::PointRecord;
    use crate::record::{LayeredFieldCompressor, LayeredFieldDecompressor};

    use super::v2::byte_models;
    use super::{byte_at, bytes_of, set_bytes};

    fn models_for_contexts(count: usize, compress: bool) -> [Vec<ArithmeticModel>; 4] {
        [
            byte_models(count, compress),
            byte_models(count, compress),
            byte_models(count, compress),
            byte_models(count, compress),
        ]
    }

    pub struct ExtraBytesCompressor {
        layers: Vec<LayerEncoder>,
        models: [Vec<ArithmeticModel>; 4],
        last_bytes: [Vec<u8>; 4],
        contexts: ContextSwitch,
    }

    impl ExtraBytesCompressor {
        pub fn new(count: usize) -> Self {
            Self {
                layers: (0..count).map(|_| LayerEncoder::new()).collect(),
                models: models_for_contexts(count, true),
                last_bytes: Default::default(),
                contexts: ContextSwitch::new(0),
            }
        }
    }

    impl<W: Write> LayeredFieldCompressor<W> for ExtraBytesCompressor {
        fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize {
            self.contexts = ContextSwitch::new(context);
            self.last_bytes[context] = bytes_of(first_point, self.layers.len());
            context
        }

        fn compress_with(&mut self, point: &PointRecord, context: usize) -> std::io::Result<usize> {
            let last_index = self.contexts.switch_to(context, &mut self.last_bytes);
            let last_bytes = &mut self.last_bytes[last_index];
            let models = &mut self.models[context];
            for (i, layer) in self.layers.iter_mut().enumerate() {
                let current = byte_at(point, i);
                let diff = current.wrapping_sub(last_bytes[i]);
                layer
                    .encoder()
                    .encode_symbol(&mut models[i], u32::from(diff))?;
                if diff != 0 {
                    layer.set_changed(true);
                    last_bytes[i] = current;
                }
            }
            Ok(context)
        }

        fn write_layers_sizes(&mut self, dst: &mut W) -> std::io::Result<()> {
            for layer in &mut self.layers {
                layer.write_size(dst)?;
            }
            Ok(())
        }

        fn write_layers(&mut self, dst: &mut W) -> std::io::Result<()> {
            for layer in &mut self.layers {
                layer.write_layer(dst)?;
            }
            Ok(())
        }
    }

    pub struct ExtraBytesDecompressor {
        layers: Vec<LayerDecoder>,
        requested: bool,
        models: [Vec<ArithmeticModel>; 4],
        last_bytes: [Vec<u8>; 4],
        contexts: ContextSwitch,
    }

    impl ExtraBytesDecompressor {
        pub fn new(count: usize, selection: DecompressionSelection) -> Self {
            Self {
                layers: (0..count).map(|_| LayerDecoder::new()).collect(),
                requested: selection.should_decompress_extra_bytes(),
                models: models_for_contexts(count, false),
                last_bytes: Default::default(),
                contexts: ContextSwitch::new(0),
            }
        }
    }

    impl<R: ByteSource> LayeredFieldDecompressor<R> for ExtraBytesDecompressor {
        fn init_first_point(&mut self, first_point: &mut PointRecord, context: usize) -> usize {
            self.contexts = ContextSwitch::new(context);
            self.last_bytes[context] = bytes_of(first_point, self.layers.len());
            context
        }

        fn decompress_with(
            &mut self,
            point: &mut PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            let last_index = self.contexts.switch_to(context, &mut self.last_bytes);
            let last_bytes = &mut self.last_bytes[last_index];
            let models = &mut self.models[context];
            for (i, layer) in self.layers.iter_mut().enumerate() {
                if layer.is_active() {
                    let diff = layer.decoder().decode_symbol(&mut models[i])? as u8;
                    last_bytes[i] = last_bytes[i].wrapping_add(diff);
                }
            }
            set_bytes(point, last_bytes);
            Ok(context)
        }

        fn read_layers_sizes(&mut self, src: &mut R) -> std::io::Result<()> {
            for layer in &mut self.layers {
                layer.read_size(src)?;
            }
            Ok(())
        }

        fn read_layers(&mut self, src: &mut R) -> std::io::Result<()> {
            for layer in &mut self.layers {
                layer.read_layer(self.requested, src)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use crate::las::selective::DecompressionSelection;
    use crate::las::test_utils::{random_points, round_trip, round_trip_with_selection, CHUNK_SIZE};
    use crate::laszip::{LazItem, LazItemType, LazItemRecordBuilder};

    #[test]
    fn test_legacy_extra_bytes_round_trip() {
        for version in 1..=2 {
            let items = LazItemRecordBuilder::new()
                .add_item(LazItemType::Point10)
                .add_item(LazItemType::Byte(5))
                .build_with_version(version)
                .unwrap();
            let mut points = random_points(&items, 1_000, 5);
            // a constant byte and a counter
            for (i, p) in points.iter_mut().enumerate() {
                p.extra_bytes[0] = 42;
                p.extra_bytes[1] = i as u8;
            }
            round_trip(&items, &points);
        }
    }

    #[test]
    fn test_byte14_round_trip() {
        let items = vec![
            LazItem::new(LazItemType::Point14, 3),
            LazItem::new(LazItemType::Byte14(3), 3),
        ];
        let mut points = random_points(&items, 1_000, 6);
        for p in points.iter_mut() {
            p.extra_bytes[2] = 0;
        }
        round_trip(&items, &points);
    }

    #[test]
    fn test_byte14_skipped_layers() {
        let items = vec![
            LazItem::new(LazItemType::Point14, 3),
            LazItem::new(LazItemType::Byte14(2), 3),
        ];
        let points = random_points(&items, 200, 8);
        let decoded = round_trip_with_selection(
            &items,
            &points,
            DecompressionSelection::all().skip_extra_bytes(),
        );
        let chunk_size = CHUNK_SIZE as usize;
        for (i, decoded) in decoded.iter().enumerate() {
            assert_eq!(decoded.extra_bytes, points[i - i % chunk_size].extra_bytes);
        }
    }
}
