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

//! Codecs of the legacy point item (x, y, z, intensity, returns, classification,
//! scan angle rank, user data and point source id).

use crate::point::PointRecord;

/// The fields of a record covered by the legacy point item,
/// in the packed form the codecs predict from.
#[derive(Default, Copy, Clone, PartialEq, Debug)]
pub(crate) struct Point10 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub intensity: u16,
    pub return_number: u8,
    pub number_of_returns: u8,
    pub scan_direction_flag: bool,
    pub edge_of_flight_line: bool,
    // classification in the low 5 bits, the rest are flags
    pub classification: u8,
    pub scan_angle_rank: i8,
    pub user_data: u8,
    pub point_source_id: u16,
}

impl Point10 {
    pub(crate) fn from_record(point: &PointRecord) -> Self {
        Self {
            x: point.x,
            y: point.y,
            z: point.z,
            intensity: point.intensity,
            return_number: point.return_number & 0x7,
            number_of_returns: point.number_of_returns & 0x7,
            scan_direction_flag: point.scan_direction_flag,
            edge_of_flight_line: point.edge_of_flight_line,
            classification: point.legacy_classification(),
            scan_angle_rank: point.scan_angle_rank(),
            user_data: point.user_data,
            point_source_id: point.point_source_id,
        }
    }

    pub(crate) fn copy_into(&self, point: &mut PointRecord) {
        point.x = self.x;
        point.y = self.y;
        point.z = self.z;
        point.intensity = self.intensity;
        point.set_legacy_bit_fields(self.bit_fields_to_byte());
        point.set_legacy_classification(self.classification);
        point.scan_angle = i16::from(self.scan_angle_rank);
        point.user_data = self.user_data;
        point.point_source_id = self.point_source_id;
    }

    pub(crate) fn populate_bit_fields_from(&mut self, byte: u8) {
        self.return_number = byte & 0x7;
        self.number_of_returns = (byte >> 3) & 0x7;
        self.scan_direction_flag = ((byte >> 6) & 0x1) != 0;
        self.edge_of_flight_line = ((byte >> 7) & 0x1) != 0;
    }

    pub(crate) fn bit_fields_to_byte(&self) -> u8 {
        (self.edge_of_flight_line as u8) << 7
            | (self.scan_direction_flag as u8) << 6
            | (self.number_of_returns & 0x7) << 3
            | (self.return_number & 0x7)
    }
}

pub mod v1 {
    use std::io::{Read, Write};

    use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
    use crate::decoders::ArithmeticDecoder;
    use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
    use crate::encoders::ArithmeticEncoder;
    use crate::models::{ArithmeticModel, ArithmeticModelBuilder};
    use crate::point::PointRecord;
    use crate::predictors::Median3;
    use crate::record::{FieldCompressor, FieldDecompressor};

    use super::Point10;

    fn symbol_model(
        models: &mut [Option<ArithmeticModel>],
        index: u8,
        compress: bool,
    ) -> &mut ArithmeticModel {
        models[index as usize]
            .get_or_insert_with(|| ArithmeticModelBuilder::new(256).compress(compress).build())
    }

    fn empty_models() -> Vec<Option<ArithmeticModel>> {
        (0..256).map(|_| None).collect()
    }

    // Everything both sides need to track
    struct Common {
        last: Point10,
        last_x_diffs: Median3<i32>,
        last_y_diffs: Median3<i32>,

        changed_values: ArithmeticModel,
        // 256 each, created when first needed
        bit_byte: Vec<Option<ArithmeticModel>>,
        classification: Vec<Option<ArithmeticModel>>,
        user_data: Vec<Option<ArithmeticModel>>,
    }

    impl Common {
        fn new(compress: bool) -> Self {
            Self {
                last: Point10::default(),
                last_x_diffs: Median3::new(),
                last_y_diffs: Median3::new(),
                changed_values: ArithmeticModelBuilder::new(64).compress(compress).build(),
                bit_byte: empty_models(),
                classification: empty_models(),
                user_data: empty_models(),
            }
        }
    }

    fn context_of(k_bits: u32) -> u32 {
        k_bits.min(19)
    }

    pub struct Point10Compressor {
        common: Common,
        ic_dx: IntegerCompressor,
        ic_dy: IntegerCompressor,
        ic_z: IntegerCompressor,
        ic_intensity: IntegerCompressor,
        ic_scan_angle_rank: IntegerCompressor,
        ic_point_source_id: IntegerCompressor,
    }

    impl Default for Point10Compressor {
        fn default() -> Self {
            Self {
                common: Common::new(true),
                ic_dx: IntegerCompressorBuilder::new().bits(32).build_initialized(),
                ic_dy: IntegerCompressorBuilder::new()
                    .bits(32)
                    .contexts(20)
                    .build_initialized(),
                ic_z: IntegerCompressorBuilder::new()
                    .bits(32)
                    .contexts(20)
                    .build_initialized(),
                ic_intensity: IntegerCompressorBuilder::new().bits(16).build_initialized(),
                ic_scan_angle_rank: IntegerCompressorBuilder::new()
                    .bits(8)
                    .contexts(2)
                    .build_initialized(),
                ic_point_source_id: IntegerCompressorBuilder::new().bits(16).build_initialized(),
            }
        }
    }

    impl<W: Write> FieldCompressor<W> for Point10Compressor {
        fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize {
            self.common.last = Point10::from_record(first_point);
            context
        }

        fn compress_with(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            point: &PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            let current = Point10::from_record(point);
            let last = &self.common.last;

            let x_diff = current.x.wrapping_sub(last.x);
            let y_diff = current.y.wrapping_sub(last.y);

            self.ic_dx
                .compress(encoder, self.common.last_x_diffs.get(), x_diff, 0)?;
            let k_bits = self.ic_dx.k();
            self.ic_dy.compress(
                encoder,
                self.common.last_y_diffs.get(),
                y_diff,
                context_of(k_bits),
            )?;
            let k_bits = (k_bits + self.ic_dy.k()) / 2;
            self.ic_z
                .compress(encoder, last.z, current.z, context_of(k_bits))?;

            // the bit fields and the intensity are swapped compared to version 2
            let changed_values = ((last.intensity != current.intensity) as u32) << 5
                | ((last.bit_fields_to_byte() != current.bit_fields_to_byte()) as u32) << 4
                | ((last.classification != current.classification) as u32) << 3
                | ((last.scan_angle_rank != current.scan_angle_rank) as u32) << 2
                | ((last.user_data != current.user_data) as u32) << 1
                | (last.point_source_id != current.point_source_id) as u32;
            encoder.encode_symbol(&mut self.common.changed_values, changed_values)?;

            if changed_values & 32 != 0 {
                self.ic_intensity.compress(
                    encoder,
                    i32::from(last.intensity),
                    i32::from(current.intensity),
                    0,
                )?;
            }
            if changed_values & 16 != 0 {
                let bit_byte = last.bit_fields_to_byte();
                let model = symbol_model(&mut self.common.bit_byte, bit_byte, true);
                encoder.encode_symbol(model, u32::from(current.bit_fields_to_byte()))?;
            }
            if changed_values & 8 != 0 {
                let model =
                    symbol_model(&mut self.common.classification, last.classification, true);
                encoder.encode_symbol(model, u32::from(current.classification))?;
            }
            if changed_values & 4 != 0 {
                self.ic_scan_angle_rank.compress(
                    encoder,
                    i32::from(last.scan_angle_rank),
                    i32::from(current.scan_angle_rank),
                    (k_bits < 3) as u32,
                )?;
            }
            if changed_values & 2 != 0 {
                let model = symbol_model(&mut self.common.user_data, last.user_data, true);
                encoder.encode_symbol(model, u32::from(current.user_data))?;
            }
            if changed_values & 1 != 0 {
                self.ic_point_source_id.compress(
                    encoder,
                    i32::from(last.point_source_id),
                    i32::from(current.point_source_id),
                    0,
                )?;
            }

            self.common.last_x_diffs.add(x_diff);
            self.common.last_y_diffs.add(y_diff);
            self.common.last = current;
            Ok(context)
        }
    }

    pub struct Point10Decompressor {
        common: Common,
        ic_dx: IntegerDecompressor,
        ic_dy: IntegerDecompressor,
        ic_z: IntegerDecompressor,
        ic_intensity: IntegerDecompressor,
        ic_scan_angle_rank: IntegerDecompressor,
        ic_point_source_id: IntegerDecompressor,
    }

    impl Default for Point10Decompressor {
        fn default() -> Self {
            Self {
                common: Common::new(false),
                ic_dx: IntegerDecompressorBuilder::new().bits(32).build_initialized(),
                ic_dy: IntegerDecompressorBuilder::new()
                    .bits(32)
                    .contexts(20)
                    .build_initialized(),
                ic_z: IntegerDecompressorBuilder::new()
                    .bits(32)
                    .contexts(20)
                    .build_initialized(),
                ic_intensity: IntegerDecompressorBuilder::new().bits(16).build_initialized(),
                ic_scan_angle_rank: IntegerDecompressorBuilder::new()
                    .bits(8)
                    .contexts(2)
                    .build_initialized(),
                ic_point_source_id: IntegerDecompressorBuilder::new()
                    .bits(16)
                    .build_initialized(),
            }
        }
    }

    impl<R: Read> FieldDecompressor<R> for Point10Decompressor {
        fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize {
            self.common.last = Point10::from_record(first_point);
            context
        }

        fn decompress_with(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            point: &mut PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            let last = &mut self.common.last;

            let x_diff = self
                .ic_dx
                .decompress(decoder, self.common.last_x_diffs.get(), 0)?;
            last.x = last.x.wrapping_add(x_diff);
            let k_bits = self.ic_dx.k();
            let y_diff = self.ic_dy.decompress(
                decoder,
                self.common.last_y_diffs.get(),
                context_of(k_bits),
            )?;
            last.y = last.y.wrapping_add(y_diff);
            let k_bits = (k_bits + self.ic_dy.k()) / 2;
            last.z = self.ic_z.decompress(decoder, last.z, context_of(k_bits))?;

            let changed_values = decoder.decode_symbol(&mut self.common.changed_values)?;
            if changed_values & 32 != 0 {
                last.intensity =
                    self.ic_intensity
                        .decompress(decoder, i32::from(last.intensity), 0)? as u16;
            }
            if changed_values & 16 != 0 {
                let bit_byte = last.bit_fields_to_byte();
                let model = symbol_model(&mut self.common.bit_byte, bit_byte, false);
                last.populate_bit_fields_from(decoder.decode_symbol(model)? as u8);
            }
            if changed_values & 8 != 0 {
                let model =
                    symbol_model(&mut self.common.classification, last.classification, false);
                last.classification = decoder.decode_symbol(model)? as u8;
            }
            if changed_values & 4 != 0 {
                last.scan_angle_rank = self.ic_scan_angle_rank.decompress(
                    decoder,
                    i32::from(last.scan_angle_rank),
                    (k_bits < 3) as u32,
                )? as i8;
            }
            if changed_values & 2 != 0 {
                let model = symbol_model(&mut self.common.user_data, last.user_data, false);
                last.user_data = decoder.decode_symbol(model)? as u8;
            }
            if changed_values & 1 != 0 {
                last.point_source_id =
                    self.ic_point_source_id
                        .decompress(decoder, i32::from(last.point_source_id), 0)? as u16;
            }

            self.common.last_x_diffs.add(x_diff);
            self.common.last_y_diffs.add(y_diff);
            last.copy_into(point);
            Ok(context)
        }
    }
}

pub mod v2 {
    use std::io::{Read, Write};

    use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
    use crate::decoders::ArithmeticDecoder;
    use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
    use crate::encoders::ArithmeticEncoder;
    use crate::las::utils::{u32_zero_bit_0, NUMBER_RETURN_LEVEL, NUMBER_RETURN_MAP};
    use crate::models::{ArithmeticModel, ArithmeticModelBuilder};
    use crate::point::PointRecord;
    use crate::predictors::StreamingMedian;
    use crate::record::{FieldCompressor, FieldDecompressor};

    use super::Point10;

    const BIT_FIELDS_CHANGED: u32 = 1 << 5;
    const INTENSITY_CHANGED: u32 = 1 << 4;
    const CLASSIFICATION_CHANGED: u32 = 1 << 3;
    const SCAN_ANGLE_RANK_CHANGED: u32 = 1 << 2;
    const USER_DATA_CHANGED: u32 = 1 << 1;
    const POINT_SOURCE_CHANGED: u32 = 1;

    fn changed_values(current: &Point10, last: &Point10, last_intensity: u16) -> u32 {
        ((last.bit_fields_to_byte() != current.bit_fields_to_byte()) as u32) << 5
            | ((last_intensity != current.intensity) as u32) << 4
            | ((last.classification != current.classification) as u32) << 3
            | ((last.scan_angle_rank != current.scan_angle_rank) as u32) << 2
            | ((last.user_data != current.user_data) as u32) << 1
            | (last.point_source_id != current.point_source_id) as u32
    }

    fn models(count: usize, symbols: u32, compress: bool) -> Vec<ArithmeticModel> {
        (0..count)
            .map(|_| ArithmeticModelBuilder::new(symbols).compress(compress).build())
            .collect()
    }

    fn y_context(n: u8, k_bits: u32) -> u32 {
        (n == 1) as u32 + if k_bits < 20 { u32_zero_bit_0(k_bits) } else { 20 }
    }

    fn z_context(n: u8, k_bits: u32) -> u32 {
        (n == 1) as u32 + if k_bits < 18 { u32_zero_bit_0(k_bits) } else { 18 }
    }

    // All the things we need to compress a point, grouped
    // so that the compressor and the decompressor share them
    struct Common {
        last: Point10,
        last_intensity: [u16; 16],
        last_x_diff_median: [StreamingMedian<i32>; 16],
        last_y_diff_median: [StreamingMedian<i32>; 16],
        last_height: [i32; 8],

        changed_values: ArithmeticModel,
        // 2
        scan_angle_rank: Vec<ArithmeticModel>,
        // 256
        bit_byte: Vec<ArithmeticModel>,
        // 256
        classification: Vec<ArithmeticModel>,
        // 256
        user_data: Vec<ArithmeticModel>,
    }

    impl Common {
        fn new(compress: bool) -> Self {
            Self {
                last: Point10::default(),
                last_intensity: [0u16; 16],
                last_x_diff_median: [StreamingMedian::new(); 16],
                last_y_diff_median: [StreamingMedian::new(); 16],
                last_height: [0i32; 8],
                changed_values: ArithmeticModelBuilder::new(64).compress(compress).build(),
                scan_angle_rank: models(2, 256, compress),
                bit_byte: models(256, 256, compress),
                classification: models(256, 256, compress),
                user_data: models(256, 256, compress),
            }
        }

        fn init_first_point(&mut self, first_point: &PointRecord) {
            self.last = Point10::from_record(first_point);
            // the intensity is predicted from `last_intensity`, which starts at zero
            self.last.intensity = 0;
        }
    }

    pub struct Point10Compressor {
        common: Common,
        ic_intensity: IntegerCompressor,
        ic_point_source_id: IntegerCompressor,
        ic_dx: IntegerCompressor,
        ic_dy: IntegerCompressor,
        ic_z: IntegerCompressor,
    }

    impl Default for Point10Compressor {
        fn default() -> Self {
            Self {
                common: Common::new(true),
                ic_intensity: IntegerCompressorBuilder::new()
                    .bits(16)
                    .contexts(4)
                    .build_initialized(),
                ic_point_source_id: IntegerCompressorBuilder::new().bits(16).build_initialized(),
                ic_dx: IntegerCompressorBuilder::new()
                    .bits(32)
                    .contexts(2)
                    .build_initialized(),
                ic_dy: IntegerCompressorBuilder::new()
                    .bits(32)
                    .contexts(22)
                    .build_initialized(),
                ic_z: IntegerCompressorBuilder::new()
                    .bits(32)
                    .contexts(20)
                    .build_initialized(),
            }
        }
    }

    impl<W: Write> FieldCompressor<W> for Point10Compressor {
        fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize {
            self.common.init_first_point(first_point);
            context
        }

        fn compress_with(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            point: &PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            let current = Point10::from_record(point);
            let common = &mut self.common;
            let r = current.return_number as usize;
            let n = current.number_of_returns;
            let m = NUMBER_RETURN_MAP[n as usize][r] as usize;
            let l = NUMBER_RETURN_LEVEL[n as usize][r] as usize;

            let changed = changed_values(&current, &common.last, common.last_intensity[m]);
            encoder.encode_symbol(&mut common.changed_values, changed)?;

            if changed & BIT_FIELDS_CHANGED != 0 {
                let last_b = common.last.bit_fields_to_byte() as usize;
                encoder.encode_symbol(
                    &mut common.bit_byte[last_b],
                    u32::from(current.bit_fields_to_byte()),
                )?;
            }
            if changed & INTENSITY_CHANGED != 0 {
                self.ic_intensity.compress(
                    encoder,
                    i32::from(common.last_intensity[m]),
                    i32::from(current.intensity),
                    m.min(3) as u32,
                )?;
                common.last_intensity[m] = current.intensity;
            }
            if changed & CLASSIFICATION_CHANGED != 0 {
                encoder.encode_symbol(
                    &mut common.classification[common.last.classification as usize],
                    u32::from(current.classification),
                )?;
            }
            if changed & SCAN_ANGLE_RANK_CHANGED != 0 {
                // the difference is coded as an unsigned byte
                let diff = current.scan_angle_rank.wrapping_sub(common.last.scan_angle_rank);
                encoder.encode_symbol(
                    &mut common.scan_angle_rank[current.scan_direction_flag as usize],
                    u32::from(diff as u8),
                )?;
            }
            if changed & USER_DATA_CHANGED != 0 {
                encoder.encode_symbol(
                    &mut common.user_data[common.last.user_data as usize],
                    u32::from(current.user_data),
                )?;
            }
            if changed & POINT_SOURCE_CHANGED != 0 {
                self.ic_point_source_id.compress(
                    encoder,
                    i32::from(common.last.point_source_id),
                    i32::from(current.point_source_id),
                    0,
                )?;
            }

            let median = common.last_x_diff_median[m].get();
            let diff = current.x.wrapping_sub(common.last.x);
            self.ic_dx.compress(encoder, median, diff, (n == 1) as u32)?;
            common.last_x_diff_median[m].add(diff);

            let k_bits = self.ic_dx.k();
            let median = common.last_y_diff_median[m].get();
            let diff = current.y.wrapping_sub(common.last.y);
            self.ic_dy
                .compress(encoder, median, diff, y_context(n, k_bits))?;
            common.last_y_diff_median[m].add(diff);

            let k_bits = (self.ic_dx.k() + self.ic_dy.k()) / 2;
            self.ic_z.compress(
                encoder,
                common.last_height[l],
                current.z,
                z_context(n, k_bits),
            )?;
            common.last_height[l] = current.z;

            common.last = current;
            Ok(context)
        }
    }

    pub struct Point10Decompressor {
        common: Common,
        ic_intensity: IntegerDecompressor,
        ic_point_source_id: IntegerDecompressor,
        ic_dx: IntegerDecompressor,
        ic_dy: IntegerDecompressor,
        ic_z: IntegerDecompressor,
    }

    impl Default for Point10Decompressor {
        fn default() -> Self {
            Self {
                common: Common::new(false),
                ic_intensity: IntegerDecompressorBuilder::new()
                    .bits(16)
                    .contexts(4)
                    .build_initialized(),
                ic_point_source_id: IntegerDecompressorBuilder::new()
                    .bits(16)
                    .build_initialized(),
                ic_dx: IntegerDecompressorBuilder::new()
                    .bits(32)
                    .contexts(2)
                    .build_initialized(),
                ic_dy: IntegerDecompressorBuilder::new()
                    .bits(32)
                    .contexts(22)
                    .build_initialized(),
                ic_z: IntegerDecompressorBuilder::new()
                    .bits(32)
                    .contexts(20)
                    .build_initialized(),
            }
        }
    }

    impl<R: Read> FieldDecompressor<R> for Point10Decompressor {
        fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize {
            self.common.init_first_point(first_point);
            context
        }

        fn decompress_with(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            point: &mut PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            let common = &mut self.common;
            let changed = decoder.decode_symbol(&mut common.changed_values)?;

            let (n, m, l) = if changed != 0 {
                if changed & BIT_FIELDS_CHANGED != 0 {
                    let last_b = common.last.bit_fields_to_byte() as usize;
                    let b = decoder.decode_symbol(&mut common.bit_byte[last_b])?;
                    common.last.populate_bit_fields_from(b as u8);
                }

                let r = common.last.return_number as usize;
                let n = common.last.number_of_returns;
                let m = NUMBER_RETURN_MAP[n as usize][r] as usize;
                let l = NUMBER_RETURN_LEVEL[n as usize][r] as usize;

                if changed & INTENSITY_CHANGED != 0 {
                    let intensity = self.ic_intensity.decompress(
                        decoder,
                        i32::from(common.last_intensity[m]),
                        m.min(3) as u32,
                    )? as u16;
                    common.last_intensity[m] = intensity;
                }
                common.last.intensity = common.last_intensity[m];

                if changed & CLASSIFICATION_CHANGED != 0 {
                    let model = &mut common.classification[common.last.classification as usize];
                    common.last.classification = decoder.decode_symbol(model)? as u8;
                }
                if changed & SCAN_ANGLE_RANK_CHANGED != 0 {
                    let model =
                        &mut common.scan_angle_rank[common.last.scan_direction_flag as usize];
                    let diff = decoder.decode_symbol(model)? as u8 as i8;
                    common.last.scan_angle_rank = common.last.scan_angle_rank.wrapping_add(diff);
                }
                if changed & USER_DATA_CHANGED != 0 {
                    let model = &mut common.user_data[common.last.user_data as usize];
                    common.last.user_data = decoder.decode_symbol(model)? as u8;
                }
                if changed & POINT_SOURCE_CHANGED != 0 {
                    common.last.point_source_id = self.ic_point_source_id.decompress(
                        decoder,
                        i32::from(common.last.point_source_id),
                        0,
                    )? as u16;
                }
                (n, m, l)
            } else {
                let r = common.last.return_number as usize;
                let n = common.last.number_of_returns;
                (
                    n,
                    NUMBER_RETURN_MAP[n as usize][r] as usize,
                    NUMBER_RETURN_LEVEL[n as usize][r] as usize,
                )
            };

            let median = common.last_x_diff_median[m].get();
            let diff = self.ic_dx.decompress(decoder, median, (n == 1) as u32)?;
            common.last.x = common.last.x.wrapping_add(diff);
            common.last_x_diff_median[m].add(diff);

            let k_bits = self.ic_dx.k();
            let median = common.last_y_diff_median[m].get();
            let diff = self.ic_dy.decompress(decoder, median, y_context(n, k_bits))?;
            common.last.y = common.last.y.wrapping_add(diff);
            common.last_y_diff_median[m].add(diff);

            let k_bits = (self.ic_dx.k() + self.ic_dy.k()) / 2;
            common.last.z =
                self.ic_z
                    .decompress(decoder, common.last_height[l], z_context(n, k_bits))?;
            common.last_height[l] = common.last.z;

            common.last.copy_into(point);
            Ok(context)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::las::test_utils::{random_points, round_trip};
    use crate::laszip::{LazItem, LazItemType};

    #[test]
    fn test_bit_fields_byte() {
        let mut p = Point10::default();
        p.populate_bit_fields_from(0b1010_1101);
        assert_eq!(p.return_number, 5);
        assert_eq!(p.number_of_returns, 5);
        assert!(!p.scan_direction_flag);
        assert!(p.edge_of_flight_line);
        assert_eq!(p.bit_fields_to_byte(), 0b1010_1101);
    }

    #[test]
    fn test_point10_v1_round_trip() {
        let items = vec![LazItem::new(LazItemType::Point10, 1)];
        round_trip(&items, &random_points(&items, 2_000, 1));
    }

    #[test]
    fn test_point10_v2_round_trip() {
        let items = vec![LazItem::new(LazItemType::Point10, 2)];
        round_trip(&items, &random_points(&items, 2_000, 2));
    }

    #[test]
    fn test_point10_v2_extreme_coordinates() {
        let items = vec![LazItem::new(LazItemType::Point10, 2)];
        let mut points = random_points(&items, 10, 3);
        points[3].x = i32::MAX;
        points[4].x = i32::MIN;
        points[5].y = i32::MIN;
        points[6].z = i32::MAX;
        points[7].scan_angle = -128;
        points[8].scan_angle = 127;
        round_trip(&items, &points);
    }
}
