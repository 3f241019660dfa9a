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

//! Codecs of the GPS time item.
//!
//! The time is a `f64` but it is predicted and coded from its
//! bit pattern, reinterpreted as an `i64`.

use crate::point::PointRecord;

const GPS_TIME_MULTI: i32 = 500;
const GPS_TIME_MULTI_MINUS: i32 = -10;
const GPS_TIME_MULTI_UNCHANGED: i32 = GPS_TIME_MULTI - GPS_TIME_MULTI_MINUS + 1;
const GPS_TIME_MULTI_CODE_FULL: i32 = GPS_TIME_MULTI - GPS_TIME_MULTI_MINUS + 2;
const GPS_TIME_MULTI_TOTAL: i32 = GPS_TIME_MULTI - GPS_TIME_MULTI_MINUS + 6;

#[inline]
pub(crate) fn gps_time_bits(point: &PointRecord) -> i64 {
    point.gps_time.to_bits() as i64
}

#[inline]
pub(crate) fn set_gps_time_bits(point: &mut PointRecord, bits: i64) {
    point.gps_time = f64::from_bits(bits as u64);
}

/// Returns the difference if it fits in 32 bits
#[inline]
pub(crate) fn diff_32(current: i64, last: i64) -> Option<i32> {
    let diff_64 = current.wrapping_sub(last);
    let diff_32 = diff_64 as i32;
    if diff_64 == i64::from(diff_32) {
        Some(diff_32)
    } else {
        None
    }
}

pub mod v1 {
    use std::io::{Read, Write};

    use num_traits::clamp;

    use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
    use crate::decoders::ArithmeticDecoder;
    use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
    use crate::encoders::ArithmeticEncoder;
    use crate::models::{ArithmeticModel, ArithmeticModelBuilder};
    use crate::point::PointRecord;
    use crate::record::{FieldCompressor, FieldDecompressor};

    use super::{diff_32, gps_time_bits, set_gps_time_bits};

    const GPS_TIME_MULTI_MAX: u32 = 512;
    const MULTI_EXTREME: i32 = (GPS_TIME_MULTI_MAX - 3) as i32;

    fn multi_context(multi: i32) -> u32 {
        if multi < 10 {
            3
        } else if multi < 50 {
            4
        } else {
            5
        }
    }

    struct Common {
        last_gps: i64,
        last_gps_time_diff: i32,
        multi_extreme_counter: i32,
        gps_time_multi: ArithmeticModel,
        gps_time_0_diff: ArithmeticModel,
    }

    impl Common {
        fn new(compress: bool) -> Self {
            Self {
                last_gps: 0,
                last_gps_time_diff: 0,
                multi_extreme_counter: 0,
                gps_time_multi: ArithmeticModelBuilder::new(GPS_TIME_MULTI_MAX)
                    .compress(compress)
                    .build(),
                gps_time_0_diff: ArithmeticModelBuilder::new(3).compress(compress).build(),
            }
        }

        /// Adopts the diff as new reference once extreme multipliers repeat
        fn count_extreme(&mut self, diff: i32) {
            self.multi_extreme_counter += 1;
            if self.multi_extreme_counter > 3 {
                self.last_gps_time_diff = diff;
                self.multi_extreme_counter = 0;
            }
        }
    }

    pub struct GpsTimeCompressor {
        common: Common,
        ic_gps_time: IntegerCompressor,
    }

    impl Default for GpsTimeCompressor {
        fn default() -> Self {
            Self {
                common: Common::new(true),
                ic_gps_time: IntegerCompressorBuilder::new()
                    .bits(32)
                    .contexts(6)
                    .build_initialized(),
            }
        }
    }

    impl<W: Write> FieldCompressor<W> for GpsTimeCompressor {
        fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize {
            self.common.last_gps = gps_time_bits(first_point);
            context
        }

        fn compress_with(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            point: &PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            let current = gps_time_bits(point);
            let common = &mut self.common;

            if common.last_gps_time_diff == 0 {
                if current == common.last_gps {
                    encoder.encode_symbol(&mut common.gps_time_0_diff, 0)?;
                } else if let Some(diff) = diff_32(current, common.last_gps) {
                    encoder.encode_symbol(&mut common.gps_time_0_diff, 1)?;
                    self.ic_gps_time.compress(encoder, 0, diff, 0)?;
                    common.last_gps_time_diff = diff;
                } else {
                    encoder.encode_symbol(&mut common.gps_time_0_diff, 2)?;
                    encoder.write_int64(current as u64)?;
                }
            } else if current == common.last_gps {
                encoder.encode_symbol(&mut common.gps_time_multi, GPS_TIME_MULTI_MAX - 1)?;
            } else if let Some(diff) = diff_32(current, common.last_gps) {
                let multi = ((diff as f32 / common.last_gps_time_diff as f32) + 0.5f32) as i32;
                let multi = clamp(multi, 0, MULTI_EXTREME);
                encoder.encode_symbol(&mut common.gps_time_multi, multi as u32)?;

                if multi == 1 {
                    self.ic_gps_time
                        .compress(encoder, common.last_gps_time_diff, diff, 1)?;
                    common.last_gps_time_diff = diff;
                    common.multi_extreme_counter = 0;
                } else if multi == 0 {
                    self.ic_gps_time
                        .compress(encoder, common.last_gps_time_diff / 4, diff, 2)?;
                    common.count_extreme(diff);
                } else {
                    self.ic_gps_time.compress(
                        encoder,
                        common.last_gps_time_diff.wrapping_mul(multi),
                        diff,
                        multi_context(multi),
                    )?;
                    if multi == MULTI_EXTREME {
                        common.count_extreme(diff);
                    }
                }
            } else {
                encoder.encode_symbol(&mut common.gps_time_multi, GPS_TIME_MULTI_MAX - 2)?;
                encoder.write_int64(current as u64)?;
            }
            common.last_gps = current;
            Ok(context)
        }
    }

    pub struct GpsTimeDecompressor {
        common: Common,
        ic_gps_time: IntegerDecompressor,
    }

    impl Default for GpsTimeDecompressor {
        fn default() -> Self {
            Self {
                common: Common::new(false),
                ic_gps_time: IntegerDecompressorBuilder::new()
                    .bits(32)
                    .contexts(6)
                    .build_initialized(),
            }
        }
    }

    impl<R: Read> FieldDecompressor<R> for GpsTimeDecompressor {
        fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize {
            self.common.last_gps = gps_time_bits(first_point);
            context
        }

        fn decompress_with(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            point: &mut PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            let common = &mut self.common;
            if common.last_gps_time_diff == 0 {
                let multi = decoder.decode_symbol(&mut common.gps_time_0_diff)?;
                if multi == 1 {
                    common.last_gps_time_diff = self.ic_gps_time.decompress(decoder, 0, 0)?;
                    common.last_gps = common
                        .last_gps
                        .wrapping_add(i64::from(common.last_gps_time_diff));
                } else if multi == 2 {
                    common.last_gps = decoder.read_int_64()? as i64;
                }
            } else {
                let multi = decoder.decode_symbol(&mut common.gps_time_multi)?;
                if multi < GPS_TIME_MULTI_MAX - 2 {
                    let multi = multi as i32;
                    let diff = if multi == 1 {
                        let diff =
                            self.ic_gps_time
                                .decompress(decoder, common.last_gps_time_diff, 1)?;
                        common.last_gps_time_diff = diff;
                        common.multi_extreme_counter = 0;
                        diff
                    } else if multi == 0 {
                        let diff =
                            self.ic_gps_time
                                .decompress(decoder, common.last_gps_time_diff / 4, 2)?;
                        common.count_extreme(diff);
                        diff
                    } else {
                        let diff = self.ic_gps_time.decompress(
                            decoder,
                            common.last_gps_time_diff.wrapping_mul(multi),
                            multi_context(multi),
                        )?;
                        if multi == MULTI_EXTREME {
                            common.count_extreme(diff);
                        }
                        diff
                    };
                    common.last_gps = common.last_gps.wrapping_add(i64::from(diff));
                } else if multi == GPS_TIME_MULTI_MAX - 2 {
                    common.last_gps = decoder.read_int_64()? as i64;
                }
            }
            set_gps_time_bits(point, common.last_gps);
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
    use crate::las::utils::i32_quantize;
    use crate::models::{ArithmeticModel, ArithmeticModelBuilder};
    use crate::point::PointRecord;
    use crate::record::{FieldCompressor, FieldDecompressor};

    use super::{
        diff_32, gps_time_bits, set_gps_time_bits, GPS_TIME_MULTI, GPS_TIME_MULTI_CODE_FULL,
        GPS_TIME_MULTI_MINUS, GPS_TIME_MULTI_TOTAL, GPS_TIME_MULTI_UNCHANGED,
    };

    // Up to 4 interleaved time sequences are tracked
    struct Common {
        gps_time_multi: ArithmeticModel,
        gps_time_0_diff: ArithmeticModel,
        last: usize,
        next: usize,
        last_gps_times: [i64; 4],
        last_gps_time_diffs: [i32; 4],
        multi_extreme_counters: [i32; 4],
    }

    impl Common {
        fn new(compress: bool) -> Self {
            Self {
                gps_time_multi: ArithmeticModelBuilder::new(GPS_TIME_MULTI_TOTAL as u32)
                    .compress(compress)
                    .build(),
                gps_time_0_diff: ArithmeticModelBuilder::new(6).compress(compress).build(),
                last: 0,
                next: 0,
                last_gps_times: [0i64; 4],
                last_gps_time_diffs: [0i32; 4],
                multi_extreme_counters: [0i32; 4],
            }
        }

        fn count_extreme(&mut self, diff: i32) {
            let counter = &mut self.multi_extreme_counters[self.last];
            *counter += 1;
            if *counter > 3 {
                self.last_gps_time_diffs[self.last] = diff;
                *counter = 0;
            }
        }

        /// Index of another sequence the time is close to
        fn other_sequence(&self, current: i64) -> Option<usize> {
            (1..4).find(|i| diff_32(current, self.last_gps_times[(self.last + i) & 3]).is_some())
        }

        fn start_new_sequence(&mut self) {
            self.next = (self.next + 1) & 3;
            self.last = self.next;
            self.last_gps_time_diffs[self.last] = 0;
            self.multi_extreme_counters[self.last] = 0;
        }
    }

    pub struct GpsTimeCompressor {
        common: Common,
        ic_gps_time: IntegerCompressor,
    }

    impl Default for GpsTimeCompressor {
        fn default() -> Self {
            Self {
                common: Common::new(true),
                ic_gps_time: IntegerCompressorBuilder::new()
                    .bits(32)
                    .contexts(9)
                    .build_initialized(),
            }
        }
    }

    impl GpsTimeCompressor {
        fn compress_full<W: Write>(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            current: i64,
        ) -> std::io::Result<()> {
            let common = &mut self.common;
            self.ic_gps_time.compress(
                encoder,
                (common.last_gps_times[common.last] >> 32) as i32,
                (current >> 32) as i32,
                8,
            )?;
            encoder.write_int(current as u32)?;
            common.start_new_sequence();
            Ok(())
        }
    }

    impl<W: Write> FieldCompressor<W> for GpsTimeCompressor {
        fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize {
            self.common.last_gps_times[0] = gps_time_bits(first_point);
            context
        }

        fn compress_with(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            point: &PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            let current = gps_time_bits(point);
            // each pass either codes the time or switches to another sequence
            loop {
                let common = &mut self.common;
                let last = common.last;
                let last_gps_time = common.last_gps_times[last];
                let last_diff = common.last_gps_time_diffs[last];

                if last_diff == 0 {
                    if current == last_gps_time {
                        encoder.encode_symbol(&mut common.gps_time_0_diff, 0)?;
                        return Ok(context);
                    }
                    if let Some(diff) = diff_32(current, last_gps_time) {
                        encoder.encode_symbol(&mut common.gps_time_0_diff, 1)?;
                        self.ic_gps_time.compress(encoder, 0, diff, 0)?;
                        common.last_gps_time_diffs[last] = diff;
                        common.multi_extreme_counters[last] = 0;
                    } else if let Some(i) = common.other_sequence(current) {
                        encoder.encode_symbol(&mut common.gps_time_0_diff, (i + 2) as u32)?;
                        common.last = (last + i) & 3;
                        continue;
                    } else {
                        encoder.encode_symbol(&mut common.gps_time_0_diff, 2)?;
                        self.compress_full(encoder, current)?;
                    }
                } else {
                    if current == last_gps_time {
                        encoder.encode_symbol(
                            &mut common.gps_time_multi,
                            GPS_TIME_MULTI_UNCHANGED as u32,
                        )?;
                        return Ok(context);
                    }
                    if let Some(diff) = diff_32(current, last_gps_time) {
                        let multi = i32_quantize(diff as f32 / last_diff as f32);
                        if multi == 1 {
                            // regularly spaced pulses
                            encoder.encode_symbol(&mut common.gps_time_multi, 1)?;
                            self.ic_gps_time.compress(encoder, last_diff, diff, 1)?;
                            common.multi_extreme_counters[last] = 0;
                        } else if multi > 0 {
                            if multi < GPS_TIME_MULTI {
                                encoder.encode_symbol(&mut common.gps_time_multi, multi as u32)?;
                                let ctx = if multi < 10 { 2 } else { 3 };
                                self.ic_gps_time.compress(
                                    encoder,
                                    multi.wrapping_mul(last_diff),
                                    diff,
                                    ctx,
                                )?;
                            } else {
                                encoder.encode_symbol(
                                    &mut common.gps_time_multi,
                                    GPS_TIME_MULTI as u32,
                                )?;
                                self.ic_gps_time.compress(
                                    encoder,
                                    GPS_TIME_MULTI.wrapping_mul(last_diff),
                                    diff,
                                    4,
                                )?;
                                common.count_extreme(diff);
                            }
                        } else if multi < 0 {
                            if multi > GPS_TIME_MULTI_MINUS {
                                encoder.encode_symbol(
                                    &mut common.gps_time_multi,
                                    (GPS_TIME_MULTI - multi) as u32,
                                )?;
                                self.ic_gps_time.compress(
                                    encoder,
                                    multi.wrapping_mul(last_diff),
                                    diff,
                                    5,
                                )?;
                            } else {
                                encoder.encode_symbol(
                                    &mut common.gps_time_multi,
                                    (GPS_TIME_MULTI - GPS_TIME_MULTI_MINUS) as u32,
                                )?;
                                self.ic_gps_time.compress(
                                    encoder,
                                    GPS_TIME_MULTI_MINUS.wrapping_mul(last_diff),
                                    diff,
                                    6,
                                )?;
                                common.count_extreme(diff);
                            }
                        } else {
                            encoder.encode_symbol(&mut common.gps_time_multi, 0)?;
                            self.ic_gps_time.compress(encoder, 0, diff, 7)?;
                            common.count_extreme(diff);
                        }
                    } else if let Some(i) = common.other_sequence(current) {
                        encoder.encode_symbol(
                            &mut common.gps_time_multi,
                            (GPS_TIME_MULTI_CODE_FULL + i as i32) as u32,
                        )?;
                        common.last = (last + i) & 3;
                        continue;
                    } else {
                        encoder.encode_symbol(
                            &mut common.gps_time_multi,
                            GPS_TIME_MULTI_CODE_FULL as u32,
                        )?;
                        self.compress_full(encoder, current)?;
                    }
                }
                let common = &mut self.common;
                common.last_gps_times[common.last] = current;
                return Ok(context);
            }
        }
    }

    pub struct GpsTimeDecompressor {
        common: Common,
        ic_gps_time: IntegerDecompressor,
    }

    impl Default for GpsTimeDecompressor {
        fn default() -> Self {
            Self {
                common: Common::new(false),
                ic_gps_time: IntegerDecompressorBuilder::new()
                    .bits(32)
                    .contexts(9)
                    .build_initialized(),
            }
        }
    }

    impl GpsTimeDecompressor {
        fn decompress_full<R: Read>(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
        ) -> std::io::Result<()> {
            let common = &mut self.common;
            let high = self.ic_gps_time.decompress(
                decoder,
                (common.last_gps_times[common.last] >> 32) as i32,
                8,
            )?;
            let low = decoder.read_int()?;
            common.start_new_sequence();
            common.last_gps_times[common.last] = i64::from(high) << 32 | i64::from(low);
            Ok(())
        }
    }

    impl<R: Read> FieldDecompressor<R> for GpsTimeDecompressor {
        fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize {
            self.common.last_gps_times[0] = gps_time_bits(first_point);
            context
        }

        fn decompress_with(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            point: &mut PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            loop {
                let common = &mut self.common;
                let last = common.last;
                let last_diff = common.last_gps_time_diffs[last];

                if last_diff == 0 {
                    let multi = decoder.decode_symbol(&mut common.gps_time_0_diff)? as usize;
                    if multi == 1 {
                        let diff = self.ic_gps_time.decompress(decoder, 0, 0)?;
                        common.last_gps_time_diffs[last] = diff;
                        common.last_gps_times[last] =
                            common.last_gps_times[last].wrapping_add(i64::from(diff));
                        common.multi_extreme_counters[last] = 0;
                    } else if multi == 2 {
                        self.decompress_full(decoder)?;
                    } else if multi > 2 {
                        common.last = (last + multi - 2) & 3;
                        continue;
                    }
                } else {
                    let multi = decoder.decode_symbol(&mut common.gps_time_multi)? as i32;
                    if multi == 1 {
                        let diff = self.ic_gps_time.decompress(decoder, last_diff, 1)?;
                        common.last_gps_times[last] =
                            common.last_gps_times[last].wrapping_add(i64::from(diff));
                        common.multi_extreme_counters[last] = 0;
                    } else if multi < GPS_TIME_MULTI_UNCHANGED {
                        let diff = if multi == 0 {
                            let diff = self.ic_gps_time.decompress(decoder, 0, 7)?;
                            common.count_extreme(diff);
                            diff
                        } else if multi < GPS_TIME_MULTI {
                            let ctx = if multi < 10 { 2 } else { 3 };
                            self.ic_gps_time
                                .decompress(decoder, multi.wrapping_mul(last_diff), ctx)?
                        } else if multi == GPS_TIME_MULTI {
                            let diff = self.ic_gps_time.decompress(
                                decoder,
                                GPS_TIME_MULTI.wrapping_mul(last_diff),
                                4,
                            )?;
                            common.count_extreme(diff);
                            diff
                        } else {
                            let multi = GPS_TIME_MULTI - multi;
                            if multi > GPS_TIME_MULTI_MINUS {
                                self.ic_gps_time.decompress(
                                    decoder,
                                    multi.wrapping_mul(last_diff),
                                    5,
                                )?
                            } else {
                                let diff = self.ic_gps_time.decompress(
                                    decoder,
                                    GPS_TIME_MULTI_MINUS.wrapping_mul(last_diff),
                                    6,
                                )?;
                                common.count_extreme(diff);
                                diff
                            }
                        };
                        common.last_gps_times[last] =
                            common.last_gps_times[last].wrapping_add(i64::from(diff));
                    } else if multi == GPS_TIME_MULTI_CODE_FULL {
                        self.decompress_full(decoder)?;
                    } else if multi > GPS_TIME_MULTI_CODE_FULL {
                        common.last = (last + (multi - GPS_TIME_MULTI_CODE_FULL) as usize) & 3;
                        continue;
                    }
                }
                let common = &self.common;
                set_gps_time_bits(point, common.last_gps_times[common.last]);
                return Ok(context);
            }
        }
    }
}
