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


//! Codec of the extended point item, the base of the point formats 6 to 10.
//!
//! The fields are spread over 9 layers so that a reader can skip the
//! ones it does not need. Points from up to 4 scanner channels are
//! predicted from the previous point of the same channel, each channel
//! having its own set of models.

pub mod v3 {
    use std::io::{Read, Write};

    use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
    use crate::decoders::ArithmeticDecoder;
    use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
    use crate::encoders::ArithmeticEncoder;
    use crate::io::ByteSource;
    use crate::las::gps::{diff_32, gps_time_bits, set_gps_time_bits};
    use crate::las::selective::DecompressionSelection;
    use crate::las::utils::{
        i32_quantize, is_nth_bit_set, u32_zero_bit_0, NUMBER_RETURN_LEVEL_8CT,
        NUMBER_RETURN_MAP_6CTX,
    };
    use crate::layers::{LayerDecoder, LayerEncoder};
    use crate::models::{ArithmeticModel, ArithmeticModelBuilder};
    use crate::point::PointRecord;
    use crate::predictors::StreamingMedian;
    use crate::record::{LayeredFieldCompressor, LayeredFieldDecompressor};

    const GPS_TIME_MULTI: i32 = 500;
    const GPS_TIME_MULTI_MINUS: i32 = -10;
    const GPS_TIME_MULTI_CODE_FULL: i32 = GPS_TIME_MULTI - GPS_TIME_MULTI_MINUS + 1;
    const GPS_TIME_MULTI_TOTAL: i32 = GPS_TIME_MULTI - GPS_TIME_MULTI_MINUS + 5;

    /// The fields of the previous point of a channel
    #[derive(Debug, Default, Copy, Clone, PartialEq)]
    struct LastPoint {
        x: i32,
        y: i32,
        z: i32,
        intensity: u16,
        return_number: u8,
        number_of_returns: u8,
        classification: u8,
        classification_flags: u8,
        scan_direction_flag: bool,
        edge_of_flight_line: bool,
        scanner_channel: u8,
        scan_angle: i16,
        user_data: u8,
        point_source_id: u16,
        gps_time: i64,
        gps_time_change: bool,
    }

    impl LastPoint {
        fn from_point(point: &PointRecord) -> Self {
            Self {
                x: point.x,
                y: point.y,
                z: point.z,
                intensity: point.intensity,
                return_number: point.return_number & 0xF,
                number_of_returns: point.number_of_returns & 0xF,
                classification: point.classification,
                classification_flags: point.classification_flags & 0xF,
                scan_direction_flag: point.scan_direction_flag,
                edge_of_flight_line: point.edge_of_flight_line,
                scanner_channel: point.scanner_channel & 0x3,
                scan_angle: point.scan_angle,
                user_data: point.user_data,
                point_source_id: point.point_source_id,
                gps_time: gps_time_bits(point),
                gps_time_change: false,
            }
        }

        fn copy_into(&self, point: &mut PointRecord) {
            point.x = self.x;
            point.y = self.y;
            point.z = self.z;
            point.intensity = self.intensity;
            point.return_number = self.return_number;
            point.number_of_returns = self.number_of_returns;
            point.classification = self.classification;
            point.classification_flags = self.classification_flags;
            point.scan_direction_flag = self.scan_direction_flag;
            point.edge_of_flight_line = self.edge_of_flight_line;
            point.scanner_channel = self.scanner_channel;
            point.scan_angle = self.scan_angle;
            point.user_data = self.user_data;
            point.point_source_id = self.point_source_id;
            set_gps_time_bits(point, self.gps_time);
        }

        /// Whether the point was a first and/or last return, and if its time changed
        fn return_context(&self) -> usize {
            let mut lpr = (self.return_number == 1) as usize;
            lpr += ((self.return_number >= self.number_of_returns) as usize) << 1;
            lpr += (self.gps_time_change as usize) << 2;
            lpr
        }

        fn flags(&self) -> u8 {
            (self.edge_of_flight_line as u8) << 5
                | (self.scan_direction_flag as u8) << 4
                | self.classification_flags
        }

        fn set_flags(&mut self, flags: u8) {
            self.edge_of_flight_line = is_nth_bit_set(u32::from(flags), 5);
            self.scan_direction_flag = is_nth_bit_set(u32::from(flags), 4);
            self.classification_flags = flags & 0xF;
        }
    }

    /// Contexts derived from the returns of the current point
    struct ReturnContexts {
        /// one of 6 return combinations
        m: usize,
        /// saturated depth of the return in its pulse
        l: usize,
        /// first (2) and/or last (1) return
        cpr: usize,
        single: u32,
    }

    impl ReturnContexts {
        fn new(return_number: u8, number_of_returns: u8) -> Self {
            let (r, n) = (usize::from(return_number), usize::from(number_of_returns));
            let mut cpr = if r == 1 { 2 } else { 0 };
            cpr += (r >= n) as usize;
            Self {
                m: usize::from(NUMBER_RETURN_MAP_6CTX[n][r]),
                l: usize::from(NUMBER_RETURN_LEVEL_8CT[n][r]),
                cpr,
                single: (n == 1) as u32,
            }
        }
    }

    #[inline]
    fn y_context(single: u32, k_bits: u32) -> u32 {
        single + if k_bits < 20 { u32_zero_bit_0(k_bits) } else { 20 }
    }

    #[inline]
    fn z_context(single: u32, k_bits: u32) -> u32 {
        single + if k_bits < 18 { u32_zero_bit_0(k_bits) } else { 18 }
    }

    fn lazy_model(
        slot: &mut Option<ArithmeticModel>,
        symbols: u32,
        compress: bool,
    ) -> &mut ArithmeticModel {
        slot.get_or_insert_with(|| ArithmeticModelBuilder::new(symbols).compress(compress).build())
    }

    /// Symbol models of one channel
    struct Point14Models {
        compress: bool,
        changed_values: Vec<ArithmeticModel>,
        scanner_channel: ArithmeticModel,
        number_of_returns: Vec<Option<ArithmeticModel>>,
        return_number: Vec<Option<ArithmeticModel>>,
        return_number_gps_same: ArithmeticModel,
        classification: Vec<Option<ArithmeticModel>>,
        flags: Vec<Option<ArithmeticModel>>,
        user_data: Vec<Option<ArithmeticModel>>,
        gps_time_multi: ArithmeticModel,
        gps_time_0_diff: ArithmeticModel,
    }

    impl Point14Models {
        fn new(compress: bool) -> Self {
            let model =
                |symbols: u32| ArithmeticModelBuilder::new(symbols).compress(compress).build();
            Self {
                compress,
                changed_values: (0..8).map(|_| model(128)).collect(),
                scanner_channel: model(3),
                number_of_returns: vec![None; 16],
                return_number: vec![None; 16],
                return_number_gps_same: model(13),
                classification: vec![None; 64],
                flags: vec![None; 64],
                user_data: vec![None; 64],
                gps_time_multi: model(GPS_TIME_MULTI_TOTAL as u32),
                gps_time_0_diff: model(5),
            }
        }

        fn number_of_returns(&mut self, last_n: u8) -> &mut ArithmeticModel {
            lazy_model(&mut self.number_of_returns[usize::from(last_n)], 16, self.compress)
        }

        fn return_number(&mut self, last_r: u8) -> &mut ArithmeticModel {
            lazy_model(&mut self.return_number[usize::from(last_r)], 16, self.compress)
        }

        fn classification(&mut self, last_classification: u8, cpr: usize) -> &mut ArithmeticModel {
            let ccc = (usize::from(last_classification & 0x1F) << 1) + (cpr == 3) as usize;
            lazy_model(&mut self.classification[ccc], 256, self.compress)
        }

        fn flags(&mut self, last_flags: u8) -> &mut ArithmeticModel {
            lazy_model(&mut self.flags[usize::from(last_flags)], 64, self.compress)
        }

        fn user_data(&mut self, last_user_data: u8) -> &mut ArithmeticModel {
            lazy_model(&mut self.user_data[usize::from(last_user_data / 4)], 256, self.compress)
        }
    }

    /// Up to 4 interleaved time sequences
    #[derive(Default)]
    struct GpsSequences {
        last: usize,
        next: usize,
        last_gps_times: [i64; 4],
        last_gps_time_diffs: [i32; 4],
        multi_extreme_counters: [i32; 4],
    }

    impl GpsSequences {
        fn starting_at(gps_time: i64) -> Self {
            let mut sequences = Self::default();
            sequences.last_gps_times[0] = gps_time;
            sequences
        }

        fn current(&self) -> i64 {
            self.last_gps_times[self.last]
        }

        fn last_diff(&self) -> i32 {
            self.last_gps_time_diffs[self.last]
        }

        fn count_extreme(&mut self, diff: i32) {
            let counter = &mut self.multi_extreme_counters[self.last];
            *counter += 1;
            if *counter > 3 {
                self.last_gps_time_diffs[self.last] = diff;
                *counter = 0;
            }
        }

        fn other_sequence(&self, gps_time: i64) -> Option<usize> {
            (1..4).find(|i| diff_32(gps_time, self.last_gps_times[(self.last + i) & 3]).is_some())
        }

        fn start_new_sequence(&mut self, gps_time: i64) {
            self.next = (self.next + 1) & 3;
            self.last = self.next;
            self.last_gps_times[self.last] = gps_time;
            self.last_gps_time_diffs[self.last] = 0;
            self.multi_extreme_counters[self.last] = 0;
        }

        fn add_diff(&mut self, diff: i32) {
            let time = &mut self.last_gps_times[self.last];
            *time = time.wrapping_add(i64::from(diff));
        }
    }

    /// Integer compressor context of a time difference, from its multiplier
    fn multi_context(multi: i32) -> u32 {
        if multi < 10 {
            2
        } else {
            3
        }
    }

    /***********************************************************************************************
                        Compression
    ***********************************************************************************************/

    struct ChannelCompressor {
        unused: bool,
        last: LastPoint,
        last_intensities: [u16; 8],
        last_x_diff_median5: [StreamingMedian<i32>; 12],
        last_y_diff_median5: [StreamingMedian<i32>; 12],
        last_z: [i32; 8],
        gps: GpsSequences,
        models: Point14Models,
        ic_dx: IntegerCompressor,
        ic_dy: IntegerCompressor,
        ic_z: IntegerCompressor,
        ic_intensity: IntegerCompressor,
        ic_scan_angle: IntegerCompressor,
        ic_point_source_id: IntegerCompressor,
        ic_gps_time: IntegerCompressor,
    }

    impl ChannelCompressor {
        fn new() -> Self {
            Self {
                unused: true,
                last: LastPoint::default(),
                last_intensities: [0; 8],
                last_x_diff_median5: [StreamingMedian::new(); 12],
                last_y_diff_median5: [StreamingMedian::new(); 12],
                last_z: [0; 8],
                gps: GpsSequences::default(),
                models: Point14Models::new(true),
                ic_dx: IntegerCompressorBuilder::new().bits(32).contexts(2).build_initialized(),
                ic_dy: IntegerCompressorBuilder::new().bits(32).contexts(22).build_initialized(),
                ic_z: IntegerCompressorBuilder::new().bits(32).contexts(20).build_initialized(),
                ic_intensity: IntegerCompressorBuilder::new()
                    .bits(16)
                    .contexts(4)
                    .build_initialized(),
                ic_scan_angle: IntegerCompressorBuilder::new()
                    .bits(16)
                    .contexts(2)
                    .build_initialized(),
                ic_point_source_id: IntegerCompressorBuilder::new().bits(16).build_initialized(),
                ic_gps_time: IntegerCompressorBuilder::new()
                    .bits(32)
                    .contexts(9)
                    .build_initialized(),
            }
        }

        fn init_from(&mut self, last: &LastPoint) {
            self.unused = false;
            self.last = *last;
            self.last_intensities = [last.intensity; 8];
            self.last_z = [last.z; 8];
            self.gps = GpsSequences::starting_at(last.gps_time);
        }

        fn compress_gps_time<W: Write>(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            gps_time: i64,
        ) -> std::io::Result<()> {
            // each pass either codes the time or switches to another sequence
            loop {
                let gps = &mut self.gps;
                let last_diff = gps.last_diff();
                let diff = diff_32(gps_time, gps.current());
                let model = if last_diff == 0 {
                    &mut self.models.gps_time_0_diff
                } else {
                    &mut self.models.gps_time_multi
                };

                match diff {
                    Some(diff) if last_diff == 0 => {
                        encoder.encode_symbol(model, 0)?;
                        self.ic_gps_time.compress(encoder, 0, diff, 0)?;
                        gps.last_gps_time_diffs[gps.last] = diff;
                        gps.multi_extreme_counters[gps.last] = 0;
                    }
                    Some(diff) => {
                        let multi = i32_quantize(diff as f32 / last_diff as f32);
                        if multi == 1 {
                            encoder.encode_symbol(model, 1)?;
                            self.ic_gps_time.compress(encoder, last_diff, diff, 1)?;
                            gps.multi_extreme_counters[gps.last] = 0;
                        } else if multi > 0 {
                            if multi < GPS_TIME_MULTI {
                                encoder.encode_symbol(model, multi as u32)?;
                                self.ic_gps_time.compress(
                                    encoder,
                                    multi.wrapping_mul(last_diff),
                                    diff,
                                    multi_context(multi),
                                )?;
                            } else {
                                encoder.encode_symbol(model, GPS_TIME_MULTI as u32)?;
                                self.ic_gps_time.compress(
                                    encoder,
                                    GPS_TIME_MULTI.wrapping_mul(last_diff),
                                    diff,
                                    4,
                                )?;
                                gps.count_extreme(diff);
                            }
                        } else if multi < 0 {
                            if multi > GPS_TIME_MULTI_MINUS {
                                encoder.encode_symbol(model, (GPS_TIME_MULTI - multi) as u32)?;
                                self.ic_gps_time.compress(
                                    encoder,
                                    multi.wrapping_mul(last_diff),
                                    diff,
                                    5,
                                )?;
                            } else {
                                encoder.encode_symbol(
                                    model,
                                    (GPS_TIME_MULTI - GPS_TIME_MULTI_MINUS) as u32,
                                )?;
                                self.ic_gps_time.compress(
                                    encoder,
                                    GPS_TIME_MULTI_MINUS.wrapping_mul(last_diff),
                                    diff,
                                    6,
                                )?;
                                gps.count_extreme(diff);
                            }
                        } else {
                            encoder.encode_symbol(model, 0)?;
                            self.ic_gps_time.compress(encoder, 0, diff, 7)?;
                            gps.count_extreme(diff);
                        }
                    }
                    None => {
                        let (full_symbol, switch_base) = if last_diff == 0 {
                            (1, 1)
                        } else {
                            (GPS_TIME_MULTI_CODE_FULL as u32, GPS_TIME_MULTI_CODE_FULL as u32)
                        };
                        if let Some(i) = gps.other_sequence(gps_time) {
                            encoder.encode_symbol(model, switch_base + i as u32)?;
                            gps.last = (gps.last + i) & 3;
                            continue;
                        }
                        encoder.encode_symbol(model, full_symbol)?;
                        self.ic_gps_time.compress(
                            encoder,
                            (gps.current() >> 32) as i32,
                            (gps_time >> 32) as i32,
                            8,
                        )?;
                        encoder.write_int(gps_time as u32)?;
                        gps.start_new_sequence(gps_time);
                    }
                }
                let gps = &mut self.gps;
                gps.last_gps_times[gps.last] = gps_time;
                return Ok(());
            }
        }
    }

    struct Point14Encoders {
        channel_returns_xy: LayerEncoder,
        z: LayerEncoder,
        classification: LayerEncoder,
        flags: LayerEncoder,
        intensity: LayerEncoder,
        scan_angle: LayerEncoder,
        user_data: LayerEncoder,
        point_source_id: LayerEncoder,
        gps_time: LayerEncoder,
    }

    impl Point14Encoders {
        fn new() -> Self {
            Self {
                channel_returns_xy: LayerEncoder::new(),
                z: LayerEncoder::new(),
                classification: LayerEncoder::new(),
                flags: LayerEncoder::new(),
                intensity: LayerEncoder::new(),
                scan_angle: LayerEncoder::new(),
                user_data: LayerEncoder::new(),
                point_source_id: LayerEncoder::new(),
                gps_time: LayerEncoder::new(),
            }
        }

        fn in_order(&mut self) -> [&mut LayerEncoder; 9] {
            [
                &mut self.channel_returns_xy,
                &mut self.z,
                &mut self.classification,
                &mut self.flags,
                &mut self.intensity,
                &mut self.scan_angle,
                &mut self.user_data,
                &mut self.point_source_id,
                &mut self.gps_time,
            ]
        }
    }

    /// Context handed to the items that follow the point.
    ///
    /// Version 3 only hands over the scanner channel on the points where it
    /// changed, version 4 always does.
    pub(super) fn forwarded_context(
        version: u16,
        context: usize,
        channel_changed: bool,
        current_context: usize,
    ) -> usize {
        if version >= 4 || channel_changed {
            current_context
        } else {
            context
        }
    }

    pub struct Point14Compressor {
        layers: Point14Encoders,
        channels: [ChannelCompressor; 4],
        current_context: usize,
        version: u16,
    }

    impl Point14Compressor {
        pub fn new(version: u16) -> Self {
            Self {
                layers: Point14Encoders::new(),
                channels: [
                    ChannelCompressor::new(),
                    ChannelCompressor::new(),
                    ChannelCompressor::new(),
                    ChannelCompressor::new(),
                ],
                current_context: 0,
                version,
            }
        }
    }

    impl<W: Write> LayeredFieldCompressor<W> for Point14Compressor {
        fn init_first_point(&mut self, first_point: &PointRecord, _context: usize) -> usize {
            let first = LastPoint::from_point(first_point);
            self.current_context = usize::from(first.scanner_channel);
            self.channels[self.current_context].init_from(&first);
            // these layers are always written
            self.layers.channel_returns_xy.set_changed(true);
            self.layers.z.set_changed(true);
            self.current_context
        }

        fn compress_with(
            &mut self,
            point: &PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            let mut current = LastPoint::from_point(point);
            let last_context = self.current_context;
            let previous = self.channels[last_context].last;
            let lpr = previous.return_context();

            let scanner_channel = usize::from(current.scanner_channel);
            let scanner_channel_change = scanner_channel != last_context;
            let last = if scanner_channel_change && !self.channels[scanner_channel].unused {
                self.channels[scanner_channel].last
            } else {
                previous
            };

            current.gps_time_change = current.gps_time != last.gps_time;
            let point_source_change = current.point_source_id != last.point_source_id;
            let scan_angle_change = current.scan_angle != last.scan_angle;

            let (r, n) = (current.return_number, current.number_of_returns);
            let (last_r, last_n) = (last.return_number, last.number_of_returns);

            let mut changed_values = (scanner_channel_change as u32) << 6
                | (point_source_change as u32) << 5
                | (current.gps_time_change as u32) << 4
                | (scan_angle_change as u32) << 3
                | ((n != last_n) as u32) << 2;
            if r != last_r {
                changed_values |= if r == (last_r + 1) % 16 {
                    1
                } else if r == (last_r + 15) % 16 {
                    2
                } else {
                    3
                };
            }

            let layers = &mut self.layers;
            {
                let models = &mut self.channels[last_context].models;
                let encoder = layers.channel_returns_xy.encoder();
                encoder.encode_symbol(&mut models.changed_values[lpr], changed_values)?;
                if scanner_channel_change {
                    let diff = (scanner_channel + 4 - last_context) % 4;
                    encoder.encode_symbol(&mut models.scanner_channel, (diff - 1) as u32)?;
                }
            }
            if scanner_channel_change {
                if self.channels[scanner_channel].unused {
                    self.channels[scanner_channel].init_from(&previous);
                }
                self.current_context = scanner_channel;
            }
            let channel = &mut self.channels[self.current_context];

            let encoder = layers.channel_returns_xy.encoder();
            if n != last_n {
                encoder.encode_symbol(channel.models.number_of_returns(last_n), u32::from(n))?;
            }
            if changed_values & 3 == 3 {
                if current.gps_time_change {
                    encoder.encode_symbol(channel.models.return_number(last_r), u32::from(r))?;
                } else {
                    let diff = i32::from(r) - i32::from(last_r);
                    let sym = if diff > 1 { diff - 2 } else { diff + 16 - 2 };
                    encoder.encode_symbol(&mut channel.models.return_number_gps_same, sym as u32)?;
                }
            }

            let ctx = ReturnContexts::new(r, n);
            let median_index = (ctx.m << 1) | current.gps_time_change as usize;

            let median = channel.last_x_diff_median5[median_index].get();
            let diff = current.x.wrapping_sub(last.x);
            channel.ic_dx.compress(encoder, median, diff, ctx.single)?;
            channel.last_x_diff_median5[median_index].add(diff);

            let k_bits = channel.ic_dx.k();
            let median = channel.last_y_diff_median5[median_index].get();
            let diff = current.y.wrapping_sub(last.y);
            channel.ic_dy.compress(encoder, median, diff, y_context(ctx.single, k_bits))?;
            channel.last_y_diff_median5[median_index].add(diff);

            let k_bits = (channel.ic_dx.k() + channel.ic_dy.k()) / 2;
            channel.ic_z.compress(
                layers.z.encoder(),
                channel.last_z[ctx.l],
                current.z,
                z_context(ctx.single, k_bits),
            )?;
            channel.last_z[ctx.l] = current.z;

            layers.classification.set_changed(current.classification != last.classification);
            layers.classification.encoder().encode_symbol(
                channel.models.classification(last.classification, ctx.cpr),
                u32::from(current.classification),
            )?;

            layers.flags.set_changed(current.flags() != last.flags());
            layers
                .flags
                .encoder()
                .encode_symbol(channel.models.flags(last.flags()), u32::from(current.flags()))?;

            let intensity_index = (ctx.cpr << 1) | current.gps_time_change as usize;
            layers.intensity.set_changed(current.intensity != last.intensity);
            channel.ic_intensity.compress(
                layers.intensity.encoder(),
                i32::from(channel.last_intensities[intensity_index]),
                i32::from(current.intensity),
                ctx.cpr as u32,
            )?;
            channel.last_intensities[intensity_index] = current.intensity;

            if scan_angle_change {
                layers.scan_angle.set_changed(true);
                channel.ic_scan_angle.compress(
                    layers.scan_angle.encoder(),
                    i32::from(last.scan_angle),
                    i32::from(current.scan_angle),
                    current.gps_time_change as u32,
                )?;
            }

            layers.user_data.set_changed(current.user_data != last.user_data);
            layers.user_data.encoder().encode_symbol(
                channel.models.user_data(last.user_data),
                u32::from(current.user_data),
            )?;

            if point_source_change {
                layers.point_source_id.set_changed(true);
                channel.ic_point_source_id.compress(
                    layers.point_source_id.encoder(),
                    i32::from(last.point_source_id),
                    i32::from(current.point_source_id),
                    0,
                )?;
            }

            if current.gps_time_change {
                layers.gps_time.set_changed(true);
                channel.compress_gps_time(layers.gps_time.encoder(), current.gps_time)?;
            }

            channel.last = current;
            Ok(forwarded_context(
                self.version,
                context,
                scanner_channel_change,
                self.current_context,
            ))
        }

        fn write_layers_sizes(&mut self, dst: &mut W) -> std::io::Result<()> {
            for layer in self.layers.in_order() {
                layer.write_size(dst)?;
            }
            Ok(())
        }

        fn write_layers(&mut self, dst: &mut W) -> std::io::Result<()> {
            for layer in self.layers.in_order() {
                layer.write_layer(dst)?;
            }
            Ok(())
        }
    }

    /***********************************************************************************************
                        Decompression
    ***********************************************************************************************/

    struct ChannelDecompressor {
        unused: bool,
        last: LastPoint,
        last_intensities: [u16; 8],
        last_x_diff_median5: [StreamingMedian<i32>; 12],
        last_y_diff_median5: [StreamingMedian<i32>; 12],
        last_z: [i32; 8],
        gps: GpsSequences,
        models: Point14Models,
        ic_dx: IntegerDecompressor,
        ic_dy: IntegerDecompressor,
        ic_z: IntegerDecompressor,
        ic_intensity: IntegerDecompressor,
        ic_scan_angle: IntegerDecompressor,
        ic_point_source_id: IntegerDecompressor,
        ic_gps_time: IntegerDecompressor,
    }

    impl ChannelDecompressor {
        fn new() -> Self {
            Self {
                unused: true,
                last: LastPoint::default(),
                last_intensities: [0; 8],
                last_x_diff_median5: [StreamingMedian::new(); 12],
                last_y_diff_median5: [StreamingMedian::new(); 12],
                last_z: [0; 8],
                gps: GpsSequences::default(),
                models: Point14Models::new(false),
                ic_dx: IntegerDecompressorBuilder::new().bits(32).contexts(2).build_initialized(),
                ic_dy: IntegerDecompressorBuilder::new().bits(32).contexts(22).build_initialized(),
                ic_z: IntegerDecompressorBuilder::new().bits(32).contexts(20).build_initialized(),
                ic_intensity: IntegerDecompressorBuilder::new()
                    .bits(16)
                    .contexts(4)
                    .build_initialized(),
                ic_scan_angle: IntegerDecompressorBuilder::new()
                    .bits(16)
                    .contexts(2)
                    .build_initialized(),
                ic_point_source_id: IntegerDecompressorBuilder::new().bits(16).build_initialized(),
                ic_gps_time: IntegerDecompressorBuilder::new()
                    .bits(32)
                    .contexts(9)
                    .build_initialized(),
            }
        }

        fn init_from(&mut self, last: &LastPoint) {
            self.unused = false;
            self.last = *last;
            self.last_intensities = [last.intensity; 8];
            self.last_z = [last.z; 8];
            self.gps = GpsSequences::starting_at(last.gps_time);
        }

        fn decompress_gps_time<R: Read>(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
        ) -> std::io::Result<i64> {
            loop {
                let gps = &mut self.gps;
                let last_diff = gps.last_diff();
                if last_diff == 0 {
                    let sym = decoder.decode_symbol(&mut self.models.gps_time_0_diff)? as usize;
                    match sym {
                        0 => {
                            let diff = self.ic_gps_time.decompress(decoder, 0, 0)?;
                            gps.add_diff(diff);
                            gps.last_gps_time_diffs[gps.last] = diff;
                            gps.multi_extreme_counters[gps.last] = 0;
                        }
                        1 => {
                            let high = self.ic_gps_time.decompress(
                                decoder,
                                (gps.current() >> 32) as i32,
                                8,
                            )?;
                            let low = decoder.read_int()?;
                            gps.start_new_sequence(i64::from(high) << 32 | i64::from(low));
                        }
                        _ => {
                            gps.last = (gps.last + sym - 1) & 3;
                            continue;
                        }
                    }
                } else {
                    let multi = decoder.decode_symbol(&mut self.models.gps_time_multi)? as i32;
                    if multi == 1 {
                        let diff = self.ic_gps_time.decompress(decoder, last_diff, 1)?;
                        gps.add_diff(diff);
                        gps.multi_extreme_counters[gps.last] = 0;
                    } else if multi < GPS_TIME_MULTI_CODE_FULL {
                        let diff = if multi == 0 {
                            let diff = self.ic_gps_time.decompress(decoder, 0, 7)?;
                            gps.count_extreme(diff);
                            diff
                        } else if multi < GPS_TIME_MULTI {
                            self.ic_gps_time.decompress(
                                decoder,
                                multi.wrapping_mul(last_diff),
                                multi_context(multi),
                            )?
                        } else if multi == GPS_TIME_MULTI {
                            let diff = self.ic_gps_time.decompress(
                                decoder,
                                GPS_TIME_MULTI.wrapping_mul(last_diff),
                                4,
                            )?;
                            gps.count_extreme(diff);
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
                                gps.count_extreme(diff);
                                diff
                            }
                        };
                        gps.add_diff(diff);
                    } else if multi == GPS_TIME_MULTI_CODE_FULL {
                        let high =
                            self.ic_gps_time
                                .decompress(decoder, (gps.current() >> 32) as i32, 8)?;
                        let low = decoder.read_int()?;
                        gps.start_new_sequence(i64::from(high) << 32 | i64::from(low));
                    } else {
                        gps.last = (gps.last + (multi - GPS_TIME_MULTI_CODE_FULL) as usize) & 3;
                        continue;
                    }
                }
                return Ok(self.gps.current());
            }
        }
    }

    struct Point14Decoders {
        channel_returns_xy: LayerDecoder,
        z: LayerDecoder,
        classification: LayerDecoder,
        flags: LayerDecoder,
        intensity: LayerDecoder,
        scan_angle: LayerDecoder,
        user_data: LayerDecoder,
        point_source_id: LayerDecoder,
        gps_time: LayerDecoder,
    }

    impl Point14Decoders {
        fn new() -> Self {
            Self {
                channel_returns_xy: LayerDecoder::new(),
                z: LayerDecoder::new(),
                classification: LayerDecoder::new(),
                flags: LayerDecoder::new(),
                intensity: LayerDecoder::new(),
                scan_angle: LayerDecoder::new(),
                user_data: LayerDecoder::new(),
                point_source_id: LayerDecoder::new(),
                gps_time: LayerDecoder::new(),
            }
        }

        fn in_order(&mut self) -> [&mut LayerDecoder; 9] {
            [
                &mut self.channel_returns_xy,
                &mut self.z,
                &mut self.classification,
                &mut self.flags,
                &mut self.intensity,
                &mut self.scan_angle,
                &mut self.user_data,
                &mut self.point_source_id,
                &mut self.gps_time,
            ]
        }
    }

    pub struct Point14Decompressor {
        layers: Point14Decoders,
        selection: DecompressionSelection,
        channels: [ChannelDecompressor; 4],
        current_context: usize,
        version: u16,
    }

    impl Point14Decompressor {
        pub fn new(version: u16, selection: DecompressionSelection) -> Self {
            Self {
                layers: Point14Decoders::new(),
                selection,
                channels: [
                    ChannelDecompressor::new(),
                    ChannelDecompressor::new(),
                    ChannelDecompressor::new(),
                    ChannelDecompressor::new(),
                ],
                current_context: 0,
                version,
            }
        }

        /// Whether each layer, in chunk order, should be decoded
        fn requested_layers(&self) -> [bool; 9] {
            let s = self.selection;
            [
                true,
                s.should_decompress_z(),
                s.should_decompress_classification(),
                s.should_decompress_flags(),
                s.should_decompress_intensity(),
                s.should_decompress_scan_angle(),
                s.should_decompress_user_data(),
                s.should_decompress_point_source_id(),
                s.should_decompress_gps_time(),
            ]
        }
    }

    impl<R: ByteSource> LayeredFieldDecompressor<R> for Point14Decompressor {
        fn init_first_point(&mut self, first_point: &mut PointRecord, _context: usize) -> usize {
            let first = LastPoint::from_point(first_point);
            self.current_context = usize::from(first.scanner_channel);
            self.channels[self.current_context].init_from(&first);
            self.current_context
        }

        fn decompress_with(
            &mut self,
            point: &mut PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            let layers = &mut self.layers;
            let last_context = self.current_context;
            let lpr = self.channels[last_context].last.return_context();

            let decoder = layers.channel_returns_xy.decoder();
            let changed_values = {
                let models = &mut self.channels[last_context].models;
                let changed_values = decoder.decode_symbol(&mut models.changed_values[lpr])?;
                if is_nth_bit_set(changed_values, 6) {
                    let diff = decoder.decode_symbol(&mut models.scanner_channel)? as usize;
                    self.current_context = (last_context + diff + 1) % 4;
                }
                changed_values
            };
            if self.current_context != last_context {
                let previous = self.channels[last_context].last;
                let channel = &mut self.channels[self.current_context];
                if channel.unused {
                    channel.init_from(&previous);
                }
            }
            let channel = &mut self.channels[self.current_context];
            let mut current = channel.last;
            current.scanner_channel = self.current_context as u8;

            let point_source_change = is_nth_bit_set(changed_values, 5);
            current.gps_time_change = is_nth_bit_set(changed_values, 4);
            let scan_angle_change = is_nth_bit_set(changed_values, 3);

            let (last_r, last_n) = (current.return_number, current.number_of_returns);
            if is_nth_bit_set(changed_values, 2) {
                current.number_of_returns =
                    decoder.decode_symbol(channel.models.number_of_returns(last_n))? as u8;
            }
            current.return_number = match changed_values & 3 {
                0 => last_r,
                1 => (last_r + 1) % 16,
                2 => (last_r + 15) % 16,
                _ => {
                    if current.gps_time_change {
                        decoder.decode_symbol(channel.models.return_number(last_r))? as u8
                    } else {
                        let sym =
                            decoder.decode_symbol(&mut channel.models.return_number_gps_same)?;
                        ((u32::from(last_r) + sym + 2) % 16) as u8
                    }
                }
            };

            let ctx = ReturnContexts::new(current.return_number, current.number_of_returns);
            let median_index = (ctx.m << 1) | current.gps_time_change as usize;

            let median = channel.last_x_diff_median5[median_index].get();
            let diff = channel.ic_dx.decompress(decoder, median, ctx.single)?;
            current.x = current.x.wrapping_add(diff);
            channel.last_x_diff_median5[median_index].add(diff);

            let k_bits = channel.ic_dx.k();
            let median = channel.last_y_diff_median5[median_index].get();
            let diff = channel
                .ic_dy
                .decompress(decoder, median, y_context(ctx.single, k_bits))?;
            current.y = current.y.wrapping_add(diff);
            channel.last_y_diff_median5[median_index].add(diff);

            if layers.z.is_active() {
                let k_bits = (channel.ic_dx.k() + channel.ic_dy.k()) / 2;
                current.z = channel.ic_z.decompress(
                    layers.z.decoder(),
                    channel.last_z[ctx.l],
                    z_context(ctx.single, k_bits),
                )?;
                channel.last_z[ctx.l] = current.z;
            }

            if layers.classification.is_active() {
                current.classification = layers.classification.decoder().decode_symbol(
                    channel.models.classification(current.classification, ctx.cpr),
                )? as u8;
            }

            if layers.flags.is_active() {
                let flags = layers
                    .flags
                    .decoder()
                    .decode_symbol(channel.models.flags(current.flags()))?;
                current.set_flags(flags as u8);
            }

            if layers.intensity.is_active() {
                let intensity_index = (ctx.cpr << 1) | current.gps_time_change as usize;
                current.intensity = channel.ic_intensity.decompress(
                    layers.intensity.decoder(),
                    i32::from(channel.last_intensities[intensity_index]),
                    ctx.cpr as u32,
                )? as u16;
                channel.last_intensities[intensity_index] = current.intensity;
            }

            if scan_angle_change && layers.scan_angle.is_active() {
                current.scan_angle = channel.ic_scan_angle.decompress(
                    layers.scan_angle.decoder(),
                    i32::from(current.scan_angle),
                    current.gps_time_change as u32,
                )? as i16;
            }

            if layers.user_data.is_active() {
                current.user_data = layers
                    .user_data
                    .decoder()
                    .decode_symbol(channel.models.user_data(current.user_data))?
                    as u8;
            }

            if point_source_change && layers.point_source_id.is_active() {
                current.point_source_id = channel.ic_point_source_id.decompress(
                    layers.point_source_id.decoder(),
                    i32::from(current.point_source_id),
                    0,
                )? as u16;
            }

            if current.gps_time_change && layers.gps_time.is_active() {
                current.gps_time = channel.decompress_gps_time(layers.gps_time.decoder())?;
            }

            current.copy_into(point);
            channel.last = current;
            Ok(forwarded_context(
                self.version,
                context,
                is_nth_bit_set(changed_values, 6),
                self.current_context,
            ))
        }

        fn read_layers_sizes(&mut self, src: &mut R) -> std::io::Result<()> {
            for layer in self.layers.in_order() {
                layer.read_size(src)?;
            }
            Ok(())
        }

        fn read_layers(&mut self, src: &mut R) -> std::io::Result<()> {
            let requested = self.requested_layers();
            for (layer, requested) in self.layers.in_order().into_iter().zip(requested) {
                layer.read_layer(requested, src)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::v3::forwarded_context;
    use crate::las::selective::DecompressionSelection;
    use crate::las::test_utils::{random_points, round_trip, round_trip_with_selection, CHUNK_SIZE};
    use crate::laszip::{LazItem, LazItemType};
    use crate::point::PointRecord;

    fn items() -> Vec<LazItem> {
        vec![LazItem::new(LazItemType::Point14, 3)]
    }

    /// Two channels of a scanner, each firing pulses of up to 3 returns
    fn scan_lines(n: usize) -> Vec<PointRecord> {
        let mut points = Vec::with_capacity(n);
        let mut gps_time = 400_000.0f64;
        for i in 0..n {
            let pulse = i / 3;
            let channel = (pulse % 2) as u8;
            let number_of_returns = 1 + (pulse % 3) as u8;
            let return_number = 1 + (i % 3) as u8;
            if return_number == 1 {
                gps_time += 0.000_01;
            }
            points.push(PointRecord {
                x: 1_000 + (pulse as i32) * 7,
                y: -3_000 + (pulse as i32 % 100) * 3,
                z: 250 - (return_number as i32) * 40,
                intensity: (100 + i % 400) as u16,
                return_number: return_number.min(number_of_returns),
                number_of_returns,
                classification: if return_number == number_of_returns { 2 } else { 5 },
                classification_flags: (i % 16 == 0) as u8,
                scanner_channel: channel,
                scan_angle: (pulse as i16 % 300) - 150,
                user_data: (i / 50) as u8,
                point_source_id: 17 + (i / 500) as u16,
                gps_time,
                scan_direction_flag: pulse % 2 == 0,
                edge_of_flight_line: pulse % 100 == 99,
                ..Default::default()
            });
        }
        points
    }

    #[test]
    fn test_point14_round_trip_random() {
        let points = random_points(&items(), 2_000, 14);
        round_trip(&items(), &points);
    }

    #[test]
    fn test_point14_round_trip_scan_lines() {
        round_trip(&items(), &scan_lines(3_000));
    }

    #[test]
    fn test_point14_version_4_round_trip_scan_lines() {
        let items = vec![LazItem::new(LazItemType::Point14, 4)];
        round_trip(&items, &scan_lines(3_000));
    }

    #[test]
    fn test_version_3_forwards_the_channel_only_when_it_changes() {
        assert_eq!(forwarded_context(3, 0, false, 2), 0);
        assert_eq!(forwarded_context(3, 0, true, 2), 2);
        assert_eq!(forwarded_context(4, 0, false, 2), 2);
        assert_eq!(forwarded_context(4, 0, true, 2), 2);
    }

    #[test]
    fn test_point14_gps_time_sequences() {
        let mut points = scan_lines(1_200);
        for (i, p) in points.iter_mut().enumerate() {
            // interleaves two distant time sequences, with some jumps and repeats
            p.gps_time = match i % 7 {
                0 | 3 => 1.0e9 + i as f64,
                5 => p.gps_time,
                6 if i % 70 == 6 => -0.0,
                _ => 2.5 + (i / 3) as f64 * 1e-4,
            };
        }
        round_trip(&items(), &points);
    }

    #[test]
    fn test_point14_skipped_layers_keep_first_values() {
        let points = scan_lines(CHUNK_SIZE * 2 + 17);
        let selection = DecompressionSelection::base().decompress_z();
        let decompressed = round_trip_with_selection(&items(), &points, selection);
        for (chunk, chunk_points) in decompressed
            .chunks(CHUNK_SIZE)
            .zip(points.chunks(CHUNK_SIZE))
        {
            let first = &chunk_points[0];
            for (decompressed, original) in chunk.iter().zip(chunk_points) {
                assert_eq!(decompressed.x, original.x);
                assert_eq!(decompressed.y, original.y);
                assert_eq!(decompressed.z, original.z);
                assert_eq!(decompressed.return_number, original.return_number);
                assert_eq!(decompressed.number_of_returns, original.number_of_returns);
                assert_eq!(decompressed.scanner_channel, original.scanner_channel);
                assert_eq!(decompressed.intensity, first.intensity);
                assert_eq!(decompressed.gps_time, first.gps_time);
                assert_eq!(decompressed.point_source_id, first.point_source_id);
            }
        }
    }
}
