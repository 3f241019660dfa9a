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

//! Codecs of the RGB color item, for the legacy (RGB12) and the
//! extended (RGB14) point formats.

use crate::las::utils::{lower_byte_changed, upper_byte_changed};
use crate::point::Rgb;

/// Bit set of the color bytes that changed since the last point.
///
/// Bits 0 to 5 are the lower and upper bytes of red, green and blue.
/// Bit 6 is set when green or blue differ from red.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct ColorDiff(u8);

impl ColorDiff {
    fn between(current: &Rgb, last: &Rgb) -> Self {
        let v = (lower_byte_changed(last.red, current.red) as u8)
            | (upper_byte_changed(last.red, current.red) as u8) << 1
            | (lower_byte_changed(last.green, current.green) as u8) << 2
            | (upper_byte_changed(last.green, current.green) as u8) << 3
            | (lower_byte_changed(last.blue, current.blue) as u8) << 4
            | (upper_byte_changed(last.blue, current.blue) as u8) << 5
            | ((current.red != current.green || current.red != current.blue) as u8) << 6;
        Self(v)
    }

    /// Only compares the bytes, bit 6 is left unset
    fn bytes_between(current: &Rgb, last: &Rgb) -> Self {
        Self(Self::between(current, last).0 & 0x3F)
    }

    #[inline]
    fn is_set(self, bit: u8) -> bool {
        self.0 & (1 << bit) != 0
    }

    fn lower_red_changed(self) -> bool {
        self.is_set(0)
    }

    fn upper_red_changed(self) -> bool {
        self.is_set(1)
    }

    fn lower_green_changed(self) -> bool {
        self.is_set(2)
    }

    fn upper_green_changed(self) -> bool {
        self.is_set(3)
    }

    fn lower_blue_changed(self) -> bool {
        self.is_set(4)
    }

    fn upper_blue_changed(self) -> bool {
        self.is_set(5)
    }

    fn colors_differ(self) -> bool {
        self.is_set(6)
    }
}

pub mod v1 {
    //! Each byte of the three components is coded on its own
    //! with the integer compressor, using the previous byte as prediction.
    //! A symbol telling which bytes changed comes first.
    use std::io::{Read, Write};

    use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
    use crate::decoders::ArithmeticDecoder;
    use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
    use crate::encoders::ArithmeticEncoder;
    use crate::las::utils::{lower_byte, upper_byte};
    use crate::models::{ArithmeticModel, ArithmeticModelBuilder};
    use crate::point::{PointRecord, Rgb};
    use crate::record::{FieldCompressor, FieldDecompressor};

    use super::ColorDiff;

    /// The 6 color bytes in memory order: lower red, upper red, lower green...
    fn color_bytes(rgb: &Rgb) -> [u8; 6] {
        [
            lower_byte(rgb.red),
            upper_byte(rgb.red),
            lower_byte(rgb.green),
            upper_byte(rgb.green),
            lower_byte(rgb.blue),
            upper_byte(rgb.blue),
        ]
    }

    fn from_color_bytes(bytes: [u8; 6]) -> Rgb {
        Rgb {
            red: u16::from_le_bytes([bytes[0], bytes[1]]),
            green: u16::from_le_bytes([bytes[2], bytes[3]]),
            blue: u16::from_le_bytes([bytes[4], bytes[5]]),
        }
    }

    pub struct RgbCompressor {
        last: Rgb,
        byte_used: ArithmeticModel,
        ic_rgb: IntegerCompressor,
    }

    impl Default for RgbCompressor {
        fn default() -> Self {
            Self {
                last: Rgb::default(),
                byte_used: ArithmeticModelBuilder::new(64).compress(true).build(),
                // one context per color byte
                ic_rgb: IntegerCompressorBuilder::new()
                    .bits(8)
                    .contexts(6)
                    .build_initialized(),
            }
        }
    }

    impl<W: Write> FieldCompressor<W> for RgbCompressor {
        fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize {
            self.last = first_point.rgb;
            context
        }

        fn compress_with(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            point: &PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            let diff = ColorDiff::bytes_between(&point.rgb, &self.last);
            encoder.encode_symbol(&mut self.byte_used, u32::from(diff.0))?;

            let last_bytes = color_bytes(&self.last);
            let current_bytes = color_bytes(&point.rgb);
            for (i, (last, current)) in last_bytes.iter().zip(current_bytes.iter()).enumerate() {
                if diff.is_set(i as u8) {
                    self.ic_rgb.compress(
                        encoder,
                        i32::from(*last),
                        i32::from(*current),
                        i as u32,
                    )?;
                }
            }
            self.last = point.rgb;
            Ok(context)
        }
    }

    pub struct RgbDecompressor {
        last: Rgb,
        byte_used: ArithmeticModel,
        ic_rgb: IntegerDecompressor,
    }

    impl Default for RgbDecompressor {
        fn default() -> Self {
            Self {
                last: Rgb::default(),
                byte_used: ArithmeticModelBuilder::new(64).build(),
                ic_rgb: IntegerDecompressorBuilder::new()
                    .bits(8)
                    .contexts(6)
                    .build_initialized(),
            }
        }
    }

    impl<R: Read> FieldDecompressor<R> for RgbDecompressor {
        fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize {
            self.last = first_point.rgb;
            context
        }

        fn decompress_with(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            point: &mut PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            let diff = ColorDiff(decoder.decode_symbol(&mut self.byte_used)? as u8);
            let mut bytes = color_bytes(&self.last);
            for (i, byte) in bytes.iter_mut().enumerate() {
                if diff.is_set(i as u8) {
                    *byte = self
                        .ic_rgb
                        .decompress(decoder, i32::from(*byte), i as u32)?
                        as u8;
                }
            }
            self.last = from_color_bytes(bytes);
            point.rgb = self.last;
            Ok(context)
        }
    }
}

pub mod v2 {
    //! The bytes that changed are coded as differences, green and blue
    //! being predicted from how much red moved.
    use std::io::{Read, Write};

    use crate::decoders::ArithmeticDecoder;
    use crate::encoders::ArithmeticEncoder;
    use crate::las::utils::{lower_byte, u8_clamp, u8_fold, upper_byte};
    use crate::models::{ArithmeticModel, ArithmeticModelBuilder};
    use crate::point::{PointRecord, Rgb};
    use crate::record::{FieldCompressor, FieldDecompressor};

    use super::ColorDiff;

    pub(crate) struct RgbModels {
        byte_used: ArithmeticModel,
        lower_red: ArithmeticModel,
        upper_red: ArithmeticModel,
        lower_green: ArithmeticModel,
        upper_green: ArithmeticModel,
        lower_blue: ArithmeticModel,
        upper_blue: ArithmeticModel,
    }

    impl RgbModels {
        pub(crate) fn new(compress: bool) -> Self {
            let byte_model = || ArithmeticModelBuilder::new(256).compress(compress).build();
            Self {
                byte_used: ArithmeticModelBuilder::new(128).compress(compress).build(),
                lower_red: byte_model(),
                upper_red: byte_model(),
                lower_green: byte_model(),
                upper_green: byte_model(),
                lower_blue: byte_model(),
                upper_blue: byte_model(),
            }
        }
    }

    /// Codes `current` against `last`, returns the symbol of changed bytes
    pub(crate) fn compress_rgb_using<W: Write>(
        encoder: &mut ArithmeticEncoder<W>,
        models: &mut RgbModels,
        current: &Rgb,
        last: &Rgb,
    ) -> std::io::Result<ColorDiffSymbol> {
        let diff = ColorDiff::between(current, last);
        encoder.encode_symbol(&mut models.byte_used, u32::from(diff.0))?;

        let mut diff_l = 0i32;
        let mut diff_h = 0i32;
        if diff.lower_red_changed() {
            diff_l = i32::from(lower_byte(current.red)) - i32::from(lower_byte(last.red));
            encoder.encode_symbol(&mut models.lower_red, u32::from(u8_fold(diff_l)))?;
        }
        if diff.upper_red_changed() {
            diff_h = i32::from(upper_byte(current.red)) - i32::from(upper_byte(last.red));
            encoder.encode_symbol(&mut models.upper_red, u32::from(u8_fold(diff_h)))?;
        }

        if diff.colors_differ() {
            if diff.lower_green_changed() {
                let corr = i32::from(lower_byte(current.green))
                    - i32::from(u8_clamp(diff_l + i32::from(lower_byte(last.green))));
                encoder.encode_symbol(&mut models.lower_green, u32::from(u8_fold(corr)))?;
            }
            if diff.lower_blue_changed() {
                diff_l = (diff_l + i32::from(lower_byte(current.green))
                    - i32::from(lower_byte(last.green)))
                    / 2;
                let corr = i32::from(lower_byte(current.blue))
                    - i32::from(u8_clamp(diff_l + i32::from(lower_byte(last.blue))));
                encoder.encode_symbol(&mut models.lower_blue, u32::from(u8_fold(corr)))?;
            }
            if diff.upper_green_changed() {
                let corr = i32::from(upper_byte(current.green))
                    - i32::from(u8_clamp(diff_h + i32::from(upper_byte(last.green))));
                encoder.encode_symbol(&mut models.upper_green, u32::from(u8_fold(corr)))?;
            }
            if diff.upper_blue_changed() {
                diff_h = (diff_h + i32::from(upper_byte(current.green))
                    - i32::from(upper_byte(last.green)))
                    / 2;
                let corr = i32::from(upper_byte(current.blue))
                    - i32::from(u8_clamp(diff_h + i32::from(upper_byte(last.blue))));
                encoder.encode_symbol(&mut models.upper_blue, u32::from(u8_fold(corr)))?;
            }
        }
        Ok(ColorDiffSymbol(diff.0))
    }

    pub(crate) fn decompress_rgb_using<R: Read>(
        decoder: &mut ArithmeticDecoder<R>,
        models: &mut RgbModels,
        last: &Rgb,
    ) -> std::io::Result<Rgb> {
        let diff = ColorDiff(decoder.decode_symbol(&mut models.byte_used)? as u8);
        let mut rgb = Rgb::default();

        let lower_red = if diff.lower_red_changed() {
            let corr = decoder.decode_symbol(&mut models.lower_red)? as u8;
            corr.wrapping_add(lower_byte(last.red))
        } else {
            lower_byte(last.red)
        };
        let upper_red = if diff.upper_red_changed() {
            let corr = decoder.decode_symbol(&mut models.upper_red)? as u8;
            corr.wrapping_add(upper_byte(last.red))
        } else {
            upper_byte(last.red)
        };
        rgb.red = u16::from_le_bytes([lower_red, upper_red]);

        if !diff.colors_differ() {
            rgb.green = rgb.red;
            rgb.blue = rgb.red;
            return Ok(rgb);
        }

        let mut diff_l = i32::from(lower_red) - i32::from(lower_byte(last.red));
        let lower_green = if diff.lower_green_changed() {
            let corr = decoder.decode_symbol(&mut models.lower_green)? as u8;
            corr.wrapping_add(u8_clamp(diff_l + i32::from(lower_byte(last.green))))
        } else {
            lower_byte(last.green)
        };
        let lower_blue = if diff.lower_blue_changed() {
            let corr = decoder.decode_symbol(&mut models.lower_blue)? as u8;
            diff_l = (diff_l + i32::from(lower_green) - i32::from(lower_byte(last.green))) / 2;
            corr.wrapping_add(u8_clamp(diff_l + i32::from(lower_byte(last.blue))))
        } else {
            lower_byte(last.blue)
        };

        let mut diff_h = i32::from(upper_red) - i32::from(upper_byte(last.red));
        let upper_green = if diff.upper_green_changed() {
            let corr = decoder.decode_symbol(&mut models.upper_green)? as u8;
            corr.wrapping_add(u8_clamp(diff_h + i32::from(upper_byte(last.green))))
        } else {
            upper_byte(last.green)
        };
        let upper_blue = if diff.upper_blue_changed() {
            let corr = decoder.decode_symbol(&mut models.upper_blue)? as u8;
            diff_h = (diff_h + i32::from(upper_green) - i32::from(upper_byte(last.green))) / 2;
            corr.wrapping_add(u8_clamp(diff_h + i32::from(upper_byte(last.blue))))
        } else {
            upper_byte(last.blue)
        };

        rgb.green = u16::from_le_bytes([lower_green, upper_green]);
        rgb.blue = u16::from_le_bytes([lower_blue, upper_blue]);
        Ok(rgb)
    }

    /// Symbol written by [`compress_rgb_using`]
    #[derive(Debug, Copy, Clone)]
    pub(crate) struct ColorDiffSymbol(u8);

    impl ColorDiffSymbol {
        /// True if any byte of the color changed
        pub(crate) fn has_changes(self) -> bool {
            self.0 & 0x3F != 0
        }
    }

    pub struct RgbCompressor {
        last: Rgb,
        models: RgbModels,
    }

    impl Default for RgbCompressor {
        fn default() -> Self {
            Self {
                last: Rgb::default(),
                models: RgbModels::new(true),
            }
        }
    }

    impl<W: Write> FieldCompressor<W> for RgbCompressor {
        fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize {
            self.last = first_point.rgb;
            context
        }

        fn compress_with(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            point: &PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            compress_rgb_using(encoder, &mut self.models, &point.rgb, &self.last)?;
            self.last = point.rgb;
            Ok(context)
        }
    }

    pub struct RgbDecompressor {
        last: Rgb,
        models: RgbModels,
    }

    impl Default for RgbDecompressor {
        fn default() -> Self {
            Self {
                last: Rgb::default(),
                models: RgbModels::new(false),
            }
        }
    }

    impl<R: Read> FieldDecompressor<R> for RgbDecompressor {
        fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize {
            self.last = first_point.rgb;
            context
        }

        fn decompress_with(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            point: &mut PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            self.last = decompress_rgb_using(decoder, &mut self.models, &self.last)?;
            point.rgb = self.last;
            Ok(context)
        }
    }
}

pub mod v3 {
    //! Same coding as the version 2, but written into its own layer
    //! and with one set of models per scanner channel context.
    use std::io::Write;

    use crate::io::ByteSource;
    use crate::las::selective::DecompressionSelection;
    use crate::las::utils::ContextSwitch;
    use crate::layers::{LayerDecoder, LayerEncoder};
    use crate::point::{PointRecord, Rgb};
    use crate::record::{LayeredFieldCompressor, LayeredFieldDecompressor};

    use super::v2::{compress_rgb_using, decompress_rgb_using, RgbModels};

    pub struct RgbCompressor {
        layer: LayerEncoder,
        models: [RgbModels; 4],
        last_rgbs: [Rgb; 4],
        contexts: ContextSwitch,
    }

    impl Default for RgbCompressor {
        fn default() -> Self {
            Self {
                layer: LayerEncoder::new(),
                models: [
                    RgbModels::new(true),
                    RgbModels::new(true),
                    RgbModels::new(true),
                    RgbModels::new(true),
                ],
                last_rgbs: [Rgb::default(); 4],
                contexts: ContextSwitch::new(0),
            }
        }
    }

    impl RgbCompressor {
        pub(crate) fn init_rgb(&mut self, rgb: Rgb, context: usize) {
            self.contexts = ContextSwitch::new(context);
            self.last_rgbs[context] = rgb;
        }

        pub(crate) fn compress_rgb(&mut self, rgb: &Rgb, context: usize) -> std::io::Result<()> {
            let last_index = self.contexts.switch_to(context, &mut self.last_rgbs);
            let last = &mut self.last_rgbs[last_index];
            let sym = compress_rgb_using(
                self.layer.encoder(),
                &mut self.models[context],
                rgb,
                last,
            )?;
            self.layer.set_changed(sym.has_changes());
            *last = *rgb;
            Ok(())
        }

        pub(crate) fn layer(&mut self) -> &mut LayerEncoder {
            &mut self.layer
        }
    }

    impl<W: Write> LayeredFieldCompressor<W> for RgbCompressor {
        fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize {
            self.init_rgb(first_point.rgb, context);
            context
        }

        fn compress_with(&mut self, point: &PointRecord, context: usize) -> std::io::Result<usize> {
            self.compress_rgb(&point.rgb, context)?;
            Ok(context)
        }

        fn write_layers_sizes(&mut self, dst: &mut W) -> std::io::Result<()> {
            self.layer.write_size(dst)
        }

        fn write_layers(&mut self, dst: &mut W) -> std::io::Result<()> {
            self.layer.write_layer(dst)
        }
    }

    pub struct RgbDecompressor {
        layer: LayerDecoder,
        requested: bool,
        models: [RgbModels; 4],
        last_rgbs: [Rgb; 4],
        contexts: ContextSwitch,
    }

    impl RgbDecompressor {
        pub fn new(selection: DecompressionSelection) -> Self {
            Self {
                layer: LayerDecoder::new(),
                requested: selection.should_decompress_rgb(),
                models: [
                    RgbModels::new(false),
                    RgbModels::new(false),
                    RgbModels::new(false),
                    RgbModels::new(false),
                ],
                last_rgbs: [Rgb::default(); 4],
                contexts: ContextSwitch::new(0),
            }
        }

        pub(crate) fn init_rgb(&mut self, rgb: Rgb, context: usize) {
            self.contexts = ContextSwitch::new(context);
            self.last_rgbs[context] = rgb;
        }

        pub(crate) fn decompress_rgb(&mut self, context: usize) -> std::io::Result<Rgb> {
            let last_index = self.contexts.switch_to(context, &mut self.last_rgbs);
            if self.layer.is_active() {
                let last = &mut self.last_rgbs[last_index];
                *last = decompress_rgb_using(
                    self.layer.decoder(),
                    &mut self.models[context],
                    last,
                )?;
                Ok(*last)
            } else {
                Ok(self.last_rgbs[last_index])
            }
        }

        pub(crate) fn layer(&mut self) -> &mut LayerDecoder {
            &mut self.layer
        }

        pub(crate) fn is_requested(&self) -> bool {
            self.requested
        }
    }

    impl<R: ByteSource> LayeredFieldDecompressor<R> for RgbDecompressor {
        fn init_first_point(&mut self, first_point: &mut PointRecord, context: usize) -> usize {
            self.init_rgb(first_point.rgb, context);
            context
        }

        fn decompress_with(
            &mut self,
            point: &mut PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            point.rgb = self.decompress_rgb(context)?;
            Ok(context)
        }

        fn read_layers_sizes(&mut self, src: &mut R) -> std::io::Result<()> {
            self.layer.read_size(src)
        }

        fn read_layers(&mut self, src: &mut R) -> std::io::Result<()> {
            self.layer.read_layer(self.requested, src)?;
            Ok(())
        }
    }
}
