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

//! Codecs of the waveform packet descriptor item.
//!
//! The offset is coded relative to the previous packet (often the
//! previous offset plus the previous size), the floating point
//! fields are predicted from their previous bit pattern.

use std::io::{Read, Write};

use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
use crate::decoders::ArithmeticDecoder;
use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
use crate::encoders::ArithmeticEncoder;
use crate::models::{ArithmeticModel, ArithmeticModelBuilder};
use crate::point::WavePacket;

const DX_CONTEXT: u32 = 0;
const DY_CONTEXT: u32 = 1;
const DZ_CONTEXT: u32 = 2;

#[inline]
fn f32_bits(v: f32) -> i32 {
    v.to_bits() as i32
}

#[inline]
fn f32_from_bits(v: i32) -> f32 {
    f32::from_bits(v as u32)
}

/// Models and last values needed to code a stream of packets
pub(crate) struct WavePacketCodecState {
    last_offset_diff: i32,
    last_sym_offset_diff: u32,
    packet_index: ArithmeticModel,
    offset_diff: [ArithmeticModel; 4],
}

impl WavePacketCodecState {
    fn new(compress: bool) -> Self {
        let offset_model = || ArithmeticModelBuilder::new(4).compress(compress).build();
        Self {
            last_offset_diff: 0,
            last_sym_offset_diff: 0,
            packet_index: ArithmeticModelBuilder::new(256).compress(compress).build(),
            offset_diff: [offset_model(), offset_model(), offset_model(), offset_model()],
        }
    }
}

pub(crate) struct WavePacketCompressorState {
    state: WavePacketCodecState,
    ic_offset_diff: IntegerCompressor,
    ic_packet_size: IntegerCompressor,
    ic_return_point: IntegerCompressor,
    ic_xyz: IntegerCompressor,
}

impl WavePacketCompressorState {
    pub(crate) fn new() -> Self {
        Self {
            state: WavePacketCodecState::new(true),
            ic_offset_diff: IntegerCompressorBuilder::new().bits(32).build_initialized(),
            ic_packet_size: IntegerCompressorBuilder::new().bits(32).build_initialized(),
            ic_return_point: IntegerCompressorBuilder::new().bits(32).build_initialized(),
            ic_xyz: IntegerCompressorBuilder::new()
                .bits(32)
                .contexts(3)
                .build_initialized(),
        }
    }

    pub(crate) fn compress<W: Write>(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        current: &WavePacket,
        last: &WavePacket,
    ) -> std::io::Result<()> {
        let state = &mut self.state;
        encoder.encode_symbol(
            &mut state.packet_index,
            u32::from(current.descriptor_index),
        )?;

        let offset_diff_64 = current.byte_offset.wrapping_sub(last.byte_offset) as i64;
        let offset_diff_32 = offset_diff_64 as i32;
        let model = &mut state.offset_diff[state.last_sym_offset_diff as usize];
        if offset_diff_64 == i64::from(offset_diff_32) {
            let sym = if offset_diff_32 == 0 {
                0
            } else if offset_diff_32 == last.packet_size as i32 {
                1
            } else {
                2
            };
            encoder.encode_symbol(model, sym)?;
            if sym == 2 {
                self.ic_offset_diff
                    .compress(encoder, state.last_offset_diff, offset_diff_32, 0)?;
                state.last_offset_diff = offset_diff_32;
            }
            state.last_sym_offset_diff = sym;
        } else {
            encoder.encode_symbol(model, 3)?;
            state.last_sym_offset_diff = 3;
            encoder.write_int64(current.byte_offset)?;
        }

        self.ic_packet_size.compress(
            encoder,
            last.packet_size as i32,
            current.packet_size as i32,
            0,
        )?;
        self.ic_return_point.compress(
            encoder,
            f32_bits(last.return_point),
            f32_bits(current.return_point),
            0,
        )?;
        self.ic_xyz
            .compress(encoder, f32_bits(last.dx), f32_bits(current.dx), DX_CONTEXT)?;
        self.ic_xyz
            .compress(encoder, f32_bits(last.dy), f32_bits(current.dy), DY_CONTEXT)?;
        self.ic_xyz
            .compress(encoder, f32_bits(last.dz), f32_bits(current.dz), DZ_CONTEXT)?;
        Ok(())
    }
}

pub(crate) struct WavePacketDecompressorState {
    state: WavePacketCodecState,
    ic_offset_diff: IntegerDecompressor,
    ic_packet_size: IntegerDecompressor,
    ic_return_point: IntegerDecompressor,
    ic_xyz: IntegerDecompressor,
}

impl WavePacketDecompressorState {
    pub(crate) fn new() -> Self {
        Self {
            state: WavePacketCodecState::new(false),
            ic_offset_diff: IntegerDecompressorBuilder::new().bits(32).build_initialized(),
            ic_packet_size: IntegerDecompressorBuilder::new().bits(32).build_initialized(),
            ic_return_point: IntegerDecompressorBuilder::new().bits(32).build_initialized(),
            ic_xyz: IntegerDecompressorBuilder::new()
                .bits(32)
                .contexts(3)
                .build_initialized(),
        }
    }

    pub(crate) fn decompress<R: Read>(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
        last: &WavePacket,
    ) -> std::io::Result<WavePacket> {
        let state = &mut self.state;
        let mut current = WavePacket {
            descriptor_index: decoder.decode_symbol(&mut state.packet_index)? as u8,
            ..WavePacket::default()
        };

        state.last_sym_offset_diff =
            decoder.decode_symbol(&mut state.offset_diff[state.last_sym_offset_diff as usize])?;
        current.byte_offset = match state.last_sym_offset_diff {
            0 => last.byte_offset,
            1 => last.byte_offset.wrapping_add(u64::from(last.packet_size)),
            2 => {
                state.last_offset_diff =
                    self.ic_offset_diff
                        .decompress(decoder, state.last_offset_diff, 0)?;
                last.byte_offset
                    .wrapping_add(i64::from(state.last_offset_diff) as u64)
            }
            _ => decoder.read_int_64()?,
        };

        current.packet_size =
            self.ic_packet_size
                .decompress(decoder, last.packet_size as i32, 0)? as u32;
        current.return_point = f32_from_bits(self.ic_return_point.decompress(
            decoder,
            f32_bits(last.return_point),
            0,
        )?);
        current.dx = f32_from_bits(self.ic_xyz.decompress(
            decoder,
            f32_bits(last.dx),
            DX_CONTEXT,
        )?);
        current.dy = f32_from_bits(self.ic_xyz.decompress(
            decoder,
            f32_bits(last.dy),
            DY_CONTEXT,
        )?);
        current.dz = f32_from_bits(self.ic_xyz.decompress(
            decoder,
            f32_bits(last.dz),
            DZ_CONTEXT,
        )?);
        Ok(current)
    }
}

pub mod v1 {
    use std::io::{Read, Write};

    use crate::decoders::ArithmeticDecoder;
    use crate::encoders::ArithmeticEncoder;
    use crate::point::{PointRecord, WavePacket};
    use crate::record::{FieldCompressor, FieldDecompressor};

    use super::{WavePacketCompressorState, WavePacketDecompressorState};

    pub struct WavePacketCompressor {
        last: WavePacket,
        state: WavePacketCompressorState,
    }

    impl Default for WavePacketCompressor {
        fn default() -> Self {
            Self {
                last: WavePacket::default(),
                state: WavePacketCompressorState::new(),
            }
        }
    }

    impl<W: Write> FieldCompressor<W> for WavePacketCompressor {
        fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize {
            self.last = first_point.wave_packet;
            context
        }

        fn compress_with(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            point: &PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            self.state.compress(encoder, &point.wave_packet, &self.last)?;
            self.last = point.wave_packet;
            Ok(context)
        }
    }

    pub struct WavePacketDecompressor {
        last: WavePacket,
        state: WavePacketDecompressorState,
    }

    impl Default for WavePacketDecompressor {
        fn default() -> Self {
            Self {
                last: WavePacket::default(),
                state: WavePacketDecompressorState::new(),
            }
        }
    }

    impl<R: Read> FieldDecompressor<R> for WavePacketDecompressor {
        fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize {
            self.last = first_point.wave_packet;
            context
        }

        fn decompress_with(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            point: &mut PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            self.last = self.state.decompress(decoder, &self.last)?;
            point.wave_packet = self.last;
            Ok(context)
        }
    }
}

/// The version 2 of the legacy item did not change the coding
pub use v1 as v2;

pub mod v3 {
    //! Coding of the version 1, into its own layer with one state
    //! per scanner channel context.
    use std::io::Write;

    use crate::io::ByteSource;
    use crate::las::selective::DecompressionSelection;
    use crate::las::utils::ContextSwitch;
    use crate::layers::{LayerDecoder, LayerEncoder};
    use crate::point::{PointRecord, WavePacket};
    use crate::record::{LayeredFieldCompressor, LayeredFieldDecompressor};

    use super::{WavePacketCompressorState, WavePacketDecompressorState};

    pub struct WavePacketCompressor {
        layer: LayerEncoder,
        states: [WavePacketCompressorState; 4],
        last_packets: [WavePacket; 4],
        contexts: ContextSwitch,
    }

    impl Default for WavePacketCompressor {
        fn default() -> Self {
            Self {
                layer: LayerEncoder::new(),
                states: [
                    WavePacketCompressorState::new(),
                    WavePacketCompressorState::new(),
                    WavePacketCompressorState::new(),
                    WavePacketCompressorState::new(),
                ],
                last_packets: [WavePacket::default(); 4],
                contexts: ContextSwitch::new(0),
            }
        }
    }

    impl<W: Write> LayeredFieldCompressor<W> for WavePacketCompressor {
        fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize {
            self.contexts = ContextSwitch::new(context);
            self.last_packets[context] = first_point.wave_packet;
            context
        }

        fn compress_with(&mut self, point: &PointRecord, context: usize) -> std::io::Result<usize> {
            let last_index = self.contexts.switch_to(context, &mut self.last_packets);
            let last = &mut self.last_packets[last_index];
            if *last != point.wave_packet {
                self.layer.set_changed(true);
            }
            self.states[context].compress(self.layer.encoder(), &point.wave_packet, last)?;
            *last = point.wave_packet;
            Ok(context)
        }

        fn write_layers_sizes(&mut self, dst: &mut W) -> std::io::Result<()> {
            self.layer.write_size(dst)
        }

        fn write_layers(&mut self, dst: &mut W) -> std::io::Result<()> {
            self.layer.write_layer(dst)
        }
    }

    pub struct WavePacketDecompressor {
        layer: LayerDecoder,
        requested: bool,
        states: [WavePacketDecompressorState; 4],
        last_packets: [WavePacket; 4],
        contexts: ContextSwitch,
    }

    impl WavePacketDecompressor {
        pub fn new(selection: DecompressionSelection) -> Self {
            Self {
                layer: LayerDecoder::new(),
                requested: selection.should_decompress_wavepacket(),
                states: [
                    WavePacketDecompressorState::new(),
                    WavePacketDecompressorState::new(),
                    WavePacketDecompressorState::new(),
                    WavePacketDecompressorState::new(),
                ],
                last_packets: [WavePacket::default(); 4],
                contexts: ContextSwitch::new(0),
            }
        }
    }

    impl<R: ByteSource> LayeredFieldDecompressor<R> for WavePacketDecompressor {
        fn init_first_point(&mut self, first_point: &mut PointRecord, context: usize) -> usize {
            self.contexts = ContextSwitch::new(context);
            self.last_packets[context] = first_point.wave_packet;
            context
        }

        fn decompress_with(
            &mut self,
            point: &mut PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            let last_index = self.contexts.switch_to(context, &mut self.last_packets);
            let last = &mut self.last_packets[last_index];
            if self.layer.is_active() {
                *last = self.states[context].decompress(self.layer.decoder(), last)?;
            }
            point.wave_packet = *last;
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
