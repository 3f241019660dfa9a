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

//! Codec of the near infrared channel of the extended point formats.
//!
//! There is no standalone NIR item, the channel is only coded as
//! the second layer of the RGBNIR14 item.

pub mod v3 {
    use std::io::Write;

    use crate::io::ByteSource;
    use crate::las::selective::DecompressionSelection;
    use crate::las::utils::{
        lower_byte, lower_byte_changed, u8_fold, upper_byte, upper_byte_changed, ContextSwitch,
    };
    use crate::layers::{LayerDecoder, LayerEncoder};
    use crate::models::{ArithmeticModel, ArithmeticModelBuilder};

    struct NirModels {
        bytes_used: ArithmeticModel,
        diff_lower: ArithmeticModel,
        diff_upper: ArithmeticModel,
    }

    impl NirModels {
        fn new(compress: bool) -> Self {
            Self {
                bytes_used: ArithmeticModelBuilder::new(4).compress(compress).build(),
                diff_lower: ArithmeticModelBuilder::new(256).compress(compress).build(),
                diff_upper: ArithmeticModelBuilder::new(256).compress(compress).build(),
            }
        }

        fn for_contexts(compress: bool) -> [Self; 4] {
            [
                Self::new(compress),
                Self::new(compress),
                Self::new(compress),
                Self::new(compress),
            ]
        }
    }

    pub struct NirCompressor {
        layer: LayerEncoder,
        models: [NirModels; 4],
        last_nirs: [u16; 4],
        contexts: ContextSwitch,
    }

    impl Default for NirCompressor {
        fn default() -> Self {
            Self {
                layer: LayerEncoder::new(),
                models: NirModels::for_contexts(true),
                last_nirs: [0; 4],
                contexts: ContextSwitch::new(0),
            }
        }
    }

    impl NirCompressor {
        pub fn init_first_nir(&mut self, nir: u16, context: usize) {
            self.contexts = ContextSwitch::new(context);
            self.last_nirs[context] = nir;
        }

        pub fn compress_nir(&mut self, nir: u16, context: usize) -> std::io::Result<()> {
            let last_index = self.contexts.switch_to(context, &mut self.last_nirs);
            let last = self.last_nirs[last_index];
            let models = &mut self.models[context];
            let encoder = self.layer.encoder();

            let sym = (lower_byte_changed(last, nir) as u32)
                | (upper_byte_changed(last, nir) as u32) << 1;
            encoder.encode_symbol(&mut models.bytes_used, sym)?;
            if sym & 1 != 0 {
                let diff = i32::from(lower_byte(nir)) - i32::from(lower_byte(last));
                encoder.encode_symbol(&mut models.diff_lower, u32::from(u8_fold(diff)))?;
            }
            if sym & 2 != 0 {
                let diff = i32::from(upper_byte(nir)) - i32::from(upper_byte(last));
                encoder.encode_symbol(&mut models.diff_upper, u32::from(u8_fold(diff)))?;
            }
            self.layer.set_changed(sym != 0);
            self.last_nirs[last_index] = nir;
            Ok(())
        }

        pub fn write_layer_size<W: Write>(&mut self, dst: &mut W) -> std::io::Result<()> {
            self.layer.write_size(dst)
        }

        pub fn write_layer<W: Write>(&mut self, dst: &mut W) -> std::io::Result<()> {
            self.layer.write_layer(dst)
        }
    }

    pub struct NirDecompressor {
        layer: LayerDecoder,
        requested: bool,
        models: [NirModels; 4],
        last_nirs: [u16; 4],
        contexts: ContextSwitch,
    }

    impl NirDecompressor {
        pub fn new(selection: DecompressionSelection) -> Self {
            Self {
                layer: LayerDecoder::new(),
                requested: selection.should_decompress_nir(),
                models: NirModels::for_contexts(false),
                last_nirs: [0; 4],
                contexts: ContextSwitch::new(0),
            }
        }

        pub fn init_first_nir(&mut self, nir: u16, context: usize) {
            self.contexts = ContextSwitch::new(context);
            self.last_nirs[context] = nir;
        }

        pub fn decompress_nir(&mut self, context: usize) -> std::io::Result<u16> {
            let last_index = self.contexts.switch_to(context, &mut self.last_nirs);
            let last = self.last_nirs[last_index];
            if !self.layer.is_active() {
                return Ok(last);
            }

            let models = &mut self.models[context];
            let decoder = self.layer.decoder();
            let sym = decoder.decode_symbol(&mut models.bytes_used)?;
            let lower = if sym & 1 != 0 {
                let corr = decoder.decode_symbol(&mut models.diff_lower)? as u8;
                corr.wrapping_add(lower_byte(last))
            } else {
                lower_byte(last)
            };
            let upper = if sym & 2 != 0 {
                let corr = decoder.decode_symbol(&mut models.diff_upper)? as u8;
                corr.wrapping_add(upper_byte(last))
            } else {
                upper_byte(last)
            };
            let nir = u16::from_le_bytes([lower, upper]);
            self.last_nirs[last_index] = nir;
            Ok(nir)
        }

        pub fn read_layer_size<R: ByteSource>(&mut self, src: &mut R) -> std::io::Result<()> {
            self.layer.read_size(src)
        }

        pub fn read_layer<R: ByteSource>(&mut self, src: &mut R) -> std::io::Result<()> {
            self.layer.read_layer(self.requested, src)?;
            Ok(())
        }
    }

}
