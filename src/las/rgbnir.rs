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

//! Codec of the RGBNIR14 item: the color and the near infrared
//! channel are coded into two separate layers, which can be
//! selected independently when decompressing.

pub mod v3 {
    use std::io::Write;

    use crate::io::ByteSource;
    use crate::las::nir::v3::{NirCompressor, NirDecompressor};
    use crate::las::rgb::v3::{RgbCompressor, RgbDecompressor};
    use crate::las::selective::DecompressionSelection;
    use crate::point::PointRecord;
    use crate::record::{LayeredFieldCompressor, LayeredFieldDecompressor};

    #[derive(Default)]
    pub struct RgbNirCompressor {
        rgb: RgbCompressor,
        nir: NirCompressor,
    }

    impl<W: Write> LayeredFieldCompressor<W> for RgbNirCompressor {
        fn init_first_point(&mut self, first_point: &PointRecord, context: usize) -> usize {
            self.rgb.init_rgb(first_point.rgb, context);
            self.nir.init_first_nir(first_point.nir, context);
            context
        }

        fn compress_with(&mut self, point: &PointRecord, context: usize) -> std::io::Result<usize> {
            self.rgb.compress_rgb(&point.rgb, context)?;
            self.nir.compress_nir(point.nir, context)?;
            Ok(context)
        }

        fn write_layers_sizes(&mut self, dst: &mut W) -> std::io::Result<()> {
            self.rgb.layer().write_size(dst)?;
            self.nir.write_layer_size(dst)
        }

        fn write_layers(&mut self, dst: &mut W) -> std::io::Result<()> {
            self.rgb.layer().write_layer(dst)?;
            self.nir.write_layer(dst)
        }
    }

    pub struct RgbNirDecompressor {
        rgb: RgbDecompressor,
        nir: NirDecompressor,
    }

    impl RgbNirDecompressor {
        pub fn new(selection: DecompressionSelection) -> Self {
            Self {
                rgb: RgbDecompressor::new(selection),
                nir: NirDecompressor::new(selection),
            }
        }
    }

    impl<R: ByteSource> LayeredFieldDecompressor<R> for RgbNirDecompressor {
        fn init_first_point(&mut self, first_point: &mut PointRecord, context: usize) -> usize {
            self.rgb.init_rgb(first_point.rgb, context);
            self.nir.init_first_nir(first_point.nir, context);
            context
        }

        fn decompress_with(
            &mut self,
            point: &mut PointRecord,
            context: usize,
        ) -> std::io::Result<usize> {
            point.rgb = self.rgb.decompress_rgb(context)?;
            point.nir = self.nir.decompress_nir(context)?;
            Ok(context)
        }

        fn read_layers_sizes(&mut self, src: &mut R) -> std::io::Result<()> {
            self.rgb.layer().read_size(src)?;
            self.nir.read_layer_size(src)
        }

        fn read_layers(&mut self, src: &mut R) -> std::io::Result<()> {
            let requested = self.rgb.is_requested();
            self.rgb.layer().read_layer(requested, src)?;
            self.nir.read_layer(src)
        }
    }
}
