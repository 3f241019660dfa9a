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

//! Maps the items and compressor of a LAZ header to the codecs handling them.
//!
//! The registries are plain maps from `(item type, version)` and from
//! compressor ids to constructor functions, the [`standard`] ones know
//! every codec of this crate.
//!
//! [`standard`]: CompressorRegistry::standard
use std::collections::HashMap;
use std::io::{Read, Write};

use crate::errors::FormatError;
use crate::io::ByteSource;
use crate::las::selective::DecompressionSelection;
use crate::las::{extra_bytes, gps, point10, point14, rgb, rgbnir, wavepacket};
use crate::laszip::{CompressorType, LazItem, LazItemType};
use crate::point::PointLayout;
use crate::record::{
    FieldCompressor, FieldCompressorCtor, FieldDecompressor, FieldDecompressorCtor,
    LayeredFieldCompressor, LayeredFieldCompressorCtor, LayeredFieldDecompressor,
    LayeredFieldDecompressorCtor, LayeredPointRecordCompressor, LayeredPointRecordDecompressor,
    RecordCompressor, RecordDecompressor, SequentialPointRecordCompressor,
    SequentialPointRecordDecompressor,
};

pub type RecordCompressorCtor<'a, W> = fn(
    &CompressorRegistry<'a, W>,
    W,
    PointLayout,
) -> crate::Result<Box<dyn RecordCompressor<W> + 'a>>;

pub type RecordDecompressorCtor<'a, R> = fn(
    &DecompressorRegistry<'a, R>,
    R,
    PointLayout,
    DecompressionSelection,
) -> crate::Result<Box<dyn RecordDecompressor<R> + 'a>>;

type ItemKey = (u16, u16);

fn key_of(item: &LazItem) -> ItemKey {
    (item.item_type().id(), item.version())
}

fn unsupported_item(item: &LazItem) -> FormatError {
    FormatError::UnsupportedLazItemVersion(item.item_type(), item.version())
}

// Versions 3 and 4 of the extended items share the same codecs,
// only Point14 tells them apart
const LAYERED_VERSIONS: [u16; 2] = [3, 4];

macro_rules! field_codec_ctors {
    ($compressor_fn:ident, $decompressor_fn:ident, $compressor:ty, $decompressor:ty) => {
        fn $compressor_fn<W: Write>(_item: &LazItem) -> Box<dyn FieldCompressor<W>> {
            Box::new(<$compressor as Default>::default())
        }

        fn $decompressor_fn<R: Read>(_item: &LazItem) -> Box<dyn FieldDecompressor<R>> {
            Box::new(<$decompressor as Default>::default())
        }
    };
}

macro_rules! layered_codec_ctors {
    ($compressor_fn:ident, $decompressor_fn:ident, $compressor:ty, $decompressor:ty) => {
        fn $compressor_fn<W: Write>(_item: &LazItem) -> Box<dyn LayeredFieldCompressor<W>> {
            Box::new(<$compressor as Default>::default())
        }

        fn $decompressor_fn<R: ByteSource>(
            _item: &LazItem,
            selection: DecompressionSelection,
        ) -> Box<dyn LayeredFieldDecompressor<R>> {
            Box::new(<$decompressor>::new(selection))
        }
    };
}

field_codec_ctors!(
    point10_v1_compressor,
    point10_v1_decompressor,
    point10::v1::Point10Compressor,
    point10::v1::Point10Decompressor
);
field_codec_ctors!(
    point10_v2_compressor,
    point10_v2_decompressor,
    point10::v2::Point10Compressor,
    point10::v2::Point10Decompressor
);
field_codec_ctors!(
    gps_v1_compressor,
    gps_v1_decompressor,
    gps::v1::GpsTimeCompressor,
    gps::v1::GpsTimeDecompressor
);
field_codec_ctors!(
    gps_v2_compressor,
    gps_v2_decompressor,
    gps::v2::GpsTimeCompressor,
    gps::v2::GpsTimeDecompressor
);
field_codec_ctors!(
    rgb_v1_compressor,
    rgb_v1_decompressor,
    rgb::v1::RgbCompressor,
    rgb::v1::RgbDecompressor
);
field_codec_ctors!(
    rgb_v2_compressor,
    rgb_v2_decompressor,
    rgb::v2::RgbCompressor,
    rgb::v2::RgbDecompressor
);
field_codec_ctors!(
    wavepacket_v1_compressor,
    wavepacket_v1_decompressor,
    wavepacket::v1::WavePacketCompressor,
    wavepacket::v1::WavePacketDecompressor
);

fn extra_bytes_v1_compressor<W: Write>(item: &LazItem) -> Box<dyn FieldCompressor<W>> {
    Box::new(extra_bytes::v1::ExtraBytesCompressor::new(usize::from(item.size())))
}

fn extra_bytes_v1_decompressor<R: Read>(item: &LazItem) -> Box<dyn FieldDecompressor<R>> {
    Box::new(extra_bytes::v1::ExtraBytesDecompressor::new(usize::from(item.size())))
}

fn extra_bytes_v2_compressor<W: Write>(item: &LazItem) -> Box<dyn FieldCompressor<W>> {
    Box::new(extra_bytes::v2::ExtraBytesCompressor::new(usize::from(item.size())))
}

fn extra_bytes_v2_decompressor<R: Read>(item: &LazItem) -> Box<dyn FieldDecompressor<R>> {
    Box::new(extra_bytes::v2::ExtraBytesDecompressor::new(usize::from(item.size())))
}

fn point14_v3_compressor<W: Write>(item: &LazItem) -> Box<dyn LayeredFieldCompressor<W>> {
    Box::new(point14::v3::Point14Compressor::new(item.version()))
}

fn point14_v3_decompressor<R: ByteSource>(
    item: &LazItem,
    selection: DecompressionSelection,
) -> Box<dyn LayeredFieldDecompressor<R>> {
    Box::new(point14::v3::Point14Decompressor::new(item.version(), selection))
}

layered_codec_ctors!(
    rgb14_v3_compressor,
    rgb14_v3_decompressor,
    rgb::v3::RgbCompressor,
    rgb::v3::RgbDecompressor
);
layered_codec_ctors!(
    rgbnir14_v3_compressor,
    rgbnir14_v3_decompressor,
    rgbnir::v3::RgbNirCompressor,
    rgbnir::v3::RgbNirDecompressor
);
layered_codec_ctors!(
    wavepacket14_v3_compressor,
    wavepacket14_v3_decompressor,
    wavepacket::v3::WavePacketCompressor,
    wavepacket::v3::WavePacketDecompressor
);

fn byte14_v3_compressor<W: Write>(item: &LazItem) -> Box<dyn LayeredFieldCompressor<W>> {
    Box::new(extra_bytes::v3::ExtraBytesCompressor::new(usize::from(item.size())))
}

fn byte14_v3_decompressor<R: ByteSource>(
    item: &LazItem,
    selection: DecompressionSelection,
) -> Box<dyn LayeredFieldDecompressor<R>> {
    Box::new(extra_bytes::v3::ExtraBytesDecompressor::new(
        usize::from(item.size()),
        selection,
    ))
}

fn sequential_record_compressor<'a, W: Write + 'a>(
    registry: &CompressorRegistry<'a, W>,
    dst: W,
    layout: PointLayout,
) -> crate::Result<Box<dyn RecordCompressor<W> + 'a>> {
    let ctors = layout
        .items()
        .iter()
        .map(|item| Ok((*item, registry.field_compressor(item)?)))
        .collect::<crate::Result<Vec<_>>>()?;
    Ok(Box::new(SequentialPointRecordCompressor::new(
        dst, layout, ctors,
    )))
}

fn layered_record_compressor<'a, W: Write + 'a>(
    registry: &CompressorRegistry<'a, W>,
    dst: W,
    layout: PointLayout,
) -> crate::Result<Box<dyn RecordCompressor<W> + 'a>> {
    let ctors = layout
        .items()
        .iter()
        .map(|item| Ok((*item, registry.layered_field_compressor(item)?)))
        .collect::<crate::Result<Vec<_>>>()?;
    Ok(Box::new(LayeredPointRecordCompressor::new(dst, layout, ctors)))
}

fn sequential_record_decompressor<'a, R: ByteSource + 'a>(
    registry: &DecompressorRegistry<'a, R>,
    src: R,
    layout: PointLayout,
    _selection: DecompressionSelection,
) -> crate::Result<Box<dyn RecordDecompressor<R> + 'a>> {
    let ctors = layout
        .items()
        .iter()
        .map(|item| Ok((*item, registry.field_decompressor(item)?)))
        .collect::<crate::Result<Vec<_>>>()?;
    Ok(Box::new(SequentialPointRecordDecompressor::new(
        src, layout, ctors,
    )))
}

fn layered_record_decompressor<'a, R: ByteSource + 'a>(
    registry: &DecompressorRegistry<'a, R>,
    src: R,
    layout: PointLayout,
    selection: DecompressionSelection,
) -> crate::Result<Box<dyn RecordDecompressor<R> + 'a>> {
    let ctors = layout
        .items()
        .iter()
        .map(|item| Ok((*item, registry.layered_field_decompressor(item)?)))
        .collect::<crate::Result<Vec<_>>>()?;
    Ok(Box::new(LayeredPointRecordDecompressor::new(
        src, layout, selection, ctors,
    )))
}

/// Codecs available to compress points
pub struct CompressorRegistry<'a, W: Write + 'a> {
    fields: HashMap<ItemKey, FieldCompressorCtor<W>>,
    layered_fields: HashMap<ItemKey, LayeredFieldCompressorCtor<W>>,
    containers: HashMap<u16, RecordCompressorCtor<'a, W>>,
}

impl<'a, W: Write + 'a> CompressorRegistry<'a, W> {
    /// A registry without any codec
    pub fn empty() -> Self {
        Self {
            fields: HashMap::new(),
            layered_fields: HashMap::new(),
            containers: HashMap::new(),
        }
    }

    /// A registry with every codec of this crate
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        let fields: [(LazItemType, u16, FieldCompressorCtor<W>); 9] = [
            (LazItemType::Point10, 1, point10_v1_compressor),
            (LazItemType::Point10, 2, point10_v2_compressor),
            (LazItemType::GpsTime, 1, gps_v1_compressor),
            (LazItemType::GpsTime, 2, gps_v2_compressor),
            (LazItemType::RGB12, 1, rgb_v1_compressor),
            (LazItemType::RGB12, 2, rgb_v2_compressor),
            (LazItemType::WavePacket13, 1, wavepacket_v1_compressor),
            (LazItemType::Byte(0), 1, extra_bytes_v1_compressor),
            (LazItemType::Byte(0), 2, extra_bytes_v2_compressor),
        ];
        for (item_type, version, ctor) in fields {
            registry.register_field(item_type, version, ctor);
        }
        // wave packets were never changed in version 2
        registry.register_field(LazItemType::WavePacket13, 2, wavepacket_v1_compressor);

        let layered_fields: [(LazItemType, LayeredFieldCompressorCtor<W>); 5] = [
            (LazItemType::Point14, point14_v3_compressor),
            (LazItemType::RGB14, rgb14_v3_compressor),
            (LazItemType::RGBNIR14, rgbnir14_v3_compressor),
            (LazItemType::WavePacket14, wavepacket14_v3_compressor),
            (LazItemType::Byte14(0), byte14_v3_compressor),
        ];
        for (item_type, ctor) in layered_fields {
            for version in LAYERED_VERSIONS {
                registry.register_layered_field(item_type, version, ctor);
            }
        }

        registry.register_container(CompressorType::PointWise, sequential_record_compressor);
        registry.register_container(CompressorType::PointWiseChunked, sequential_record_compressor);
        registry.register_container(CompressorType::LayeredChunked, layered_record_compressor);
        registry
    }

    pub fn register_field(
        &mut self,
        item_type: LazItemType,
        version: u16,
        ctor: FieldCompressorCtor<W>,
    ) {
        self.fields.insert((item_type.id(), version), ctor);
    }

    pub fn register_layered_field(
        &mut self,
        item_type: LazItemType,
        version: u16,
        ctor: LayeredFieldCompressorCtor<W>,
    ) {
        self.layered_fields.insert((item_type.id(), version), ctor);
    }

    pub fn register_container(
        &mut self,
        compressor: CompressorType,
        ctor: RecordCompressorCtor<'a, W>,
    ) {
        self.containers.insert(compressor as u16, ctor);
    }

    pub fn field_compressor(&self, item: &LazItem) -> crate::Result<FieldCompressorCtor<W>> {
        self.fields
            .get(&key_of(item))
            .copied()
            .ok_or_else(|| unsupported_item(item).into())
    }

    pub fn layered_field_compressor(
        &self,
        item: &LazItem,
    ) -> crate::Result<LayeredFieldCompressorCtor<W>> {
        self.layered_fields
            .get(&key_of(item))
            .copied()
            .ok_or_else(|| unsupported_item(item).into())
    }

    /// Builds the record compressor the `compressor` uses for the `layout`
    pub fn record_compressor(
        &self,
        compressor: CompressorType,
        dst: W,
        layout: PointLayout,
    ) -> crate::Result<Box<dyn RecordCompressor<W> + 'a>> {
        let ctor = self
            .containers
            .get(&(compressor as u16))
            .ok_or(FormatError::UnsupportedCompressorType(compressor))?;
        ctor(self, dst, layout)
    }
}

impl<'a, W: Write + 'a> Default for CompressorRegistry<'a, W> {
    fn default() -> Self {
        Self::standard()
    }
}

/// Codecs available to decompress points
pub struct DecompressorRegistry<'a, R: ByteSource + 'a> {
    fields: HashMap<ItemKey, FieldDecompressorCtor<R>>,
    layered_fields: HashMap<ItemKey, LayeredFieldDecompressorCtor<R>>,
    containers: HashMap<u16, RecordDecompressorCtor<'a, R>>,
}

impl<'a, R: ByteSource + 'a> DecompressorRegistry<'a, R> {
    pub fn empty() -> Self {
        Self {
            fields: HashMap::new(),
            layered_fields: HashMap::new(),
            containers: HashMap::new(),
        }
    }

    pub fn standard() -> Self {
        let mut registry = Self::empty();
        let fields: [(LazItemType, u16, FieldDecompressorCtor<R>); 10] = [
            (LazItemType::Point10, 1, point10_v1_decompressor),
            (LazItemType::Point10, 2, point10_v2_decompressor),
            (LazItemType::GpsTime, 1, gps_v1_decompressor),
            (LazItemType::GpsTime, 2, gps_v2_decompressor),
            (LazItemType::RGB12, 1, rgb_v1_decompressor),
            (LazItemType::RGB12, 2, rgb_v2_decompressor),
            (LazItemType::WavePacket13, 1, wavepacket_v1_decompressor),
            (LazItemType::WavePacket13, 2, wavepacket_v1_decompressor),
            (LazItemType::Byte(0), 1, extra_bytes_v1_decompressor),
            (LazItemType::Byte(0), 2, extra_bytes_v2_decompressor),
        ];
        for (item_type, version, ctor) in fields {
            registry.register_field(item_type, version, ctor);
        }

        let layered_fields: [(LazItemType, LayeredFieldDecompressorCtor<R>); 5] = [
            (LazItemType::Point14, point14_v3_decompressor),
            (LazItemType::RGB14, rgb14_v3_decompressor),
            (LazItemType::RGBNIR14, rgbnir14_v3_decompressor),
            (LazItemType::WavePacket14, wavepacket14_v3_decompressor),
            (LazItemType::Byte14(0), byte14_v3_decompressor),
        ];
        for (item_type, ctor) in layered_fields {
            for version in LAYERED_VERSIONS {
                registry.register_layered_field(item_type, version, ctor);
            }
        }

        registry.register_container(CompressorType::PointWise, sequential_record_decompressor);
        registry.register_container(
            CompressorType::PointWiseChunked,
            sequential_record_decompressor,
        );
        registry.register_container(CompressorType::LayeredChunked, layered_record_decompressor);
        registry
    }

    pub fn register_field(
        &mut self,
        item_type: LazItemType,
        version: u16,
        ctor: FieldDecompressorCtor<R>,
    ) {
        self.fields.insert((item_type.id(), version), ctor);
    }

    pub fn register_layered_field(
        &mut self,
        item_type: LazItemType,
        version: u16,
        ctor: LayeredFieldDecompressorCtor<R>,
    ) {
        self.layered_fields.insert((item_type.id(), version), ctor);
    }

    pub fn register_container(
        &mut self,
        compressor: CompressorType,
        ctor: RecordDecompressorCtor<'a, R>,
    ) {
        self.containers.insert(compressor as u16, ctor);
    }

    pub fn field_decompressor(&self, item: &LazItem) -> crate::Result<FieldDecompressorCtor<R>> {
        self.fields
            .get(&key_of(item))
            .copied()
            .ok_or_else(|| unsupported_item(item).into())
    }

    pub fn layered_field_decompressor(
        &self,
        item: &LazItem,
    ) -> crate::Result<LayeredFieldDecompressorCtor<R>> {
        self.layered_fields
            .get(&key_of(item))
            .copied()
            .ok_or_else(|| unsupported_item(item).into())
    }

    /// Builds the record decompressor the `compressor` uses for the `layout`
    pub fn record_decompressor(
        &self,
        compressor: CompressorType,
        src: R,
        layout: PointLayout,
        selection: DecompressionSelection,
    ) -> crate::Result<Box<dyn RecordDecompressor<R> + 'a>> {
        let ctor = self
            .containers
            .get(&(compressor as u16))
            .ok_or(FormatError::UnsupportedCompressorType(compressor))?;
        ctor(self, src, layout, selection)
    }
}

impl<'a, R: ByteSource + 'a> Default for DecompressorRegistry<'a, R> {
    fn default() -> Self {
        Self::standard()
    }
}
