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

//! The laszip header ("LASzip VLR"): which items make up a point record,
//! with which version of their codec, and how records are chunked.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::errors::{FormatError, IoResultExt, Stage};

pub const DEFAULT_CHUNK_SIZE: u32 = 50_000;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub revision: u16,
}

impl Version {
    fn read_from<R: Read>(src: &mut R) -> std::io::Result<Self> {
        Ok(Self {
            major: src.read_u8()?,
            minor: src.read_u8()?,
            revision: src.read_u16::<LittleEndian>()?,
        })
    }

    fn write_to<W: Write>(&self, dst: &mut W) -> std::io::Result<()> {
        dst.write_u8(self.major)?;
        dst.write_u8(self.minor)?;
        dst.write_u16::<LittleEndian>(self.revision)?;
        Ok(())
    }
}

impl Default for Version {
    fn default() -> Self {
        Self {
            major: 2,
            minor: 2,
            revision: 0,
        }
    }
}

/// The kind of data an item of the point record holds
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum LazItemType {
    /// Extra bytes, with their count
    Byte(u16),
    Point10,
    GpsTime,
    RGB12,
    WavePacket13,
    Point14,
    RGB14,
    RGBNIR14,
    WavePacket14,
    /// Extra bytes of extended point formats, with their count
    Byte14(u16),
}

impl LazItemType {
    pub const POINT10_SIZE: u16 = 20;
    pub const GPS_TIME_SIZE: u16 = 8;
    pub const RGB_SIZE: u16 = 6;
    pub const NIR_SIZE: u16 = 2;
    pub const WAVE_PACKET_SIZE: u16 = 29;
    pub const POINT14_SIZE: u16 = 30;

    /// Number of bytes the item takes in an uncompressed record
    pub fn size(&self) -> u16 {
        match self {
            LazItemType::Byte(size) | LazItemType::Byte14(size) => *size,
            LazItemType::Point10 => Self::POINT10_SIZE,
            LazItemType::GpsTime => Self::GPS_TIME_SIZE,
            LazItemType::RGB12 | LazItemType::RGB14 => Self::RGB_SIZE,
            LazItemType::RGBNIR14 => Self::RGB_SIZE + Self::NIR_SIZE,
            LazItemType::WavePacket13 | LazItemType::WavePacket14 => Self::WAVE_PACKET_SIZE,
            LazItemType::Point14 => Self::POINT14_SIZE,
        }
    }

    /// Type id as stored in the header
    pub fn id(&self) -> u16 {
        u16::from(*self)
    }

    /// Items of the extended point formats use the layered codecs
    pub fn is_extended(&self) -> bool {
        matches!(
            self,
            LazItemType::Point14
                | LazItemType::RGB14
                | LazItemType::RGBNIR14
                | LazItemType::WavePacket14
                | LazItemType::Byte14(_)
        )
    }

    fn from_id(id: u16, size: u16) -> Result<Self, FormatError> {
        match id {
            0 => Ok(LazItemType::Byte(size)),
            6 => Ok(LazItemType::Point10),
            7 => Ok(LazItemType::GpsTime),
            8 => Ok(LazItemType::RGB12),
            9 => Ok(LazItemType::WavePacket13),
            10 => Ok(LazItemType::Point14),
            11 => Ok(LazItemType::RGB14),
            12 => Ok(LazItemType::RGBNIR14),
            13 => Ok(LazItemType::WavePacket14),
            14 => Ok(LazItemType::Byte14(size)),
            _ => Err(FormatError::UnknownLazItem(id)),
        }
    }
}

impl From<LazItemType> for u16 {
    fn from(t: LazItemType) -> Self {
        match t {
            LazItemType::Byte(_) => 0,
            LazItemType::Point10 => 6,
            LazItemType::GpsTime => 7,
            LazItemType::RGB12 => 8,
            LazItemType::WavePacket13 => 9,
            LazItemType::Point14 => 10,
            LazItemType::RGB14 => 11,
            LazItemType::RGBNIR14 => 12,
            LazItemType::WavePacket14 => 13,
            LazItemType::Byte14(_) => 14,
        }
    }
}

/// An item of the point record: its type, size and codec version
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LazItem {
    pub(crate) item_type: LazItemType,
    pub(crate) size: u16,
    pub(crate) version: u16,
}

impl LazItem {
    pub fn new(item_type: LazItemType, version: u16) -> Self {
        Self {
            item_type,
            size: item_type.size(),
            version,
        }
    }

    pub fn item_type(&self) -> LazItemType {
        self.item_type
    }

    pub fn size(&self) -> u16 {
        self.size
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    fn read_from<R: Read>(src: &mut R) -> crate::Result<Self> {
        let id = src.read_u16::<LittleEndian>().at_stage(Stage::ReadingHeader)?;
        let size = src.read_u16::<LittleEndian>().at_stage(Stage::ReadingHeader)?;
        let version = src.read_u16::<LittleEndian>().at_stage(Stage::ReadingHeader)?;
        Ok(Self {
            item_type: LazItemType::from_id(id, size)?,
            size,
            version,
        })
    }

    fn write_to<W: Write>(&self, dst: &mut W) -> std::io::Result<()> {
        dst.write_u16::<LittleEndian>(self.item_type.into())?;
        dst.write_u16::<LittleEndian>(self.size)?;
        dst.write_u16::<LittleEndian>(self.version)?;
        Ok(())
    }
}

/// Builds the list of items of a point record
#[derive(Debug, Clone, Default)]
pub struct LazItemRecordBuilder {
    items: Vec<LazItemType>,
}

impl LazItemRecordBuilder {
    pub fn new() -> Self {
        Self { items: vec![] }
    }

    /// The items needed to store points of the given LAS point format.
    ///
    /// In compatibility mode, the extended formats (6 to 10) are expressed
    /// with the legacy items, the fields that do not fit are carried
    /// as 5 extra bytes (7 when the format has a NIR channel).
    pub fn for_point_format(
        point_format_id: u8,
        num_extra_bytes: u16,
        compatible: bool,
    ) -> crate::Result<Self> {
        use LazItemType::*;
        let mut extra_bytes = num_extra_bytes;
        let items = match (point_format_id, compatible) {
            (0, _) => vec![Point10],
            (1, _) => vec![Point10, GpsTime],
            (2, _) => vec![Point10, RGB12],
            (3, _) => vec![Point10, GpsTime, RGB12],
            (4, _) => vec![Point10, GpsTime, WavePacket13],
            (5, _) => vec![Point10, GpsTime, RGB12, WavePacket13],
            (6, false) => vec![Point14],
            (7, false) => vec![Point14, RGB14],
            (8, false) => vec![Point14, RGBNIR14],
            (9, false) => vec![Point14, WavePacket14],
            (10, false) => vec![Point14, RGBNIR14, WavePacket14],
            (6, true) => {
                extra_bytes += 5;
                vec![Point10, GpsTime]
            }
            (7, true) => {
                extra_bytes += 5;
                vec![Point10, GpsTime, RGB12]
            }
            (8, true) => {
                extra_bytes += 7;
                vec![Point10, GpsTime, RGB12]
            }
            (9, true) => {
                extra_bytes += 5;
                vec![Point10, GpsTime, WavePacket13]
            }
            (10, true) => {
                extra_bytes += 7;
                vec![Point10, GpsTime, RGB12, WavePacket13]
            }
            _ => return Err(FormatError::UnsupportedPointFormat(point_format_id).into()),
        };

        let mut builder = Self { items };
        if extra_bytes > 0 {
            if builder.items[0] == Point14 {
                builder.add_item(Byte14(extra_bytes));
            } else {
                builder.add_item(Byte(extra_bytes));
            }
        }
        Ok(builder)
    }

    /// Default items, with default versions, of a point format
    pub fn default_for_point_format_id(
        point_format_id: u8,
        num_extra_bytes: u16,
    ) -> crate::Result<Vec<LazItem>> {
        Ok(Self::for_point_format(point_format_id, num_extra_bytes, false)?.build())
    }

    pub fn add_item(&mut self, item_type: LazItemType) -> &mut Self {
        self.items.push(item_type);
        self
    }

    pub fn item_types(&self) -> &[LazItemType] {
        &self.items
    }

    /// Builds the items using the most recent version of each codec
    pub fn build(&self) -> Vec<LazItem> {
        self.build_with_version(2)
            .unwrap_or_else(|_| unreachable!("version 2 exists for every legacy item"))
    }

    /// Builds the items, legacy items get the `requested_version` (1 or 2),
    /// wave packets of legacy formats only exist in version 1 and
    /// the extended items in version 3.
    pub fn build_with_version(&self, requested_version: u16) -> crate::Result<Vec<LazItem>> {
        self.items
            .iter()
            .map(|item_type| {
                let version = match item_type {
                    LazItemType::WavePacket13 => 1,
                    t if t.is_extended() => 3,
                    t => {
                        if !(1..=2).contains(&requested_version) {
                            let e = FormatError::UnsupportedLazItemVersion(*t, requested_version);
                            return Err(e.into());
                        }
                        requested_version
                    }
                };
                Ok(LazItem::new(*item_type, version))
            })
            .collect()
    }
}

fn read_laz_items_from<R: Read>(src: &mut R) -> crate::Result<Vec<LazItem>> {
    let num_items = src
        .read_u16::<LittleEndian>()
        .at_stage(Stage::ReadingHeader)?;
    (0..num_items).map(|_| LazItem::read_from(src)).collect()
}

fn write_laz_items_to<W: Write>(laz_items: &[LazItem], dst: &mut W) -> std::io::Result<()> {
    dst.write_u16::<LittleEndian>(laz_items.len() as u16)?;
    for item in laz_items {
        item.write_to(dst)?;
    }
    Ok(())
}

/// How the point records are grouped into coding sessions
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CompressorType {
    /// Points are not compressed
    None = 0,
    /// One coding session for all the points
    PointWise = 1,
    /// One coding session per chunk of points
    PointWiseChunked = 2,
    /// One coding session per field and chunk of points
    LayeredChunked = 3,
}

impl CompressorType {
    pub fn from_u16(t: u16) -> Option<Self> {
        match t {
            0 => Some(CompressorType::None),
            1 => Some(CompressorType::PointWise),
            2 => Some(CompressorType::PointWiseChunked),
            3 => Some(CompressorType::LayeredChunked),
            _ => None,
        }
    }

    pub fn is_chunked(&self) -> bool {
        matches!(
            self,
            CompressorType::PointWiseChunked | CompressorType::LayeredChunked
        )
    }
}

impl Default for CompressorType {
    fn default() -> Self {
        CompressorType::PointWiseChunked
    }
}

/// The laszip header
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LazVlr {
    pub(crate) compressor: CompressorType,
    coder: u16,

    version: Version,
    options: u32,
    chunk_size: u32,

    number_of_special_evlrs: i64,
    offset_to_special_evlrs: i64,

    items: Vec<LazItem>,
}

impl LazVlr {
    pub const USER_ID: &'static str = "laszip encoded";
    pub const RECORD_ID: u16 = 22204;
    pub const DESCRIPTION: &'static str = "http://laszip.org";
    pub const VARIABLE_CHUNK_SIZE: u32 = u32::MAX;

    /// Header for the given items, layered compression is used when
    /// the first item is an extended point.
    pub fn from_laz_items(items: Vec<LazItem>) -> Self {
        LazVlrBuilder::new().with_laz_items(items).build()
    }

    pub fn from_buffer(record_data: &[u8]) -> crate::Result<Self> {
        let mut cursor = std::io::Cursor::new(record_data);
        Self::read_from(&mut cursor)
    }

    pub fn read_from<R: Read>(src: &mut R) -> crate::Result<Self> {
        let compressor_type = src
            .read_u16::<LittleEndian>()
            .at_stage(Stage::ReadingHeader)?;
        let compressor = CompressorType::from_u16(compressor_type)
            .ok_or(FormatError::UnknownCompressorType(compressor_type))?;

        let mut read_fixed = || -> std::io::Result<(u16, Version, u32, u32, i64, i64)> {
            Ok((
                src.read_u16::<LittleEndian>()?,
                Version::read_from(src)?,
                src.read_u32::<LittleEndian>()?,
                src.read_u32::<LittleEndian>()?,
                src.read_i64::<LittleEndian>()?,
                src.read_i64::<LittleEndian>()?,
            ))
        };
        let (
            coder,
            version,
            options,
            chunk_size,
            number_of_special_evlrs,
            offset_to_special_evlrs,
        ) = read_fixed().at_stage(Stage::ReadingHeader)?;
        if coder != 0 {
            return Err(FormatError::UnsupportedCoder(coder).into());
        }

        Ok(Self {
            compressor,
            coder,
            version,
            options,
            chunk_size,
            number_of_special_evlrs,
            offset_to_special_evlrs,
            items: read_laz_items_from(src)?,
        })
    }

    pub fn write_to<W: Write>(&self, dst: &mut W) -> std::io::Result<()> {
        dst.write_u16::<LittleEndian>(self.compressor as u16)?;
        dst.write_u16::<LittleEndian>(self.coder)?;
        self.version.write_to(dst)?;
        dst.write_u32::<LittleEndian>(self.options)?;
        dst.write_u32::<LittleEndian>(self.chunk_size)?;
        dst.write_i64::<LittleEndian>(self.number_of_special_evlrs)?;
        dst.write_i64::<LittleEndian>(self.offset_to_special_evlrs)?;
        write_laz_items_to(&self.items, dst)?;
        Ok(())
    }

    /// Number of bytes `write_to` produces
    pub fn size_in_bytes(&self) -> usize {
        34 + 6 * self.items.len()
    }

    pub fn uses_variably_sized_chunks(&self) -> bool {
        self.chunk_size == Self::VARIABLE_CHUNK_SIZE
    }

    /// Returns the chunk size, that is, the number of points
    /// in each chunk.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn compressor(&self) -> CompressorType {
        self.compressor
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn options(&self) -> u32 {
        self.options
    }

    /// Returns the items compressed by this VLR
    pub fn items(&self) -> &[LazItem] {
        &self.items
    }

    /// Returns the sum of the size of the laz_items, which should correspond to the
    /// expected size of points (uncompressed).
    pub fn items_size(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.size)).sum()
    }
}

impl Default for LazVlr {
    fn default() -> Self {
        Self {
            compressor: Default::default(),
            coder: 0,
            version: Version::default(),
            options: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            number_of_special_evlrs: -1,
            offset_to_special_evlrs: -1,
            items: vec![],
        }
    }
}

/// Builder struct to personalize the LazVlr
#[derive(Debug, Clone, Default)]
pub struct LazVlrBuilder {
    laz_vlr: LazVlr,
    compressor: Option<CompressorType>,
}

impl LazVlrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_laz_items(laz_items: Vec<LazItem>) -> Self {
        Self::new().with_laz_items(laz_items)
    }

    /// Header for a LAS point format.
    ///
    /// Legacy items use `requested_version` (1 or 2). The compressor
    /// is adjusted to the items: extended points are always layered,
    /// legacy points never are.
    pub fn for_point_format(
        point_format_id: u8,
        num_extra_bytes: u16,
        compressor: CompressorType,
        requested_version: u16,
    ) -> crate::Result<Self> {
        Self::with_items_of(
            LazItemRecordBuilder::for_point_format(point_format_id, num_extra_bytes, false)?,
            compressor,
            requested_version,
        )
    }

    /// Same as [`for_point_format`](Self::for_point_format) but extended
    /// point formats are written with the legacy items.
    pub fn compatible_for_point_format(
        point_format_id: u8,
        num_extra_bytes: u16,
        compressor: CompressorType,
        requested_version: u16,
    ) -> crate::Result<Self> {
        Self::with_items_of(
            LazItemRecordBuilder::for_point_format(point_format_id, num_extra_bytes, true)?,
            compressor,
            requested_version,
        )
    }

    fn with_items_of(
        items: LazItemRecordBuilder,
        compressor: CompressorType,
        requested_version: u16,
    ) -> crate::Result<Self> {
        let items = items.build_with_version(requested_version)?;
        Ok(Self::new().with_laz_items(items).with_compressor(compressor))
    }

    pub fn with_laz_items(mut self, laz_items: Vec<LazItem>) -> Self {
        self.laz_vlr.items = laz_items;
        self
    }

    pub fn with_compressor(mut self, compressor: CompressorType) -> Self {
        self.compressor = Some(compressor);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.laz_vlr.chunk_size = chunk_size;
        self
    }

    pub fn with_variable_chunk_size(self) -> Self {
        self.with_chunk_size(LazVlr::VARIABLE_CHUNK_SIZE)
    }

    pub fn build(self) -> LazVlr {
        let mut vlr = self.laz_vlr;
        let leads_with_point14 = vlr
            .items
            .first()
            .map_or(false, |item| item.item_type == LazItemType::Point14);
        vlr.compressor = match self.compressor {
            _ if leads_with_point14 => CompressorType::LayeredChunked,
            Some(CompressorType::LayeredChunked) | None => CompressorType::PointWiseChunked,
            Some(other) => other,
        };
        if vlr.compressor.is_chunked() && vlr.chunk_size == 0 {
            vlr.chunk_size = DEFAULT_CHUNK_SIZE;
        }
        vlr
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_create_laz_items() {
        assert_eq!(
            LazItemRecordBuilder::new()
                .add_item(LazItemType::Point10)
                .build()
                .len(),
            1
        );
    }

    #[test]
    fn test_extra_bytes_item_follows_leading_item() {
        let items = LazItemRecordBuilder::for_point_format(3, 4, false).unwrap();
        assert_eq!(items.item_types().last(), Some(&LazItemType::Byte(4)));

        let items = LazItemRecordBuilder::for_point_format(6, 4, false).unwrap();
        assert_eq!(items.item_types().last(), Some(&LazItemType::Byte14(4)));
    }

    #[test]
    fn test_compatible_mode_uses_legacy_items() {
        let items = LazItemRecordBuilder::for_point_format(8, 2, true).unwrap();
        assert_eq!(
            items.item_types(),
            &[
                LazItemType::Point10,
                LazItemType::GpsTime,
                LazItemType::RGB12,
                LazItemType::Byte(9)
            ]
        );
    }

    #[test]
    fn test_unknown_point_format() {
        assert!(LazItemRecordBuilder::for_point_format(11, 0, false).is_err());
    }

    #[test]
    fn test_compressor_follows_items() {
        let vlr = LazVlrBuilder::for_point_format(1, 0, CompressorType::LayeredChunked, 2)
            .unwrap()
            .build();
        assert_eq!(vlr.compressor(), CompressorType::PointWiseChunked);

        let vlr = LazVlrBuilder::for_point_format(6, 0, CompressorType::PointWise, 2)
            .unwrap()
            .build();
        assert_eq!(vlr.compressor(), CompressorType::LayeredChunked);

        let vlr = LazVlrBuilder::for_point_format(0, 0, CompressorType::PointWise, 1)
            .unwrap()
            .with_chunk_size(0)
            .build();
        assert_eq!(vlr.compressor(), CompressorType::PointWise);
        assert_eq!(vlr.chunk_size(), 0);

        let vlr = LazVlrBuilder::for_point_format(0, 0, CompressorType::PointWiseChunked, 1)
            .unwrap()
            .with_chunk_size(0)
            .build();
        assert_eq!(vlr.chunk_size(), DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_versions_assigned_per_item() {
        let items = LazItemRecordBuilder::for_point_format(5, 0, false)
            .unwrap()
            .build_with_version(1)
            .unwrap();
        let versions: Vec<u16> = items.iter().map(LazItem::version).collect();
        assert_eq!(versions, vec![1, 1, 1, 1]);

        let items = LazItemRecordBuilder::for_point_format(10, 3, false)
            .unwrap()
            .build_with_version(2)
            .unwrap();
        assert!(items.iter().all(|item| item.version() == 3));

        assert!(LazItemRecordBuilder::for_point_format(0, 0, false)
            .unwrap()
            .build_with_version(3)
            .is_err());
    }

    #[test]
    fn test_header_round_trip() {
        let vlr = LazVlrBuilder::for_point_format(3, 2, CompressorType::PointWiseChunked, 2)
            .unwrap()
            .with_chunk_size(5_000)
            .build();
        let mut bytes = Vec::new();
        vlr.write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len(), vlr.size_in_bytes());

        let read = LazVlr::from_buffer(&bytes).unwrap();
        assert_eq!(read, vlr);
        let mut bytes2 = Vec::new();
        read.write_to(&mut bytes2).unwrap();
        assert_eq!(bytes, bytes2);
    }

    #[test]
    fn test_unknown_item_id_is_format_error() {
        let vlr = LazVlrBuilder::new()
            .with_laz_items(vec![LazItem::new(LazItemType::Point10, 2)])
            .build();
        let mut bytes = Vec::new();
        vlr.write_to(&mut bytes).unwrap();
        // type id of the first item
        bytes[34] = 99;
        match LazVlr::from_buffer(&bytes) {
            Err(crate::LasZipError::Format(FormatError::UnknownLazItem(99))) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}
