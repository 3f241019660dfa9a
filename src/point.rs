//! The typed point record the codecs work on, and its raw byte layout.

use std::io::{Read, Write};

use byteorder::{ByteOrder, LittleEndian};

use crate::errors::FormatError;
use crate::laszip::{LazItem, LazItemType};

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct Rgb {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

/// Description of the full waveform data of a point
#[derive(Default, Debug, Copy, Clone, PartialEq)]
pub struct WavePacket {
    pub descriptor_index: u8,
    pub byte_offset: u64,
    pub packet_size: u32,
    pub return_point: f32,
    pub dx: f32,
    pub dy: f32,
    pub dz: f32,
}

impl WavePacket {
    pub const SIZE: usize = 29;

    pub fn unpack_from(input: &[u8]) -> Self {
        Self {
            descriptor_index: input[0],
            byte_offset: LittleEndian::read_u64(&input[1..9]),
            packet_size: LittleEndian::read_u32(&input[9..13]),
            return_point: LittleEndian::read_f32(&input[13..17]),
            dx: LittleEndian::read_f32(&input[17..21]),
            dy: LittleEndian::read_f32(&input[21..25]),
            dz: LittleEndian::read_f32(&input[25..29]),
        }
    }

    pub fn pack_into(&self, output: &mut [u8]) {
        output[0] = self.descriptor_index;
        LittleEndian::write_u64(&mut output[1..9], self.byte_offset);
        LittleEndian::write_u32(&mut output[9..13], self.packet_size);
        LittleEndian::write_f32(&mut output[13..17], self.return_point);
        LittleEndian::write_f32(&mut output[17..21], self.dx);
        LittleEndian::write_f32(&mut output[21..25], self.dy);
        LittleEndian::write_f32(&mut output[25..29], self.dz);
    }
}

/// A LiDAR point, with every field any of the items may carry.
///
/// Items only read and write the fields they cover, the others
/// keep their value.
///
/// `scan_angle` holds the scan angle rank (widened from an `i8`) for
/// legacy points and the scan angle in raw units for extended points.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct PointRecord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub intensity: u16,
    pub return_number: u8,
    pub number_of_returns: u8,
    pub scan_direction_flag: bool,
    pub edge_of_flight_line: bool,
    pub classification: u8,
    /// synthetic, key-point, withheld and (extended points only) overlap
    pub classification_flags: u8,
    pub scanner_channel: u8,
    pub scan_angle: i16,
    pub user_data: u8,
    pub point_source_id: u16,
    pub gps_time: f64,
    pub rgb: Rgb,
    pub nir: u16,
    pub wave_packet: WavePacket,
    pub extra_bytes: Vec<u8>,
}

impl PointRecord {
    /// Return number, number of returns, scan direction and edge of flight line
    /// packed as in legacy point formats.
    pub fn legacy_bit_fields(&self) -> u8 {
        (self.return_number & 0x7)
            | (self.number_of_returns & 0x7) << 3
            | (self.scan_direction_flag as u8) << 6
            | (self.edge_of_flight_line as u8) << 7
    }

    pub fn set_legacy_bit_fields(&mut self, byte: u8) {
        self.return_number = byte & 0x7;
        self.number_of_returns = (byte >> 3) & 0x7;
        self.scan_direction_flag = (byte >> 6) & 0x1 != 0;
        self.edge_of_flight_line = (byte >> 7) & 0x1 != 0;
    }

    /// Classification and its three flags packed in one byte
    pub fn legacy_classification(&self) -> u8 {
        (self.classification & 0x1F) | (self.classification_flags & 0x7) << 5
    }

    pub fn set_legacy_classification(&mut self, byte: u8) {
        self.classification = byte & 0x1F;
        self.classification_flags = byte >> 5;
    }

    pub fn scan_angle_rank(&self) -> i8 {
        self.scan_angle as i8
    }

    /// Return number and number of returns of an extended point
    pub fn extended_returns(&self) -> u8 {
        (self.return_number & 0xF) | (self.number_of_returns & 0xF) << 4
    }

    pub fn set_extended_returns(&mut self, byte: u8) {
        self.return_number = byte & 0xF;
        self.number_of_returns = byte >> 4;
    }

    /// Classification flags, scanner channel, scan direction and
    /// edge of flight line of an extended point
    pub fn extended_flags(&self) -> u8 {
        (self.classification_flags & 0xF)
            | (self.scanner_channel & 0x3) << 4
            | (self.scan_direction_flag as u8) << 6
            | (self.edge_of_flight_line as u8) << 7
    }

    pub fn set_extended_flags(&mut self, byte: u8) {
        self.classification_flags = byte & 0xF;
        self.scanner_channel = (byte >> 4) & 0x3;
        self.scan_direction_flag = (byte >> 6) & 0x1 != 0;
        self.edge_of_flight_line = (byte >> 7) & 0x1 != 0;
    }
}

fn unpack_point10(input: &[u8], point: &mut PointRecord) {
    point.x = LittleEndian::read_i32(&input[0..4]);
    point.y = LittleEndian::read_i32(&input[4..8]);
    point.z = LittleEndian::read_i32(&input[8..12]);
    point.intensity = LittleEndian::read_u16(&input[12..14]);
    point.set_legacy_bit_fields(input[14]);
    point.set_legacy_classification(input[15]);
    point.scan_angle = i16::from(input[16] as i8);
    point.user_data = input[17];
    point.point_source_id = LittleEndian::read_u16(&input[18..20]);
}

fn pack_point10(point: &PointRecord, output: &mut [u8]) {
    LittleEndian::write_i32(&mut output[0..4], point.x);
    LittleEndian::write_i32(&mut output[4..8], point.y);
    LittleEndian::write_i32(&mut output[8..12], point.z);
    LittleEndian::write_u16(&mut output[12..14], point.intensity);
    output[14] = point.legacy_bit_fields();
    output[15] = point.legacy_classification();
    output[16] = point.scan_angle_rank() as u8;
    output[17] = point.user_data;
    LittleEndian::write_u16(&mut output[18..20], point.point_source_id);
}

fn unpack_point14(input: &[u8], point: &mut PointRecord) {
    point.x = LittleEndian::read_i32(&input[0..4]);
    point.y = LittleEndian::read_i32(&input[4..8]);
    point.z = LittleEndian::read_i32(&input[8..12]);
    point.intensity = LittleEndian::read_u16(&input[12..14]);
    point.set_extended_returns(input[14]);
    point.set_extended_flags(input[15]);
    point.classification = input[16];
    point.user_data = input[17];
    point.scan_angle = LittleEndian::read_i16(&input[18..20]);
    point.point_source_id = LittleEndian::read_u16(&input[20..22]);
    point.gps_time = LittleEndian::read_f64(&input[22..30]);
}

fn pack_point14(point: &PointRecord, output: &mut [u8]) {
    LittleEndian::write_i32(&mut output[0..4], point.x);
    LittleEndian::write_i32(&mut output[4..8], point.y);
    LittleEndian::write_i32(&mut output[8..12], point.z);
    LittleEndian::write_u16(&mut output[12..14], point.intensity);
    output[14] = point.extended_returns();
    output[15] = point.extended_flags();
    output[16] = point.classification;
    output[17] = point.user_data;
    LittleEndian::write_i16(&mut output[18..20], point.scan_angle);
    LittleEndian::write_u16(&mut output[20..22], point.point_source_id);
    LittleEndian::write_f64(&mut output[22..30], point.gps_time);
}

fn unpack_rgb(input: &[u8]) -> Rgb {
    Rgb {
        red: LittleEndian::read_u16(&input[0..2]),
        green: LittleEndian::read_u16(&input[2..4]),
        blue: LittleEndian::read_u16(&input[4..6]),
    }
}

fn pack_rgb(rgb: &Rgb, output: &mut [u8]) {
    LittleEndian::write_u16(&mut output[0..2], rgb.red);
    LittleEndian::write_u16(&mut output[2..4], rgb.green);
    LittleEndian::write_u16(&mut output[4..6], rgb.blue);
}

/// Maps the items of a record to the bytes of an uncompressed point
#[derive(Debug, Clone)]
pub struct PointLayout {
    items: Vec<LazItem>,
    size: usize,
    num_extra_bytes: usize,
}

impl PointLayout {
    /// Checks that each item has the size its type implies and
    /// appears only once.
    pub fn from_items(items: &[LazItem]) -> crate::Result<Self> {
        let mut seen: Vec<u16> = Vec::with_capacity(items.len());
        let mut num_extra_bytes = 0usize;
        for item in items {
            let expected = item.item_type().size();
            if item.size() != expected {
                return Err(FormatError::ItemSizeMismatch {
                    item_type: item.item_type(),
                    expected,
                    found: item.size(),
                }
                .into());
            }
            // extra bytes of both generations land in the same field
            let id = match item.item_type() {
                LazItemType::Byte14(_) => u16::from(LazItemType::Byte(0)),
                t => t.id(),
            };
            if seen.contains(&id) {
                return Err(FormatError::DuplicateItem(item.item_type()).into());
            }
            seen.push(id);
            if let LazItemType::Byte(n) | LazItemType::Byte14(n) = item.item_type() {
                num_extra_bytes = usize::from(n);
            }
        }
        Ok(Self {
            items: items.to_vec(),
            size: items.iter().map(|item| usize::from(item.size())).sum(),
            num_extra_bytes,
        })
    }

    /// Size in bytes of an uncompressed point
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn items(&self) -> &[LazItem] {
        &self.items
    }

    pub fn num_extra_bytes(&self) -> usize {
        self.num_extra_bytes
    }

    /// A zeroed point with room for the extra bytes
    pub fn new_point(&self) -> PointRecord {
        PointRecord {
            extra_bytes: vec![0u8; self.num_extra_bytes],
            ..Default::default()
        }
    }

    pub fn unpack(&self, input: &[u8], point: &mut PointRecord) {
        let mut start = 0usize;
        for item in &self.items {
            let end = start + usize::from(item.size());
            let bytes = &input[start..end];
            match item.item_type() {
                LazItemType::Point10 => unpack_point10(bytes, point),
                LazItemType::Point14 => unpack_point14(bytes, point),
                LazItemType::GpsTime => point.gps_time = LittleEndian::read_f64(bytes),
                LazItemType::RGB12 | LazItemType::RGB14 => point.rgb = unpack_rgb(bytes),
                LazItemType::RGBNIR14 => {
                    point.rgb = unpack_rgb(&bytes[..6]);
                    point.nir = LittleEndian::read_u16(&bytes[6..8]);
                }
                LazItemType::WavePacket13 | LazItemType::WavePacket14 => {
                    point.wave_packet = WavePacket::unpack_from(bytes)
                }
                LazItemType::Byte(_) | LazItemType::Byte14(_) => {
                    point.extra_bytes.clear();
                    point.extra_bytes.extend_from_slice(bytes);
                }
            }
            start = end;
        }
    }

    /// Packs the point, `output` must be at least `size()` bytes long.
    ///
    /// Missing extra bytes are written as zeros.
    pub fn pack(&self, point: &PointRecord, output: &mut [u8]) {
        let mut start = 0usize;
        for item in &self.items {
            let end = start + usize::from(item.size());
            let bytes = &mut output[start..end];
            match item.item_type() {
                LazItemType::Point10 => pack_point10(point, bytes),
                LazItemType::Point14 => pack_point14(point, bytes),
                LazItemType::GpsTime => LittleEndian::write_f64(bytes, point.gps_time),
                LazItemType::RGB12 | LazItemType::RGB14 => pack_rgb(&point.rgb, bytes),
                LazItemType::RGBNIR14 => {
                    pack_rgb(&point.rgb, &mut bytes[..6]);
                    LittleEndian::write_u16(&mut bytes[6..8], point.nir);
                }
                LazItemType::WavePacket13 | LazItemType::WavePacket14 => {
                    point.wave_packet.pack_into(bytes)
                }
                LazItemType::Byte(_) | LazItemType::Byte14(_) => {
                    let n = point.extra_bytes.len().min(bytes.len());
                    bytes[..n].copy_from_slice(&point.extra_bytes[..n]);
                    bytes[n..].iter_mut().for_each(|b| *b = 0);
                }
            }
            start = end;
        }
    }

    /// Reads one raw point
    pub fn read_point<R: Read>(&self, src: &mut R, point: &mut PointRecord) -> std::io::Result<()> {
        let mut buf = vec![0u8; self.size];
        src.read_exact(&mut buf)?;
        self.unpack(&buf, point);
        Ok(())
    }

    /// Writes one raw point
    pub fn write_point<W: Write>(&self, dst: &mut W, point: &PointRecord) -> std::io::Result<()> {
        let mut buf = vec![0u8; self.size];
        self.pack(point, &mut buf);
        dst.write_all(&buf)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::laszip::LazItemRecordBuilder;

    #[test]
    fn test_legacy_bytes_round_trip() {
        let mut point = PointRecord::default();
        point.set_legacy_bit_fields(0b1101_0011);
        assert_eq!(point.return_number, 3);
        assert_eq!(point.number_of_returns, 2);
        assert!(point.scan_direction_flag);
        assert!(point.edge_of_flight_line);
        assert_eq!(point.legacy_bit_fields(), 0b1101_0011);

        point.set_legacy_classification(0b101_00110);
        assert_eq!(point.classification, 6);
        assert_eq!(point.classification_flags, 5);
        assert_eq!(point.legacy_classification(), 0b101_00110);
    }

    #[test]
    fn test_layout_size_matches_items() {
        for format in 0u8..=10 {
            let items = LazItemRecordBuilder::default_for_point_format_id(format, 3).unwrap();
            let layout = PointLayout::from_items(&items).unwrap();
            let expected: usize = items.iter().map(|i| usize::from(i.size())).sum();
            assert_eq!(layout.size(), expected);
            assert_eq!(layout.num_extra_bytes(), 3);
        }
    }

    #[test]
    fn test_pack_unpack_point14() {
        let items = LazItemRecordBuilder::default_for_point_format_id(10, 2).unwrap();
        let layout = PointLayout::from_items(&items).unwrap();
        let mut point = layout.new_point();
        point.x = -5;
        point.y = 17;
        point.z = 1 << 20;
        point.return_number = 9;
        point.number_of_returns = 15;
        point.classification_flags = 0xA;
        point.scanner_channel = 3;
        point.edge_of_flight_line = true;
        point.classification = 200;
        point.scan_angle = -12_000;
        point.gps_time = 1234.5678;
        point.rgb = Rgb {
            red: 1,
            green: 2,
            blue: 3,
        };
        point.nir = 65535;
        point.wave_packet.byte_offset = 1 << 40;
        point.wave_packet.dz = -0.25;
        point.extra_bytes = vec![7, 8];

        let mut bytes = vec![0u8; layout.size()];
        layout.pack(&point, &mut bytes);
        let mut unpacked = layout.new_point();
        layout.unpack(&bytes, &mut unpacked);
        assert_eq!(unpacked, point);
    }

    #[test]
    fn test_bad_item_lists_are_rejected() {
        let mut item = LazItem::new(LazItemType::Point10, 2);
        item.size = 21;
        assert!(PointLayout::from_items(&[item]).is_err());

        let items = vec![
            LazItem::new(LazItemType::Point10, 2),
            LazItem::new(LazItemType::Point10, 2),
        ];
        match PointLayout::from_items(&items) {
            Err(crate::LasZipError::Format(FormatError::DuplicateItem(LazItemType::Point10))) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}
