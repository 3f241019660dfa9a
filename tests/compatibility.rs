//! Chunks holding the bytes that LASzip writes, and laz-rs reads, for known points.
//!
//! Both chunks switch scanner channels back and forth, so the per channel
//! contexts of every layered item are exercised, including the first use
//! of a context and the return to a known one.

use std::io::Cursor;

use lazcodec::{
    ChunkTable, ChunkTableEntry, LasZipCompressor, LasZipDecompressor, LazItem, LazItemType,
    LazVlr, LazVlrBuilder, PointLayout, PointRecord, Rgb, WavePacket,
};

const MULTI_CHANNEL_CHUNK: [u8; 393] = [
    0xe8, 0x03, 0x00, 0x00, 0xd0, 0x07, 0x00, 0x00, 0x2c, 0x01, 0x00, 0x00, 0x78, 0x00, 0x21, 0x00,
    0x02, 0x07, 0x96, 0x00, 0x0b, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x44, 0x8f, 0x40, 0x00, 0xc8,
    0xc8, 0xc8, 0xd4, 0xc6, 0x04, 0xc8, 0x0e, 0x00, 0x00, 0x00, 0x35, 0x00, 0x00, 0x00, 0x13, 0x00,
    0x00, 0x00, 0x11, 0x00, 0x00, 0x00, 0x0d, 0x00, 0x00, 0x00, 0x14, 0x00, 0x00, 0x00, 0x0c, 0x00,
    0x00, 0x00, 0x11, 0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0x00, 0x26, 0x00, 0x00, 0x00, 0x49, 0x00,
    0x00, 0x00, 0x11, 0x00, 0x00, 0x00, 0x11, 0x00, 0x00, 0x00, 0x02, 0x48, 0xb8, 0x1d, 0xc5, 0x5a,
    0xa8, 0xb6, 0x5e, 0x1c, 0x8a, 0x51, 0xe0, 0x03, 0xa6, 0xe5, 0xe4, 0x70, 0x23, 0xc1, 0xa6, 0x1a,
    0x41, 0xf9, 0x59, 0xbc, 0x53, 0xb2, 0x49, 0x78, 0x8d, 0x0b, 0x9b, 0x9f, 0xf8, 0x69, 0xbe, 0x0c,
    0x7a, 0xcd, 0xa4, 0xc7, 0xd4, 0xc0, 0x8f, 0x86, 0x5c, 0x28, 0xef, 0x6a, 0x00, 0x00, 0x00, 0x1a,
    0x50, 0xc4, 0x7f, 0x06, 0xf2, 0x6e, 0x38, 0x5d, 0x9b, 0xda, 0xa0, 0x75, 0x69, 0xec, 0x3d, 0x00,
    0x00, 0x00, 0x02, 0x06, 0x04, 0xfe, 0xff, 0x08, 0x08, 0x01, 0x80, 0x7d, 0xfe, 0x84, 0x88, 0x7e,
    0x00, 0x00, 0x00, 0x01, 0x04, 0x30, 0xf5, 0xd0, 0x20, 0x07, 0x0a, 0xa0, 0x80, 0x00, 0x00, 0x00,
    0x4f, 0xb5, 0x51, 0x3c, 0x83, 0xba, 0xcf, 0x86, 0x1a, 0x24, 0xb2, 0x5e, 0xc5, 0x9a, 0x7a, 0xd1,
    0xd4, 0x00, 0x00, 0x00, 0x89, 0x51, 0xdb, 0x12, 0x13, 0xad, 0x23, 0x38, 0x42, 0x00, 0x00, 0x00,
    0x07, 0x09, 0x05, 0x84, 0x84, 0x44, 0x43, 0xa4, 0xa3, 0xfc, 0x7d, 0x08, 0x48, 0x7c, 0x00, 0x00,
    0x00, 0x0b, 0xc2, 0xdd, 0xa0, 0xba, 0x00, 0x00, 0x2a, 0xe6, 0xc5, 0x9d, 0x91, 0x18, 0x2e, 0xac,
    0x51, 0x9a, 0xeb, 0xa5, 0x6f, 0x34, 0xe2, 0x80, 0x00, 0x00, 0x02, 0x79, 0xf2, 0x9d, 0x7a, 0x46,
    0xd1, 0xe1, 0x83, 0xe2, 0xb2, 0x05, 0x7a, 0xcc, 0xf0, 0x34, 0xe0, 0x00, 0x00, 0x00, 0x81, 0xfc,
    0x1b, 0xab, 0xe5, 0x69, 0xd4, 0x07, 0xc5, 0x11, 0xf5, 0x2c, 0xd9, 0xf0, 0x77, 0x8b, 0x2f, 0x18,
    0xf2, 0x09, 0xf1, 0x4e, 0xbc, 0xc1, 0x56, 0xec, 0x57, 0xbd, 0x40, 0x4b, 0x5e, 0x29, 0xe1, 0x9c,
    0xf7, 0x68, 0x1f, 0x07, 0x78, 0xb2, 0xf1, 0x8f, 0x20, 0x9f, 0x14, 0xea, 0x6e, 0x5e, 0x64, 0x01,
    0x1b, 0x28, 0x63, 0x1d, 0xcb, 0xff, 0xf5, 0xa2, 0x76, 0x82, 0x8e, 0x51, 0xf7, 0xfc, 0xa9, 0xf0,
    0xd1, 0x17, 0xec, 0xa8, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0x7e, 0xfa, 0x80, 0x85, 0xff,
    0xf6, 0x01, 0x01, 0xfc, 0x82, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x81, 0x00, 0xb5, 0x7e, 0x65,
    0x02, 0xb4, 0xfd, 0xe7, 0xb2, 0x7f, 0x00, 0x00, 0x00,
];

const WAVE_PACKET_CHUNK: [u8; 346] = [
    0x64, 0x00, 0x00, 0x00, 0xc8, 0x00, 0x00, 0x00, 0x1e, 0x00, 0x00, 0x00, 0x32, 0x00, 0x11, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x40, 0x6f, 0x40, 0x01, 0xa0,
    0x0f, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x48, 0x41, 0x00,
    0x00, 0x00, 0x3f, 0x00, 0x00, 0x80, 0xbe, 0x00, 0x00, 0x80, 0x3f, 0x0a, 0x00, 0x00, 0x00, 0x21,
    0x00, 0x00, 0x00, 0x0c, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0b,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2f,
    0x00, 0x00, 0x00, 0x8c, 0x00, 0x00, 0x00, 0x20, 0x46, 0xbf, 0x66, 0x7f, 0x4f, 0xdb, 0x8f, 0xf1,
    0x79, 0xa5, 0xf2, 0x21, 0x02, 0xa4, 0x1f, 0xb1, 0xee, 0x89, 0x04, 0x51, 0xbc, 0xa5, 0xe8, 0x1b,
    0x1c, 0x66, 0xc0, 0x14, 0xb6, 0x00, 0x00, 0x00, 0x04, 0x33, 0x8b, 0x2d, 0x96, 0xea, 0x85, 0xe3,
    0xc2, 0x00, 0x00, 0x00, 0x18, 0x96, 0x40, 0xc5, 0x41, 0x7f, 0x86, 0xb5, 0x00, 0x00, 0x00, 0x39,
    0x61, 0xf3, 0x09, 0x3e, 0x35, 0xc8, 0xab, 0x32, 0x69, 0xfe, 0x5b, 0x6b, 0x2c, 0xb4, 0xfd, 0x3b,
    0x62, 0xe6, 0x7e, 0x9f, 0xec, 0xa0, 0xe6, 0x29, 0xf9, 0xc1, 0xd2, 0x7c, 0x8d, 0x7c, 0xe4, 0x32,
    0x59, 0xa6, 0xa7, 0xd4, 0xe8, 0xae, 0xa8, 0xbe, 0x07, 0x48, 0x28, 0x00, 0x00, 0x00, 0x01, 0x40,
    0x95, 0xa3, 0x1c, 0xa1, 0x24, 0x00, 0x86, 0x44, 0x8c, 0x17, 0xb4, 0xfe, 0x97, 0x22, 0xe8, 0x5d,
    0xd7, 0xd8, 0x6c, 0x1a, 0x13, 0xef, 0x45, 0x92, 0x00, 0xb9, 0xf9, 0x86, 0x77, 0xa6, 0xaa, 0xca,
    0x74, 0x00, 0xcc, 0x7e, 0x85, 0x43, 0x5f, 0x87, 0x31, 0x31, 0x7f, 0x39, 0xec, 0x15, 0xce, 0x3d,
    0x84, 0xc4, 0x97, 0xfe, 0xe8, 0x5b, 0xa1, 0xfe, 0x8e, 0x02, 0xd9, 0xdb, 0xa0, 0xf0, 0xf1, 0x2f,
    0x65, 0x7f, 0x5a, 0x59, 0x6a, 0xad, 0x75, 0x5f, 0xd7, 0xff, 0xfe, 0xc8, 0x79, 0xaf, 0xb0, 0x03,
    0x31, 0xbf, 0x44, 0x98, 0x24, 0x2d, 0x40, 0xd9, 0x6f, 0xfa, 0xfb, 0x03, 0x31, 0x0e, 0x40, 0x50,
    0x00, 0x00, 0x74, 0x80, 0x00, 0x01, 0x18, 0x29, 0x31, 0x25, 0x58, 0x04, 0x7b, 0x60, 0xaa, 0x00,
    0x4a, 0xa0, 0x00, 0x00, 0x13, 0x37, 0x79, 0xb6, 0x1e, 0x7e, 0xf1, 0x1d, 0x55, 0xbb, 0xf2, 0xb2,
    0x2f, 0xff, 0xfe, 0x82, 0x13, 0x8e, 0x7e, 0x81, 0x00, 0x00,
];


// channel, x, y, z, intensity, return, returns, classification, classification flags,
// scan direction, edge, scan angle, user data, point source, gps time, rgb, extra bytes
type MultiChannelRow = (
    u8, i32, i32, i32, u16, u8, u8, u8, u8, bool, bool, i16, u8, u16, f64,
    (u16, u16, u16), [u8; 2],
);

const MULTI_CHANNEL_POINTS: [MultiChannelRow; 14] = [
    (0, 1000, 2000, 300, 120, 1, 2, 2, 0, false, false, 150, 7, 11, 1000.5,
     (51200, 51400, 50900), [4, 200]),
    (0, 1012, 2003, 296, 98, 2, 2, 2, 0, false, false, 150, 7, 11, 1000.5,
     (51200, 51400, 50900), [4, 201]),
    (1, 1030, 1990, 310, 140, 1, 1, 6, 0, true, false, -300, 9, 12, 1000.50001,
     (30000, 30100, 29800), [5, 201]),
    (1, 1041, 1985, 305, 143, 1, 3, 6, 1, true, false, -300, 9, 12, 1000.50002,
     (30100, 30300, 29900), [5, 202]),
    (1, 1043, 1984, 280, 60, 3, 3, 2, 1, true, false, -300, 9, 12, 1000.50002,
     (30100, 30300, 29900), [6, 202]),
    (0, 1021, 2010, 301, 117, 1, 1, 2, 0, false, true, 152, 8, 11, 1000.50003,
     (51300, 51400, 51000), [4, 203]),
    (2, 5000, -7000, 1200, 600, 1, 1, 9, 0, false, false, 0, 200, 300, 500000.25,
     (1000, 2000, 3000), [0, 0]),
    (2, 5100, -6950, 1190, 610, 1, 2, 9, 0, false, false, 2, 200, 300, 500000.26,
     (1100, 2000, 3000), [0, 255]),
    (1, 1050, 1980, 300, 150, 2, 2, 6, 0, false, true, -280, 9, 12, 1000.50004,
     (30200, 30300, 30000), [7, 203]),
    (0, 1025, 2015, 299, 115, 2, 5, 5, 2, false, false, 154, 8, 13, 1000.50005,
     (51300, 51500, 51000), [4, 204]),
    (3, -20, 40, -5, 7, 1, 1, 1, 0, true, true, -6000, 1, 65535, 1000.50005,
     (0, 0, 0), [255, 255]),
    (3, -25, 38, -4, 9, 1, 1, 1, 0, true, true, -6000, 1, 65535, 1000.50006,
     (0, 65535, 0), [255, 254]),
    (0, 1030, 2020, 298, 113, 5, 5, 5, 2, false, false, 154, 8, 13, 1000.50005,
     (51300, 51500, 51000), [4, 205]),
    (2, 5150, -6900, 1185, 605, 2, 2, 9, 0, false, false, 2, 201, 300, 500000.26,
     (1100, 2100, 3000), [1, 255]),
];

// channel, x, y, z, intensity, return, returns, gps time,
// (descriptor index, byte offset, packet size, return point, dx, dy, dz)
type WavePacketRow = (u8, i32, i32, i32, u16, u8, u8, f64, (u8, u64, u32, f32, f32, f32, f32));

const WAVE_PACKET_POINTS: [WavePacketRow; 10] = [
    (0, 100, 200, 30, 50, 1, 1, 250.0, (1, 4000, 256, 12.5, 0.5, -0.25, 1.0)),
    (0, 110, 205, 31, 52, 1, 1, 250.001, (1, 4256, 256, 13.0, 0.5, -0.25, 1.0)),
    (1, 140, 190, 35, 61, 1, 2, 250.002, (2, 4512, 512, 40.25, 0.5, -0.25, 0.875)),
    (1, 141, 189, 20, 30, 2, 2, 250.002, (2, 4512, 512, 48.75, 0.5, -0.25, 0.875)),
    (0, 120, 210, 32, 49, 1, 1, 250.003, (1, 5024, 256, 12.0, 0.5, -0.25, 1.0)),
    (2, 300, -40, 80, 90, 1, 1, 250.004, (3, 90000, 128, 3.5, -1.5, 2.0, 0.0)),
    (1, 150, 185, 36, 62, 1, 1, 250.005, (2, 5280, 512, 41.0, 0.5, -0.25, 0.875)),
    (0, 125, 215, 33, 47, 1, 1, 250.006, (1, 5792, 256, 11.75, 0.5, -0.25, 1.0)),
    // the offset jump does not fit in 32 bits
    (0, 130, 220, 34, 47, 1, 1, 250.007, (1, 6048 + (1 << 40), 256, 11.5, 0.5, -0.25, 1.0)),
    (2, 310, -45, 81, 91, 1, 1, 250.008, (3, 90128, 128, 3.5, -1.5, 2.0, 0.0)),
];

fn multi_channel_vlr() -> LazVlr {
    LazVlrBuilder::from_laz_items(vec![
        LazItem::new(LazItemType::Point14, 3),
        LazItem::new(LazItemType::RGB14, 3),
        LazItem::new(LazItemType::Byte14(2), 3),
    ])
    .build()
}

fn wave_packet_vlr() -> LazVlr {
    LazVlrBuilder::from_laz_items(vec![
        LazItem::new(LazItemType::Point14, 3),
        LazItem::new(LazItemType::WavePacket14, 3),
    ])
    .build()
}

fn multi_channel_points(layout: &PointLayout) -> Vec<PointRecord> {
    MULTI_CHANNEL_POINTS
        .iter()
        .map(|row| {
            let mut point = layout.new_point();
            point.scanner_channel = row.0;
            point.x = row.1;
            point.y = row.2;
            point.z = row.3;
            point.intensity = row.4;
            point.return_number = row.5;
            point.number_of_returns = row.6;
            point.classification = row.7;
            point.classification_flags = row.8;
            point.scan_direction_flag = row.9;
            point.edge_of_flight_line = row.10;
            point.scan_angle = row.11;
            point.user_data = row.12;
            point.point_source_id = row.13;
            point.gps_time = row.14;
            let (red, green, blue) = row.15;
            point.rgb = Rgb { red, green, blue };
            point.extra_bytes = row.16.to_vec();
            point
        })
        .collect()
}

fn wave_packet_points(layout: &PointLayout) -> Vec<PointRecord> {
    WAVE_PACKET_POINTS
        .iter()
        .map(|&(channel, x, y, z, intensity, return_number, number_of_returns, gps_time, wave)| {
            let mut point = layout.new_point();
            point.scanner_channel = channel;
            point.x = x;
            point.y = y;
            point.z = z;
            point.intensity = intensity;
            point.return_number = return_number;
            point.number_of_returns = number_of_returns;
            point.gps_time = gps_time;
            point.wave_packet = WavePacket {
                descriptor_index: wave.0,
                byte_offset: wave.1,
                packet_size: wave.2,
                return_point: wave.3,
                dx: wave.4,
                dy: wave.5,
                dz: wave.6,
            };
            point
        })
        .collect()
}

fn check_compression(vlr: LazVlr, points: &[PointRecord], expected_chunk: &[u8]) {
    let mut compressor = LasZipCompressor::new(Cursor::new(Vec::new()), vlr).unwrap();
    compressor.compress_many(points).unwrap();
    compressor.done().unwrap();
    let table = compressor.chunk_table().clone();
    let data = compressor.into_inner().into_inner();

    assert_eq!(table.len(), 1);
    assert_eq!(table.entries()[0].byte_count, expected_chunk.len() as u64);
    let start = ChunkTable::OFFSET_SIZE as usize;
    assert_eq!(&data[start..start + expected_chunk.len()], expected_chunk);
}

fn check_decompression(vlr: LazVlr, expected: &[PointRecord], chunk: &[u8]) {
    let mut table = ChunkTable::new(ChunkTable::OFFSET_SIZE);
    table.push(ChunkTableEntry {
        point_count: expected.len() as u64,
        byte_count: chunk.len() as u64,
    });
    let mut data = Vec::new();
    data.extend_from_slice(&(table.end() as i64).to_le_bytes());
    data.extend_from_slice(chunk);
    table.write_to(&mut data, false).unwrap();

    let mut decompressor = LasZipDecompressor::new(Cursor::new(data), vlr).unwrap();
    let mut points = vec![decompressor.layout().new_point(); expected.len()];
    decompressor.decompress_many(&mut points).unwrap();
    assert_eq!(points, expected);
}

#[test]
fn test_multi_channel_chunk_compresses_to_laszip_bytes() {
    let vlr = multi_channel_vlr();
    let layout = PointLayout::from_items(vlr.items()).unwrap();
    let points = multi_channel_points(&layout);
    check_compression(vlr, &points, &MULTI_CHANNEL_CHUNK);
}

#[test]
fn test_multi_channel_chunk_decompresses_laszip_bytes() {
    let vlr = multi_channel_vlr();
    let layout = PointLayout::from_items(vlr.items()).unwrap();
    let points = multi_channel_points(&layout);
    check_decompression(vlr, &points, &MULTI_CHANNEL_CHUNK);
}

#[test]
fn test_wave_packet_chunk_compresses_to_laszip_bytes() {
    let vlr = wave_packet_vlr();
    let layout = PointLayout::from_items(vlr.items()).unwrap();
    let points = wave_packet_points(&layout);
    check_compression(vlr, &points, &WAVE_PACKET_CHUNK);
}

#[test]
fn test_wave_packet_chunk_decompresses_laszip_bytes() {
    let vlr = wave_packet_vlr();
    let layout = PointLayout::from_items(vlr.items()).unwrap();
    let points = wave_packet_points(&layout);
    check_decompression(vlr, &points, &WAVE_PACKET_CHUNK);
}
