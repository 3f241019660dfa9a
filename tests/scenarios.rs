mod common;

use std::io::{Cursor, Write};

use lazcodec::{
    LasZipCompressor, LasZipDecompressor, LazVlr, PointLayout, TableState, DEFAULT_CHUNK_SIZE,
};

use common::{assert_same_points, random_points, vlr};

/// Stand in for the LAS header and VLRs that precede the point data
const PREAMBLE_LEN: usize = 375;

#[test]
fn test_large_file_with_default_chunks() {
    let num_points = 150_000;
    let vlr = vlr(3, 0, 2, DEFAULT_CHUNK_SIZE);
    let layout = PointLayout::from_items(vlr.items()).unwrap();
    let points = random_points(&layout, num_points, 41);

    let mut output = Cursor::new(Vec::new());
    output.write_all(&[0u8; PREAMBLE_LEN]).unwrap();
    let mut header_bytes = Vec::new();
    vlr.write_to(&mut header_bytes).unwrap();
    output.write_all(&header_bytes).unwrap();
    let data_offset = (PREAMBLE_LEN + header_bytes.len()) as u64;

    let mut compressor = LasZipCompressor::new(output, vlr).unwrap();
    compressor.compress_many(&points).unwrap();
    compressor.done().unwrap();
    let table = compressor.chunk_table().clone();
    let file = compressor.into_inner().into_inner();

    assert_eq!(table.len(), 3);
    assert_eq!(table.data_start(), data_offset + 8);
    let table_offset = {
        let pointer = &file[data_offset as usize..data_offset as usize + 8];
        i64::from_le_bytes(pointer.try_into().unwrap()) as u64
    };
    assert_eq!(table_offset, table.end());
    // header, pointer, chunks then the table, nothing else
    let mut encoded_table = Vec::new();
    table.write_to(&mut encoded_table, false).unwrap();
    assert_eq!(file.len() as u64, table_offset + encoded_table.len() as u64);
    let chunk_bytes: u64 = table.entries().iter().map(|e| e.byte_count).sum();
    assert_eq!(data_offset + 8 + chunk_bytes, table_offset);

    // a reader first reads the header, then the points
    let mut src = Cursor::new(file.as_slice());
    src.set_position(PREAMBLE_LEN as u64);
    let vlr = LazVlr::read_from(&mut src).unwrap();
    assert_eq!(src.position(), data_offset);

    let mut decompressor = LasZipDecompressor::new(src, vlr).unwrap();
    assert_eq!(decompressor.table_state(), TableState::TablePresent);
    assert_eq!(decompressor.number_chunks(), 3);

    let mut point = layout.new_point();
    decompressor.seek(100_000).unwrap();
    decompressor.decompress_one(&mut point).unwrap();
    assert_same_points(&layout, &points[100_000..100_001], &[point.clone()]);

    decompressor.seek(0).unwrap();
    let mut sequential = vec![layout.new_point(); num_points];
    decompressor.decompress_many(&mut sequential).unwrap();
    assert_same_points(&layout, &points, &sequential);
    assert_same_points(&layout, &sequential[100_000..100_001], &[point]);
}

#[test]
fn test_single_point() {
    for point_format in [0u8, 6] {
        let vlr = vlr(point_format, 0, 2, DEFAULT_CHUNK_SIZE);
        let layout = PointLayout::from_items(vlr.items()).unwrap();
        let points = random_points(&layout, 1, 42);
        let data = common::compress(&vlr, &points);

        let decompressed = common::decompress(&data, &vlr, 1);
        assert_same_points(&layout, &points, &decompressed);
    }
}

#[test]
fn test_chunk_of_one_point_each() {
    let vlr = vlr(7, 0, 2, 1);
    let layout = PointLayout::from_items(vlr.items()).unwrap();
    let points = random_points(&layout, 20, 43);
    let data = common::compress(&vlr, &points);

    let mut decompressor = LasZipDecompressor::new(Cursor::new(&data), vlr).unwrap();
    assert_eq!(decompressor.number_chunks(), 20);
    let mut point = layout.new_point();
    for index in [19u64, 3, 0, 12] {
        decompressor.seek(index).unwrap();
        decompressor.decompress_one(&mut point).unwrap();
        let index = index as usize;
        assert_same_points(&layout, &points[index..index + 1], std::slice::from_ref(&point));
    }
}
