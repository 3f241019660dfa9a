mod common;

use std::io::Cursor;

use lazcodec::{
    ChunkTable, ChunkTableEntry, CorruptionError, LasZipCompressor, LasZipDecompressor,
    LasZipError, LazVlr, PointLayout, PointRecord, TableState,
};

use common::{random_points, vlr};

const CHUNK_SIZE: u32 = 100;

fn compressed_with_table(vlr: &LazVlr, points: &[PointRecord]) -> (Vec<u8>, ChunkTable) {
    let mut compressor = LasZipCompressor::new(Cursor::new(Vec::new()), vlr.clone()).unwrap();
    compressor.compress_many(points).unwrap();
    compressor.done().unwrap();
    let table = compressor.chunk_table().clone();
    (compressor.into_inner().into_inner(), table)
}

fn read_all(data: &[u8], vlr: &LazVlr, count: usize) -> lazcodec::Result<()> {
    let mut decompressor = LasZipDecompressor::new(Cursor::new(data), vlr.clone())?;
    let mut points = vec![decompressor.layout().new_point(); count];
    decompressor.decompress_many(&mut points)
}

#[test]
fn test_tampered_layer_size_is_detected() {
    let vlr = vlr(6, 0, 2, CHUNK_SIZE);
    let layout = PointLayout::from_items(vlr.items()).unwrap();
    let points = random_points(&layout, 250, 31);
    let (mut data, table) = compressed_with_table(&vlr, &points);

    // first chunk: raw point, point count, then the sizes of the
    // 9 layers of the point, the gps time layer is the last one
    let size_offset = 8 + layout.size() + 4 + 8 * 4;
    let gps_layer_size =
        u32::from_le_bytes(data[size_offset..size_offset + 4].try_into().unwrap());
    assert!(gps_layer_size > 0);
    data[size_offset..size_offset + 4].copy_from_slice(&(gps_layer_size + 1).to_le_bytes());

    let expected = table.chunk_start(1).unwrap();
    match read_all(&data, &vlr, points.len()) {
        Err(LasZipError::Corruption(CorruptionError::ChunkStartMismatch {
            chunk_index,
            expected: e,
            found,
        })) => {
            assert_eq!(chunk_index, 0);
            assert_eq!(e, expected);
            assert_eq!(found, expected + 1);
        }
        other => panic!("expected a chunk start mismatch, got {:?}", other.err()),
    }
}

#[test]
fn test_tampered_table_entry_is_detected() {
    let vlr = vlr(3, 0, 2, CHUNK_SIZE);
    let layout = PointLayout::from_items(vlr.items()).unwrap();
    let points = random_points(&layout, 350, 32);
    let (mut data, table) = compressed_with_table(&vlr, &points);

    let mut tampered = ChunkTable::new(table.data_start());
    for (i, entry) in table.entries().iter().enumerate() {
        let mut entry = *entry;
        if i == 1 {
            entry.byte_count += 3;
        }
        tampered.push(entry);
    }
    data.truncate(table.end() as usize);
    tampered.write_to(&mut data, false).unwrap();

    match read_all(&data, &vlr, points.len()) {
        Err(LasZipError::Corruption(CorruptionError::ChunkStartMismatch {
            chunk_index, ..
        })) => assert_eq!(chunk_index, 1),
        other => panic!("expected a chunk start mismatch, got {:?}", other.err()),
    }
}

#[test]
fn test_zero_sized_chunk_in_table() {
    let vlr = vlr(1, 0, 2, CHUNK_SIZE);
    let layout = PointLayout::from_items(vlr.items()).unwrap();
    let points = random_points(&layout, 300, 33);
    let (mut data, table) = compressed_with_table(&vlr, &points);

    let mut tampered = ChunkTable::new(table.data_start());
    tampered.push(table.entries()[0]);
    tampered.push(ChunkTableEntry {
        point_count: u64::from(CHUNK_SIZE),
        byte_count: 0,
    });
    data.truncate(table.end() as usize);
    tampered.write_to(&mut data, false).unwrap();

    assert!(matches!(
        LasZipDecompressor::new(Cursor::new(&data), vlr),
        Err(LasZipError::Corruption(CorruptionError::NonIncreasingChunkStarts {
            chunk_index: 1
        }))
    ));
}

#[test]
fn test_bad_table_version() {
    let vlr = vlr(0, 0, 2, CHUNK_SIZE);
    let layout = PointLayout::from_items(vlr.items()).unwrap();
    let points = random_points(&layout, 150, 34);
    let (mut data, table) = compressed_with_table(&vlr, &points);

    let version_at = table.end() as usize;
    data[version_at] = 1;
    assert!(matches!(
        LasZipDecompressor::new(Cursor::new(&data), vlr),
        Err(LasZipError::Corruption(CorruptionError::BadChunkTableVersion(1)))
    ));
}

#[test]
fn test_truncated_data() {
    for point_format in [1u8, 7] {
        let vlr = vlr(point_format, 0, 2, CHUNK_SIZE);
        let layout = PointLayout::from_items(vlr.items()).unwrap();
        let points = random_points(&layout, 300, 35);
        let (mut data, table) = compressed_with_table(&vlr, &points);

        // cut in the middle of the second chunk, the table is lost too
        let start = table.chunk_start(1).unwrap();
        let end = table.chunk_start(2).unwrap();
        data.truncate(((start + end) / 2) as usize);

        let mut decompressor = LasZipDecompressor::new(Cursor::new(&data), vlr.clone()).unwrap();
        assert_eq!(
            decompressor.table_state(),
            TableState::TableMissingRecoverable
        );
        let mut point = layout.new_point();
        let mut error = None;
        for i in 0..points.len() {
            if let Err(e) = decompressor.decompress_one(&mut point) {
                error = Some((i, e));
                break;
            }
        }
        let (failed_at, error) = error.expect("reading truncated data must fail");
        assert!(error.is_truncation(), "{}", error);
        assert!((100..200).contains(&failed_at));
        // the first chunk was fully read, so it got tabled
        assert_eq!(decompressor.number_chunks(), 1);
    }
}

#[test]
fn test_interrupted_writer_data_is_readable() {
    let vlr = vlr(3, 0, 2, CHUNK_SIZE);
    let layout = PointLayout::from_items(vlr.items()).unwrap();
    let points = random_points(&layout, 300, 36);
    let (mut data, table) = compressed_with_table(&vlr, &points);

    // what a writer that stopped before `done` leaves behind:
    // the pointer still points to itself, and there is no table
    data.truncate(table.end() as usize);
    data[..8].copy_from_slice(&0i64.to_le_bytes());

    let mut decompressor = LasZipDecompressor::new(Cursor::new(&data), vlr).unwrap();
    assert_eq!(
        decompressor.table_state(),
        TableState::TableMissingRecoverable
    );
    let mut decompressed = vec![layout.new_point(); points.len()];
    decompressor.decompress_many(&mut decompressed).unwrap();
    common::assert_same_points(&layout, &points, &decompressed);
    assert_eq!(decompressor.number_chunks(), 3);
}
