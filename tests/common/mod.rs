#![allow(dead_code)]

use std::io::Cursor;

use lazcodec::{
    ByteSink, CompressorType, LasZipCompressor, LasZipDecompressor, LazVlr, LazVlrBuilder,
    PointLayout, PointRecord,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Points of random content whose fields hold values the layout can store,
/// returns are consistent and gps times finite.
pub fn random_points(layout: &PointLayout, n: usize, seed: u64) -> Vec<PointRecord> {
    let is_extended = layout
        .items()
        .first()
        .map_or(false, |item| item.item_type().is_extended());
    let max_returns = if is_extended { 15 } else { 7 };
    let mut rng = StdRng::seed_from_u64(seed);
    let mut bytes = vec![0u8; layout.size()];
    let mut gps_time = 0.0f64;
    (0..n)
        .map(|i| {
            rng.fill(bytes.as_mut_slice());
            let mut point = layout.new_point();
            layout.unpack(&bytes, &mut point);
            point.number_of_returns = rng.gen_range(1..=max_returns);
            point.return_number = rng.gen_range(1..=point.number_of_returns);
            // runs of equal times, as multi return pulses have
            if i % 3 == 0 {
                gps_time += rng.gen_range(0.0..0.01);
            }
            point.gps_time = gps_time;
            if is_extended {
                point.scanner_channel = rng.gen_range(0..4);
            }
            layout.pack(&point, &mut bytes);
            let mut normalized = layout.new_point();
            layout.unpack(&bytes, &mut normalized);
            normalized
        })
        .collect()
}

/// Raw bytes of the points, as in a LAS file
pub fn packed(layout: &PointLayout, points: &[PointRecord]) -> Vec<u8> {
    let mut out = vec![0u8; layout.size() * points.len()];
    for (point, raw) in points.iter().zip(out.chunks_exact_mut(layout.size())) {
        layout.pack(point, raw);
    }
    out
}

pub fn vlr(point_format: u8, num_extra_bytes: u16, version: u16, chunk_size: u32) -> LazVlr {
    LazVlrBuilder::for_point_format(
        point_format,
        num_extra_bytes,
        CompressorType::PointWiseChunked,
        version,
    )
    .unwrap()
    .with_chunk_size(chunk_size)
    .build()
}

pub fn compress_into<W: ByteSink>(dst: W, vlr: &LazVlr, points: &[PointRecord]) -> W {
    let mut compressor = LasZipCompressor::new(dst, vlr.clone()).unwrap();
    compressor.compress_many(points).unwrap();
    compressor.done().unwrap();
    compressor.into_inner()
}

pub fn compress(vlr: &LazVlr, points: &[PointRecord]) -> Vec<u8> {
    compress_into(Cursor::new(Vec::new()), vlr, points).into_inner()
}

pub fn decompress(data: &[u8], vlr: &LazVlr, count: usize) -> Vec<PointRecord> {
    let mut decompressor = LasZipDecompressor::new(Cursor::new(data), vlr.clone()).unwrap();
    let mut points = vec![decompressor.layout().new_point(); count];
    decompressor.decompress_many(&mut points).unwrap();
    points
}

pub fn assert_same_points(layout: &PointLayout, expected: &[PointRecord], found: &[PointRecord]) {
    assert_eq!(expected.len(), found.len());
    let mut a = vec![0u8; layout.size()];
    let mut b = vec![0u8; layout.size()];
    for (i, (e, f)) in expected.iter().zip(found).enumerate() {
        layout.pack(e, &mut a);
        layout.pack(f, &mut b);
        assert_eq!(a, b, "point {} differs", i);
    }
}
