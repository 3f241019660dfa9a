#[macro_use]
extern crate criterion;

use std::io::Cursor;

use criterion::{black_box, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lazcodec::record::RecordCompressor;
use lazcodec::{
    CompressorRegistry, CompressorType, LasZipCompressor, LasZipDecompressor, LazVlr,
    LazVlrBuilder, PointLayout, PointRecord,
};

const NUM_POINTS: usize = 20_000;

/// Points walking along a scan line, so that the predictors have
/// something to predict.
fn synthetic_points(layout: &PointLayout, n: usize) -> Vec<PointRecord> {
    let mut rng = StdRng::seed_from_u64(0x1a5);
    let mut point = layout.new_point();
    (0..n)
        .map(|i| {
            point.x += rng.gen_range(-20..40);
            point.y += rng.gen_range(-5..5);
            point.z = 1000 + rng.gen_range(-300..300);
            point.intensity = rng.gen_range(0..1024);
            point.number_of_returns = rng.gen_range(1..4);
            point.return_number = rng.gen_range(1..=point.number_of_returns);
            point.classification = if i % 7 == 0 { 2 } else { 1 };
            point.scan_angle = rng.gen_range(-20..20);
            point.point_source_id = 12;
            point.gps_time += 0.00001;
            point.rgb.red = rng.gen_range(0..256) << 8;
            point.rgb.green = point.rgb.red;
            point.rgb.blue = rng.gen_range(0..65535);
            point.clone()
        })
        .collect()
}

fn vlr_for(point_format: u8, compressor: CompressorType) -> LazVlr {
    LazVlrBuilder::for_point_format(point_format, 0, compressor, 2)
        .unwrap()
        .build()
}

fn compressed(vlr: &LazVlr, points: &[PointRecord]) -> Vec<u8> {
    let mut compressor = LasZipCompressor::new(Cursor::new(Vec::new()), vlr.clone()).unwrap();
    compressor.compress_many(points).unwrap();
    compressor.done().unwrap();
    compressor.into_inner().into_inner()
}

fn record_compression_benchmark(c: &mut Criterion, name: &str, point_format: u8) {
    let vlr = vlr_for(point_format, CompressorType::PointWise);
    let layout = PointLayout::from_items(vlr.items()).unwrap();
    let points = synthetic_points(&layout, NUM_POINTS);

    let mut record_compressor = CompressorRegistry::standard()
        .record_compressor(vlr.compressor(), Cursor::new(Vec::<u8>::new()), layout)
        .unwrap();

    c.bench_function(name, move |b| {
        let mut points_iter = points.iter().cycle();
        b.iter(|| record_compressor.compress_next(points_iter.next().unwrap()));
    });
}

fn point_3_v2_record_compression_benchmark(c: &mut Criterion) {
    record_compression_benchmark(c, "point_3_v2_record_compression", 3);
}

fn point_7_v3_record_compression_benchmark(c: &mut Criterion) {
    record_compression_benchmark(c, "point_7_v3_record_compression", 7);
}

fn decompression_benchmark(c: &mut Criterion, name: &str, point_format: u8) {
    let vlr = vlr_for(point_format, CompressorType::PointWiseChunked);
    let layout = PointLayout::from_items(vlr.items()).unwrap();
    let points = synthetic_points(&layout, NUM_POINTS);
    let data = compressed(&vlr, &points);

    c.bench_function(name, move |b| {
        let mut out = vec![layout.new_point(); NUM_POINTS];
        b.iter(|| {
            let mut decompressor =
                LasZipDecompressor::new(Cursor::new(data.as_slice()), vlr.clone()).unwrap();
            decompressor.decompress_many(&mut out).unwrap();
            black_box(&out);
        });
    });
}

fn point_3_v2_decompression_benchmark(c: &mut Criterion) {
    decompression_benchmark(c, "point_3_v2_decompression", 3);
}

fn point_7_v3_decompression_benchmark(c: &mut Criterion) {
    decompression_benchmark(c, "point_7_v3_decompression", 7);
}

criterion_group!(
    record_compression,
    point_3_v2_record_compression_benchmark,
    point_7_v3_record_compression_benchmark
);
criterion_group!(
    decompression,
    point_3_v2_decompression_benchmark,
    point_7_v3_decompression_benchmark
);
criterion_main!(record_compression, decompression);
