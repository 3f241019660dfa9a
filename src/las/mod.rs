//! Codecs of the items a LAS point record is made of.
//!
//! Each item type has one module, with one sub module per
//! compression version (`v1`, `v2`, `v3`).
pub mod extra_bytes;
pub mod gps;
pub mod nir;
pub mod point10;
pub mod point14;
pub mod rgb;
pub mod rgbnir;
pub mod selective;
pub(crate) mod utils;
pub mod wavepacket;

#[cfg(test)]
pub(crate) mod test_utils {
    use std::io::Cursor;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::las::selective::DecompressionSelection;
    use crate::laszip::{LasZipCompressor, LasZipDecompressor, LazItem, LazItemType, LazVlrBuilder};
    use crate::point::{PointLayout, PointRecord};

    /// Small chunks so that tests go through several of them
    pub(crate) const CHUNK_SIZE: usize = 100;

    /// Points made of random bytes, with finite times and
    /// return numbers that make sense.
    pub(crate) fn random_points(items: &[LazItem], n: usize, seed: u64) -> Vec<PointRecord> {
        let layout = PointLayout::from_items(items).unwrap();
        let is_extended = items
            .first()
            .map_or(false, |item| item.item_type() == LazItemType::Point14);
        let max_returns = if is_extended { 15 } else { 7 };
        let mut rng = StdRng::seed_from_u64(seed);
        let mut bytes = vec![0u8; layout.size()];
        (0..n)
            .map(|_| {
                rng.fill(bytes.as_mut_slice());
                let mut point = layout.new_point();
                layout.unpack(&bytes, &mut point);
                point.number_of_returns = rng.gen_range(1..=max_returns);
                point.return_number = rng.gen_range(1..=point.number_of_returns);
                point.gps_time = rng.gen_range(0.0..1.0e6);
                if is_extended {
                    point.scanner_channel = rng.gen_range(0..4);
                }
                // drop what the layout cannot store
                layout.pack(&point, &mut bytes);
                let mut normalized = layout.new_point();
                layout.unpack(&bytes, &mut normalized);
                normalized
            })
            .collect()
    }

    pub(crate) fn compress(items: &[LazItem], points: &[PointRecord]) -> (Vec<u8>, LazVlrBuilder) {
        let builder = LazVlrBuilder::from_laz_items(items.to_vec())
            .with_chunk_size(CHUNK_SIZE as u32);
        let mut compressor =
            LasZipCompressor::new(Cursor::new(Vec::new()), builder.clone().build()).unwrap();
        compressor.compress_many(points).unwrap();
        compressor.done().unwrap();
        (compressor.into_inner().into_inner(), builder)
    }

    /// Compresses then decompresses the points with the given selection
    pub(crate) fn round_trip_with_selection(
        items: &[LazItem],
        points: &[PointRecord],
        selection: DecompressionSelection,
    ) -> Vec<PointRecord> {
        let (compressed, builder) = compress(items, points);
        let mut decompressor = LasZipDecompressor::selective(
            Cursor::new(compressed),
            builder.build(),
            selection,
        )
        .unwrap();
        let layout = PointLayout::from_items(items).unwrap();
        let mut decompressed = vec![layout.new_point(); points.len()];
        decompressor.decompress_many(&mut decompressed).unwrap();
        decompressed
    }

    /// Checks that compressing then decompressing gives back the
    /// exact same bytes.
    pub(crate) fn round_trip(items: &[LazItem], points: &[PointRecord]) {
        let layout = PointLayout::from_items(items).unwrap();
        let decompressed = round_trip_with_selection(items, points, DecompressionSelection::all());
        let mut expected = vec![0u8; layout.size()];
        let mut found = vec![0u8; layout.size()];
        for (i, (original, decoded)) in points.iter().zip(&decompressed).enumerate() {
            layout.pack(original, &mut expected);
            layout.pack(decoded, &mut found);
            assert_eq!(expected, found, "point {} differs", i);
        }
    }
}
