//! The LAZ containers: the header describing compressed data, the chunk
//! table, and the compressor and decompressor driving the item codecs.
pub use chunk_table::{ChunkTable, ChunkTableEntry, TableState};
pub use compression::{compress_buffer, LasZipCompressor};
pub use decompression::{decompress_buffer, LasZipDecompressor};
pub use registry::{CompressorRegistry, DecompressorRegistry};
pub use vlr::{
    CompressorType, LazItem, LazItemRecordBuilder, LazItemType, LazVlr, LazVlrBuilder, Version,
    DEFAULT_CHUNK_SIZE,
};

mod chunk_table;
mod compression;
mod decompression;
pub mod registry;
mod vlr;

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;
    use crate::las::test_utils::random_points;

    fn compress(vlr: &LazVlr, reserve_first: bool) -> Vec<u8> {
        let points = random_points(vlr.items(), 20, 9);
        let mut compressor = LasZipCompressor::new(Cursor::new(Vec::new()), vlr.clone()).unwrap();
        if reserve_first {
            compressor.reserve_offset_to_chunk_table().unwrap();
        }
        compressor.compress_many(&points).unwrap();
        compressor.done().unwrap();
        compressor.into_inner().into_inner()
    }

    #[test]
    fn test_manual_reserve_gives_same_data() {
        for format in [1u8, 7] {
            let vlr = LazVlrBuilder::for_point_format(format, 0, CompressorType::default(), 2)
                .unwrap()
                .build();
            assert_eq!(compress(&vlr, false), compress(&vlr, true));
        }
    }
}
