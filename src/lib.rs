//! Lossless compression of LiDAR point records, compatible with LASzip.
//!
//! [`LasZipCompressor`] and [`LasZipDecompressor`] are the two types
//! users wishing to compress and / or decompress LAZ point data should use.
//! They are configured by a [`LazVlr`], the laszip header that a LAZ file
//! stores in a variable length record.
//!
//! # Compressing
//!
//! ```
//! use lazcodec::{CompressorType, LasZipCompressor, LasZipError, LazVlrBuilder};
//!
//! # fn main() -> Result<(), LasZipError> {
//! // A Cursor is used here, a std::fs::File works just as well
//! let mut output = std::io::Cursor::new(Vec::<u8>::new());
//!
//! // point format 3 (xyz, gps time, rgb), no extra bytes, version 2 codecs
//! let vlr = LazVlrBuilder::for_point_format(3, 0, CompressorType::PointWiseChunked, 2)?
//!     .with_chunk_size(5_000)
//!     .build();
//!
//! let mut compressor = LasZipCompressor::new(&mut output, vlr)?;
//! let mut point = compressor.layout().new_point();
//! for i in 0..10 {
//!     point.x = i * 100;
//!     point.gps_time = f64::from(i);
//!     compressor.compress_one(&point)?;
//! }
//! // don't forget to call done when you are...done compressing
//! compressor.done()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Decompressing
//!
//! The decompressor needs the laszip header that was used to compress,
//! and a source positioned at the start of the compressed data.
//! When the source can seek, the chunk table is read and
//! [`LasZipDecompressor::seek`] gives random access to the points.
//!
//! ```
//! use lazcodec::{
//!     CompressorType, LasZipCompressor, LasZipDecompressor, LasZipError, LazVlrBuilder,
//! };
//!
//! # fn main() -> Result<(), LasZipError> {
//! let vlr = LazVlrBuilder::for_point_format(7, 0, CompressorType::LayeredChunked, 2)?
//!     .with_chunk_size(100)
//!     .build();
//!
//! let output = std::io::Cursor::new(Vec::<u8>::new());
//! let mut compressor = LasZipCompressor::new(output, vlr.clone())?;
//! let mut point = compressor.layout().new_point();
//! for i in 0..250 {
//!     point.x = i;
//!     point.return_number = 1;
//!     point.number_of_returns = 1;
//!     compressor.compress_one(&point)?;
//! }
//! compressor.done()?;
//!
//! let mut output = compressor.into_inner();
//! output.set_position(0);
//! let mut decompressor = LasZipDecompressor::new(output, vlr)?;
//! let mut point = decompressor.layout().new_point();
//! decompressor.seek(120)?;
//! decompressor.decompress_one(&mut point)?;
//! assert_eq!(point.x, 120);
//! # Ok(())
//! # }
//! ```
//!
//! Streams that cannot seek are supported through [`Sequential`].
//! Points can also be handled in their raw LAS byte form with
//! [`compress_buffer`] and [`decompress_buffer`].

pub(crate) mod compressors;
pub(crate) mod decoders;
pub(crate) mod decompressors;
pub(crate) mod encoders;
pub(crate) mod models;

pub mod errors;
pub mod io;
pub mod las;
pub mod laszip;
pub mod layers;
pub mod point;
pub mod predictors;
pub mod record;

pub use errors::{CorruptionError, FormatError, LasZipError, Stage};
pub use io::{ByteSink, ByteSource, Sequential};
pub use las::selective::DecompressionSelection;
pub use laszip::{
    compress_buffer, decompress_buffer, ChunkTable, ChunkTableEntry, CompressorRegistry,
    CompressorType, DecompressorRegistry, LasZipCompressor, LasZipDecompressor, LazItem,
    LazItemRecordBuilder, LazItemType, LazVlr, LazVlrBuilder, TableState, Version,
    DEFAULT_CHUNK_SIZE,
};
pub use point::{PointLayout, PointRecord, Rgb, WavePacket};

pub type Result<T> = std::result::Result<T, LasZipError>;
