//! Nested, size-prefixed coding sessions used by the layered (v3) codecs.
//!
//! Each field of a layered point format is coded into its own in-memory
//! stream. At the end of a chunk, the sizes of every layer are written
//! first, then the layers themselves, so that a reader can skip the
//! layers it is not interested in.

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::trace;

use crate::decoders::ArithmeticDecoder;
use crate::encoders::ArithmeticEncoder;
use crate::io::ByteSource;

pub struct LayerEncoder {
    encoder: ArithmeticEncoder<Cursor<Vec<u8>>>,
    changed: bool,
}

impl LayerEncoder {
    pub fn new() -> Self {
        Self {
            encoder: ArithmeticEncoder::new(Cursor::new(Vec::new())),
            changed: false,
        }
    }

    pub fn encoder(&mut self) -> &mut ArithmeticEncoder<Cursor<Vec<u8>>> {
        &mut self.encoder
    }

    /// Marks the layer as holding information, only changed layers are
    /// written when the chunk ends.
    pub fn set_changed(&mut self, changed: bool) {
        self.changed |= changed;
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Ends the coding session and writes the number of bytes of the layer.
    pub fn write_size<W: Write>(&mut self, dst: &mut W) -> std::io::Result<()> {
        let num_bytes = if self.changed {
            self.encoder.done()?;
            self.encoder.out_stream().get_ref().len() as u32
        } else {
            0
        };
        trace!("Layer of {} bytes", num_bytes);
        dst.write_u32::<LittleEndian>(num_bytes)
    }

    pub fn write_layer<W: Write>(&mut self, dst: &mut W) -> std::io::Result<()> {
        if self.changed {
            dst.write_all(self.encoder.out_stream().get_ref())?;
        }
        Ok(())
    }

    /// Size the layer would report, only meaningful after `write_size`
    pub fn num_bytes(&mut self) -> usize {
        if self.changed {
            self.encoder.out_stream().get_ref().len()
        } else {
            0
        }
    }

    /// Prepares the layer for a new chunk
    pub fn reset(&mut self) {
        let stream = self.encoder.out_stream();
        stream.get_mut().clear();
        stream.set_position(0);
        self.encoder.reset();
        self.changed = false;
    }
}

impl Default for LayerEncoder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct LayerDecoder {
    decoder: ArithmeticDecoder<Cursor<Vec<u8>>>,
    num_bytes: u32,
    active: bool,
}

impl LayerDecoder {
    pub fn new() -> Self {
        Self {
            decoder: ArithmeticDecoder::new(Cursor::new(Vec::new())),
            num_bytes: 0,
            active: false,
        }
    }

    pub fn decoder(&mut self) -> &mut ArithmeticDecoder<Cursor<Vec<u8>>> {
        &mut self.decoder
    }

    pub fn read_size<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.num_bytes = src.read_u32::<LittleEndian>()?;
        trace!("Layer of {} bytes", self.num_bytes);
        Ok(())
    }

    pub fn num_bytes(&self) -> u32 {
        self.num_bytes
    }

    /// Loads the layer bytes and starts decoding them, or moves past them
    /// when the layer is not requested or empty.
    ///
    /// Returns whether the layer holds data to decode.
    pub fn read_layer<R: ByteSource>(
        &mut self,
        requested: bool,
        src: &mut R,
    ) -> std::io::Result<bool> {
        let num_bytes = self.num_bytes as usize;
        self.active = requested && num_bytes > 0;
        if self.active {
            let stream = self.decoder.in_stream();
            let buffer = stream.get_mut();
            buffer.resize(num_bytes, 0);
            src.read_exact(&mut buffer[..num_bytes])?;
            stream.set_position(0);
            self.decoder.read_init_bytes()?;
        } else if num_bytes > 0 {
            src.skip(num_bytes as u64)?;
        }
        Ok(self.active)
    }

    /// True when the layer was loaded by the last `read_layer`
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Default for LayerDecoder {
    fn default() -> Self {
        Self::new()
    }
}
