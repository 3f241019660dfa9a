/*
===============================================================================

  PROGRAMMERS:

    martin.isenburg@rapidlasso.com  -  http://rapidlasso.com
    uday.karan@gmail.com - Hobu, Inc.

  COPYRIGHT:

    (c) 2007-2014, martin isenburg, rapidlasso - tools to catch reality
    (c) 2014, Uday Verma, Hobu, Inc.
    (c) 2019, Thomas Montaigu

    This is free software; you can redistribute and/or modify it under the
    terms of the GNU Lesser General Licence as published by the Free Software
    Foundation. See the COPYING file for more information.

    This software is distributed WITHOUT ANY WARRANTY and without even the
    implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.

  CHANGE HISTORY:
    6 June 2019: Translated to Rust
===============================================================================
*/

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
//                                                                           -
//                       ****************************                        -
//                        ARITHMETIC CODING EXAMPLES                         -
//                       ****************************                        -
//                                                                           -
// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
//                                                                           -
// Fast arithmetic coding implementation                                     -
// -> 32-bit variables, 32-bit product, periodic updates, table decoding     -
//                                                                           -
// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
//                                                                           -
// Version 1.00  -  April 25, 2004                                           -
//                                                                           -
// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
//                                                                           -
//                                  WARNING                                  -
//                                 =========                                 -
//                                                                           -
// The only purpose of this program is to demonstrate the basic principles   -
// of arithmetic coding. The original version of this code can be found in   -
// Digital Signal Compression: Principles and Practice                       -
// (Cambridge University Press, 2011, ISBN: 9780511984655)                   -
//                                                                           -
// Copyright (c) 2019 by Amir Said (said@ieee.org) &                         -
//                       William A. Pearlman (pearlw@ecse.rpi.edu)           -
//                                                                           -
// Redistribution and use in source and binary forms, with or without        -
// modification, are permitted provided that the following conditions are    -
// met:                                                                      -
//                                                                           -
// 1. Redistributions of source code must retain the above copyright notice, -
// this list of conditions and the following disclaimer.                     -
//                                                                           -
// 2. Redistributions in binary form must reproduce the above copyright      -
// notice, this list of conditions and the following disclaimer in the       -
// documentation and/or other materials provided with the distribution.      -
//                                                                           -
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS       -
// "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED -
// TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A           -
// PARTICULAR PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER -
// OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL,  -
// EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO,       -
// PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE, DATA, OR        -
// PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF    -
// LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING      -
// NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE OF THIS        -
// SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.              -
//                                                                           -
// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
//                                                                           -
// A description of the arithmetic coding method used here is available in   -
//                                                                           -
// Lossless Compression Handbook, ed. K. Sayood                              -
// Chapter 5: Arithmetic Coding (A. Said), pp. 101-152, Academic Press, 2003 -
//                                                                           -
// A. Said, Introduction to Arithetic Coding Theory and Practice             -
// HP Labs report HPL-2004-76  -  http://www.hpl.hp.com/techreports/         -
//                                                                           -
// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -

//! Arithmetic decoder reading its input from a `Read` source.

use byteorder::ReadBytesExt;
use std::io::Read;

use crate::models::{ArithmeticBitModel, ArithmeticModel, BM_LENGTH_SHIFT, DM_LENGTH_SHIFT};

// maximum AC interval length
pub const AC_MAX_LENGTH: u32 = 0xFFFF_FFFF;
// threshold for renormalization
pub const AC_MIN_LENGTH: u32 = 0x0100_0000;

pub struct ArithmeticDecoder<T: Read> {
    in_stream: T,
    value: u32,
    length: u32,
}

impl<T: Read> ArithmeticDecoder<T> {
    pub fn new(in_stream: T) -> Self {
        Self {
            in_stream,
            value: 0,
            length: AC_MAX_LENGTH,
        }
    }

    pub fn reset(&mut self) {
        self.value = 0;
        self.length = AC_MAX_LENGTH;
    }

    /// Starts a session at the current position of the source.
    pub fn read_init_bytes(&mut self) -> std::io::Result<()> {
        self.length = AC_MAX_LENGTH;
        self.value = self.in_stream.read_u32::<byteorder::BigEndian>()?;
        Ok(())
    }

    pub fn decode_bit(&mut self, model: &mut ArithmeticBitModel) -> std::io::Result<u32> {
        // product l x p0
        let x = model.bit_0_prob * (self.length >> BM_LENGTH_SHIFT);
        let sym = self.value >= x;

        if sym {
            self.value -= x;
            self.length -= x;
        } else {
            self.length = x;
            model.bit_0_count += 1;
        }
        if self.length < AC_MIN_LENGTH {
            self.renorm_dec_interval()?;
        }

        model.bits_until_update -= 1;
        if model.bits_until_update == 0 {
            model.update();
        }
        Ok(sym as u32)
    }

    pub fn decode_symbol(&mut self, model: &mut ArithmeticModel) -> std::io::Result<u32> {
        let upper_bound = self.length;
        self.length >>= DM_LENGTH_SHIFT;
        let (sym, low, high) = if model.decoder_table.is_empty() {
            self.bisect_symbol(model, upper_bound)
        } else {
            self.look_up_symbol(model, upper_bound)
        };

        self.value = self.value.wrapping_sub(low);
        self.length = high.wrapping_sub(low);
        if self.length < AC_MIN_LENGTH {
            self.renorm_dec_interval()?;
        }

        model.symbol_count[sym as usize] += 1;
        model.symbols_until_update -= 1;
        if model.symbols_until_update == 0 {
            model.update();
        }
        Ok(sym)
    }

    /// Finds the symbol whose interval holds the value, starting from the
    /// decoder table and refining by bisection.
    ///
    /// Returns the symbol and the bounds of its interval.
    fn look_up_symbol(&self, model: &ArithmeticModel, upper_bound: u32) -> (u32, u32, u32) {
        let scaled = self.value / self.length;
        // a corrupted stream can produce values outside of the table
        let slot = ((scaled >> model.table_shift) as usize).min(model.table_size as usize);

        let mut sym = model.decoder_table[slot];
        let mut end = model.decoder_table[slot + 1] + 1;
        while end > sym + 1 {
            let middle = (sym + end) >> 1;
            if model.distribution[middle as usize] > scaled {
                end = middle;
            } else {
                sym = middle;
            }
        }

        let low = model.distribution[sym as usize].wrapping_mul(self.length);
        let high = if sym == model.last_symbol {
            upper_bound
        } else {
            model.distribution[sym as usize + 1].wrapping_mul(self.length)
        };
        (sym, low, high)
    }

    /// Same as `look_up_symbol`, for models too small to have a table
    fn bisect_symbol(&self, model: &ArithmeticModel, upper_bound: u32) -> (u32, u32, u32) {
        let (mut sym, mut low, mut high) = (0u32, 0u32, upper_bound);
        let mut end = model.symbols;
        let mut middle = end >> 1;
        loop {
            let bound = self.length * model.distribution[middle as usize];
            if bound > self.value {
                end = middle;
                high = bound;
            } else {
                sym = middle;
                low = bound;
            }
            middle = (sym + end) >> 1;
            if middle == sym {
                break;
            }
        }
        (sym, low, high)
    }

    pub fn read_bit(&mut self) -> std::io::Result<u32> {
        self.read_raw(1)
    }

    pub fn read_bits(&mut self, bits: u32) -> std::io::Result<u32> {
        debug_assert!(bits > 0 && bits <= 32);
        if bits > 19 {
            let lower = u32::from(self.read_short()?);
            let upper = self.read_raw(bits - 16)?;
            Ok((upper << 16) | lower)
        } else {
            self.read_raw(bits)
        }
    }

    pub fn read_byte(&mut self) -> std::io::Result<u8> {
        Ok(self.read_raw(8)? as u8)
    }

    pub fn read_short(&mut self) -> std::io::Result<u16> {
        Ok(self.read_raw(16)? as u16)
    }

    pub fn read_int(&mut self) -> std::io::Result<u32> {
        let lower = u32::from(self.read_short()?);
        let upper = u32::from(self.read_short()?);
        Ok((upper << 16) | lower)
    }

    pub fn read_int_64(&mut self) -> std::io::Result<u64> {
        let lower = u64::from(self.read_int()?);
        let upper = u64::from(self.read_int()?);
        Ok((upper << 32) | lower)
    }

    pub fn in_stream(&mut self) -> &mut T {
        &mut self.in_stream
    }

    pub fn into_stream(self) -> T {
        self.in_stream
    }

    #[inline]
    fn read_raw(&mut self, bits: u32) -> std::io::Result<u32> {
        self.length >>= bits;
        let sym = self.value / self.length;
        self.value = self.value.wrapping_sub(self.length.wrapping_mul(sym));
        if self.length < AC_MIN_LENGTH {
            self.renorm_dec_interval()?;
        }
        Ok(sym)
    }

    fn renorm_dec_interval(&mut self) -> std::io::Result<()> {
        loop {
            self.value = (self.value << 8) | u32::from(self.in_stream.read_u8()?);
            self.length <<= 8;
            if self.length >= AC_MIN_LENGTH {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_init_bytes_are_big_endian() {
        let mut decoder = ArithmeticDecoder::new(Cursor::new(vec![1u8, 2, 3, 4]));
        decoder.read_init_bytes().unwrap();
        assert_eq!(decoder.value, 0x0102_0304);
        assert_eq!(decoder.in_stream().position(), 4);
    }

    #[test]
    fn test_truncated_input_is_an_error() {
        let mut decoder = ArithmeticDecoder::new(Cursor::new(vec![1u8, 2]));
        let err = decoder.read_init_bytes().unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }
}
