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

//! Integer decompressor, the mirror of [`IntegerCompressor`].
//!
//! [`IntegerCompressor`]: crate::compressors::IntegerCompressor

use std::io::Read;

use crate::compressors::{
    CorrectorRange, DEFAULT_BITS, DEFAULT_BITS_HIGH, DEFAULT_CONTEXTS, DEFAULT_RANGE,
};
use crate::decoders::ArithmeticDecoder;
use crate::models::{ArithmeticBitModel, ArithmeticModel};

#[derive(Debug, Clone)]
pub struct IntegerDecompressor {
    k: u32,
    contexts: u32,
    bits_high: u32,
    corr: CorrectorRange,

    m_bits: Vec<ArithmeticModel>,
    m_corrector_0: ArithmeticBitModel,
    m_corrector: Vec<ArithmeticModel>,
}

impl IntegerDecompressor {
    pub fn new(bits: u32, contexts: u32, bits_high: u32, range: u32) -> Self {
        Self {
            k: 0,
            contexts,
            bits_high,
            corr: CorrectorRange::new(bits, range),
            m_bits: vec![],
            m_corrector_0: ArithmeticBitModel::new(),
            m_corrector: vec![],
        }
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    pub fn init(&mut self) {
        let (m_bits, m_corrector) = self.corr.models(self.contexts, self.bits_high, false);
        self.m_bits = m_bits;
        self.m_corrector = m_corrector;
        self.m_corrector_0 = ArithmeticBitModel::new();
    }

    pub fn decompress<T: Read>(
        &mut self,
        decoder: &mut ArithmeticDecoder<T>,
        pred: i32,
        context: u32,
    ) -> std::io::Result<i32> {
        let corr = self.read_corrector(decoder, context)?;
        let range = self.corr.range as i32;
        let real = pred.wrapping_add(corr);
        if real < 0 {
            Ok(real.wrapping_add(range))
        } else if range > 0 && real >= range {
            Ok(real - range)
        } else {
            Ok(real)
        }
    }

    fn read_corrector<T: Read>(
        &mut self,
        decoder: &mut ArithmeticDecoder<T>,
        context: u32,
    ) -> std::io::Result<i32> {
        self.k = decoder.decode_symbol(&mut self.m_bits[context as usize])?;
        if self.k == 0 {
            return Ok(decoder.decode_bit(&mut self.m_corrector_0)? as i32);
        }
        if self.k >= 32 {
            return Ok(self.corr.min);
        }

        let model = &mut self.m_corrector[(self.k - 1) as usize];
        let c = if self.k <= self.bits_high {
            decoder.decode_symbol(model)? as i32
        } else {
            let k1 = self.k - self.bits_high;
            let high = decoder.decode_symbol(model)?;
            let low = decoder.read_bits(k1)?;
            ((high << k1) | low) as i32
        };

        // translate c back into its interval
        if c >= (1u32 << (self.k - 1)) as i32 {
            Ok(c.wrapping_add(1))
        } else {
            Ok(c.wrapping_sub(((1u32 << self.k) - 1) as i32))
        }
    }
}

pub struct IntegerDecompressorBuilder {
    bits: u32,
    contexts: u32,
}

impl IntegerDecompressorBuilder {
    pub fn new() -> Self {
        Self {
            bits: DEFAULT_BITS,
            contexts: DEFAULT_CONTEXTS,
        }
    }

    pub fn bits(&mut self, bits: u32) -> &mut Self {
        self.bits = bits;
        self
    }

    pub fn contexts(&mut self, contexts: u32) -> &mut Self {
        self.contexts = contexts;
        self
    }

    pub fn build(&self) -> IntegerDecompressor {
        IntegerDecompressor::new(self.bits, self.contexts, DEFAULT_BITS_HIGH, DEFAULT_RANGE)
    }

    pub fn build_initialized(&self) -> IntegerDecompressor {
        let mut idc = self.build();
        idc.init();
        idc
    }
}

impl Default for IntegerDecompressorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
