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

//! Integer compressor: codes the difference between a predicted and
//! a real integer as a magnitude class followed by a corrector.

use std::io::Write;

use crate::encoders::ArithmeticEncoder;
use crate::models::{ArithmeticBitModel, ArithmeticModel, ArithmeticModelBuilder};

pub const DEFAULT_BITS: u32 = 16;
pub const DEFAULT_CONTEXTS: u32 = 1;
pub const DEFAULT_BITS_HIGH: u32 = 8;
pub const DEFAULT_RANGE: u32 = 0;

/// Number of significant bits of the corrector and the
/// interval into which it is folded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct CorrectorRange {
    pub(crate) bits: u32,
    pub(crate) range: u32,
    pub(crate) min: i32,
    pub(crate) max: i32,
}

impl CorrectorRange {
    pub(crate) fn new(bits: u32, range: u32) -> Self {
        if range != 0 {
            let mut corr_bits = 32 - range.leading_zeros();
            if range == 1u32 << (corr_bits - 1) {
                corr_bits -= 1;
            }
            let min = -((range / 2) as i32);
            Self {
                bits: corr_bits,
                range,
                min,
                max: min.wrapping_add((range - 1) as i32),
            }
        } else if (1..32).contains(&bits) {
            let range = 1u32 << bits;
            let min = -((range / 2) as i32);
            Self {
                bits,
                range,
                min,
                max: min.wrapping_add((range - 1) as i32),
            }
        } else {
            Self {
                bits: 32,
                range: 0,
                min: i32::MIN,
                max: i32::MAX,
            }
        }
    }

    /// Folds a corrector into `[min, max]`.
    pub(crate) fn fold(&self, corr: i32) -> i32 {
        if corr < self.min {
            corr.wrapping_add(self.range as i32)
        } else if corr > self.max {
            corr.wrapping_sub(self.range as i32)
        } else {
            corr
        }
    }

    /// Symbol models for the magnitude classes and the correctors.
    pub(crate) fn models(
        &self,
        contexts: u32,
        bits_high: u32,
        compress: bool,
    ) -> (Vec<ArithmeticModel>, Vec<ArithmeticModel>) {
        let m_bits = (0..contexts)
            .map(|_| {
                ArithmeticModelBuilder::new(self.bits + 1)
                    .compress(compress)
                    .build()
            })
            .collect();
        let m_corrector = (1..=self.bits)
            .map(|i| {
                ArithmeticModelBuilder::new(1u32 << i.min(bits_high))
                    .compress(compress)
                    .build()
            })
            .collect();
        (m_bits, m_corrector)
    }
}

#[derive(Debug, Clone)]
pub struct IntegerCompressor {
    k: u32,
    contexts: u32,
    bits_high: u32,
    corr: CorrectorRange,

    m_bits: Vec<ArithmeticModel>,
    m_corrector_0: ArithmeticBitModel,
    m_corrector: Vec<ArithmeticModel>,
}

impl IntegerCompressor {
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

    /// The magnitude class of the last compressed corrector
    pub fn k(&self) -> u32 {
        self.k
    }

    /// (Re)creates the models, must be called before the first `compress`
    /// and at every chunk start.
    pub fn init(&mut self) {
        let (m_bits, m_corrector) = self.corr.models(self.contexts, self.bits_high, true);
        self.m_bits = m_bits;
        self.m_corrector = m_corrector;
        self.m_corrector_0 = ArithmeticBitModel::new();
    }

    pub fn compress<T: Write>(
        &mut self,
        encoder: &mut ArithmeticEncoder<T>,
        pred: i32,
        real: i32,
        context: u32,
    ) -> std::io::Result<()> {
        let mut c = self.corr.fold(real.wrapping_sub(pred));

        // find the tightest interval [ - (2^k - 1)  ...  + (2^k) ] that contains c
        let c1 = (if c <= 0 { c.wrapping_neg() } else { c - 1 }) as u32;
        self.k = 32 - c1.leading_zeros();

        encoder.encode_symbol(&mut self.m_bits[context as usize], self.k)?;
        if self.k == 0 {
            // c is 0 or 1
            debug_assert!(c == 0 || c == 1);
            return encoder.encode_bit(&mut self.m_corrector_0, c as u32);
        }
        if self.k == 32 {
            // only i32::MIN lands here, the class says it all
            return Ok(());
        }

        // translate c into the k-bit interval [ 0 ... 2^k - 1 ]
        if c >= 0 {
            c -= 1;
        } else {
            c = c.wrapping_add(((1u32 << self.k) - 1) as i32);
        }

        let model = &mut self.m_corrector[(self.k - 1) as usize];
        if self.k <= self.bits_high {
            encoder.encode_symbol(model, c as u32)
        } else {
            // the high bits go through the model, the low k1 bits are raw
            let k1 = self.k - self.bits_high;
            let low = (c as u32) & ((1u32 << k1) - 1);
            encoder.encode_symbol(model, (c >> k1) as u32)?;
            encoder.write_bits(k1, low)
        }
    }
}

pub struct IntegerCompressorBuilder {
    bits: u32,
    contexts: u32,
}

impl IntegerCompressorBuilder {
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

    pub fn build(&self) -> IntegerCompressor {
        IntegerCompressor::new(self.bits, self.contexts, DEFAULT_BITS_HIGH, DEFAULT_RANGE)
    }

    pub fn build_initialized(&self) -> IntegerCompressor {
        let mut ic = self.build();
        ic.init();
        ic
    }
}

impl Default for IntegerCompressorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::decompressors::IntegerDecompressorBuilder;
    use crate::decoders::ArithmeticDecoder;
    use std::io::Cursor;

    #[test]
    fn test_corrector_range() {
        let r = CorrectorRange::new(16, 0);
        assert_eq!((r.bits, r.range, r.min, r.max), (16, 65536, -32768, 32767));

        let r = CorrectorRange::new(0, 256);
        assert_eq!((r.bits, r.range, r.min, r.max), (8, 256, -128, 127));

        let r = CorrectorRange::new(0, 100);
        assert_eq!((r.bits, r.range, r.min, r.max), (7, 100, -50, 49));

        let r = CorrectorRange::new(32, 0);
        assert_eq!((r.bits, r.range), (32, 0));
        assert_eq!(r.fold(i32::MIN), i32::MIN);
    }

    #[test]
    fn test_fold_wraps_into_interval() {
        let r = CorrectorRange::new(8, 0);
        assert_eq!(r.fold(200), 200 - 256);
        assert_eq!(r.fold(-200), -200 + 256);
        assert_eq!(r.fold(5), 5);
    }

    fn round_trip(bits: u32, contexts: u32, values: &[(i32, i32, u32)]) {
        let mut encoder = ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new()));
        let mut ic = IntegerCompressorBuilder::new()
            .bits(bits)
            .contexts(contexts)
            .build_initialized();
        for &(pred, real, ctx) in values {
            ic.compress(&mut encoder, pred, real, ctx).unwrap();
        }
        encoder.done().unwrap();

        let mut decoder = ArithmeticDecoder::new(Cursor::new(encoder.into_stream().into_inner()));
        decoder.read_init_bytes().unwrap();
        let mut idc = IntegerDecompressorBuilder::new()
            .bits(bits)
            .contexts(contexts)
            .build_initialized();
        for &(pred, real, ctx) in values {
            assert_eq!(idc.decompress(&mut decoder, pred, ctx).unwrap(), real);
        }
    }

    #[test]
    fn test_extreme_32_bit_differences() {
        round_trip(
            32,
            2,
            &[
                (0, 0, 0),
                (0, 1, 1),
                (i32::MAX, i32::MIN, 0),
                (i32::MIN, i32::MAX, 1),
                (0, i32::MIN, 0),
                (-5, 1_000_000, 1),
                (123, 123, 0),
            ],
        );
    }

    #[test]
    fn test_16_bit_values_fold() {
        let values: Vec<(i32, i32, u32)> = (0..2000)
            .map(|i| (((i * 37) % 65536), ((i * 911 + 7) % 65536), (i % 4) as u32))
            .collect();
        round_trip(16, 4, &values);
    }
}
