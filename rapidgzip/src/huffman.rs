//! Canonical Huffman code construction and decoding (RFC 1951 §3.2.2).

use crate::bitreader::BitReader;
use crate::error::{Error, Result};

const MAX_CODE_LENGTH: usize = 15;

/// A decode table built from an array of per-symbol code lengths.
///
/// Internally this is a flat lookup table indexed by the next
/// `max_length` peeked bits, mapping straight to `(symbol, length)`. This
/// trades a little memory for branchless decode, the same tradeoff
/// `oozextract`'s `HuffRevLut` makes, just without its SIMD-oriented
/// layout since this alphabet is small enough not to need it.
pub struct HuffmanCoding {
    /// lut[bits] = (symbol, code_length), for all `bits` of `max_length`
    /// width consistent with some codeword.
    lut: Vec<(u16, u8)>,
    max_length: u32,
}

impl HuffmanCoding {
    /// Builds a canonical Huffman coding from per-symbol code lengths
    /// (0 meaning "symbol unused"). Rejects over-subscribed codes and,
    /// optionally, single-symbol codings (see the crate's design notes on
    /// the Open Question this resolves).
    pub fn build_from_lengths(lengths: &[u8], allow_single_symbol: bool) -> Result<Self> {
        let max_length = *lengths.iter().max().unwrap_or(&0) as usize;
        if max_length == 0 {
            return Err(Error::InvalidCodeLengths);
        }
        if max_length > MAX_CODE_LENGTH {
            return Err(Error::InvalidCodeLengths);
        }

        let mut bl_count = vec![0u32; max_length + 1];
        for &len in lengths {
            if len > 0 {
                bl_count[len as usize] += 1;
            }
        }

        let used_symbols: usize = bl_count.iter().sum::<u32>() as usize;
        if used_symbols == 0 {
            return Err(Error::InvalidCodeLengths);
        }
        if used_symbols == 1 && !allow_single_symbol {
            return Err(Error::InvalidCodeLengths);
        }

        // Verify the code is exactly complete (not over- or
        // under-subscribed) via the Kraft inequality, except the
        // single-symbol case which is inherently "under-subscribed" by
        // this metric and is handled by the `used_symbols == 1` guard above.
        if used_symbols > 1 {
            let mut remaining: i64 = 1 << max_length;
            for len in 1..=max_length {
                remaining -= (bl_count[len] as i64) << (max_length - len);
                if remaining < 0 {
                    return Err(Error::InvalidCodeLengths);
                }
            }
        }

        // RFC 1951 §3.2.2 next_code computation.
        let mut code = 0u32;
        let mut next_code_arr = vec![0u32; max_length + 1];
        for bits in 1..=max_length {
            code = (code + bl_count[bits - 1]) << 1;
            next_code_arr[bits] = code;
        }

        let lut_size = 1usize << max_length;
        let mut lut = vec![(0u16, 0u8); lut_size];
        let mut filled = vec![false; lut_size];

        for (symbol, &len) in lengths.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let len = len as usize;
            let code = next_code_arr[len];
            next_code_arr[len] += 1;

            // Codewords are MSB-first when written out, but deflate reads
            // bits LSB-first from the stream; the classic resolution is to
            // reverse the codeword bits once here so the decode side can
            // do a flat LSB-first lookup.
            let reversed = reverse_bits(code, len as u32);

            // Fill every LUT slot whose low `len` bits equal `reversed`;
            // the remaining high bits are free (not yet consumed).
            let step = 1usize << len;
            let mut entry = reversed as usize;
            while entry < lut_size {
                if filled[entry] {
                    return Err(Error::InvalidCodeLengths);
                }
                filled[entry] = true;
                lut[entry] = (symbol as u16, len as u8);
                entry += step;
            }
        }

        Ok(Self {
            lut,
            max_length: max_length as u32,
        })
    }

    /// Decodes a single symbol, advancing the reader past its codeword.
    pub fn decode(&self, reader: &mut BitReader) -> Result<u16> {
        let peeked = reader.peek(self.max_length)?;
        let (symbol, len) = self.lut[peeked as usize];
        if len == 0 {
            return Err(Error::InvalidCodeLengths);
        }
        reader.read(len as u32)?;
        Ok(symbol)
    }
}

fn reverse_bits(value: u32, bits: u32) -> u32 {
    let mut v = value;
    let mut r = 0u32;
    for _ in 0..bits {
        r = (r << 1) | (v & 1);
        v >>= 1;
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn rejects_empty_lengths() {
        assert!(HuffmanCoding::build_from_lengths(&[0, 0, 0], false).is_err());
    }

    #[test]
    fn rejects_single_symbol_by_default() {
        assert!(HuffmanCoding::build_from_lengths(&[0, 1, 0], false).is_err());
    }

    #[test]
    fn allows_single_symbol_when_requested() {
        assert!(HuffmanCoding::build_from_lengths(&[0, 1, 0], true).is_ok());
    }

    #[test]
    fn rejects_over_subscribed() {
        // Two symbols both claiming length 1 is already a complete code;
        // three would over-subscribe it.
        assert!(HuffmanCoding::build_from_lengths(&[1, 1, 1], false).is_err());
    }

    #[test]
    fn decodes_fixed_three_symbol_code() {
        // lengths: a=1, b=2, c=2 -> a=0, b=10, c=11 (canonical)
        let coding = HuffmanCoding::build_from_lengths(&[1, 2, 2], false).unwrap();
        let bytes: Arc<[u8]> = Arc::from(&[0b0110_1000u8][..]); // bits LSB first: 0,0,0,1,0,1,1,0
        let mut reader = BitReader::new(bytes);
        // First bit is 0 -> symbol 0 (a)
        assert_eq!(coding.decode(&mut reader).unwrap(), 0);
    }
}
