//! Bit vectors shared by every sequence codec.
//!
//! Bits are stored least-significant first inside little-endian `u64` words,
//! so a value appended with width `w` at offset `p` occupies bits
//! `p..p + w` and can be read back with a single (or double) word fetch.

use crate::utils::encoding::{ByteReader, DecodeError, Persist, put_u64, put_words};

/// Mask with the `width` lowest bits set.
#[inline]
pub fn low_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Number of bits needed to write any value in `0..x`.
#[inline]
pub fn ceil_log2(x: u64) -> u32 {
    if x <= 1 { 0 } else { 64 - (x - 1).leading_zeros() }
}

/// Position of the most significant set bit (`x` must be non-zero).
#[inline]
pub fn msb(x: u64) -> u32 {
    debug_assert!(x != 0);
    63 - x.leading_zeros()
}

/// Position of the `k`-th (0-based) set bit of `word`.
#[inline]
fn select_in_word(mut word: u64, k: u32) -> u32 {
    for _ in 0..k {
        word &= word - 1;
    }
    word.trailing_zeros()
}

/// Growable bit buffer used while encoding.
#[derive(Debug, Clone, Default)]
pub struct BitVectorBuilder {
    words: Vec<u64>,
    len: u64,
}

impl BitVectorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bits: u64) -> Self {
        Self {
            words: Vec::with_capacity(bits.div_ceil(64) as usize),
            len: 0,
        }
    }

    /// Number of bits written so far.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, bit: bool) {
        self.append_bits(bit as u64, 1);
    }

    /// Append the `width` low bits of `value` (`width <= 64`).
    pub fn append_bits(&mut self, value: u64, width: u32) {
        if width == 0 {
            return;
        }
        debug_assert!(width <= 64);
        debug_assert!(width == 64 || value >> width == 0, "value does not fit in width");

        let shift = (self.len % 64) as u32;
        self.len += width as u64;
        if shift == 0 {
            self.words.push(value);
            return;
        }

        if let Some(last) = self.words.last_mut() {
            *last |= value << shift;
        }
        if shift + width > 64 {
            self.words.push(value >> (64 - shift));
        }
    }

    /// Append `n` zero bits.
    pub fn zero_extend(&mut self, n: u64) {
        self.len += n;
        self.words.resize(self.len.div_ceil(64) as usize, 0);
    }

    pub fn set(&mut self, pos: u64, bit: bool) {
        debug_assert!(pos < self.len);
        let word = (pos / 64) as usize;
        let mask = 1u64 << (pos % 64);
        if bit {
            self.words[word] |= mask;
        } else {
            self.words[word] &= !mask;
        }
    }

    /// Overwrite `width` bits starting at `pos`.
    pub fn set_bits(&mut self, pos: u64, value: u64, width: u32) {
        if width == 0 {
            return;
        }
        debug_assert!(pos + width as u64 <= self.len);
        let mask = low_mask(width);
        let word = (pos / 64) as usize;
        let shift = (pos % 64) as u32;

        self.words[word] &= !(mask << shift);
        self.words[word] |= value << shift;
        if shift + width > 64 {
            let spill = 64 - shift;
            self.words[word + 1] &= !(mask >> spill);
            self.words[word + 1] |= value >> spill;
        }
    }

    /// Append every bit of `other`.
    pub fn append(&mut self, other: &BitVectorBuilder) {
        if other.len == 0 {
            return;
        }
        if self.len % 64 == 0 {
            self.words.extend_from_slice(&other.words);
            self.len += other.len;
            return;
        }

        let mut remaining = other.len;
        for &word in &other.words {
            let width = remaining.min(64) as u32;
            self.append_bits(word & low_mask(width), width);
            remaining -= width as u64;
        }
    }

    pub fn build(self) -> BitVector {
        BitVector {
            words: self.words,
            len: self.len,
        }
    }
}

/// Immutable bit buffer with word-level random access.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitVector {
    words: Vec<u64>,
    len: u64,
}

impl BitVector {
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Space taken by the encoded buffer.
    pub fn bytes(&self) -> usize {
        std::mem::size_of::<u64>() * (self.words.len() + 1)
    }

    #[inline]
    pub fn get(&self, pos: u64) -> bool {
        debug_assert!(pos < self.len);
        (self.words[(pos / 64) as usize] >> (pos % 64)) & 1 == 1
    }

    /// Read `width` bits starting at `pos`.
    #[inline]
    pub fn get_bits(&self, pos: u64, width: u32) -> u64 {
        if width == 0 {
            return 0;
        }
        debug_assert!(pos + width as u64 <= self.len);
        let block = (pos / 64) as usize;
        let shift = (pos % 64) as u32;
        let mask = low_mask(width);

        if shift + width <= 64 {
            (self.words[block] >> shift) & mask
        } else {
            ((self.words[block] >> shift) | (self.words[block + 1] << (64 - shift))) & mask
        }
    }

    /// First set bit at or after `pos`.
    #[inline]
    pub fn next_one(&self, pos: u64) -> Option<u64> {
        self.nth_one_from(pos, 0)
    }

    /// Position of the `k`-th (0-based) set bit at or after `pos`.
    pub fn nth_one_from(&self, pos: u64, k: u64) -> Option<u64> {
        self.nth_from(pos, k, |w| w)
    }

    /// Position of the `k`-th (0-based) clear bit at or after `pos`.
    pub fn nth_zero_from(&self, pos: u64, k: u64) -> Option<u64> {
        self.nth_from(pos, k, |w| !w)
    }

    fn nth_from(&self, pos: u64, mut k: u64, view: impl Fn(u64) -> u64) -> Option<u64> {
        if pos >= self.len {
            return None;
        }
        let mut block = (pos / 64) as usize;
        let mut word = view(self.words[block]) & (u64::MAX << (pos % 64));

        loop {
            let ones = word.count_ones() as u64;
            if k < ones {
                let found = block as u64 * 64 + select_in_word(word, k as u32) as u64;
                return (found < self.len).then_some(found);
            }
            k -= ones;
            block += 1;
            if block >= self.words.len() {
                return None;
            }
            word = view(self.words[block]);
        }
    }
}

impl Persist for BitVector {
    fn write_to(&self, buf: &mut Vec<u8>) {
        put_u64(buf, self.len);
        put_words(buf, &self.words);
    }

    fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let len = reader.read_u64()?;
        let words = reader.read_words()?;
        if words.len() as u64 != len.div_ceil(64) {
            return Err(DecodeError::Inconsistent(format!(
                "bit vector of {} bits stored in {} words",
                len,
                words.len()
            )));
        }
        Ok(Self { words, len })
    }
}

/// Sequential reader over a [`BitVector`].
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    bits: &'a BitVector,
    pos: u64,
}

impl<'a> BitReader<'a> {
    pub fn new(bits: &'a BitVector, pos: u64) -> Self {
        Self { bits, pos }
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> u64 {
        self.bits.len().saturating_sub(self.pos)
    }

    #[inline]
    pub fn get_bits(&mut self, width: u32) -> u64 {
        let value = self.bits.get_bits(self.pos, width);
        self.pos += width as u64;
        value
    }

    /// Skip a run of zeros and the one terminating it, returning the run length.
    pub fn skip_zeros(&mut self) -> u32 {
        match self.bits.next_one(self.pos) {
            Some(one) => {
                let zeros = (one - self.pos) as u32;
                self.pos = one + 1;
                zeros
            }
            None => {
                let zeros = (self.bits.len() - self.pos) as u32;
                self.pos = self.bits.len();
                zeros
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_get_bits_across_words() {
        let mut builder = BitVectorBuilder::new();
        let widths = [3u32, 17, 64, 1, 33, 60, 7];
        let values = [5u64, 0x1_2345, u64::MAX - 7, 1, 0x1_0000_0001, (1 << 59) + 3, 99];
        for (&v, &w) in values.iter().zip(&widths) {
            builder.append_bits(v, w);
        }
        let bits = builder.build();

        let mut pos = 0;
        for (&v, &w) in values.iter().zip(&widths) {
            assert_eq!(bits.get_bits(pos, w), v);
            pos += w as u64;
        }
        assert_eq!(bits.len(), pos);
    }

    #[test]
    fn test_set_bits_overwrites_in_place() {
        let mut builder = BitVectorBuilder::new();
        builder.zero_extend(130);
        builder.set_bits(60, 0b1011_0110, 8);
        builder.set_bits(60, 0b0000_1111, 8);
        builder.set(129, true);
        let bits = builder.build();
        assert_eq!(bits.get_bits(60, 8), 0b0000_1111);
        assert!(bits.get(129));
        assert!(!bits.get(128));
    }

    #[test]
    fn test_append_unaligned_builder() {
        let mut a = BitVectorBuilder::new();
        a.append_bits(0b101, 3);
        let mut b = BitVectorBuilder::new();
        for i in 0..100u64 {
            b.push(i % 3 == 0);
        }
        a.append(&b);
        let bits = a.build();
        assert_eq!(bits.len(), 103);
        for i in 0..100u64 {
            assert_eq!(bits.get(3 + i), i % 3 == 0, "bit {}", i);
        }
    }

    #[test]
    fn test_nth_one_and_zero() {
        let mut builder = BitVectorBuilder::new();
        builder.zero_extend(200);
        for p in [3u64, 64, 65, 150, 199] {
            builder.set(p, true);
        }
        let bits = builder.build();

        assert_eq!(bits.next_one(0), Some(3));
        assert_eq!(bits.next_one(4), Some(64));
        assert_eq!(bits.nth_one_from(0, 3), Some(150));
        assert_eq!(bits.nth_one_from(151, 0), Some(199));
        assert_eq!(bits.nth_one_from(0, 5), None);
        assert_eq!(bits.nth_zero_from(0, 3), Some(4));
        assert_eq!(bits.nth_zero_from(64, 0), Some(66));
        // Zeros past the logical end do not count.
        assert_eq!(bits.nth_zero_from(199, 0), None);
    }

    #[test]
    fn test_reader_skip_zeros() {
        let mut builder = BitVectorBuilder::new();
        builder.append_bits(1 << 5, 6);
        builder.append_bits(0b11, 2);
        let bits = builder.build();
        let mut reader = BitReader::new(&bits, 0);
        assert_eq!(reader.skip_zeros(), 5);
        assert_eq!(reader.position(), 6);
        assert_eq!(reader.get_bits(2), 0b11);
    }

    #[test]
    fn test_ceil_log2() {
        assert_eq!(ceil_log2(0), 0);
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(256), 8);
        assert_eq!(ceil_log2(257), 9);
        assert_eq!(ceil_log2(u64::MAX), 64);
    }
}
