//! Elias-Fano blocks and the plain [`EfSequence`].
//!
//! A block encoding `n` values below `universe` splits every value into
//! `l = floor(log2(universe / n))` low bits, stored verbatim, and a high part
//! stored in unary: value `i` sets bit `(v >> l) + i` of a bitmap of
//! `n + (universe >> l) + 1` bits. Ahead of both live two sampled pointer
//! tables, one entry per `2^9` zeros and one per `2^8` ones of the high
//! bitmap, so select and successor jumps never scan more than one sample.
//!
//! Block layout, starting at the block offset:
//!
//! ```text
//! [zero samples][one samples][low bits: n * l][high bitmap]
//! ```

use super::bits::{BitVector, BitVectorBuilder, ceil_log2, low_mask, msb};
use super::{BuildError, Codec, MonotoneSequence, Range, SequenceCursor, SequenceParams, check_reserved};
use crate::utils::encoding::{ByteReader, DecodeError, Persist, put_u64};

const LOG_SAMPLING0: u32 = 9;
const LOG_SAMPLING1: u32 = 8;

/// Forward distances (in high buckets) worth scanning instead of jumping.
const LINEAR_SKIP: u64 = 8;

/// Offsets of every section of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EfLayout {
    n: u64,
    universe: u64,
    lower_bits: u32,
    pointer_size: u32,
    high_len: u64,
    num_pointers0: u64,
    num_pointers1: u64,
    pointers0_offset: u64,
    pointers1_offset: u64,
    lower_offset: u64,
    higher_offset: u64,
    end: u64,
}

impl EfLayout {
    pub fn new(offset: u64, universe: u64, n: u64) -> Self {
        let lower_bits = if n > 0 && universe > n { msb(universe / n) } else { 0 };
        let high_buckets = universe >> lower_bits;
        let high_len = n + high_buckets + 1;
        let pointer_size = ceil_log2(high_len);
        let num_pointers0 = high_buckets >> LOG_SAMPLING0;
        let num_pointers1 = if n == 0 { 0 } else { (n - 1) >> LOG_SAMPLING1 };

        let pointers0_offset = offset;
        let pointers1_offset = pointers0_offset + num_pointers0 * pointer_size as u64;
        let lower_offset = pointers1_offset + num_pointers1 * pointer_size as u64;
        let higher_offset = lower_offset + n * lower_bits as u64;
        let end = higher_offset + high_len;

        Self {
            n,
            universe,
            lower_bits,
            pointer_size,
            high_len,
            num_pointers0,
            num_pointers1,
            pointers0_offset,
            pointers1_offset,
            lower_offset,
            higher_offset,
            end,
        }
    }

    /// Encoded size in bits.
    pub fn bit_size(&self) -> u64 {
        self.end - self.pointers0_offset
    }

    pub fn lower_bits(&self) -> u32 {
        self.lower_bits
    }
}

/// Bits taken by a block of `n` values below `universe`.
pub fn block_bit_size(universe: u64, n: u64) -> u64 {
    EfLayout::new(0, universe, n).bit_size()
}

/// Append one block holding `values` (non-decreasing, all `< universe`).
pub fn write_block(out: &mut BitVectorBuilder, values: &[u64], universe: u64) {
    let layout = EfLayout::new(out.len(), universe, values.len() as u64);
    out.zero_extend(layout.bit_size());

    let l = layout.lower_bits;
    let mask = low_mask(l);
    let mut last = 0u64;
    for (i, &value) in values.iter().enumerate() {
        debug_assert!(value >= last, "values must be non-decreasing");
        debug_assert!(value < universe, "value {} outside universe {}", value, universe);
        last = value;

        let i = i as u64;
        out.set_bits(layout.lower_offset + i * l as u64, value & mask, l);
        out.set(layout.higher_offset + (value >> l) + i, true);
    }

    let ps = layout.pointer_size;

    // zero `z` sits after every one whose high part is <= z
    let mut seen = 0usize;
    for j in 1..=layout.num_pointers0 {
        let zero = j << LOG_SAMPLING0;
        while seen < values.len() && (values[seen] >> l) <= zero {
            seen += 1;
        }
        let pos = zero + seen as u64;
        out.set_bits(layout.pointers0_offset + (j - 1) * ps as u64, pos, ps);
    }

    for j in 1..=layout.num_pointers1 {
        let i = j << LOG_SAMPLING1;
        let pos = (values[i as usize] >> l) + i;
        out.set_bits(layout.pointers1_offset + (j - 1) * ps as u64, pos, ps);
    }
}

/// Sequential decoder over one block.
///
/// Past the last element the enumerator sits at position `n` with value
/// `universe`.
#[derive(Debug, Clone)]
pub struct EfEnumerator<'a> {
    bits: &'a BitVector,
    layout: EfLayout,
    position: u64,
    high_pos: u64,
    value: u64,
}

impl<'a> EfEnumerator<'a> {
    /// Open the block at `offset` and position on element `pos`.
    pub fn at(bits: &'a BitVector, offset: u64, universe: u64, n: u64, pos: u64) -> Self {
        let mut e = Self {
            bits,
            layout: EfLayout::new(offset, universe, n),
            position: n,
            high_pos: 0,
            value: universe,
        };
        e.move_to(pos);
        e
    }

    pub fn new(bits: &'a BitVector, offset: u64, universe: u64, n: u64) -> Self {
        Self::at(bits, offset, universe, n, 0)
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.layout.n
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.value
    }

    #[inline]
    fn low(&self, i: u64) -> u64 {
        let l = self.layout.lower_bits;
        self.bits.get_bits(self.layout.lower_offset + i * l as u64, l)
    }

    #[inline]
    fn pointer(&self, table: u64, j: u64) -> u64 {
        let ps = self.layout.pointer_size;
        self.bits.get_bits(table + j * ps as u64, ps)
    }

    #[inline]
    fn settle(&mut self, i: u64, high_pos: u64) {
        self.position = i;
        self.high_pos = high_pos;
        self.value = ((high_pos - i) << self.layout.lower_bits) | self.low(i);
    }

    fn finish(&mut self) {
        self.position = self.layout.n;
        self.value = self.layout.universe;
    }

    /// First one at or after `from` (relative to the high bitmap).
    #[inline]
    fn next_high_one(&self, from: u64, k: u64) -> u64 {
        let hb = self.layout.higher_offset;
        self.bits
            .nth_one_from(hb + from, k)
            .map_or(self.layout.high_len, |p| p - hb)
    }

    /// High bitmap position of the one belonging to element `i`.
    fn select1(&self, i: u64) -> u64 {
        let k = i >> LOG_SAMPLING1;
        let start = if k == 0 {
            0
        } else {
            self.pointer(self.layout.pointers1_offset, k - 1)
        };
        self.next_high_one(start, i - (k << LOG_SAMPLING1))
    }

    /// High bitmap position of the `i`-th zero.
    fn select0(&self, i: u64) -> u64 {
        let hb = self.layout.higher_offset;
        let k = i >> LOG_SAMPLING0;
        let start = if k == 0 {
            0
        } else {
            self.pointer(self.layout.pointers0_offset, k - 1)
        };
        self.bits
            .nth_zero_from(hb + start, i - (k << LOG_SAMPLING0))
            .map_or(self.layout.high_len, |p| p - hb)
    }

    pub fn move_to(&mut self, i: u64) {
        if i == self.position {
            return;
        }
        if i >= self.layout.n {
            self.finish();
            return;
        }
        let high_pos = if self.position < self.layout.n && i > self.position {
            self.next_high_one(self.high_pos + 1, i - self.position - 1)
        } else {
            self.select1(i)
        };
        self.settle(i, high_pos);
    }

    pub fn next(&mut self) {
        let i = self.position + 1;
        if i >= self.layout.n {
            self.finish();
            return;
        }
        let high_pos = self.next_high_one(self.high_pos + 1, 0);
        self.settle(i, high_pos);
    }

    /// Move forward to the first element `>= x`.
    pub fn next_geq(&mut self, x: u64) {
        if self.position >= self.layout.n || self.value >= x {
            return;
        }
        if x >= self.layout.universe {
            self.finish();
            return;
        }

        let l = self.layout.lower_bits;
        let high = x >> l;
        let current_high = self.high_pos - self.position;
        if high > current_high + LINEAR_SKIP {
            let after_zero = self.select0(high - 1) + 1;
            let i = after_zero - high;
            if i >= self.layout.n {
                self.finish();
                return;
            }
            if i > self.position {
                let high_pos = self.next_high_one(after_zero, 0);
                self.settle(i, high_pos);
            }
        }

        while self.position < self.layout.n && self.value < x {
            self.next();
        }
    }
}

/// One Elias-Fano block over the whole sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EfSequence {
    size: u64,
    universe: u64,
    bits: BitVector,
}

impl EfSequence {
    pub fn from_values(values: &[u64]) -> Self {
        let universe = values.last().map_or(0, |&v| v + 1);
        let mut builder = BitVectorBuilder::with_capacity(block_bit_size(universe, values.len() as u64));
        write_block(&mut builder, values, universe);
        Self {
            size: values.len() as u64,
            universe,
            bits: builder.build(),
        }
    }

    fn enumerator_at(&self, pos: u64) -> EfEnumerator<'_> {
        EfEnumerator::at(&self.bits, 0, self.universe, self.size, pos)
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        let mut e = self.enumerator_at(0);
        std::iter::from_fn(move || {
            if e.position() >= e.size() {
                return None;
            }
            let v = e.value();
            e.next();
            Some(v)
        })
    }
}

impl Persist for EfSequence {
    fn write_to(&self, buf: &mut Vec<u8>) {
        put_u64(buf, self.size);
        put_u64(buf, self.universe);
        self.bits.write_to(buf);
    }

    fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let size = reader.read_u64()?;
        let universe = reader.read_u64()?;
        let bits = BitVector::read_from(reader)?;

        if (size == 0) != (universe == 0) {
            return Err(DecodeError::Inconsistent(format!(
                "elias-fano sequence of {} values with universe {}",
                size, universe
            )));
        }
        if size > bits.len() {
            return Err(DecodeError::Inconsistent(format!(
                "elias-fano sequence of {} values in {} bits",
                size,
                bits.len()
            )));
        }
        let expected = block_bit_size(universe, size);
        if expected != bits.len() {
            return Err(DecodeError::Inconsistent(format!(
                "elias-fano block needs {} bits, found {}",
                expected,
                bits.len()
            )));
        }
        Ok(Self {
            size,
            universe,
            bits,
        })
    }
}

/// Cursor over an [`EfSequence`].
#[derive(Debug, Clone)]
pub struct EfCursor<'a> {
    block: EfEnumerator<'a>,
    range_base: u64,
    previous: u64,
}

impl SequenceCursor for EfCursor<'_> {
    #[inline]
    fn position(&self) -> u64 {
        self.block.position()
    }

    #[inline]
    fn value(&self) -> u64 {
        self.block.value() - self.range_base
    }

    #[inline]
    fn absolute(&self) -> u64 {
        self.block.value()
    }

    #[inline]
    fn advance(&mut self) {
        self.previous = self.block.value();
        self.block.next();
    }

    #[inline]
    fn enter_next_range(&mut self) {
        self.range_base = self.previous;
    }

    fn seek(&mut self, id: u64, end: u64) -> u64 {
        if self.block.position() >= end {
            return end;
        }
        self.block.next_geq(id.saturating_add(self.range_base));
        self.block.position().min(end)
    }
}

impl MonotoneSequence for EfSequence {
    const CODEC: Codec = Codec::EliasFano;

    type Cursor<'a> = EfCursor<'a>;

    fn build(values: &[u64], _params: &SequenceParams) -> Result<Self, BuildError> {
        check_reserved(values)?;
        Ok(Self::from_values(values))
    }

    fn len(&self) -> u64 {
        self.size
    }

    fn universe(&self) -> u64 {
        self.universe
    }

    fn bytes(&self) -> usize {
        2 * std::mem::size_of::<u64>() + self.bits.bytes()
    }

    fn access(&self, pos: u64) -> u64 {
        debug_assert!(pos < self.size, "position {} out of {}", pos, self.size);
        self.enumerator_at(pos).value()
    }

    fn at(&self, range: Range, pos: u64) -> EfCursor<'_> {
        let mut block = self.enumerator_at(if range.begin > 0 { range.begin - 1 } else { pos });
        let range_base = if range.begin > 0 { block.value() } else { 0 };
        block.move_to(pos);
        EfCursor {
            block,
            range_base,
            previous: range_base,
        }
    }
}
