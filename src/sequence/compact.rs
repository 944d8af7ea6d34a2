//! Fixed-width bit-packed vector.
//!
//! Every value takes `ceil_log2(max + 1)` bits. Values are stored raw, so
//! range-relative reads need no base correction and searches inside a range
//! are plain binary searches.

use super::bits::{BitVector, BitVectorBuilder, ceil_log2};
use super::{
    BuildError, Codec, LINEAR_SCAN_THRESHOLD, MonotoneSequence, Range, SequenceCursor, SequenceParams, check_reserved,
};
use crate::utils::encoding::{ByteReader, DecodeError, Persist, put_u8, put_u64};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactVector {
    len: u64,
    universe: u64,
    width: u32,
    bits: BitVector,
}

impl CompactVector {
    pub fn from_values(values: &[u64]) -> Self {
        let max = values.iter().copied().max().unwrap_or(0);
        let universe = max.saturating_add(1);
        let width = if max == u64::MAX { 64 } else { ceil_log2(universe) };

        let mut builder = BitVectorBuilder::with_capacity(values.len() as u64 * width as u64);
        for &value in values {
            builder.append_bits(value, width);
        }
        Self {
            len: values.len() as u64,
            universe,
            width,
            bits: builder.build(),
        }
    }

    #[inline]
    pub fn get(&self, pos: u64) -> u64 {
        debug_assert!(pos < self.len, "position {} out of {}", pos, self.len);
        self.bits.get_bits(pos * self.width as u64, self.width)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.len).map(move |pos| self.get(pos))
    }
}

impl Persist for CompactVector {
    fn write_to(&self, buf: &mut Vec<u8>) {
        put_u64(buf, self.len);
        put_u64(buf, self.universe);
        put_u8(buf, self.width as u8);
        self.bits.write_to(buf);
    }

    fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let len = reader.read_u64()?;
        let universe = reader.read_u64()?;
        let width = reader.read_u8()? as u32;
        let bits = BitVector::read_from(reader)?;

        if width > 64 {
            return Err(DecodeError::Inconsistent(format!("compact width {}", width)));
        }
        let expected = len.checked_mul(width as u64);
        if expected != Some(bits.len()) {
            return Err(DecodeError::Inconsistent(format!(
                "compact vector of {} x {} bits stored in {} bits",
                len,
                width,
                bits.len()
            )));
        }
        Ok(Self {
            len,
            universe,
            width,
            bits,
        })
    }
}

/// Cursor over a [`CompactVector`].
#[derive(Debug, Clone)]
pub struct CompactCursor<'a> {
    vec: &'a CompactVector,
    position: u64,
}

impl SequenceCursor for CompactCursor<'_> {
    #[inline]
    fn position(&self) -> u64 {
        self.position
    }

    #[inline]
    fn value(&self) -> u64 {
        self.vec.get(self.position)
    }

    #[inline]
    fn absolute(&self) -> u64 {
        self.vec.get(self.position)
    }

    #[inline]
    fn advance(&mut self) {
        self.position += 1;
    }

    fn enter_next_range(&mut self) {}

    fn seek(&mut self, id: u64, end: u64) -> u64 {
        let (mut lo, mut hi) = (self.position, end);
        while hi - lo > LINEAR_SCAN_THRESHOLD {
            let mid = lo + (hi - lo) / 2;
            if self.vec.get(mid) >= id {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        let found = (lo..hi).find(|&pos| self.vec.get(pos) >= id).unwrap_or(hi);
        self.position = found;
        found
    }
}

impl MonotoneSequence for CompactVector {
    const CODEC: Codec = Codec::Compact;

    type Cursor<'a> = CompactCursor<'a>;

    fn build(values: &[u64], _params: &SequenceParams) -> Result<Self, BuildError> {
        check_reserved(values)?;
        Ok(Self::from_values(values))
    }

    fn build_ranged(values: &[u64], _pointers: &[u64], _params: &SequenceParams) -> Result<Self, BuildError> {
        check_reserved(values)?;
        Ok(Self::from_values(values))
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn universe(&self) -> u64 {
        self.universe
    }

    fn bytes(&self) -> usize {
        2 * std::mem::size_of::<u64>() + 1 + self.bits.bytes()
    }

    fn access(&self, pos: u64) -> u64 {
        self.get(pos)
    }

    fn range_base(&self, _range: Range) -> u64 {
        0
    }

    fn at(&self, _range: Range, pos: u64) -> CompactCursor<'_> {
        CompactCursor {
            vec: self,
            position: pos,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::NOT_FOUND;
    use crate::sequence::test_support::{check_ranged, ranged_values};

    #[test]
    fn test_width_fits_maximum() {
        let vec = CompactVector::from_values(&[0, 5, 255]);
        assert_eq!(vec.width(), 8);
        assert_eq!(vec.iter().collect::<Vec<_>>(), vec![0, 5, 255]);
        assert_eq!(vec.universe(), 256);

        let zeros = CompactVector::from_values(&[0, 0, 0]);
        assert_eq!(zeros.width(), 0);
        assert_eq!(zeros.get(2), 0);
    }

    #[test]
    fn test_ranged_values_are_stored_raw() {
        let values = [2, 9, 1, 4, 7];
        let pointers = [0, 2, 5];
        let vec = CompactVector::build_ranged(&values, &pointers, &SequenceParams::default()).unwrap();
        assert_eq!(vec.access(2), 1);
        assert_eq!(vec.access_in(Range::new(2, 5), 3), 4);
        assert_eq!(vec.find(Range::new(2, 5), 9), NOT_FOUND);
    }

    #[test]
    fn test_ranged_contract_random() {
        let (values, pointers) = ranged_values(7, 300, 40, 20);
        let vec = CompactVector::build_ranged(&values, &pointers, &SequenceParams::default()).unwrap();
        check_ranged(&vec, &values, &pointers);
    }

    #[test]
    fn test_find_at_binary_search_boundary() {
        let values: Vec<u64> = (0..20).map(|i| 2 * i).chain((0..20).map(|i| 2 * i + 1)).collect();
        let pointers = [0, 20, 40];
        let vec = CompactVector::build_ranged(&values, &pointers, &SequenceParams::default()).unwrap();

        // the search narrows to [6, 10) and the answer sits at its end
        let first = Range::new(0, 20);
        assert_eq!(vec.find(first, 20), 10);
        assert_eq!(vec.next_geq(first, 19), 10);
        assert_eq!(vec.next_geq_clamped(first, 19), 10);
        assert_eq!(vec.find(first, 19), NOT_FOUND);

        let second = Range::new(20, 40);
        assert_eq!(vec.find(second, 21), 30);
        assert_eq!(vec.next_geq(second, 20), 30);
        assert_eq!(vec.next_geq(second, 40), NOT_FOUND);
        for (i, &v) in values.iter().enumerate() {
            let range = if i < 20 { first } else { second };
            assert_eq!(vec.find(range, v), i as u64);
        }
    }

    #[test]
    fn test_persist_round_trip() {
        let vec = CompactVector::from_values(&[1, 1, 3, 1000, 1_000_000]);
        let mut buf = Vec::new();
        vec.write_to(&mut buf);
        let mut reader = ByteReader::new(&buf);
        assert_eq!(CompactVector::read_from(&mut reader).unwrap(), vec);
        assert_eq!(reader.remaining(), 0);
    }
}
