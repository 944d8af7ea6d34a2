//! Compressed monotone integer sequences.
//!
//! A sequence stores `n` integers that are non-decreasing inside caller
//! defined ranges. Ranges are laid out back to back in one physical
//! sequence; codecs that need global monotonicity shift every range by the
//! last stored value of the range before it, and subtract that value again
//! on range-relative reads.
//!
//! ## Backends
//!
//! - [`PefSequence`] - partitioned Elias-Fano, the default for trie nodes
//! - [`EfSequence`] - plain Elias-Fano, used for every pointer sequence
//! - [`CompactVector`] - fixed-width bit packing, values stored raw
//!
//! Cursors returned by [`MonotoneSequence::at`] own all traversal state, so
//! a built sequence is immutable and can be shared between threads freely.

pub mod bits;
pub mod codes;
pub mod compact;
pub mod elias_fano;
pub mod partitioned;

pub use compact::CompactVector;
pub use elias_fano::EfSequence;
pub use partitioned::PefSequence;

use crate::utils::encoding::{DecodeError, Persist};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Position returned by searches that miss.
pub const NOT_FOUND: u64 = u64::MAX;

/// Ranges at most this long are searched by a forward scan.
pub const LINEAR_SCAN_THRESHOLD: u64 = 8;

/// Default `log2` of the partition size of [`PefSequence`].
pub const DEFAULT_LOG_PARTITION_SIZE: u8 = 7;

/// Values a sequence cannot be built from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("value at position {position} is {NOT_FOUND}, which is reserved for misses")]
    ReservedValue { position: u64 },

    #[error("range {range} overflows 64 bits once shifted by the ranges before it")]
    ShiftOverflow { range: u64 },
}

/// Fail on the first value equal to [`NOT_FOUND`]. Stored values must leave
/// room for an exclusive `universe` bound.
pub fn check_reserved(values: &[u64]) -> Result<(), BuildError> {
    match values.iter().position(|&v| v == NOT_FOUND) {
        Some(position) => Err(BuildError::ReservedValue {
            position: position as u64,
        }),
        None => Ok(()),
    }
}

/// Half-open interval `[begin, end)` of sequence positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Range {
    pub begin: u64,
    pub end: u64,
}

impl Range {
    #[inline]
    pub fn new(begin: u64, end: u64) -> Self {
        debug_assert!(end >= begin);
        Self { begin, end }
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.begin
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end == self.begin
    }
}

/// Build-time knobs shared by all codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceParams {
    pub log_partition_size: u8,
}

impl Default for SequenceParams {
    fn default() -> Self {
        Self {
            log_partition_size: DEFAULT_LOG_PARTITION_SIZE,
        }
    }
}

/// On-disk tag identifying a nodes codec.
///
/// The first three name one sequence codec used for both node levels of a
/// trie; the mixed ones pick a codec per level (second, then third).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Codec {
    #[serde(rename = "compact")]
    Compact = 1,
    #[serde(rename = "ef")]
    EliasFano = 2,
    #[serde(rename = "pef")]
    PartitionedEliasFano = 3,
    #[serde(rename = "pef-compact")]
    PefCompact = 4,
    #[serde(rename = "compact-pef")]
    CompactPef = 5,
}

impl Codec {
    pub const ALL: [Codec; 5] = [
        Codec::Compact,
        Codec::EliasFano,
        Codec::PartitionedEliasFano,
        Codec::PefCompact,
        Codec::CompactPef,
    ];

    pub fn from_tag(tag: u8) -> Result<Self, DecodeError> {
        match tag {
            1 => Ok(Codec::Compact),
            2 => Ok(Codec::EliasFano),
            3 => Ok(Codec::PartitionedEliasFano),
            4 => Ok(Codec::PefCompact),
            5 => Ok(Codec::CompactPef),
            value => Err(DecodeError::InvalidTag {
                field: "codec",
                value,
            }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Codec::Compact => "compact",
            Codec::EliasFano => "ef",
            Codec::PartitionedEliasFano => "pef",
            Codec::PefCompact => "pef-compact",
            Codec::CompactPef => "compact-pef",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Codec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|c| c.name()).collect();
                format!("unknown codec '{}' (expected one of {})", s, names.join(", "))
            })
    }
}

/// Traversal state over one sequence.
///
/// `value` is relative to the range the cursor was opened on; after the
/// cursor walks off the end of a range, [`enter_next_range`] rebases it on
/// the range it walked into.
///
/// [`enter_next_range`]: SequenceCursor::enter_next_range
pub trait SequenceCursor {
    fn position(&self) -> u64;

    /// Value under the cursor, relative to the current range.
    fn value(&self) -> u64;

    /// Value under the cursor as physically stored.
    fn absolute(&self) -> u64;

    /// Step to the next position.
    fn advance(&mut self);

    /// Rebase on the range starting at the current position.
    fn enter_next_range(&mut self);

    /// Move forward to the first position in `[position, end)` whose
    /// relative value is `>= id`; returns `end` when there is none.
    fn seek(&mut self, id: u64, end: u64) -> u64;
}

/// Capability shared by every sequence codec.
pub trait MonotoneSequence: Persist + Default + fmt::Debug + Send + Sync + Sized {
    const CODEC: Codec;

    type Cursor<'a>: SequenceCursor
    where
        Self: 'a;

    /// Build from globally non-decreasing values.
    fn build(values: &[u64], params: &SequenceParams) -> Result<Self, BuildError>;

    /// Build from values that are non-decreasing within each range of
    /// `pointers` (`pointers[i]..pointers[i + 1]`).
    fn build_ranged(values: &[u64], pointers: &[u64], params: &SequenceParams) -> Result<Self, BuildError> {
        Self::build(&prefix_shift(values, pointers)?, params)
    }

    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exclusive upper bound on stored values.
    fn universe(&self) -> u64;

    fn bytes(&self) -> usize;

    /// Stored value at `pos`.
    fn access(&self, pos: u64) -> u64;

    /// Value every read inside `range` is relative to.
    fn range_base(&self, range: Range) -> u64 {
        if range.begin == 0 {
            0
        } else {
            self.access(range.begin - 1)
        }
    }

    /// Range-relative value at `pos`.
    fn access_in(&self, range: Range, pos: u64) -> u64 {
        self.access(pos) - self.range_base(range)
    }

    /// Cursor at `pos`, reading values relative to `range`.
    fn at(&self, range: Range, pos: u64) -> Self::Cursor<'_>;

    /// Position of `id` inside `range`, or [`NOT_FOUND`].
    fn find(&self, range: Range, id: u64) -> u64 {
        if range.is_empty() {
            return NOT_FOUND;
        }
        let mut cursor = self.at(range, range.begin);
        if range.len() <= LINEAR_SCAN_THRESHOLD {
            return match scan_geq(&mut cursor, range, id) {
                Some(pos) if cursor.value() == id => pos,
                _ => NOT_FOUND,
            };
        }
        let pos = cursor.seek(id, range.end);
        if pos < range.end && cursor.value() == id {
            pos
        } else {
            NOT_FOUND
        }
    }

    /// Smallest position in `range` whose value is `>= id`, or [`NOT_FOUND`]
    /// when every value in the range is smaller.
    fn next_geq(&self, range: Range, id: u64) -> u64 {
        if range.is_empty() {
            return NOT_FOUND;
        }
        let mut cursor = self.at(range, range.begin);
        if range.len() <= LINEAR_SCAN_THRESHOLD {
            return scan_geq(&mut cursor, range, id).unwrap_or(NOT_FOUND);
        }
        let pos = cursor.seek(id, range.end);
        if pos < range.end { pos } else { NOT_FOUND }
    }

    /// Like [`next_geq`](MonotoneSequence::next_geq) but never fails on a
    /// non-empty range: a miss clamps to `range.end - 1`.
    fn next_geq_clamped(&self, range: Range, id: u64) -> u64 {
        if range.is_empty() {
            return NOT_FOUND;
        }
        let mut cursor = self.at(range, range.begin);
        if range.len() <= LINEAR_SCAN_THRESHOLD {
            return scan_geq(&mut cursor, range, id).unwrap_or(range.end - 1);
        }
        cursor.seek(id, range.end).min(range.end - 1)
    }

    /// Global successor: smallest position holding a value `>= lower_bound`,
    /// or `len()` when there is none.
    fn next_geq_from(&self, lower_bound: u64) -> u64 {
        if self.is_empty() {
            return 0;
        }
        let all = Range::new(0, self.len());
        self.at(all, 0).seek(lower_bound, all.end)
    }
}

/// Forward scan used for short ranges.
fn scan_geq<C: SequenceCursor>(cursor: &mut C, range: Range, id: u64) -> Option<u64> {
    let mut pos = range.begin;
    loop {
        if cursor.value() >= id {
            return Some(pos);
        }
        pos += 1;
        if pos == range.end {
            return None;
        }
        cursor.advance();
    }
}

/// Turn per-range values into one globally non-decreasing run by adding the
/// last shifted value of the previous range to every value of a range.
pub fn prefix_shift(values: &[u64], pointers: &[u64]) -> Result<Vec<u64>, BuildError> {
    let mut shifted = Vec::with_capacity(values.len());
    let mut prev_upper = 0u64;
    for (range, window) in pointers.windows(2).enumerate() {
        let (begin, end) = (window[0] as usize, window[1] as usize);
        if begin == end {
            continue;
        }
        prev_upper = shifted.last().copied().unwrap_or(prev_upper);
        for &v in &values[begin..end] {
            let value = v.checked_add(prev_upper).ok_or(BuildError::ShiftOverflow { range: range as u64 })?;
            shifted.push(value);
        }
    }
    debug_assert_eq!(shifted.len(), values.len());
    Ok(shifted)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Random ranged data: strictly increasing values inside each range.
    pub fn ranged_values(seed: u64, ranges: usize, max_len: u64, max_gap: u64) -> (Vec<u64>, Vec<u64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut values = Vec::new();
        let mut pointers = vec![0u64];
        for _ in 0..ranges {
            let len = rng.gen_range(0..=max_len);
            let mut v = rng.gen_range(0..=max_gap);
            for _ in 0..len {
                values.push(v);
                v += rng.gen_range(1..=max_gap);
            }
            pointers.push(values.len() as u64);
        }
        (values, pointers)
    }

    /// Check the range-relative contract of a sequence against brute force.
    pub fn check_ranged<S: MonotoneSequence>(seq: &S, values: &[u64], pointers: &[u64]) {
        for window in pointers.windows(2) {
            let range = Range::new(window[0], window[1]);
            if range.is_empty() {
                continue;
            }
            let slice = &values[range.begin as usize..range.end as usize];

            let mut cursor = seq.at(range, range.begin);
            for (i, &expected) in slice.iter().enumerate() {
                let pos = range.begin + i as u64;
                assert_eq!(seq.access_in(range, pos), expected, "access_in at {}", pos);
                assert_eq!(cursor.value(), expected, "cursor at {}", pos);
                assert_eq!(seq.find(range, expected), pos, "find {}", expected);
                if pos + 1 < range.end {
                    cursor.advance();
                }
            }

            let last = *slice.last().unwrap_or(&0);
            for target in [0, 1, last / 2, last, last + 1, last + 100] {
                let expected_geq = slice.iter().position(|&v| v >= target);
                let expected_find = slice.iter().position(|&v| v == target);
                let to_pos = |i: usize| range.begin + i as u64;

                assert_eq!(
                    seq.find(range, target),
                    expected_find.map(to_pos).unwrap_or(NOT_FOUND),
                    "find {} in {:?}",
                    target,
                    range
                );
                assert_eq!(
                    seq.next_geq(range, target),
                    expected_geq.map(to_pos).unwrap_or(NOT_FOUND),
                    "next_geq {} in {:?}",
                    target,
                    range
                );
                assert_eq!(
                    seq.next_geq_clamped(range, target),
                    expected_geq.map(to_pos).unwrap_or(range.end - 1),
                    "next_geq_clamped {} in {:?}",
                    target,
                    range
                );
            }
        }
    }
}
