//! Partitioned Elias-Fano.
//!
//! Values are cut into partitions of `2^k` elements. Partition `p` is an
//! Elias-Fano block over `value - base(p)`, where `base(0)` is the first
//! value and `base(p)` is the maximum of partition `p - 1`. A compact
//! directory of upper bounds `U[0..=P]` (`U[0]` the first value, `U[p + 1]`
//! the maximum of partition `p`) drives both base reconstruction and the
//! partition search of successor queries.
//!
//! Multi-partition buffer:
//!
//! ```text
//! gamma(endpoint_bits) | P - 1 endpoints | block 0 | block 1 | ...
//! ```
//!
//! With a single partition the directory is dropped and the buffer starts
//! with the base (`ceil_log2(universe)` bits) and a tight-universe flag,
//! followed by `delta(max - base)` when the flag is clear.
//!
//! Cursors cache the decoded partition. Moves and successor searches that
//! stay inside it are answered by the block enumerator; anything else goes
//! through the directory and re-opens a block.

use super::bits::{BitReader, BitVector, BitVectorBuilder, ceil_log2};
use super::codes::{try_read_delta, try_read_gamma, write_delta, write_gamma};
use super::compact::CompactVector;
use super::elias_fano::{EfEnumerator, block_bit_size, write_block};
use super::{
    BuildError, Codec, LINEAR_SCAN_THRESHOLD, MonotoneSequence, Range, SequenceCursor, SequenceParams, check_reserved,
};
use crate::utils::encoding::{ByteReader, DecodeError, Persist, put_u8, put_u64};

/// Accepted values of `log_partition_size`.
pub const LOG_PARTITION_SIZE_RANGE: std::ops::RangeInclusive<u8> = 1..=16;

/// Offsets decoded from the head of the bit buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Header {
    single_base: u64,
    single_max: u64,
    single_offset: u64,
    endpoint_bits: u32,
    endpoints_offset: u64,
    sequences_offset: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PefSequence {
    size: u64,
    universe: u64,
    partitions: u64,
    upper_bounds: CompactVector,
    data: BitVector,
    log_partition_size: u8,
    header: Header,
}

impl PefSequence {
    pub fn from_values(values: &[u64], log_partition_size: u8) -> Self {
        debug_assert!(LOG_PARTITION_SIZE_RANGE.contains(&log_partition_size));
        let Some(&last) = values.last() else {
            return Self {
                log_partition_size,
                ..Self::default()
            };
        };

        let n = values.len() as u64;
        let universe = last + 1;
        let partition_size = 1usize << log_partition_size;
        let partitions = n.div_ceil(partition_size as u64);

        let mut data = BitVectorBuilder::new();
        let mut header = Header::default();
        let mut relative = Vec::with_capacity(partition_size.min(values.len()));

        let upper_bounds = if partitions == 1 {
            let base = values[0];
            relative.extend(values.iter().map(|&v| v - base));
            let max = last - base;

            data.append_bits(base, ceil_log2(universe));
            let tight = base + max + 1 == universe;
            data.push(tight);
            if !tight {
                write_delta(&mut data, max);
            }
            header.single_base = base;
            header.single_max = max;
            header.single_offset = data.len();
            write_block(&mut data, &relative, max + 1);
            CompactVector::default()
        } else {
            let mut sequences = BitVectorBuilder::new();
            let mut endpoints = Vec::with_capacity(partitions as usize);
            let mut bounds = Vec::with_capacity(partitions as usize + 1);

            let mut base = values[0];
            bounds.push(base);
            for chunk in values.chunks(partition_size) {
                relative.clear();
                relative.extend(chunk.iter().map(|&v| v - base));
                let max = chunk[chunk.len() - 1];
                write_block(&mut sequences, &relative, max - base + 1);
                endpoints.push(sequences.len());
                bounds.push(max);
                base = max;
            }

            let endpoint_bits = ceil_log2(sequences.len() + 1);
            write_gamma(&mut data, endpoint_bits as u64);
            header.endpoint_bits = endpoint_bits;
            header.endpoints_offset = data.len();
            for &endpoint in &endpoints[..endpoints.len() - 1] {
                data.append_bits(endpoint, endpoint_bits);
            }
            header.sequences_offset = data.len();
            data.append(&sequences);
            CompactVector::from_values(&bounds)
        };

        Self {
            size: n,
            universe,
            partitions,
            upper_bounds,
            data: data.build(),
            log_partition_size,
            header,
        }
    }

    pub fn num_partitions(&self) -> u64 {
        self.partitions
    }

    pub fn log_partition_size(&self) -> u8 {
        self.log_partition_size
    }

    /// Base of partition `p` (its values are stored relative to it).
    #[inline]
    fn partition_base(&self, p: u64) -> u64 {
        self.upper_bounds.get(p)
    }

    /// Largest value of partition `p`.
    #[inline]
    fn partition_upper(&self, p: u64) -> u64 {
        self.upper_bounds.get(p + 1)
    }

    #[inline]
    fn partition_endpoint(&self, p: u64) -> u64 {
        if p == 0 {
            return 0;
        }
        let width = self.header.endpoint_bits;
        self.data
            .get_bits(self.header.endpoints_offset + (p - 1) * width as u64, width)
    }

    /// First partition in `[lo, hi)` whose maximum is `>= target`.
    fn search_directory(&self, target: u64, mut lo: u64, mut hi: u64) -> Option<u64> {
        let end = hi;
        while hi - lo > LINEAR_SCAN_THRESHOLD {
            let mid = lo + (hi - lo) / 2;
            if self.partition_upper(mid) >= target {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        (lo..end).find(|&p| self.partition_upper(p) >= target)
    }

    fn cursor_at(&self, pos: u64) -> PefCursor<'_> {
        if self.size == 0 {
            return PefCursor {
                seq: self,
                partition: 0,
                begin: 0,
                end: 0,
                base: 0,
                upper: 0,
                block: EfEnumerator::new(&self.data, 0, 0, 0),
                position: 0,
                range_base: 0,
                previous: 0,
            };
        }
        let clamped = pos.min(self.size - 1);
        let partition = if self.partitions <= 1 {
            0
        } else {
            clamped >> self.log_partition_size
        };
        let mut cursor = PefCursor {
            seq: self,
            partition,
            begin: 0,
            end: 0,
            base: 0,
            upper: 0,
            block: EfEnumerator::new(&self.data, 0, 0, 0),
            position: clamped,
            range_base: 0,
            previous: 0,
        };
        cursor.open_partition(partition, clamped);
        cursor.move_to(pos);
        cursor
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        let mut cursor = self.cursor_at(0);
        std::iter::from_fn(move || {
            if cursor.position >= self.size {
                return None;
            }
            let value = cursor.absolute();
            cursor.advance();
            Some(value)
        })
    }

    fn read_header(&self) -> Result<Header, DecodeError> {
        let inconsistent = |what: &str| DecodeError::Inconsistent(format!("partitioned sequence: {}", what));
        let mut header = Header::default();

        if self.size == 0 {
            if self.partitions != 0 || !self.data.is_empty() || !self.upper_bounds.is_empty() {
                return Err(inconsistent("empty sequence with payload"));
            }
            return Ok(header);
        }
        if !LOG_PARTITION_SIZE_RANGE.contains(&self.log_partition_size) {
            return Err(inconsistent("log_partition_size out of range"));
        }
        if self.partitions != self.size.div_ceil(1u64 << self.log_partition_size) {
            return Err(inconsistent("partition count does not match size"));
        }

        let mut reader = BitReader::new(&self.data, 0);
        if self.partitions == 1 {
            let universe_bits = ceil_log2(self.universe);
            if reader.remaining() < universe_bits as u64 + 1 {
                return Err(inconsistent("truncated single-partition header"));
            }
            let base = reader.get_bits(universe_bits);
            let tight = reader.get_bits(1) == 1;
            if base >= self.universe {
                return Err(inconsistent("base outside universe"));
            }
            let max = if tight {
                self.universe - base - 1
            } else {
                try_read_delta(&mut reader).ok_or_else(|| inconsistent("truncated upper bound"))?
            };
            header.single_base = base;
            header.single_max = max;
            header.single_offset = reader.position();

            let needed = max
                .checked_add(1)
                .map(|universe| block_bit_size(universe, self.size));
            if needed != Some(self.data.len() - header.single_offset) {
                return Err(inconsistent("block size mismatch"));
            }
            return Ok(header);
        }

        if self.upper_bounds.len() != self.partitions + 1 {
            return Err(inconsistent("upper bound directory size mismatch"));
        }
        let endpoint_bits = try_read_gamma(&mut reader).ok_or_else(|| inconsistent("truncated endpoint width"))?;
        if endpoint_bits > 64 {
            return Err(inconsistent("endpoint width above 64"));
        }
        header.endpoint_bits = endpoint_bits as u32;
        header.endpoints_offset = reader.position();
        header.sequences_offset = (self.partitions - 1)
            .checked_mul(endpoint_bits)
            .and_then(|bits| bits.checked_add(header.endpoints_offset))
            .filter(|&offset| offset <= self.data.len())
            .ok_or_else(|| inconsistent("truncated endpoint directory"))?;

        let partition_size = 1u64 << self.log_partition_size;
        let mut previous_end = 0u64;
        for p in 0..self.partitions {
            let base = self.upper_bounds.get(p);
            let upper = self.upper_bounds.get(p + 1);
            if upper < base {
                return Err(inconsistent("upper bounds are not monotone"));
            }
            let n = partition_size.min(self.size - p * partition_size);
            let end = if p + 1 == self.partitions {
                self.data.len() - header.sequences_offset
            } else {
                let width = header.endpoint_bits;
                self.data.get_bits(header.endpoints_offset + p * width as u64, width)
            };
            let needed = (upper - base)
                .checked_add(1)
                .map(|universe| block_bit_size(universe, n));
            if end < previous_end || needed != Some(end - previous_end) {
                return Err(inconsistent("partition block size mismatch"));
            }
            previous_end = end;
        }
        if self.upper_bounds.get(self.partitions).checked_add(1) != Some(self.universe) {
            return Err(inconsistent("universe does not match last upper bound"));
        }
        Ok(header)
    }
}

impl Persist for PefSequence {
    fn write_to(&self, buf: &mut Vec<u8>) {
        put_u64(buf, self.size);
        put_u64(buf, self.universe);
        put_u64(buf, self.partitions);
        self.upper_bounds.write_to(buf);
        self.data.write_to(buf);
        put_u8(buf, self.log_partition_size);
    }

    fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let mut seq = Self {
            size: reader.read_u64()?,
            universe: reader.read_u64()?,
            partitions: reader.read_u64()?,
            upper_bounds: CompactVector::read_from(reader)?,
            data: BitVector::read_from(reader)?,
            log_partition_size: reader.read_u8()?,
            header: Header::default(),
        };
        seq.header = seq.read_header()?;
        Ok(seq)
    }
}

/// Cursor over a [`PefSequence`], caching the current partition.
#[derive(Debug, Clone)]
pub struct PefCursor<'a> {
    seq: &'a PefSequence,
    partition: u64,
    begin: u64,
    end: u64,
    base: u64,
    upper: u64,
    block: EfEnumerator<'a>,
    position: u64,
    range_base: u64,
    previous: u64,
}

impl<'a> PefCursor<'a> {
    /// Slow path: decode partition `p` and position on global `pos` inside it.
    fn open_partition(&mut self, p: u64, pos: u64) {
        let seq = self.seq;
        let offset;
        if seq.partitions <= 1 {
            self.begin = 0;
            self.end = seq.size;
            self.base = seq.header.single_base;
            self.upper = self.base + seq.header.single_max;
            offset = seq.header.single_offset;
        } else {
            self.begin = p << seq.log_partition_size;
            self.end = seq.size.min(self.begin + (1u64 << seq.log_partition_size));
            self.base = seq.partition_base(p);
            self.upper = seq.partition_upper(p);
            offset = seq.header.sequences_offset + seq.partition_endpoint(p);
        }
        self.partition = p;
        self.block = EfEnumerator::at(
            &seq.data,
            offset,
            self.upper - self.base + 1,
            self.end - self.begin,
            pos - self.begin,
        );
        self.position = pos;
    }

    fn move_to(&mut self, pos: u64) {
        if pos >= self.seq.size {
            self.position = self.seq.size;
            return;
        }
        if pos >= self.begin && pos < self.end {
            self.block.move_to(pos - self.begin);
            self.position = pos;
        } else {
            self.open_partition(pos >> self.seq.log_partition_size, pos);
        }
    }

    /// Leave the cursor on the first element `>= target` of the cached
    /// partition, which must hold one.
    fn settle_in_partition(&mut self, target: u64, end: u64) -> u64 {
        self.block.next_geq(target - self.base);
        self.position = self.begin + self.block.position();
        self.position.min(end)
    }
}

impl SequenceCursor for PefCursor<'_> {
    #[inline]
    fn position(&self) -> u64 {
        self.position
    }

    #[inline]
    fn value(&self) -> u64 {
        self.absolute() - self.range_base
    }

    #[inline]
    fn absolute(&self) -> u64 {
        if self.position >= self.seq.size {
            self.seq.universe
        } else {
            self.base + self.block.value()
        }
    }

    fn advance(&mut self) {
        self.previous = self.absolute();
        let next = self.position + 1;
        if next < self.end {
            self.block.next();
            self.position = next;
        } else if next < self.seq.size {
            self.open_partition(self.partition + 1, next);
        } else {
            self.position = self.seq.size;
        }
    }

    #[inline]
    fn enter_next_range(&mut self) {
        self.range_base = self.previous;
    }

    fn seek(&mut self, id: u64, end: u64) -> u64 {
        if self.position >= end {
            return end;
        }
        let target = id.saturating_add(self.range_base);
        if self.absolute() >= target {
            return self.position;
        }
        if target <= self.upper {
            return self.settle_in_partition(target, end);
        }
        if self.seq.partitions <= 1 {
            return end;
        }

        let last = (end - 1) >> self.seq.log_partition_size;
        match self.seq.search_directory(target, self.partition + 1, last + 1) {
            Some(p) => {
                self.open_partition(p, p << self.seq.log_partition_size);
                self.settle_in_partition(target, end)
            }
            None => end,
        }
    }
}

impl MonotoneSequence for PefSequence {
    const CODEC: Codec = Codec::PartitionedEliasFano;

    type Cursor<'a> = PefCursor<'a>;

    fn build(values: &[u64], params: &SequenceParams) -> Result<Self, BuildError> {
        check_reserved(values)?;
        Ok(Self::from_values(values, params.log_partition_size))
    }

    fn len(&self) -> u64 {
        self.size
    }

    fn universe(&self) -> u64 {
        self.universe
    }

    fn bytes(&self) -> usize {
        3 * std::mem::size_of::<u64>() + self.upper_bounds.bytes() + self.data.bytes() + 1
    }

    fn access(&self, pos: u64) -> u64 {
        debug_assert!(pos < self.size, "position {} out of {}", pos, self.size);
        self.cursor_at(pos).absolute()
    }

    fn at(&self, range: Range, pos: u64) -> PefCursor<'_> {
        if range.begin == 0 {
            return self.cursor_at(pos);
        }
        let mut cursor = self.cursor_at(range.begin - 1);
        let range_base = cursor.absolute();
        cursor.move_to(pos);
        cursor.range_base = range_base;
        cursor.previous = range_base;
        cursor
    }
}
