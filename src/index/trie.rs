//! Three-level trie over one coordinate permutation.
//!
//! The first level is implicit: range `i` of its pointers holds the second
//! coordinates of every triple whose first coordinate is `i`. Identifiers
//! that never occur as a first coordinate own an empty range. Likewise
//! range `j` of the second level's pointers holds the third coordinates
//! under the `j`-th (first, second) pair.
//!
//! Every pattern answer is produced lazily by cursors walking the levels;
//! nothing is materialized.

use super::level::{LevelCursor, TrieLevel};
use super::mapper::{IdentityMapper, ObjectMapper};
use super::types::{LevelKind, NOT_FOUND, Permutation, Range, Triple, WILDCARD};
use crate::sequence::{EfSequence, MonotoneSequence, PefSequence, SequenceCursor};
use crate::utils::encoding::{ByteReader, DecodeError, Persist, put_u8};
use std::sync::Arc;

/// `N2` encodes the second-level nodes, `N3` the third-level nodes and
/// `P` the pointers of both upper levels.
#[derive(Debug, Clone)]
pub struct Trie<N2 = PefSequence, N3 = N2, P = EfSequence> {
    perm: Permutation,
    first: TrieLevel<N2, P>,
    second: TrieLevel<N2, P>,
    third: TrieLevel<N3, P>,
    mapper: Arc<dyn ObjectMapper>,
}

/// Size of one level, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelStats {
    pub kind: LevelKind,
    pub size: u64,
    pub bytes: usize,
}

impl<N2: MonotoneSequence, N3: MonotoneSequence, P: MonotoneSequence> Trie<N2, N3, P> {
    pub fn new(
        perm: Permutation,
        first: TrieLevel<N2, P>,
        second: TrieLevel<N2, P>,
        third: TrieLevel<N3, P>,
    ) -> Self {
        Self {
            perm,
            first,
            second,
            third,
            mapper: Arc::new(IdentityMapper),
        }
    }

    pub fn set_mapper(&mut self, mapper: Arc<dyn ObjectMapper>) {
        self.mapper = mapper;
    }

    pub fn perm(&self) -> Permutation {
        self.perm
    }

    pub fn first(&self) -> &TrieLevel<N2, P> {
        &self.first
    }

    pub fn second(&self) -> &TrieLevel<N2, P> {
        &self.second
    }

    pub fn third(&self) -> &TrieLevel<N3, P> {
        &self.third
    }

    pub fn mapper(&self) -> &dyn ObjectMapper {
        self.mapper.as_ref()
    }

    /// Total number of nodes over the three levels.
    pub fn size(&self) -> u64 {
        self.first.size() + self.second.size() + self.third.size()
    }

    pub fn triples(&self) -> u64 {
        self.third.size()
    }

    pub fn bytes(&self) -> usize {
        self.first.bytes() + self.second.bytes() + self.third.bytes() + 1
    }

    pub fn level_stats(&self) -> [LevelStats; 3] {
        [
            LevelStats {
                kind: self.first.kind(),
                size: self.first.size(),
                bytes: self.first.bytes(),
            },
            LevelStats {
                kind: self.second.kind(),
                size: self.second.size(),
                bytes: self.second.bytes(),
            },
            LevelStats {
                kind: self.third.kind(),
                size: self.third.size(),
                bytes: self.third.bytes(),
            },
        ]
    }

    /// Number of distinct first coordinates.
    pub fn distinct_first(&self) -> u64 {
        let pointers = self.first.pointers();
        let mut cursor = pointers.at(Range::new(0, pointers.len()), 0);
        let mut count = 0;
        for _ in 0..self.first.num_ranges() {
            let begin = cursor.absolute();
            cursor.advance();
            if cursor.absolute() > begin {
                count += 1;
            }
        }
        count
    }

    /// Second-level range of first coordinate `c0`, if it occurs.
    #[inline]
    pub fn first_range(&self, c0: u64) -> Option<Range> {
        if c0 >= self.first.num_ranges() {
            return None;
        }
        Some(self.first.range(c0)).filter(|r| !r.is_empty())
    }

    /// Iterator positioned on second-level node `j` (under `c0`) and
    /// third-level node `k` (under `j`), yielding `count` triples.
    fn iter_from(&self, c0: u64, j: u64, k: u64, count: u64) -> TrieIter<'_, N2, N3, P> {
        let cursors = LevelCursor::open(self.second.nodes(), self.first.pointers(), c0, j)
            .zip(LevelCursor::open(self.third.nodes(), self.second.pointers(), j, k));
        TrieIter {
            mapper: self.mapper.as_ref(),
            remaining: if cursors.is_some() { count } else { 0 },
            cursors,
        }
    }

    fn empty_iter(&self) -> TrieIter<'_, N2, N3, P> {
        TrieIter {
            mapper: self.mapper.as_ref(),
            cursors: None,
            remaining: 0,
        }
    }

    /// Every triple, in trie order.
    pub fn select_all(&self) -> TrieIter<'_, N2, N3, P> {
        let count = self.triples();
        if count == 0 {
            return self.empty_iter();
        }
        let cursors = LevelCursor::open(self.second.nodes(), self.first.pointers(), 0, 0)
            .zip(LevelCursor::open(self.third.nodes(), self.second.pointers(), 0, 0));
        TrieIter {
            mapper: self.mapper.as_ref(),
            remaining: if cursors.is_some() { count } else { 0 },
            cursors,
        }
    }

    /// Triples matching `t`, whose bound coordinates must form a prefix
    /// (`c0`, `c0 c1` or `c0 c1 c2`).
    pub fn select(&self, t: &Triple) -> TrieIter<'_, N2, N3, P> {
        debug_assert!(t.s != WILDCARD, "first coordinate must be bound");
        debug_assert!(t.p != WILDCARD || t.o == WILDCARD, "bound coordinates must form a prefix");

        let Some(r1) = self.first_range(t.s) else {
            return self.empty_iter();
        };

        if t.p == WILDCARD {
            let pointers = self.second.pointers();
            let begin = pointers.access(r1.begin);
            let count = pointers.access(r1.end) - begin;
            return self.iter_from(t.s, r1.begin, begin, count);
        }

        let j = self.second.find(r1, t.p);
        if j == NOT_FOUND {
            return self.empty_iter();
        }
        let r2 = self.second.range(j);

        if t.o == WILDCARD {
            return self.iter_from(t.s, j, r2.begin, r2.len());
        }

        let mapped = self.mapper.map(t);
        if mapped == NOT_FOUND {
            return self.empty_iter();
        }
        match self.third.find(r2, mapped) {
            NOT_FOUND => self.empty_iter(),
            k => self.iter_from(t.s, j, k, 1),
        }
    }

    /// Triples with `c0` bound, `c1` unbound and `c2` bound: every second
    /// node under `c0` is searched for `c2`.
    pub fn select_so(&self, t: &Triple) -> SoIter<'_, N2, N3, P> {
        debug_assert!(t.s != WILDCARD && t.p == WILDCARD && t.o != WILDCARD);
        let second = self
            .first_range(t.s)
            .and_then(|r1| LevelCursor::open(self.second.nodes(), self.first.pointers(), t.s, r1.begin));
        SoIter {
            trie: self,
            c0: t.s,
            c2: t.o,
            remaining: second.as_ref().map_or(0, |c| c.range().len()),
            second,
        }
    }

    /// Triples with only `c1` bound: every first-level entry is searched for
    /// `c1`. Cost grows with the number of first coordinates.
    pub fn select_po(&self, t: &Triple) -> PoIter<'_, N2, N3, P> {
        debug_assert!(t.s == WILDCARD && t.p != WILDCARD && t.o == WILDCARD);
        let pointers = self.first.pointers();
        PoIter {
            trie: self,
            c1: t.p,
            next_first: 0,
            pointers: pointers.at(Range::new(0, pointers.len()), 0),
            run: None,
        }
    }

    /// Triples under `c0` whose second coordinate lies in
    /// `[lower_id, upper_id)`.
    pub fn select_range(&self, c0: u64, lower_id: u64, upper_id: u64) -> TrieIter<'_, N2, N3, P> {
        let Some(r1) = self.first_range(c0) else {
            return self.empty_iter();
        };
        if lower_id >= upper_id {
            return self.empty_iter();
        }
        let nodes = self.second.nodes();
        let j = nodes.next_geq(r1, lower_id);
        if j == NOT_FOUND {
            return self.empty_iter();
        }
        let mut k = nodes.next_geq_clamped(r1, upper_id);
        if nodes.access_in(r1, k) < upper_id {
            k += 1;
        }
        if k <= j {
            return self.empty_iter();
        }
        let pointers = self.second.pointers();
        let begin = pointers.access(j);
        let count = pointers.access(k) - begin;
        self.iter_from(c0, j, begin, count)
    }

    /// Third-level position of a fully bound triple, or [`NOT_FOUND`].
    pub fn is_member(&self, t: &Triple) -> u64 {
        debug_assert!(t.is_fully_bound());
        let Some(r1) = self.first_range(t.s) else {
            return NOT_FOUND;
        };
        let j = self.second.find(r1, t.p);
        if j == NOT_FOUND {
            return NOT_FOUND;
        }
        let mapped = self.mapper.map(t);
        if mapped == NOT_FOUND {
            return NOT_FOUND;
        }
        self.third.find(self.second.range(j), mapped)
    }

    fn check_shape(&self) -> Result<(), DecodeError> {
        let kinds = [self.first.kind(), self.second.kind(), self.third.kind()];
        if kinds != [LevelKind::First, LevelKind::Second, LevelKind::Third] {
            return Err(DecodeError::Inconsistent(format!("{} trie levels out of order", self.perm)));
        }
        let last_pointer = |pointers: &P| {
            if pointers.is_empty() {
                None
            } else {
                Some(pointers.access(pointers.len() - 1))
            }
        };
        let first_end = last_pointer(self.first.pointers());
        let second_end = last_pointer(self.second.pointers());
        if first_end != Some(self.second.nodes().len())
            || second_end != Some(self.third.nodes().len())
            || self.second.num_ranges() != self.second.nodes().len()
        {
            return Err(DecodeError::Inconsistent(format!(
                "{} trie pointers do not match node counts",
                self.perm
            )));
        }
        Ok(())
    }
}

impl<N2: MonotoneSequence, N3: MonotoneSequence, P: MonotoneSequence> Persist for Trie<N2, N3, P> {
    fn write_to(&self, buf: &mut Vec<u8>) {
        self.first.write_to(buf);
        self.second.write_to(buf);
        self.third.write_to(buf);
        put_u8(buf, self.perm as u8);
    }

    fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let first = TrieLevel::read_from(reader)?;
        let second = TrieLevel::read_from(reader)?;
        let third = TrieLevel::read_from(reader)?;
        let perm = Permutation::from_tag(reader.read_u8()?)?;
        let trie = Self::new(perm, first, second, third);
        trie.check_shape()?;
        Ok(trie)
    }
}

/// Lazy walk over consecutive third-level nodes.
pub struct TrieIter<'a, N2: MonotoneSequence + 'a, N3: MonotoneSequence + 'a, P: MonotoneSequence + 'a> {
    mapper: &'a dyn ObjectMapper,
    cursors: Option<(LevelCursor<'a, N2, P>, LevelCursor<'a, N3, P>)>,
    remaining: u64,
}

impl<'a, N2, N3, P> Iterator for TrieIter<'a, N2, N3, P>
where
    N2: MonotoneSequence + 'a,
    N3: MonotoneSequence + 'a,
    P: MonotoneSequence + 'a,
{
    type Item = Triple;

    fn next(&mut self) -> Option<Triple> {
        if self.remaining == 0 {
            return None;
        }
        let (second, third) = self.cursors.as_mut()?;
        let mut t = Triple::new(second.range_index(), second.value(), third.value());
        t.o = self.mapper.unmap(&t);

        self.remaining -= 1;
        if self.remaining > 0 && third.advance() {
            second.advance();
        }
        Some(t)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}

impl<'a, N2, N3, P> ExactSizeIterator for TrieIter<'a, N2, N3, P>
where
    N2: MonotoneSequence + 'a,
    N3: MonotoneSequence + 'a,
    P: MonotoneSequence + 'a,
{
}

/// Answers `(c0, ?, c2)` by probing the third level under every `(c0, c1)`.
pub struct SoIter<'a, N2: MonotoneSequence + 'a, N3: MonotoneSequence + 'a, P: MonotoneSequence + 'a> {
    trie: &'a Trie<N2, N3, P>,
    c0: u64,
    c2: u64,
    second: Option<LevelCursor<'a, N2, P>>,
    remaining: u64,
}

impl<'a, N2, N3, P> Iterator for SoIter<'a, N2, N3, P>
where
    N2: MonotoneSequence + 'a,
    N3: MonotoneSequence + 'a,
    P: MonotoneSequence + 'a,
{
    type Item = Triple;

    fn next(&mut self) -> Option<Triple> {
        while self.remaining > 0 {
            let cursor = self.second.as_mut()?;
            let j = cursor.position();
            let t = Triple::new(self.c0, cursor.value(), self.c2);

            self.remaining -= 1;
            if self.remaining > 0 {
                cursor.advance();
            }

            let mapped = self.trie.mapper.map(&t);
            if mapped != NOT_FOUND && self.trie.third.find(self.trie.second.range(j), mapped) != NOT_FOUND {
                return Some(t);
            }
        }
        None
    }
}

struct ThirdRun<'a, N3: MonotoneSequence + 'a> {
    c0: u64,
    cursor: N3::Cursor<'a>,
    pos: u64,
    end: u64,
}

/// Answers `(?, c1, ?)` by scanning every first-level range for `c1`.
pub struct PoIter<'a, N2: MonotoneSequence + 'a, N3: MonotoneSequence + 'a, P: MonotoneSequence + 'a> {
    trie: &'a Trie<N2, N3, P>,
    c1: u64,
    next_first: u64,
    pointers: P::Cursor<'a>,
    run: Option<ThirdRun<'a, N3>>,
}

impl<'a, N2, N3, P> PoIter<'a, N2, N3, P>
where
    N2: MonotoneSequence + 'a,
    N3: MonotoneSequence + 'a,
    P: MonotoneSequence + 'a,
{
    /// Move to the next first coordinate whose range holds `c1`.
    fn open_next_run(&mut self) -> bool {
        let trie = self.trie;
        while self.next_first < trie.first.num_ranges() {
            let c0 = self.next_first;
            self.next_first += 1;

            let begin = self.pointers.absolute();
            self.pointers.advance();
            let r1 = Range::new(begin, self.pointers.absolute());
            if r1.is_empty() {
                continue;
            }
            let j = trie.second.find(r1, self.c1);
            if j == NOT_FOUND {
                continue;
            }
            let r2 = trie.second.range(j);
            self.run = Some(ThirdRun {
                c0,
                cursor: trie.third.nodes().at(r2, r2.begin),
                pos: r2.begin,
                end: r2.end,
            });
            return true;
        }
        false
    }
}

impl<'a, N2, N3, P> Iterator for PoIter<'a, N2, N3, P>
where
    N2: MonotoneSequence + 'a,
    N3: MonotoneSequence + 'a,
    P: MonotoneSequence + 'a,
{
    type Item = Triple;

    fn next(&mut self) -> Option<Triple> {
        loop {
            if let Some(run) = self.run.as_mut() {
                if run.pos < run.end {
                    let mut t = Triple::new(run.c0, self.c1, run.cursor.value());
                    t.o = self.trie.mapper.unmap(&t);
                    run.pos += 1;
                    if run.pos < run.end {
                        run.cursor.advance();
                    }
                    return Some(t);
                }
                self.run = None;
            }
            if !self.open_next_run() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::builder::TrieBuilder;
    use crate::sequence::{CompactVector, SequenceParams};

    const W: u64 = WILDCARD;

    fn corpus() -> Vec<Triple> {
        [(1, 1, 1), (1, 1, 2), (1, 2, 1), (2, 1, 1), (2, 2, 2), (4, 0, 9), (4, 3, 5), (4, 3, 6)]
            .into_iter()
            .map(|(s, p, o)| Triple::new(s, p, o))
            .collect()
    }

    fn spo<N: MonotoneSequence>() -> Trie<N, N, EfSequence> {
        TrieBuilder::new(Permutation::Spo, SequenceParams { log_partition_size: 2 })
            .build_from_triples(&corpus())
            .unwrap()
    }

    fn collect<I: Iterator<Item = Triple>>(iter: I) -> Vec<(u64, u64, u64)> {
        iter.map(|t| (t.s, t.p, t.o)).collect()
    }

    #[test]
    fn test_select_all_skips_missing_subjects() {
        let trie = spo::<PefSequence>();
        assert_eq!(trie.triples(), 8);
        assert_eq!(trie.distinct_first(), 3);
        let all = collect(trie.select_all());
        let expected: Vec<_> = corpus().into_iter().map(|t| (t.s, t.p, t.o)).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn test_select_prefix_patterns() {
        let trie = spo::<PefSequence>();
        assert_eq!(collect(trie.select(&Triple::new(1, W, W))), vec![(1, 1, 1), (1, 1, 2), (1, 2, 1)]);
        assert_eq!(collect(trie.select(&Triple::new(4, 3, W))), vec![(4, 3, 5), (4, 3, 6)]);
        assert_eq!(collect(trie.select(&Triple::new(2, 2, 2))), vec![(2, 2, 2)]);
        assert!(collect(trie.select(&Triple::new(2, 2, 1))).is_empty());
        assert!(collect(trie.select(&Triple::new(3, W, W))).is_empty());
        assert!(collect(trie.select(&Triple::new(9, W, W))).is_empty());
        assert!(collect(trie.select(&Triple::new(1, 7, W))).is_empty());
    }

    #[test]
    fn test_select_so_and_po() {
        let trie = spo::<CompactVector>();
        assert_eq!(collect(trie.select_so(&Triple::new(1, W, 1))), vec![(1, 1, 1), (1, 2, 1)]);
        assert!(collect(trie.select_so(&Triple::new(4, W, 1))).is_empty());
        assert_eq!(
            collect(trie.select_po(&Triple::new(W, 1, W))),
            vec![(1, 1, 1), (1, 1, 2), (2, 1, 1)]
        );
        assert_eq!(collect(trie.select_po(&Triple::new(W, 3, W))), vec![(4, 3, 5), (4, 3, 6)]);
        assert!(collect(trie.select_po(&Triple::new(W, 8, W))).is_empty());
    }

    #[test]
    fn test_select_range_is_half_open() {
        let trie = spo::<PefSequence>();
        assert_eq!(collect(trie.select_range(4, 0, 3)), vec![(4, 0, 9)]);
        assert_eq!(collect(trie.select_range(4, 0, 4)), vec![(4, 0, 9), (4, 3, 5), (4, 3, 6)]);
        assert_eq!(collect(trie.select_range(4, 1, 10)), vec![(4, 3, 5), (4, 3, 6)]);
        assert!(collect(trie.select_range(4, 4, 10)).is_empty());
        assert!(collect(trie.select_range(4, 2, 2)).is_empty());
        assert!(collect(trie.select_range(3, 0, 10)).is_empty());
    }

    #[test]
    fn test_is_member_positions_are_dense() {
        let trie = spo::<EfSequence>();
        for (i, t) in corpus().iter().enumerate() {
            assert_eq!(trie.is_member(t), i as u64, "{}", t);
        }
        assert_eq!(trie.is_member(&Triple::new(1, 1, 3)), NOT_FOUND);
        assert_eq!(trie.is_member(&Triple::new(3, 1, 1)), NOT_FOUND);
        assert_eq!(trie.is_member(&Triple::new(100, 1, 1)), NOT_FOUND);
    }

    #[test]
    fn test_mixed_level_codecs_agree() {
        let uniform = spo::<PefSequence>();
        let builder = TrieBuilder::new(Permutation::Spo, SequenceParams { log_partition_size: 2 });
        let pef_compact: Trie<PefSequence, CompactVector, EfSequence> = builder.build_from_triples(&corpus()).unwrap();
        let compact_pef: Trie<CompactVector, PefSequence, EfSequence> = builder.build_from_triples(&corpus()).unwrap();

        // compact levels hold the raw per-range values
        assert_eq!(pef_compact.third().nodes().iter().collect::<Vec<_>>(), vec![1, 2, 1, 1, 2, 9, 5, 6]);
        assert_eq!(compact_pef.second().nodes().iter().collect::<Vec<_>>(), vec![1, 2, 1, 2, 0, 3]);

        for pattern in [Triple::new(1, W, W), Triple::new(4, 3, W), Triple::new(2, 2, 2), Triple::new(2, 2, 1)] {
            let expected = collect(uniform.select(&pattern));
            assert_eq!(collect(pef_compact.select(&pattern)), expected, "{}", pattern);
            assert_eq!(collect(compact_pef.select(&pattern)), expected, "{}", pattern);
        }
        let so = Triple::new(1, W, 1);
        assert_eq!(collect(pef_compact.select_so(&so)), collect(uniform.select_so(&so)));
        let po = Triple::new(W, 1, W);
        assert_eq!(collect(compact_pef.select_po(&po)), collect(uniform.select_po(&po)));
        for t in corpus() {
            assert_eq!(pef_compact.is_member(&t), uniform.is_member(&t));
            assert_eq!(compact_pef.is_member(&t), uniform.is_member(&t));
        }

        let mut buf = Vec::new();
        pef_compact.write_to(&mut buf);
        let loaded = Trie::<PefSequence, CompactVector, EfSequence>::read_from(&mut ByteReader::new(&buf)).unwrap();
        assert_eq!(collect(loaded.select_all()), collect(uniform.select_all()));
    }

    #[test]
    fn test_persist_round_trip() {
        let trie = spo::<PefSequence>();
        let mut buf = Vec::new();
        trie.write_to(&mut buf);
        let loaded = Trie::<PefSequence, PefSequence, EfSequence>::read_from(&mut ByteReader::new(&buf)).unwrap();
        assert_eq!(loaded.perm(), Permutation::Spo);
        assert_eq!(collect(loaded.select_all()), collect(trie.select_all()));

        // drop the permutation tag
        assert!(
            Trie::<PefSequence, PefSequence, EfSequence>::read_from(&mut ByteReader::new(&buf[..buf.len() - 1]))
                .is_err()
        );
    }
}
