//! One level of a trie: a nodes sequence partitioned into ranges by a
//! pointers sequence.
//!
//! Range `i` of a level spans `pointers[i]..pointers[i + 1]` of the level
//! below. The first level only stores pointers (its nodes are implicit
//! identifiers) and the third only stores nodes.

use super::types::{LevelKind, Range};
use crate::sequence::{MonotoneSequence, SequenceCursor};
use crate::utils::encoding::{ByteReader, DecodeError, Persist, put_u8};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrieLevel<N, P> {
    kind: LevelKind,
    nodes: N,
    pointers: P,
}

impl<N: MonotoneSequence, P: MonotoneSequence> TrieLevel<N, P> {
    pub fn first(pointers: P) -> Self {
        Self {
            kind: LevelKind::First,
            nodes: N::default(),
            pointers,
        }
    }

    pub fn second(nodes: N, pointers: P) -> Self {
        Self {
            kind: LevelKind::Second,
            nodes,
            pointers,
        }
    }

    pub fn third(nodes: N) -> Self {
        Self {
            kind: LevelKind::Third,
            nodes,
            pointers: P::default(),
        }
    }

    pub fn kind(&self) -> LevelKind {
        self.kind
    }

    pub fn nodes(&self) -> &N {
        &self.nodes
    }

    pub fn pointers(&self) -> &P {
        &self.pointers
    }

    /// Number of ranges this level's pointers delimit.
    #[inline]
    pub fn num_ranges(&self) -> u64 {
        self.pointers.len().saturating_sub(1)
    }

    /// Range `i` of the level below.
    #[inline]
    pub fn range(&self, i: u64) -> Range {
        debug_assert!(i < self.num_ranges(), "range {} out of {}", i, self.num_ranges());
        Range::new(self.pointers.access(i), self.pointers.access(i + 1))
    }

    /// Number of entries: ranges for the upper levels, nodes for the third.
    pub fn size(&self) -> u64 {
        match self.kind {
            LevelKind::First | LevelKind::Second => self.num_ranges(),
            LevelKind::Third => self.nodes.len(),
        }
    }

    pub fn bytes(&self) -> usize {
        let pointers = if self.kind.has_pointers() { self.pointers.bytes() } else { 0 };
        let nodes = if self.kind.has_nodes() { self.nodes.bytes() } else { 0 };
        pointers + nodes + 1
    }

    #[inline]
    pub fn find(&self, range: Range, id: u64) -> u64 {
        self.nodes.find(range, id)
    }

    #[inline]
    pub fn access(&self, range: Range, pos: u64) -> u64 {
        self.nodes.access_in(range, pos)
    }
}

impl<N: MonotoneSequence, P: MonotoneSequence> Persist for TrieLevel<N, P> {
    fn write_to(&self, buf: &mut Vec<u8>) {
        put_u8(buf, self.kind as u8);
        if self.kind.has_pointers() {
            self.pointers.write_to(buf);
        }
        if self.kind.has_nodes() {
            self.nodes.write_to(buf);
        }
    }

    fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let kind = LevelKind::from_tag(reader.read_u8()?)?;
        let pointers = if kind.has_pointers() {
            P::read_from(reader)?
        } else {
            P::default()
        };
        let nodes = if kind.has_nodes() {
            N::read_from(reader)?
        } else {
            N::default()
        };
        Ok(Self { kind, nodes, pointers })
    }
}

/// Walks the nodes of a level range by range.
///
/// `advance` reports when the step crossed into a new range, which is the
/// signal the parent level's cursor follows.
pub struct LevelCursor<'a, N: MonotoneSequence + 'a, P: MonotoneSequence + 'a> {
    nodes: N::Cursor<'a>,
    pointers: P::Cursor<'a>,
    range_index: u64,
    range: Range,
    num_ranges: u64,
}

impl<'a, N: MonotoneSequence + 'a, P: MonotoneSequence + 'a> LevelCursor<'a, N, P> {
    /// Cursor over `nodes` delimited by the parent level's `pointers`,
    /// starting at `pos` inside range `range_index`.
    ///
    /// When that range is empty the cursor moves on to the next non-empty
    /// one; `None` means there is none left.
    pub fn open(nodes: &'a N, pointers: &'a P, range_index: u64, pos: u64) -> Option<Self> {
        let num_ranges = pointers.len().saturating_sub(1);
        if range_index >= num_ranges {
            return None;
        }
        let mut pointers = pointers.at(Range::new(0, pointers.len()), range_index);
        let begin = pointers.absolute();
        pointers.advance();
        let mut range = Range::new(begin, pointers.absolute());
        let mut index = range_index;
        while range.is_empty() {
            index += 1;
            if index >= num_ranges {
                return None;
            }
            pointers.advance();
            range = Range::new(range.end, pointers.absolute());
        }
        let pos = pos.max(range.begin);
        Some(Self {
            nodes: nodes.at(range, pos),
            pointers,
            range_index: index,
            range,
            num_ranges,
        })
    }

    /// Node value under the cursor, relative to its range.
    #[inline]
    pub fn value(&self) -> u64 {
        self.nodes.value()
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.nodes.position()
    }

    /// Index of the range (parent position) the cursor is in.
    #[inline]
    pub fn range_index(&self) -> u64 {
        self.range_index
    }

    #[inline]
    pub fn range(&self) -> Range {
        self.range
    }

    /// Step to the next node; returns whether a range boundary was crossed.
    pub fn advance(&mut self) -> bool {
        self.nodes.advance();
        if self.nodes.position() < self.range.end {
            return false;
        }
        loop {
            self.range_index += 1;
            if self.range_index >= self.num_ranges {
                break;
            }
            self.pointers.advance();
            self.range = Range::new(self.range.end, self.pointers.absolute());
            if !self.range.is_empty() {
                break;
            }
        }
        self.nodes.enter_next_range();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::{EfSequence, PefSequence, SequenceParams};

    fn level() -> TrieLevel<PefSequence, EfSequence> {
        // ranges: [0,2) [2,2) [2,5) [5,5) [5,6)
        let pointers = [0u64, 2, 2, 5, 5, 6];
        let nodes = [1u64, 4, 0, 2, 3, 7];
        let params = SequenceParams { log_partition_size: 1 };
        TrieLevel::second(
            PefSequence::build_ranged(&nodes, &pointers, &params).unwrap(),
            EfSequence::build(&pointers, &params).unwrap(),
        )
    }

    #[test]
    fn test_range_access_and_find() {
        let level = level();
        assert_eq!(level.num_ranges(), 5);
        assert_eq!(level.range(2), Range::new(2, 5));
        assert!(level.range(1).is_empty());
        assert_eq!(level.access(Range::new(2, 5), 3), 2);
        assert_eq!(level.find(Range::new(2, 5), 3), 4);
        assert_eq!(level.find(Range::new(0, 2), 3), crate::sequence::NOT_FOUND);
    }

    #[test]
    fn test_cursor_skips_empty_ranges() {
        let level = level();
        let mut cursor = LevelCursor::open(level.nodes(), level.pointers(), 0, 0).unwrap();
        let mut seen = vec![(cursor.range_index(), cursor.value())];
        let mut switches = 0;
        for _ in 1..6 {
            if cursor.advance() {
                switches += 1;
            }
            seen.push((cursor.range_index(), cursor.value()));
        }
        assert_eq!(seen, vec![(0, 1), (0, 4), (2, 0), (2, 2), (2, 3), (4, 7)]);
        assert_eq!(switches, 2);

        let cursor = LevelCursor::open(level.nodes(), level.pointers(), 1, 2).unwrap();
        assert_eq!(cursor.range_index(), 2);
        assert_eq!(cursor.value(), 0);
        assert!(LevelCursor::open(level.nodes(), level.pointers(), 3, 5).is_some());
        assert!(LevelCursor::open(level.nodes(), level.pointers(), 5, 6).is_none());
    }

    #[test]
    fn test_persist_visits_only_stored_parts() {
        let level = level();
        let mut buf = Vec::new();
        level.write_to(&mut buf);
        let loaded = TrieLevel::<PefSequence, EfSequence>::read_from(&mut ByteReader::new(&buf)).unwrap();
        assert_eq!(loaded, level);

        let third = TrieLevel::<PefSequence, EfSequence>::third(PefSequence::default());
        let mut buf = Vec::new();
        third.write_to(&mut buf);
        assert_eq!(buf[0], LevelKind::Third as u8);
        let loaded = TrieLevel::<PefSequence, EfSequence>::read_from(&mut ByteReader::new(&buf)).unwrap();
        assert_eq!(loaded.kind(), LevelKind::Third);
    }
}
