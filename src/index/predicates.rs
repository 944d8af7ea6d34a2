//! Predicate to subjects side index.
//!
//! Range `p` of the pointers lists, in increasing order, every subject that
//! occurs with predicate `p`. A layout without a predicate-major trie
//! answers `(?, p, ?)` by walking those subjects and reading each `(s, p)`
//! run straight out of the SPO trie, instead of probing every subject.

use super::level::LevelCursor;
use super::trie::{Trie, TrieIter};
use super::types::{Range, Triple, WILDCARD};
use crate::sequence::{BuildError, EfSequence, MonotoneSequence, PefSequence, SequenceCursor, SequenceParams};
use crate::utils::encoding::{ByteReader, DecodeError, Persist};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredicateIndex<N = PefSequence> {
    pointers: EfSequence,
    subjects: N,
}

impl<N: MonotoneSequence> PredicateIndex<N> {
    /// Collect the (subject, predicate) pairs stored in the second level of
    /// an SPO trie and regroup them by predicate.
    pub fn from_spo<N3: MonotoneSequence>(
        spo: &Trie<N, N3, EfSequence>,
        params: &SequenceParams,
    ) -> Result<Self, BuildError> {
        let pairs = spo.second().size();
        let mut by_subject = Vec::with_capacity(pairs as usize);
        if let Some(mut cursor) = LevelCursor::open(spo.second().nodes(), spo.first().pointers(), 0, 0) {
            for i in 0..pairs {
                by_subject.push((cursor.value(), cursor.range_index()));
                if i + 1 < pairs {
                    cursor.advance();
                }
            }
        }

        let predicates = by_subject.iter().map(|&(p, _)| p + 1).max().unwrap_or(0) as usize;
        let mut offsets = vec![0u64; predicates + 1];
        for &(p, _) in &by_subject {
            offsets[p as usize + 1] += 1;
        }
        for i in 1..offsets.len() {
            offsets[i] += offsets[i - 1];
        }
        let pointers = offsets.clone();

        // pairs arrive in subject order, so every range fills up sorted
        let mut subjects = vec![0u64; by_subject.len()];
        for &(p, s) in &by_subject {
            let slot = &mut offsets[p as usize];
            subjects[*slot as usize] = s;
            *slot += 1;
        }

        Ok(Self {
            pointers: EfSequence::build(&pointers, params)?,
            subjects: N::build_ranged(&subjects, &pointers, params)?,
        })
    }

    pub fn num_predicates(&self) -> u64 {
        self.pointers.len().saturating_sub(1)
    }

    /// Number of distinct (subject, predicate) pairs.
    pub fn pairs(&self) -> u64 {
        self.subjects.len()
    }

    pub fn bytes(&self) -> usize {
        self.pointers.bytes() + self.subjects.bytes()
    }

    /// Range of the subjects of `p`; empty when `p` never occurs.
    pub fn subjects_range(&self, p: u64) -> Range {
        if p >= self.num_predicates() {
            return Range::default();
        }
        Range::new(self.pointers.access(p), self.pointers.access(p + 1))
    }

    /// Subjects of `p`, in increasing order.
    pub fn subjects(&self, p: u64) -> impl Iterator<Item = u64> + '_ {
        let range = self.subjects_range(p);
        (range.begin..range.end).map(move |pos| self.subjects.access_in(range, pos))
    }

    /// Triples with predicate `p`, in (s,p,o) order, read out of `spo`.
    pub fn select_p<'a, N3: MonotoneSequence>(
        &'a self,
        spo: &'a Trie<N, N3, EfSequence>,
        p: u64,
    ) -> PredicateIter<'a, N, N3> {
        let range = self.subjects_range(p);
        PredicateIter {
            spo,
            p,
            subjects: (!range.is_empty()).then(|| self.subjects.at(range, range.begin)),
            remaining: range.len(),
            run: None,
        }
    }

    pub(crate) fn check_against(&self, pairs: u64) -> Result<(), DecodeError> {
        let last = if self.pointers.is_empty() {
            0
        } else {
            self.pointers.access(self.pointers.len() - 1)
        };
        if last != self.subjects.len() || self.subjects.len() != pairs {
            return Err(DecodeError::Inconsistent(format!(
                "predicate index holds {} subjects for {} pairs",
                self.subjects.len(),
                pairs
            )));
        }
        Ok(())
    }
}

impl<N: MonotoneSequence> Persist for PredicateIndex<N> {
    fn write_to(&self, buf: &mut Vec<u8>) {
        self.pointers.write_to(buf);
        self.subjects.write_to(buf);
    }

    fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let pointers = EfSequence::read_from(reader)?;
        let subjects = N::read_from(reader)?;
        Ok(Self { pointers, subjects })
    }
}

/// Answers `(?, p, ?)` subject by subject through the SPO trie.
pub struct PredicateIter<'a, N: MonotoneSequence + 'a, N3: MonotoneSequence + 'a> {
    spo: &'a Trie<N, N3, EfSequence>,
    p: u64,
    subjects: Option<N::Cursor<'a>>,
    remaining: u64,
    run: Option<TrieIter<'a, N, N3, EfSequence>>,
}

impl<'a, N: MonotoneSequence + 'a, N3: MonotoneSequence + 'a> Iterator for PredicateIter<'a, N, N3> {
    type Item = Triple;

    fn next(&mut self) -> Option<Triple> {
        loop {
            if let Some(t) = self.run.as_mut().and_then(Iterator::next) {
                return Some(t);
            }
            if self.remaining == 0 {
                return None;
            }
            let cursor = self.subjects.as_mut()?;
            let s = cursor.value();
            self.remaining -= 1;
            if self.remaining > 0 {
                cursor.advance();
            }
            self.run = Some(self.spo.select(&Triple::new(s, self.p, WILDCARD)));
        }
    }
}
