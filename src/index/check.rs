//! Verification of a built index against its corpus files.

use super::composite::{AnyIndex, Index, NodeCodecs};
use super::corpus;
use super::trie::Trie;
use super::types::{Permutation, Triple};
use crate::sequence::{EfSequence, MonotoneSequence};
use anyhow::Result;
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

/// Third-level ranges sampled per trie.
const SAMPLED_RANGES: u64 = 1024;

/// Outcome of checking one trie.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TrieCheck {
    pub perm: Permutation,
    pub expected: u64,
    pub found: u64,
    /// Positions where the scan disagrees with the corpus.
    pub mismatches: u64,
    pub first_mismatch: Option<String>,
    /// Triples whose membership lookup missed or landed elsewhere.
    pub lookup_failures: u64,
    pub samples: u64,
    pub sample_failures: u64,
}

impl TrieCheck {
    pub fn passed(&self) -> bool {
        self.expected == self.found && self.mismatches == 0 && self.lookup_failures == 0 && self.sample_failures == 0
    }
}

/// Check `trie` against `expected`, its triples in trie order.
pub fn check_trie<N2, N3>(trie: &Trie<N2, N3, EfSequence>, expected: &[Triple]) -> TrieCheck
where
    N2: MonotoneSequence,
    N3: MonotoneSequence,
{
    let perm = trie.perm();
    let mut found = 0u64;
    let mut mismatches = 0u64;
    let mut first_mismatch = None;
    for (i, actual) in trie.select_all().enumerate() {
        found += 1;
        match expected.get(i) {
            Some(want) if *want == actual => {}
            want => {
                mismatches += 1;
                if first_mismatch.is_none() {
                    first_mismatch = Some(match want {
                        Some(want) => format!(
                            "triple {}: expected {} found {}",
                            i,
                            perm.unpermute(*want),
                            perm.unpermute(actual)
                        ),
                        None => format!("triple {}: unexpected {}", i, perm.unpermute(actual)),
                    });
                }
            }
        }
    }

    let lookup_failures = expected
        .par_iter()
        .enumerate()
        .filter(|(i, t)| trie.is_member(t) != *i as u64)
        .count() as u64;

    let (samples, sample_failures) = sample_third_level(trie);
    TrieCheck {
        perm,
        expected: expected.len() as u64,
        found,
        mismatches,
        first_mismatch,
        lookup_failures,
        samples,
        sample_failures,
    }
}

/// `find` must return `pos` for the value `access` reads at `pos`, on a
/// sample of third-level ranges.
fn sample_third_level<N2, N3>(trie: &Trie<N2, N3, EfSequence>) -> (u64, u64)
where
    N2: MonotoneSequence,
    N3: MonotoneSequence,
{
    let second = trie.second();
    let ranges = second.num_ranges();
    let stride = (ranges / SAMPLED_RANGES).max(1);
    let mut samples = 0;
    let mut failures = 0;
    for j in (0..ranges).step_by(stride as usize) {
        let range = second.range(j);
        for pos in range.begin..range.end {
            let value = trie.third().access(range, pos);
            samples += 1;
            if trie.third().find(range, value) != pos {
                failures += 1;
            }
        }
    }
    (samples, failures)
}

pub fn check_index<C: NodeCodecs>(index: &Index<C>, basename: &Path) -> Result<Vec<TrieCheck>> {
    let results = index
        .tries()
        .par_iter()
        .map(|trie| -> Result<TrieCheck> {
            let expected = corpus::load_permuted(basename, trie.perm())?;
            let result = check_trie(trie, &expected);
            if result.passed() {
                debug!(perm = %result.perm, triples = result.found, "trie verified");
            } else {
                warn!(perm = %result.perm, mismatches = result.mismatches, "trie differs from corpus");
            }
            Ok(result)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(results)
}

pub fn check_any(index: &AnyIndex, basename: &Path) -> Result<Vec<TrieCheck>> {
    crate::with_index!(index, index => check_index(index, basename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::builder::IndexBuilder;
    use crate::index::composite::Layout;
    use crate::sequence::{PefSequence, SequenceParams};
    use std::fs;

    #[test]
    fn test_index_matches_its_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.txt");
        let lines: String = (0..200u64).map(|i| format!("{} {} {}\n", i % 13, i % 7, i % 29)).collect();
        fs::write(&input, lines).unwrap();
        let basename = dir.path().join("corpus");
        corpus::prepare(&input, &basename, &Permutation::ALL).unwrap();

        for layout in Layout::ALL {
            let index = IndexBuilder::new(layout, SequenceParams { log_partition_size: 2 })
                .build_from_corpus::<PefSequence>(&basename)
                .unwrap();
            let results = check_index(&index, &basename).unwrap();
            assert_eq!(results.len(), layout.permutations().len());
            assert!(results.iter().all(|r| r.passed()), "{}: {:?}", layout, results);
            assert!(results.iter().all(|r| r.samples == r.expected));
        }
    }

    #[test]
    fn test_detects_a_different_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.txt");
        fs::write(&input, "1 1 1\n1 1 2\n2 1 1\n").unwrap();
        let basename = dir.path().join("corpus");
        corpus::prepare(&input, &basename, &Permutation::ALL).unwrap();
        let index = IndexBuilder::new(Layout::SpoPos, SequenceParams::default())
            .build_from_corpus::<PefSequence>(&basename)
            .unwrap();

        fs::write(corpus::corpus_path(&basename, Permutation::Spo), "1 1 1\n1 1 3\n2 1 1\n").unwrap();
        let results = check_index(&index, &basename).unwrap();
        let spo = results.iter().find(|r| r.perm == Permutation::Spo).unwrap();
        assert!(!spo.passed());
        assert_eq!(spo.mismatches, 1);
        assert_eq!(spo.lookup_failures, 1);
        assert!(spo.first_mismatch.as_deref().unwrap().contains("(1,1,3)"));
        assert!(results.iter().find(|r| r.perm == Permutation::Pos).unwrap().passed());
    }
}
