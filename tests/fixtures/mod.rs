//! Shared corpus fixtures for the integration tests.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use trix::index::{Triple, WILDCARD};

/// The five-triple corpus used throughout the docs.
pub fn small_corpus() -> Vec<Triple> {
    [(1, 1, 1), (1, 1, 2), (1, 2, 1), (2, 1, 1), (2, 2, 2)]
        .into_iter()
        .map(|(s, p, o)| Triple::new(s, p, o))
        .collect()
}

/// Sorted, deduplicated random triples. Predicates are few and skewed
/// like in real RDF data.
pub fn random_corpus(seed: u64, n: usize, subjects: u64, predicates: u64, objects: u64) -> Vec<Triple> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut triples: Vec<Triple> = (0..n)
        .map(|_| {
            let p = rng.gen_range(0..predicates).min(rng.gen_range(0..predicates));
            Triple::new(rng.gen_range(0..subjects), p, rng.gen_range(0..objects))
        })
        .collect();
    triples.sort();
    triples.dedup();
    triples
}

/// Matches of `pattern` by a linear scan, sorted.
pub fn brute_select(triples: &[Triple], pattern: &Triple) -> Vec<Triple> {
    let matches = |want: u64, have: u64| want == WILDCARD || want == have;
    let mut out: Vec<Triple> = triples
        .iter()
        .filter(|t| matches(pattern.s, t.s) && matches(pattern.p, t.p) && matches(pattern.o, t.o))
        .copied()
        .collect();
    out.sort();
    out
}

/// The eight bound/unbound combinations.
pub fn all_masks() -> Vec<[bool; 3]> {
    (0..8u8).map(|m| [m & 4 != 0, m & 2 != 0, m & 1 != 0]).collect()
}

/// Write triples as an unsorted input file for `prepare`.
pub fn write_raw(dir: &Path, name: &str, triples: &[Triple]) -> PathBuf {
    let path = dir.join(name);
    let content: String = triples.iter().rev().map(|t| format!("{} {} {}\n", t.s, t.p, t.o)).collect();
    fs::write(&path, content).expect("Failed to write raw triples");
    path
}
