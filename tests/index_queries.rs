//! Library-level query tests: every layout and codec must answer every
//! pattern exactly like a linear scan of the corpus.

mod fixtures;

use fixtures::{all_masks, brute_select, random_corpus, small_corpus};
use rayon::prelude::*;
use trix::index::{
    AnyIndex, CompactPefLevels, Index, IndexBuilder, Layout, NodeCodecs, PefCompactLevels, Triple, WILDCARD,
};
use trix::query::{Dictionary, LiteralDictionary};
use trix::sequence::{CompactVector, EfSequence, PefSequence, SequenceParams};

const W: u64 = WILDCARD;

fn build<C: NodeCodecs>(layout: Layout, triples: &[Triple], log: u8) -> Index<C> {
    IndexBuilder::new(layout, SequenceParams { log_partition_size: log })
        .build(triples)
        .unwrap()
}

fn sorted(iter: impl Iterator<Item = Triple>) -> Vec<Triple> {
    let mut v: Vec<_> = iter.collect();
    v.sort();
    v
}

/// Patterns drawn from stored triples plus a few that match nothing.
fn patterns(triples: &[Triple]) -> Vec<Triple> {
    let mut out = Vec::new();
    for t in triples.iter().step_by((triples.len() / 40).max(1)) {
        for mask in all_masks() {
            out.push(t.masked(mask));
        }
    }
    out.push(Triple::new(10_000, W, W));
    out.push(Triple::new(W, 10_000, W));
    out.push(Triple::new(W, W, 10_000));
    out.push(Triple::new(0, 10_000, 0));
    out
}

fn check_against_scan<C: NodeCodecs>(layout: Layout, triples: &[Triple], log: u8) {
    let index = build::<C>(layout, triples, log);
    assert_eq!(index.triples(), triples.len() as u64);
    for pattern in patterns(triples) {
        assert_eq!(
            sorted(index.select(&pattern)),
            brute_select(triples, &pattern),
            "{} {} pattern {}",
            layout,
            C::NODES_CODEC,
            pattern
        );
    }
    for t in triples.iter().step_by(7) {
        assert!(index.is_member(t), "{} missing {}", layout, t);
        let absent = Triple::new(t.s, t.p, t.o + 100_000);
        assert!(!index.is_member(&absent));
    }
}

#[test]
fn test_small_corpus_scenario() {
    let triples = small_corpus();
    for layout in Layout::ALL {
        let index = build::<PefSequence>(layout, &triples, 7);
        assert_eq!(
            sorted(index.select(&Triple::new(1, W, W))),
            vec![Triple::new(1, 1, 1), Triple::new(1, 1, 2), Triple::new(1, 2, 1)]
        );
        assert_eq!(
            sorted(index.select(&Triple::new(W, 1, W))),
            vec![Triple::new(1, 1, 1), Triple::new(1, 1, 2), Triple::new(2, 1, 1)]
        );
        assert!(index.is_member(&Triple::new(1, 1, 1)));
        assert_eq!(index.select(&Triple::new(3, W, W)).count(), 0);
    }
}

#[test]
fn test_every_layout_matches_scan_with_pef() {
    let triples = random_corpus(11, 3_000, 200, 12, 400);
    for layout in Layout::ALL {
        check_against_scan::<PefSequence>(layout, &triples, 3);
    }
}

#[test]
fn test_every_codec_matches_scan() {
    let triples = random_corpus(23, 1_500, 90, 6, 150);
    for layout in [Layout::ThreeTries, Layout::SpoOps] {
        check_against_scan::<CompactVector>(layout, &triples, 7);
        check_against_scan::<EfSequence>(layout, &triples, 7);
        check_against_scan::<PefSequence>(layout, &triples, 7);
        check_against_scan::<PefCompactLevels>(layout, &triples, 7);
        check_against_scan::<CompactPefLevels>(layout, &triples, 7);
    }
}

#[test]
fn test_compact_codec_finds_values_at_search_midpoints() {
    // long second-level ranges push lookups through the binary search
    let triples: Vec<_> = (0..64u64)
        .flat_map(|p| (0..3u64).map(move |o| Triple::new(p % 2, p, o * 7 + p % 5)))
        .collect();
    for layout in Layout::ALL {
        check_against_scan::<CompactVector>(layout, &triples, 7);
        check_against_scan::<CompactPefLevels>(layout, &triples, 7);
    }
}

#[test]
fn test_predicate_patterns_on_spo_ops() {
    let triples = random_corpus(41, 2_500, 150, 9, 300);
    let index = build::<PefSequence>(Layout::SpoOps, &triples, 4);
    let predicates = index.predicates().unwrap();
    for p in 0..10 {
        let pattern = Triple::new(W, p, W);
        let expected = brute_select(&triples, &pattern);
        let subjects: std::collections::BTreeSet<_> = expected.iter().map(|t| t.s).collect();
        assert_eq!(predicates.subjects(p).collect::<Vec<_>>(), subjects.into_iter().collect::<Vec<_>>());
        // already in (s,p,o) order
        assert_eq!(index.select(&pattern).collect::<Vec<_>>(), expected, "predicate {}", p);
    }
}

#[test]
fn test_sparse_identifiers() {
    // ids with large gaps leave most first-level ranges empty
    let triples: Vec<_> = (0..300u64)
        .map(|i| Triple::new(i * 37 % 1000, i % 3 * 50, i * 13 % 997))
        .collect();
    let mut triples = triples;
    triples.sort();
    triples.dedup();
    for layout in Layout::ALL {
        check_against_scan::<PefSequence>(layout, &triples, 2);
    }
}

#[test]
fn test_select_range_matches_scan() {
    let triples = random_corpus(5, 2_000, 100, 5, 300);
    // object id i carries literal value 3 * i + 1
    let dictionary = LiteralDictionary::new((0..300u64).map(|i| 3 * i + 1).collect()).unwrap();
    for layout in [Layout::ThreeTries, Layout::RankedThreeTries, Layout::SpoPos] {
        let index = build::<PefSequence>(layout, &triples, 4);
        for (p, lower, upper) in [(0, 0, 1000), (1, 50, 200), (2, 400, 401), (4, 898, 2000), (3, 10, 10)] {
            let expected: Vec<_> = triples
                .iter()
                .filter(|t| {
                    let value = dictionary.value(t.o);
                    t.p == p && value >= lower && value < upper
                })
                .copied()
                .collect();
            let got = sorted(index.select_range(p, lower, upper, &dictionary).unwrap());
            assert_eq!(got, expected, "{} p={} [{}, {})", layout, p, lower, upper);
        }
    }
}

#[test]
fn test_concurrent_readers_share_one_index() {
    let triples = random_corpus(99, 4_000, 300, 10, 500);
    let index = build::<PefSequence>(Layout::RankedThreeTries, &triples, 5);
    let patterns = patterns(&triples);

    let expected: Vec<_> = patterns.iter().map(|p| brute_select(&triples, p)).collect();
    let results: Vec<_> = patterns.par_iter().map(|p| sorted(index.select(p))).collect();
    assert_eq!(results, expected);

    let members = triples.par_iter().filter(|t| index.is_member(t)).count();
    assert_eq!(members, triples.len());
}

#[test]
fn test_loaded_index_answers_like_built() {
    let triples = random_corpus(3, 1_000, 80, 8, 120);
    let dir = tempfile::tempdir().unwrap();
    for layout in Layout::ALL {
        let index = build::<EfSequence>(layout, &triples, 7);
        let path = dir.path().join(format!("{}.trix", layout));
        index.save(&path).unwrap();

        let loaded = AnyIndex::load(&path).unwrap();
        assert!(matches!(loaded, AnyIndex::EliasFano(_)));
        assert_eq!(loaded.layout(), layout);
        for pattern in patterns(&triples).iter().step_by(5) {
            assert_eq!(sorted(loaded.select(pattern)), sorted(index.select(pattern)), "{}", pattern);
        }
    }
}
