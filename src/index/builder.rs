//! Index construction.
//!
//! [`TrieBuilder`] turns triples sorted in one permutation into a [`Trie`]
//! in a single pass: the pointers of the two upper levels are collected as
//! prefix counts while the nodes are appended, and each sequence is
//! encoded once its values are complete. [`IndexBuilder`] builds every
//! trie a [`Layout`] materializes, in parallel where they are independent,
//! plus the predicate index of layouts that keep one.

use super::composite::{Index, IndexTrie, Layout, NodeCodecs};
use super::corpus;
use super::level::TrieLevel;
use super::mapper::{IdentityMapper, ObjectMapper, RankMapper};
use super::params::TripleParams;
use super::predicates::PredicateIndex;
use super::trie::Trie;
use super::types::{LevelKind, NOT_FOUND, Permutation, Triple, WILDCARD};
use crate::sequence::partitioned::LOG_PARTITION_SIZE_RANGE;
use crate::sequence::{EfSequence, MonotoneSequence, SequenceParams};
use crate::utils::progress::{self, ProgressBar};
use anyhow::{Context, Result, bail, ensure};
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Builds one trie from triples in its permutation's coordinate order.
pub struct TrieBuilder {
    perm: Permutation,
    params: SequenceParams,
    mapper: Arc<dyn ObjectMapper>,
}

impl TrieBuilder {
    pub fn new(perm: Permutation, params: SequenceParams) -> Self {
        Self {
            perm,
            params,
            mapper: Arc::new(IdentityMapper),
        }
    }

    /// Store third coordinates through `mapper`; the built trie keeps it.
    pub fn with_mapper(mut self, mapper: Arc<dyn ObjectMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    /// Build from (s,p,o) triples in any order. Duplicates are dropped.
    pub fn build_from_triples<N2, N3, P>(&self, triples: &[Triple]) -> Result<Trie<N2, N3, P>>
    where
        N2: MonotoneSequence,
        N3: MonotoneSequence,
        P: MonotoneSequence,
    {
        let permuted = permute_sorted(triples, self.perm);
        self.build_sorted(&permuted)
    }

    /// Build from triples already rewritten into this trie's permutation
    /// and strictly increasing.
    pub fn build_sorted<N2, N3, P>(&self, triples: &[Triple]) -> Result<Trie<N2, N3, P>>
    where
        N2: MonotoneSequence,
        N3: MonotoneSequence,
        P: MonotoneSequence,
    {
        ensure!(!triples.is_empty(), "cannot build a {} trie from an empty triple set", self.perm);
        if let Some(t) = triples.iter().find(|t| t.has_wildcard()) {
            bail!("triple {} holds the reserved wildcard identifier", self.perm.unpermute(*t));
        }
        if let Some(i) = triples.windows(2).position(|w| w[0] >= w[1]) {
            bail!(
                "{} input is not strictly increasing at triple {}: {} follows {}",
                self.perm,
                i + 1,
                triples[i + 1],
                triples[i]
            );
        }

        let mut first_pointers: Vec<u64> = vec![0];
        let mut second_nodes: Vec<u64> = Vec::new();
        let mut second_pointers: Vec<u64> = vec![0];
        let mut third_nodes: Vec<u64> = Vec::with_capacity(triples.len());

        let mut prev: Option<&Triple> = None;
        for t in triples {
            let same_pair = prev.is_some_and(|p| p.s == t.s && p.p == t.p);
            if !same_pair {
                if prev.is_some() {
                    second_pointers.push(third_nodes.len() as u64);
                }
                if first_pointers.len() as u64 <= t.s {
                    grow_pointers(&mut first_pointers, t.s + 1, second_nodes.len() as u64)
                        .with_context(|| format!("{} trie cannot address first coordinate {}", self.perm, t.s))?;
                }
                second_nodes.push(t.p);
            }

            let mapped = self.mapper.map(t);
            if mapped == NOT_FOUND || mapped == WILDCARD {
                bail!(
                    "{} trie cannot store the third coordinate of {}",
                    self.perm,
                    self.perm.unpermute(*t)
                );
            }
            if same_pair && third_nodes.last().is_some_and(|&last| last >= mapped) {
                bail!("mapped third coordinates of {} are not increasing", self.perm.unpermute(*t));
            }
            third_nodes.push(mapped);
            prev = Some(t);
        }
        second_pointers.push(third_nodes.len() as u64);
        first_pointers.push(second_nodes.len() as u64);

        let level = |kind: LevelKind| format!("Failed to encode the {:?} level of the {} trie", kind, self.perm);
        let first = TrieLevel::first(P::build(&first_pointers, &self.params).with_context(|| level(LevelKind::First))?);
        let second = TrieLevel::second(
            N2::build_ranged(&second_nodes, &first_pointers, &self.params)
                .with_context(|| level(LevelKind::Second))?,
            P::build(&second_pointers, &self.params).with_context(|| level(LevelKind::Second))?,
        );
        let third = TrieLevel::third(
            N3::build_ranged(&third_nodes, &second_pointers, &self.params).with_context(|| level(LevelKind::Third))?,
        );

        let mut trie = Trie::new(self.perm, first, second, third);
        trie.set_mapper(Arc::clone(&self.mapper));
        debug!(
            perm = %self.perm,
            second = %N2::CODEC,
            third = %N3::CODEC,
            triples = trie.triples(),
            bytes = trie.bytes(),
            "built trie"
        );
        Ok(trie)
    }
}

/// Extend `pointers` to `len` entries, each an empty range at `fill`.
fn grow_pointers(pointers: &mut Vec<u64>, len: u64, fill: u64) -> Result<()> {
    let len = usize::try_from(len)?;
    pointers.try_reserve(len - pointers.len())?;
    pointers.resize(len, fill);
    Ok(())
}

/// (s,p,o) triples rewritten into `perm`, sorted and deduplicated.
pub fn permute_sorted(triples: &[Triple], perm: Permutation) -> Vec<Triple> {
    let mut permuted: Vec<Triple> = triples.par_iter().map(|t| perm.permute(*t)).collect();
    permuted.par_sort_unstable();
    permuted.dedup();
    permuted
}

/// Builds every trie of an [`Index`] layout.
pub struct IndexBuilder {
    layout: Layout,
    params: SequenceParams,
    progress: bool,
}

impl IndexBuilder {
    pub fn new(layout: Layout, params: SequenceParams) -> Self {
        Self {
            layout,
            params,
            progress: false,
        }
    }

    /// Show a spinner while building.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Build from in-memory (s,p,o) triples in any order.
    pub fn build<C: NodeCodecs>(&self, triples: &[Triple]) -> Result<Index<C>> {
        self.assemble(|perm| Ok(permute_sorted(triples, perm)), None)
    }

    /// Build from the corpus files and parameters of `basename`. Every
    /// trie is checked against the parameters.
    pub fn build_from_corpus<C: NodeCodecs>(&self, basename: &Path) -> Result<Index<C>> {
        let expected = TripleParams::load(basename)?;
        info!(
            basename = %basename.display(),
            triples = expected.triples,
            layout = %self.layout,
            codec = %C::NODES_CODEC,
            "building index"
        );
        self.assemble(|perm| corpus::load_permuted(basename, perm), Some(&expected))
    }

    fn assemble<C, L>(&self, load: L, expected: Option<&TripleParams>) -> Result<Index<C>>
    where
        C: NodeCodecs,
        L: Fn(Permutation) -> Result<Vec<Triple>> + Sync,
    {
        ensure!(
            LOG_PARTITION_SIZE_RANGE.contains(&self.params.log_partition_size),
            "log partition size {} is outside {:?}",
            self.params.log_partition_size,
            LOG_PARTITION_SIZE_RANGE
        );

        let start = Instant::now();
        let spinner = self.spinner();

        let build_trie = |perm: Permutation, mapper: Option<Arc<dyn ObjectMapper>>| -> Result<IndexTrie<C>> {
            if let Some(spinner) = &spinner {
                spinner.set_message(format!("Building {} trie...", perm));
            }
            let triples = load(perm)?;
            let mut builder = TrieBuilder::new(perm, self.params);
            if let Some(mapper) = mapper {
                builder = builder.with_mapper(mapper);
            }
            let trie = builder
                .build_sorted(&triples)
                .with_context(|| format!("Failed to build the {} trie", perm))?;
            if let Some(expected) = expected {
                check_counts(&trie, expected)?;
            }
            Ok(trie)
        };

        let secondary_perm = self.layout.secondary();
        let (spo, secondary, osp) = if self.layout.has_osp() {
            let osp = Arc::new(build_trie(Permutation::Osp, None)?);
            let mapper = match self.layout {
                Layout::RankedThreeTries => {
                    Some(Arc::new(RankMapper::new(Arc::clone(&osp))) as Arc<dyn ObjectMapper>)
                }
                _ => None,
            };
            let (spo, secondary) =
                rayon::join(|| build_trie(Permutation::Spo, None), || build_trie(secondary_perm, mapper));
            (spo?, secondary?, Some(osp))
        } else {
            let (spo, secondary) =
                rayon::join(|| build_trie(Permutation::Spo, None), || build_trie(secondary_perm, None));
            (spo?, secondary?, None)
        };

        let predicates = if self.layout.has_predicate_index() {
            if let Some(spinner) = &spinner {
                spinner.set_message("Building predicate index...".to_owned());
            }
            let predicates = PredicateIndex::from_spo(&spo, &self.params).context("Failed to build the predicate index")?;
            debug!(
                predicates = predicates.num_predicates(),
                pairs = predicates.pairs(),
                bytes = predicates.bytes(),
                "built predicate index"
            );
            Some(predicates)
        } else {
            None
        };

        let index = Index::from_parts(self.layout, self.params, spo, secondary, osp, predicates)?;
        if let Some(spinner) = spinner {
            spinner.finish_with_message(format!("Built {} triples", index.triples()));
        }
        info!(
            layout = %self.layout,
            triples = index.triples(),
            bytes = index.bytes(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "index built"
        );
        Ok(index)
    }

    fn spinner(&self) -> Option<ProgressBar> {
        self.progress
            .then(|| progress::spinner(format!("Building {} index...", self.layout)))
    }
}

fn check_counts<N2, N3>(trie: &Trie<N2, N3, EfSequence>, expected: &TripleParams) -> Result<()>
where
    N2: MonotoneSequence,
    N3: MonotoneSequence,
{
    let perm = trie.perm();
    let actual = [
        (LevelKind::First, trie.distinct_first()),
        (LevelKind::Second, trie.second().size()),
        (LevelKind::Third, trie.third().size()),
    ];
    for (level, count) in actual {
        let want = expected.num_nodes(perm, level);
        if count != want {
            bail!(
                "{} trie {:?} level holds {} entries but the parameters expect {}",
                perm,
                level,
                count,
                want
            );
        }
    }
    Ok(())
}
