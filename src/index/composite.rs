//! Multi-permutation index.
//!
//! An [`Index`] owns two or three tries laid out in different permutations
//! and routes each pattern to the trie that places its bound coordinates
//! first. Results are rewritten back to (s,p,o) order before they are
//! yielded.

use super::mapper::{ObjectMapper, RankMapper};
use super::predicates::{PredicateIndex, PredicateIter};
use super::trie::{PoIter, SoIter, Trie, TrieIter};
use super::types::{NOT_FOUND, Permutation, Triple};
use crate::query::dictionary::Dictionary;
use crate::sequence::{Codec, CompactVector, EfSequence, MonotoneSequence, PefSequence, SequenceParams};
use crate::utils::encoding::DecodeError;
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Nodes codecs of the second and third trie levels of an index.
///
/// Every [`MonotoneSequence`] is a configuration on its own, encoding both
/// levels; the marker types below mix two codecs.
pub trait NodeCodecs: fmt::Debug + Send + Sync + 'static {
    type Second: MonotoneSequence + 'static;
    type Third: MonotoneSequence + 'static;

    /// Tag written to index headers.
    const NODES_CODEC: Codec;
}

impl<N: MonotoneSequence + 'static> NodeCodecs for N {
    type Second = N;
    type Third = N;
    const NODES_CODEC: Codec = N::CODEC;
}

/// Partitioned Elias-Fano second level over a bit-packed third level.
#[derive(Debug, Clone, Copy, Default)]
pub struct PefCompactLevels;

impl NodeCodecs for PefCompactLevels {
    type Second = PefSequence;
    type Third = CompactVector;
    const NODES_CODEC: Codec = Codec::PefCompact;
}

/// Bit-packed second level over a partitioned Elias-Fano third level.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactPefLevels;

impl NodeCodecs for CompactPefLevels {
    type Second = CompactVector;
    type Third = PefSequence;
    const NODES_CODEC: Codec = Codec::CompactPef;
}

/// Trie type every index stores: pointers are always plain Elias-Fano.
pub type IndexTrie<C> = Trie<<C as NodeCodecs>::Second, <C as NodeCodecs>::Third, EfSequence>;

/// Which permutations an index materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum Layout {
    /// SPO, POS and OSP.
    ThreeTries = 1,
    /// SPO, POS and OSP; POS stores subjects as ranks under OSP.
    RankedThreeTries = 2,
    /// SPO and POS.
    SpoPos = 3,
    /// SPO and OPS.
    SpoOps = 4,
}

impl Layout {
    pub const ALL: [Layout; 4] = [
        Layout::ThreeTries,
        Layout::RankedThreeTries,
        Layout::SpoPos,
        Layout::SpoOps,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Layout::ThreeTries => "three-tries",
            Layout::RankedThreeTries => "ranked-three-tries",
            Layout::SpoPos => "spo-pos",
            Layout::SpoOps => "spo-ops",
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, DecodeError> {
        Self::ALL
            .into_iter()
            .find(|l| *l as u8 == tag)
            .ok_or(DecodeError::InvalidTag { field: "layout", value: tag })
    }

    /// The trie stored next to SPO.
    pub fn secondary(self) -> Permutation {
        match self {
            Layout::SpoOps => Permutation::Ops,
            _ => Permutation::Pos,
        }
    }

    pub fn has_osp(self) -> bool {
        matches!(self, Layout::ThreeTries | Layout::RankedThreeTries)
    }

    /// Whether the layout keeps a predicate to subjects index for `(?,p,?)`.
    pub fn has_predicate_index(self) -> bool {
        matches!(self, Layout::SpoOps)
    }

    /// Permutations in persisted order.
    pub fn permutations(self) -> Vec<Permutation> {
        let mut perms = vec![Permutation::Spo, self.secondary()];
        if self.has_osp() {
            perms.push(Permutation::Osp);
        }
        perms
    }

    /// Whether object range queries can be answered.
    pub fn supports_range(self) -> bool {
        self.secondary() == Permutation::Pos
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|l| l.name()).collect();
                format!("unknown layout '{}' (expected one of {})", s, names.join(", "))
            })
    }
}

/// Trie operation chosen for a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    All,
    Select(Permutation),
    SelectSo(Permutation),
    SelectPo(Permutation),
    /// Subjects of the predicate, then their SPO runs.
    SelectP,
}

impl Route {
    pub fn perm(self) -> Permutation {
        match self {
            Route::All | Route::SelectP => Permutation::Spo,
            Route::Select(p) | Route::SelectSo(p) | Route::SelectPo(p) => p,
        }
    }
}

#[derive(Debug)]
pub struct Index<C: NodeCodecs = PefSequence> {
    layout: Layout,
    params: SequenceParams,
    spo: IndexTrie<C>,
    secondary: IndexTrie<C>,
    osp: Option<Arc<IndexTrie<C>>>,
    predicates: Option<PredicateIndex<C::Second>>,
}

impl<C: NodeCodecs> Index<C> {
    /// Assemble an index from built or decoded parts, checking that they
    /// match `layout` and agree on the triple count. A ranked layout gets
    /// its POS mapper installed here.
    pub fn from_parts(
        layout: Layout,
        params: SequenceParams,
        spo: IndexTrie<C>,
        mut secondary: IndexTrie<C>,
        osp: Option<Arc<IndexTrie<C>>>,
        predicates: Option<PredicateIndex<C::Second>>,
    ) -> Result<Self, DecodeError> {
        let inconsistent = |msg: String| Err(DecodeError::Inconsistent(msg));
        if spo.perm() != Permutation::Spo {
            return inconsistent(format!("expected the spo trie, found {}", spo.perm()));
        }
        if secondary.perm() != layout.secondary() {
            return inconsistent(format!(
                "{} layout expects a {} trie, found {}",
                layout,
                layout.secondary(),
                secondary.perm()
            ));
        }
        match (&osp, layout.has_osp()) {
            (Some(osp), true) if osp.perm() != Permutation::Osp => {
                return inconsistent(format!("expected the osp trie, found {}", osp.perm()));
            }
            (None, true) => return inconsistent(format!("{} layout is missing its osp trie", layout)),
            (Some(_), false) => return inconsistent(format!("{} layout has no osp trie", layout)),
            _ => {}
        }
        match (&predicates, layout.has_predicate_index()) {
            (Some(predicates), true) => predicates.check_against(spo.second().size())?,
            (None, true) => return inconsistent(format!("{} layout is missing its predicate index", layout)),
            (Some(_), false) => return inconsistent(format!("{} layout has no predicate index", layout)),
            (None, false) => {}
        }

        let triples = spo.triples();
        let counts = [Some(secondary.triples()), osp.as_ref().map(|t| t.triples())];
        if counts.into_iter().flatten().any(|n| n != triples) {
            return inconsistent("tries disagree on the number of triples".to_owned());
        }

        if let (Layout::RankedThreeTries, Some(osp)) = (layout, &osp) {
            let mapper: Arc<dyn ObjectMapper> = Arc::new(RankMapper::new(Arc::clone(osp)));
            secondary.set_mapper(mapper);
        }

        Ok(Self {
            layout,
            params,
            spo,
            secondary,
            osp,
            predicates,
        })
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn codec(&self) -> Codec {
        C::NODES_CODEC
    }

    pub fn params(&self) -> SequenceParams {
        self.params
    }

    pub fn spo(&self) -> &IndexTrie<C> {
        &self.spo
    }

    pub fn secondary(&self) -> &IndexTrie<C> {
        &self.secondary
    }

    pub fn osp(&self) -> Option<&IndexTrie<C>> {
        self.osp.as_deref()
    }

    pub fn predicates(&self) -> Option<&PredicateIndex<C::Second>> {
        self.predicates.as_ref()
    }

    /// Materialized tries, in persisted order.
    pub fn tries(&self) -> Vec<&IndexTrie<C>> {
        let mut tries = vec![&self.spo, &self.secondary];
        tries.extend(self.osp());
        tries
    }

    pub fn trie(&self, perm: Permutation) -> Option<&IndexTrie<C>> {
        self.tries().into_iter().find(|t| t.perm() == perm)
    }

    pub fn triples(&self) -> u64 {
        self.spo.triples()
    }

    pub fn bytes(&self) -> usize {
        let tries: usize = self.tries().iter().map(|t| t.bytes()).sum();
        tries + self.predicates.as_ref().map_or(0, PredicateIndex::bytes)
    }

    /// Bits per triple over all tries.
    pub fn bits_per_triple(&self) -> f64 {
        if self.triples() == 0 {
            return 0.0;
        }
        self.bytes() as f64 * 8.0 / self.triples() as f64
    }

    /// Pick the trie operation for the bound coordinates of `t`.
    pub fn route(&self, t: &Triple) -> Route {
        let [s, p, o] = t.bound();
        if !s && !p && !o {
            return Route::All;
        }
        match self.layout {
            Layout::ThreeTries | Layout::RankedThreeTries => {
                if s && (p || !o) {
                    Route::Select(Permutation::Spo)
                } else if p && (o || !s) {
                    Route::Select(Permutation::Pos)
                } else {
                    Route::Select(Permutation::Osp)
                }
            }
            Layout::SpoPos => match (s, p, o) {
                (true, false, true) => Route::SelectSo(Permutation::Spo),
                (true, _, _) => Route::Select(Permutation::Spo),
                (false, true, _) => Route::Select(Permutation::Pos),
                (false, false, _) => Route::SelectPo(Permutation::Pos),
            },
            Layout::SpoOps => match (s, p, o) {
                (true, false, true) => Route::SelectSo(Permutation::Spo),
                (true, _, _) => Route::Select(Permutation::Spo),
                (false, true, false) => Route::SelectP,
                (false, _, _) => Route::Select(Permutation::Ops),
            },
        }
    }

    fn routed_trie(&self, perm: Permutation) -> &IndexTrie<C> {
        match perm {
            Permutation::Spo => &self.spo,
            Permutation::Osp => self.osp.as_deref().unwrap_or(&self.secondary),
            _ => &self.secondary,
        }
    }

    /// Every triple matching `t`, in (s,p,o) order.
    pub fn select(&self, t: &Triple) -> IndexIter<'_, C> {
        let route = self.route(t);
        let perm = route.perm();
        let trie = self.routed_trie(perm);
        debug_assert_eq!(trie.perm(), perm);
        let permuted = perm.permute(*t);
        match route {
            Route::All => IndexIter::Select {
                perm,
                iter: trie.select_all(),
            },
            Route::Select(_) => IndexIter::Select {
                perm,
                iter: trie.select(&permuted),
            },
            Route::SelectSo(_) => IndexIter::SelectSo {
                perm,
                iter: trie.select_so(&permuted),
            },
            Route::SelectPo(_) => IndexIter::SelectPo {
                perm,
                iter: trie.select_po(&permuted),
            },
            Route::SelectP => match &self.predicates {
                Some(predicates) => IndexIter::SelectP {
                    iter: predicates.select_p(&self.spo, t.p),
                },
                None => IndexIter::SelectPo {
                    perm,
                    iter: trie.select_po(&permuted),
                },
            },
        }
    }

    pub fn select_all(&self) -> IndexIter<'_, C> {
        IndexIter::Select {
            perm: Permutation::Spo,
            iter: self.spo.select_all(),
        }
    }

    /// Position of a fully bound triple in the SPO trie, or [`NOT_FOUND`].
    pub fn locate(&self, t: &Triple) -> u64 {
        if t.has_wildcard() {
            return NOT_FOUND;
        }
        self.spo.is_member(t)
    }

    pub fn is_member(&self, t: &Triple) -> bool {
        self.locate(t) != NOT_FOUND
    }

    /// Triples with predicate `p` whose object id lies in
    /// `[lower_id, upper_id)`.
    pub fn select_range_ids(&self, p: u64, lower_id: u64, upper_id: u64) -> Result<IndexIter<'_, C>> {
        if !self.layout.supports_range() {
            bail!("{} layout does not store a pos trie, range queries need one", self.layout);
        }
        Ok(IndexIter::Select {
            perm: Permutation::Pos,
            iter: self.secondary.select_range(p, lower_id, upper_id),
        })
    }

    /// Triples with predicate `p` whose object's literal value lies in
    /// `[lower, upper)`, resolved through `dictionary`.
    pub fn select_range<D: Dictionary + ?Sized>(
        &self,
        p: u64,
        lower: u64,
        upper: u64,
        dictionary: &D,
    ) -> Result<IndexIter<'_, C>> {
        if lower >= upper {
            return Ok(IndexIter::Empty);
        }
        let lower_id = dictionary.next_geq(lower);
        let upper_id = dictionary.next_geq(upper);
        self.select_range_ids(p, lower_id, upper_id)
    }
}

/// Results of [`Index::select`], rewritten to (s,p,o) order.
pub enum IndexIter<'a, C: NodeCodecs> {
    Empty,
    Select {
        perm: Permutation,
        iter: TrieIter<'a, C::Second, C::Third, EfSequence>,
    },
    SelectSo {
        perm: Permutation,
        iter: SoIter<'a, C::Second, C::Third, EfSequence>,
    },
    SelectPo {
        perm: Permutation,
        iter: PoIter<'a, C::Second, C::Third, EfSequence>,
    },
    SelectP {
        iter: PredicateIter<'a, C::Second, C::Third>,
    },
}

impl<C: NodeCodecs> Iterator for IndexIter<'_, C> {
    type Item = Triple;

    fn next(&mut self) -> Option<Triple> {
        match self {
            IndexIter::Empty => None,
            IndexIter::Select { perm, iter } => iter.next().map(|t| perm.unpermute(t)),
            IndexIter::SelectSo { perm, iter } => iter.next().map(|t| perm.unpermute(t)),
            IndexIter::SelectPo { perm, iter } => iter.next().map(|t| perm.unpermute(t)),
            IndexIter::SelectP { iter } => iter.next(),
        }
    }
}

/// An index of any nodes codec, as found on disk.
#[derive(Debug)]
pub enum AnyIndex {
    Compact(Index<CompactVector>),
    EliasFano(Index<EfSequence>),
    Partitioned(Index<PefSequence>),
    PefCompact(Index<PefCompactLevels>),
    CompactPef(Index<CompactPefLevels>),
}

/// Run `$body` with `$index` bound to the typed index inside an [`AnyIndex`].
#[macro_export]
macro_rules! with_index {
    ($any:expr, $index:ident => $body:expr) => {
        match $any {
            $crate::index::AnyIndex::Compact($index) => $body,
            $crate::index::AnyIndex::EliasFano($index) => $body,
            $crate::index::AnyIndex::Partitioned($index) => $body,
            $crate::index::AnyIndex::PefCompact($index) => $body,
            $crate::index::AnyIndex::CompactPef($index) => $body,
        }
    };
}

impl AnyIndex {
    pub fn codec(&self) -> Codec {
        with_index!(self, index => index.codec())
    }

    pub fn layout(&self) -> Layout {
        with_index!(self, index => index.layout())
    }

    pub fn triples(&self) -> u64 {
        with_index!(self, index => index.triples())
    }

    pub fn bytes(&self) -> usize {
        with_index!(self, index => index.bytes())
    }

    pub fn is_member(&self, t: &Triple) -> bool {
        with_index!(self, index => index.is_member(t))
    }

    /// [`Index::select`] behind a trait object.
    pub fn select(&self, t: &Triple) -> Box<dyn Iterator<Item = Triple> + '_> {
        with_index!(self, index => Box::new(index.select(t)))
    }
}
