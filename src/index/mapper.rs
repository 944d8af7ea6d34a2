//! Third-level object id translation.
//!
//! A trie stores `mapper.map(t)` as the third coordinate of `t` and hands
//! back `mapper.unmap` of the stored value. The rank mapper stores, for a
//! predicate-major trie, the rank of the subject among the subjects of the
//! same object in the object-major trie, which keeps the stored values
//! dense.

use super::trie::Trie;
use super::types::{NOT_FOUND, Triple};
use crate::sequence::MonotoneSequence;
use std::fmt;
use std::sync::Arc;

/// Strategy translating a third coordinate to and from its stored form.
///
/// Both methods read the triple in the owning trie's coordinate order.
pub trait ObjectMapper: Send + Sync + fmt::Debug {
    /// Stored form of `t.o`, or [`NOT_FOUND`] when it cannot be stored.
    fn map(&self, t: &Triple) -> u64;

    /// Original id of the stored value in `t.o`.
    fn unmap(&self, t: &Triple) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMapper;

impl ObjectMapper for IdentityMapper {
    #[inline]
    fn map(&self, t: &Triple) -> u64 {
        t.o
    }

    #[inline]
    fn unmap(&self, t: &Triple) -> u64 {
        t.o
    }
}

/// Ranks third coordinates against the second level of an object-major
/// trie, keyed by the second coordinate of the owning trie.
pub struct RankMapper<N2, N3, P> {
    osp: Arc<Trie<N2, N3, P>>,
}

impl<N2: MonotoneSequence, N3: MonotoneSequence, P: MonotoneSequence> RankMapper<N2, N3, P> {
    pub fn new(osp: Arc<Trie<N2, N3, P>>) -> Self {
        Self { osp }
    }
}

impl<N2: MonotoneSequence, N3: MonotoneSequence, P: MonotoneSequence> fmt::Debug for RankMapper<N2, N3, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RankMapper").field("osp", &self.osp.perm()).finish()
    }
}

impl<N2, N3, P> ObjectMapper for RankMapper<N2, N3, P>
where
    N2: MonotoneSequence + 'static,
    N3: MonotoneSequence + 'static,
    P: MonotoneSequence + 'static,
{
    fn map(&self, t: &Triple) -> u64 {
        let Some(r) = self.osp.first_range(t.p) else {
            return NOT_FOUND;
        };
        match self.osp.second().find(r, t.o) {
            NOT_FOUND => NOT_FOUND,
            pos => pos - r.begin,
        }
    }

    fn unmap(&self, t: &Triple) -> u64 {
        let Some(r) = self.osp.first_range(t.p) else {
            return NOT_FOUND;
        };
        if t.o >= r.len() {
            return NOT_FOUND;
        }
        self.osp.second().access(r, r.begin + t.o)
    }
}
