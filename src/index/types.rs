use crate::utils::encoding::DecodeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use crate::sequence::{NOT_FOUND, Range};

/// Query coordinate meaning "unbound". Never stored.
pub const WILDCARD: u64 = u64::MAX;

/// An integer-encoded (subject, predicate, object) record.
///
/// Inside a trie the same struct carries coordinates in the trie's own
/// permutation order: `s`, `p`, `o` then read as first, second, third.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Triple {
    pub s: u64,
    pub p: u64,
    pub o: u64,
}

impl Triple {
    #[inline]
    pub const fn new(s: u64, p: u64, o: u64) -> Self {
        Self { s, p, o }
    }

    /// Pattern with every coordinate unbound.
    pub const fn wildcard() -> Self {
        Self::new(WILDCARD, WILDCARD, WILDCARD)
    }

    #[inline]
    pub fn coords(&self) -> [u64; 3] {
        [self.s, self.p, self.o]
    }

    #[inline]
    pub fn from_coords(c: [u64; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }

    /// Bound flags in coordinate order.
    #[inline]
    pub fn bound(&self) -> [bool; 3] {
        [self.s != WILDCARD, self.p != WILDCARD, self.o != WILDCARD]
    }

    pub fn is_fully_bound(&self) -> bool {
        self.bound().iter().all(|&b| b)
    }

    pub fn has_wildcard(&self) -> bool {
        !self.is_fully_bound()
    }

    /// Blank out the coordinates whose flag is false.
    pub fn masked(&self, keep: [bool; 3]) -> Self {
        let c = self.coords();
        Self::from_coords([0, 1, 2].map(|i| if keep[i] { c[i] } else { WILDCARD }))
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |f: &mut fmt::Formatter<'_>, v: u64| {
            if v == WILDCARD {
                write!(f, "?")
            } else {
                write!(f, "{}", v)
            }
        };
        write!(f, "(")?;
        show(f, self.s)?;
        write!(f, ",")?;
        show(f, self.p)?;
        write!(f, ",")?;
        show(f, self.o)?;
        write!(f, ")")
    }
}

/// Coordinate order used to lay out one trie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Permutation {
    Spo = 1,
    Pos = 2,
    Osp = 3,
    Ops = 4,
    Pso = 5,
    Sop = 6,
}

impl Permutation {
    pub const ALL: [Permutation; 6] = [
        Permutation::Spo,
        Permutation::Pos,
        Permutation::Osp,
        Permutation::Ops,
        Permutation::Pso,
        Permutation::Sop,
    ];

    /// Source coordinate (0 = s, 1 = p, 2 = o) placed at each trie level.
    #[inline]
    pub const fn order(self) -> [usize; 3] {
        match self {
            Permutation::Spo => [0, 1, 2],
            Permutation::Pos => [1, 2, 0],
            Permutation::Osp => [2, 0, 1],
            Permutation::Ops => [2, 1, 0],
            Permutation::Pso => [1, 0, 2],
            Permutation::Sop => [0, 2, 1],
        }
    }

    /// Rewrite an (s,p,o) triple into this permutation's order.
    #[inline]
    pub fn permute(self, t: Triple) -> Triple {
        let c = t.coords();
        let [a, b, d] = self.order();
        Triple::new(c[a], c[b], c[d])
    }

    /// Inverse of [`permute`](Permutation::permute).
    #[inline]
    pub fn unpermute(self, t: Triple) -> Triple {
        let mut c = [0u64; 3];
        for (level, &source) in self.order().iter().enumerate() {
            c[source] = t.coords()[level];
        }
        Triple::from_coords(c)
    }

    /// File suffix of the corpus sorted in this order.
    pub fn suffix(self) -> &'static str {
        match self {
            Permutation::Spo => "spo",
            Permutation::Pos => "pos",
            Permutation::Osp => "osp",
            Permutation::Ops => "ops",
            Permutation::Pso => "pso",
            Permutation::Sop => "sop",
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, DecodeError> {
        Self::ALL
            .into_iter()
            .find(|p| *p as u8 == tag)
            .ok_or(DecodeError::InvalidTag {
                field: "permutation",
                value: tag,
            })
    }
}

impl fmt::Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for Permutation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.suffix().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown permutation '{}'", s))
    }
}

/// Depth of a trie level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LevelKind {
    First = 1,
    Second = 2,
    Third = 3,
}

impl LevelKind {
    pub fn from_tag(tag: u8) -> Result<Self, DecodeError> {
        match tag {
            1 => Ok(LevelKind::First),
            2 => Ok(LevelKind::Second),
            3 => Ok(LevelKind::Third),
            value => Err(DecodeError::InvalidTag {
                field: "level",
                value,
            }),
        }
    }

    pub fn has_pointers(self) -> bool {
        matches!(self, LevelKind::First | LevelKind::Second)
    }

    pub fn has_nodes(self) -> bool {
        matches!(self, LevelKind::Second | LevelKind::Third)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permute_unpermute_inverse() {
        let t = Triple::new(10, 20, 30);
        for perm in Permutation::ALL {
            assert_eq!(perm.unpermute(perm.permute(t)), t, "{}", perm);
        }
        assert_eq!(Permutation::Pos.permute(t), Triple::new(20, 30, 10));
        assert_eq!(Permutation::Osp.permute(t), Triple::new(30, 10, 20));
        assert_eq!(Permutation::Ops.permute(t), Triple::new(30, 20, 10));
    }

    #[test]
    fn test_permutation_tags_and_names() {
        for perm in Permutation::ALL {
            assert_eq!(Permutation::from_tag(perm as u8).unwrap(), perm);
            assert_eq!(perm.suffix().parse::<Permutation>().unwrap(), perm);
        }
        assert!(Permutation::from_tag(7).is_err());
        assert!("xyz".parse::<Permutation>().is_err());
    }

    #[test]
    fn test_masked_and_display() {
        let t = Triple::new(1, 2, 3).masked([true, false, true]);
        assert_eq!(t, Triple::new(1, WILDCARD, 3));
        assert_eq!(t.to_string(), "(1,?,3)");
        assert!(t.has_wildcard());
        assert!(Triple::new(1, 2, 3).is_fully_bound());
    }
}
