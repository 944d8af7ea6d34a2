//! Corpus parameters stored next to the triple files as `<basename>.stats`.
//!
//! The file holds seven whitespace separated integers: the triple count,
//! the distinct subjects, predicates and objects, then the distinct
//! (s,p), (p,o) and (o,s) pairs.

use super::types::{LevelKind, Permutation, Triple};
use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const STATS_SUFFIX: &str = "stats";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TripleParams {
    pub triples: u64,
    pub subjects: u64,
    pub predicates: u64,
    pub objects: u64,
    pub sp_pairs: u64,
    pub po_pairs: u64,
    pub os_pairs: u64,
}

/// Path of the parameters file for `basename`.
pub fn stats_path(basename: &Path) -> PathBuf {
    let mut name = basename.as_os_str().to_owned();
    name.push(".");
    name.push(STATS_SUFFIX);
    PathBuf::from(name)
}

fn distinct<T: Ord + Send>(mut items: Vec<T>) -> u64 {
    items.par_sort_unstable();
    items.dedup();
    items.len() as u64
}

impl TripleParams {
    /// Count the parameters of a deduplicated (s,p,o) triple set.
    pub fn from_triples(triples: &[Triple]) -> Self {
        let column = |f: fn(&Triple) -> u64| distinct(triples.par_iter().map(f).collect());
        let pairs = |f: fn(&Triple) -> (u64, u64)| distinct(triples.par_iter().map(f).collect());
        Self {
            triples: triples.len() as u64,
            subjects: column(|t| t.s),
            predicates: column(|t| t.p),
            objects: column(|t| t.o),
            sp_pairs: pairs(|t| (t.s, t.p)),
            po_pairs: pairs(|t| (t.p, t.o)),
            os_pairs: pairs(|t| (t.o, t.s)),
        }
    }

    /// Expected number of entries of `level` in a trie laid out in `perm`:
    /// distinct first coordinates, distinct (first, second) pairs, or
    /// triples.
    pub fn num_nodes(&self, perm: Permutation, level: LevelKind) -> u64 {
        match level {
            LevelKind::First => match perm {
                Permutation::Spo | Permutation::Sop => self.subjects,
                Permutation::Pos | Permutation::Pso => self.predicates,
                Permutation::Osp | Permutation::Ops => self.objects,
            },
            LevelKind::Second => match perm {
                Permutation::Spo | Permutation::Pso => self.sp_pairs,
                Permutation::Pos | Permutation::Ops => self.po_pairs,
                Permutation::Osp | Permutation::Sop => self.os_pairs,
            },
            LevelKind::Third => self.triples,
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut values = [0u64; 7];
        let mut tokens = content.split_whitespace();
        for (i, slot) in values.iter_mut().enumerate() {
            let token = tokens
                .next()
                .with_context(|| format!("Parameters end after {} of 7 values", i))?;
            *slot = token
                .parse()
                .with_context(|| format!("Invalid parameter value '{}'", token))?;
        }
        if tokens.next().is_some() {
            bail!("Parameters hold more than 7 values");
        }
        let [triples, subjects, predicates, objects, sp_pairs, po_pairs, os_pairs] = values;
        Ok(Self {
            triples,
            subjects,
            predicates,
            objects,
            sp_pairs,
            po_pairs,
            os_pairs,
        })
    }

    pub fn load(basename: &Path) -> Result<Self> {
        let path = stats_path(basename);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read parameters file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Malformed parameters file {}", path.display()))
    }

    pub fn save(&self, basename: &Path) -> Result<()> {
        let path = stats_path(basename);
        let content = format!(
            "{}\n{}\n{}\n{}\n{}\n{}\n{}\n",
            self.triples, self.subjects, self.predicates, self.objects, self.sp_pairs, self.po_pairs, self.os_pairs
        );
        fs::write(&path, content).with_context(|| format!("Failed to write parameters file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Triple> {
        [(1, 1, 1), (1, 1, 2), (1, 2, 1), (2, 1, 1), (2, 2, 2)]
            .into_iter()
            .map(|(s, p, o)| Triple::new(s, p, o))
            .collect()
    }

    #[test]
    fn test_counts_from_triples() {
        let params = TripleParams::from_triples(&corpus());
        assert_eq!(
            params,
            TripleParams {
                triples: 5,
                subjects: 2,
                predicates: 2,
                objects: 2,
                sp_pairs: 4,
                po_pairs: 4,
                os_pairs: 4,
            }
        );
        assert_eq!(params.num_nodes(Permutation::Pos, LevelKind::Second), 4);
        assert_eq!(params.num_nodes(Permutation::Osp, LevelKind::First), 2);
        assert_eq!(params.num_nodes(Permutation::Ops, LevelKind::Third), 5);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let basename = dir.path().join("corpus");
        let params = TripleParams::from_triples(&corpus());
        params.save(&basename).unwrap();
        assert!(dir.path().join("corpus.stats").exists());
        assert_eq!(TripleParams::load(&basename).unwrap(), params);
    }

    #[test]
    fn test_parse_rejects_bad_files() {
        assert!(TripleParams::parse("5 2 2 2 4 3").is_err());
        assert!(TripleParams::parse("5 2 2 2 4 3 4 9").is_err());
        assert!(TripleParams::parse("5 2 x 2 4 3 4").is_err());
        assert_eq!(TripleParams::parse(" 5\n2 2 2\n4 3 4\n").unwrap().po_pairs, 3);
    }
}
