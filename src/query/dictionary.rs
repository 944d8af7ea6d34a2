//! Literal dictionaries used to turn value ranges into id ranges.
//!
//! Object identifiers of numeric literals are assigned in value order, so
//! the ids of every literal inside `[lower, upper)` form one contiguous id
//! range that a POS trie can answer with a single range scan.

use crate::sequence::{MonotoneSequence, PefSequence, SequenceParams};
use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;

pub trait Dictionary {
    /// Number of literals.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Literal value of `id`.
    fn value(&self, id: u64) -> u64;

    /// Smallest id whose value is `>= value`, or [`len`](Dictionary::len).
    fn next_geq(&self, value: u64) -> u64;
}

/// Strictly increasing numeric literals stored as a partitioned
/// Elias-Fano sequence; the id of a literal is its rank.
#[derive(Debug, Default)]
pub struct LiteralDictionary {
    values: PefSequence,
}

impl LiteralDictionary {
    pub fn new(values: Vec<u64>) -> Result<Self> {
        if let Some(i) = values.windows(2).position(|w| w[0] >= w[1]) {
            bail!(
                "literal values must be strictly increasing: {} follows {} at id {}",
                values[i + 1],
                values[i],
                i + 1
            );
        }
        let values = PefSequence::build(&values, &SequenceParams::default())?;
        Ok(Self { values })
    }

    /// Read one literal value per line, in id order.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read dictionary {}", path.display()))?;
        let values = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(i, line)| {
                line.parse::<u64>()
                    .with_context(|| format!("Invalid literal '{}' for id {}", line, i))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(values).with_context(|| format!("Malformed dictionary {}", path.display()))
    }

    pub fn bytes(&self) -> usize {
        self.values.bytes()
    }
}

impl Dictionary for LiteralDictionary {
    fn len(&self) -> u64 {
        self.values.len()
    }

    fn value(&self, id: u64) -> u64 {
        self.values.access(id)
    }

    fn next_geq(&self, value: u64) -> u64 {
        self.values.next_geq_from(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_geq_maps_values_to_ids() {
        let dict = LiteralDictionary::new(vec![3, 10, 11, 40, 1000]).unwrap();
        assert_eq!(dict.len(), 5);
        assert_eq!(dict.value(3), 40);
        assert_eq!(dict.next_geq(0), 0);
        assert_eq!(dict.next_geq(3), 0);
        assert_eq!(dict.next_geq(4), 1);
        assert_eq!(dict.next_geq(41), 4);
        assert_eq!(dict.next_geq(1001), 5);
    }

    #[test]
    fn test_rejects_unsorted_literals() {
        assert!(LiteralDictionary::new(vec![1, 1]).is_err());
        assert!(LiteralDictionary::new(vec![5, 2]).is_err());
        assert!(LiteralDictionary::new(Vec::new()).unwrap().is_empty());
        assert_eq!(LiteralDictionary::default().next_geq(7), 0);
        let err = LiteralDictionary::new(vec![1, u64::MAX]).unwrap_err();
        assert!(err.to_string().contains("reserved"), "{}", err);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("literals.txt");
        fs::write(&path, "5\n\n9\n20\n").unwrap();
        let dict = LiteralDictionary::load(&path).unwrap();
        assert_eq!(dict.next_geq(6), 1);

        fs::write(&path, "5\nfive\n").unwrap();
        assert!(LiteralDictionary::load(&path).is_err());
    }
}
