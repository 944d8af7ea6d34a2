//! Query workloads: load pattern triples and time them against an index.

use crate::index::corpus;
use crate::index::{Index, NodeCodecs, Triple, WILDCARD};
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::fmt;
use std::hint::black_box;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::info;

/// Bound coordinates of a workload, written like `sp?` or `??o`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pattern {
    bound: [bool; 3],
}

impl Pattern {
    pub const ALL_BOUND: Pattern = Pattern { bound: [true; 3] };

    pub fn bound(&self) -> [bool; 3] {
        self.bound
    }

    pub fn wildcards(&self) -> usize {
        self.bound.iter().filter(|b| !**b).count()
    }

    /// Blank the unbound coordinates of `t`.
    pub fn apply(&self, t: &Triple) -> Triple {
        t.masked(self.bound)
    }
}

impl FromStr for Pattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 3 {
            return Err(format!("pattern '{}' must have three positions", s));
        }
        let mut bound = [false; 3];
        for (i, (c, name)) in chars.iter().zip(['s', 'p', 'o']).enumerate() {
            bound[i] = match c.to_ascii_lowercase() {
                c if c == name => true,
                '?' | '*' => false,
                _ => return Err(format!("pattern '{}': position {} must be '{}' or '?'", s, i + 1, name)),
            };
        }
        Ok(Self { bound })
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (bound, name) in self.bound.iter().zip(['s', 'p', 'o']) {
            write!(f, "{}", if *bound { name } else { '?' })?;
        }
        Ok(())
    }
}

/// Read up to `limit` triples from `path` and blank them with `pattern`.
pub fn load_queries(path: &Path, limit: Option<usize>, pattern: Pattern) -> Result<Vec<Triple>> {
    let mut queries = corpus::read_triples(path).with_context(|| format!("Failed to load queries {}", path.display()))?;
    if let Some(limit) = limit {
        queries.truncate(limit);
    }
    if queries.is_empty() {
        bail!("{} holds no queries", path.display());
    }
    for q in queries.iter_mut() {
        *q = pattern.apply(q);
    }
    info!(queries = queries.len(), %pattern, "loaded queries");
    Ok(queries)
}

/// Timing of a workload.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub queries: u64,
    pub runs: u32,
    pub returned: u64,
    pub mean_run_secs: f64,
    pub mean_per_query_us: f64,
    pub mean_per_triple_ns: f64,
}

/// Mean run time, discarding the fastest and slowest runs when there are
/// more than two.
fn mean_without_extremes(mut timings: Vec<Duration>) -> Duration {
    timings.sort();
    if timings.len() > 2 {
        timings.pop();
        timings.remove(0);
    }
    if timings.is_empty() {
        return Duration::ZERO;
    }
    timings.iter().sum::<Duration>() / timings.len() as u32
}

fn report(queries: u64, runs: u32, returned: u64, timings: Vec<Duration>) -> RunReport {
    let mean = mean_without_extremes(timings);
    let micros = mean.as_secs_f64() * 1e6;
    RunReport {
        queries,
        runs,
        returned,
        mean_run_secs: mean.as_secs_f64(),
        mean_per_query_us: if queries == 0 { 0.0 } else { micros / queries as f64 },
        mean_per_triple_ns: if returned == 0 { 0.0 } else { micros * 1e3 / returned as f64 },
    }
}

/// Run every query `runs` times. Fully bound queries are membership tests
/// and count as one returned triple each.
pub fn run_queries<C: NodeCodecs>(index: &Index<C>, queries: &[Triple], runs: u32) -> RunReport {
    let membership = queries.iter().all(|q| q.is_fully_bound());
    let mut returned = 0;
    let mut timings = Vec::with_capacity(runs as usize);
    for _ in 0..runs {
        returned = 0;
        let start = Instant::now();
        if membership {
            for q in queries {
                black_box(index.is_member(q));
            }
            returned = queries.len() as u64;
        } else {
            for q in queries {
                for t in index.select(q) {
                    black_box(t.s);
                    returned += 1;
                }
            }
        }
        timings.push(start.elapsed());
    }
    report(queries.len() as u64, runs, returned, timings)
}

/// Time a full scan of the index.
pub fn run_select_all<C: NodeCodecs>(index: &Index<C>, runs: u32) -> RunReport {
    let mut returned = 0;
    let mut timings = Vec::with_capacity(runs as usize);
    for _ in 0..runs {
        let start = Instant::now();
        returned = index.select_all().map(|t| black_box(t.s)).count() as u64;
        timings.push(start.elapsed());
    }
    report(1, runs, returned, timings)
}

/// Parse a lookup pattern such as `1 ? 3`; `?`, `*` and `_` are wildcards.
pub fn parse_triple_pattern(text: &str) -> Result<Triple> {
    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.len() != 3 {
        bail!("pattern '{}' must have three fields", text);
    }
    let mut coords = [WILDCARD; 3];
    for (slot, field) in coords.iter_mut().zip(&fields) {
        if matches!(*field, "?" | "*" | "_") {
            continue;
        }
        *slot = field
            .parse()
            .with_context(|| format!("invalid identifier '{}' in pattern", field))?;
        if *slot == WILDCARD {
            bail!("identifier {} is reserved for wildcards", field);
        }
    }
    Ok(Triple::from_coords(coords))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexBuilder, Layout};
    use crate::sequence::{PefSequence, SequenceParams};

    #[test]
    fn test_pattern_parse_and_apply() {
        let pattern: Pattern = "s?o".parse().unwrap();
        assert_eq!(pattern.bound(), [true, false, true]);
        assert_eq!(pattern.wildcards(), 1);
        assert_eq!(pattern.to_string(), "s?o");
        assert_eq!(pattern.apply(&Triple::new(1, 2, 3)), Triple::new(1, WILDCARD, 3));
        assert_eq!("S*?".parse::<Pattern>().unwrap().to_string(), "s??");
        assert!("ps?".parse::<Pattern>().is_err());
        assert!("sp".parse::<Pattern>().is_err());
    }

    #[test]
    fn test_parse_triple_pattern() {
        assert_eq!(parse_triple_pattern("1 ? 3").unwrap(), Triple::new(1, WILDCARD, 3));
        assert_eq!(parse_triple_pattern(" _ * 7 ").unwrap(), Triple::new(WILDCARD, WILDCARD, 7));
        assert!(parse_triple_pattern("1 2").is_err());
        assert!(parse_triple_pattern("1 x 3").is_err());
    }

    #[test]
    fn test_mean_discards_extremes() {
        let ms = |v: u64| Duration::from_millis(v);
        assert_eq!(mean_without_extremes(vec![ms(100), ms(2), ms(4), ms(1)]), ms(3));
        assert_eq!(mean_without_extremes(vec![ms(2), ms(4)]), ms(3));
        assert_eq!(mean_without_extremes(Vec::new()), Duration::ZERO);
    }

    #[test]
    fn test_workload_counts_results() {
        let triples = [(1, 1, 1), (1, 1, 2), (1, 2, 1), (2, 1, 1), (2, 2, 2)].map(|(s, p, o)| Triple::new(s, p, o));
        let index = IndexBuilder::new(Layout::SpoPos, SequenceParams::default())
            .build::<PefSequence>(&triples)
            .unwrap();

        let pattern: Pattern = "s??".parse().unwrap();
        let queries: Vec<_> = [Triple::new(1, 1, 1), Triple::new(2, 2, 2)].iter().map(|t| pattern.apply(t)).collect();
        let report = run_queries(&index, &queries, 3);
        assert_eq!(report.returned, 5);
        assert_eq!(report.queries, 2);

        let members = run_queries(&index, &triples, 1);
        assert_eq!(members.returned, 5);
        assert_eq!(run_select_all(&index, 4).returned, 5);
    }

    #[test]
    fn test_load_queries_masks_and_limits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queries.txt");
        std::fs::write(&path, "1 2 3\n4 5 6\n7 8 9\n").unwrap();
        let queries = load_queries(&path, Some(2), "?p?".parse().unwrap()).unwrap();
        assert_eq!(queries, vec![Triple::new(WILDCARD, 2, WILDCARD), Triple::new(WILDCARD, 5, WILDCARD)]);
    }
}
