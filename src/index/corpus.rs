//! Triple corpus files.
//!
//! A corpus is a set of text files `<basename>.<perm>`, one per
//! permutation. Every line holds one triple as three whitespace separated
//! integers in s p o order; the lines of each file are sorted by that
//! file's permutation.

use super::params::TripleParams;
use super::types::{Permutation, Triple, WILDCARD};
use anyhow::{Context, Result, bail};
use memchr::memchr;
use memmap2::Mmap;
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Path of the corpus file sorted in `perm` order.
pub fn corpus_path(basename: &Path, perm: Permutation) -> PathBuf {
    let mut name = basename.as_os_str().to_owned();
    name.push(".");
    name.push(perm.suffix());
    PathBuf::from(name)
}

fn parse_line(line: &[u8], line_no: usize) -> Result<Option<Triple>> {
    let text = std::str::from_utf8(line).with_context(|| format!("Line {} is not valid UTF-8", line_no))?;
    let mut fields = text.split_ascii_whitespace();
    let Some(first) = fields.next() else {
        return Ok(None);
    };
    let mut coords = [0u64; 3];
    for (i, slot) in coords.iter_mut().enumerate() {
        let field = if i == 0 {
            first
        } else {
            fields
                .next()
                .with_context(|| format!("Line {} has {} fields, expected 3", line_no, i))?
        };
        *slot = field
            .parse()
            .with_context(|| format!("Line {}: invalid identifier '{}'", line_no, field))?;
        if *slot == WILDCARD {
            bail!("Line {}: identifier {} is reserved for wildcards", line_no, field);
        }
    }
    if fields.next().is_some() {
        bail!("Line {} has more than 3 fields", line_no);
    }
    Ok(Some(Triple::from_coords(coords)))
}

/// Parse triple lines. Blank lines are skipped.
pub fn parse_triples(data: &[u8]) -> Result<Vec<Triple>> {
    let mut triples = Vec::new();
    let mut start = 0;
    let mut line_no = 1;
    while start < data.len() {
        let end = memchr(b'\n', &data[start..]).map_or(data.len(), |i| start + i);
        if let Some(t) = parse_line(&data[start..end], line_no)? {
            triples.push(t);
        }
        start = end + 1;
        line_no += 1;
    }
    Ok(triples)
}

/// Read every triple of a file, in file order.
pub fn read_triples(path: &Path) -> Result<Vec<Triple>> {
    let file = File::open(path).with_context(|| format!("Failed to open corpus file {}", path.display()))?;
    let len = file.metadata().context("Failed to stat corpus file")?.len();
    if len == 0 {
        return Ok(Vec::new());
    }
    // Safety: the file is only read while the map is alive.
    let mmap = unsafe { Mmap::map(&file) }.with_context(|| format!("Failed to map {}", path.display()))?;
    parse_triples(&mmap).with_context(|| format!("Malformed corpus file {}", path.display()))
}

/// Read the corpus file of `perm` and return its triples rewritten into
/// `perm` order, checking that they are strictly increasing.
pub fn load_permuted(basename: &Path, perm: Permutation) -> Result<Vec<Triple>> {
    let path = corpus_path(basename, perm);
    let mut triples = read_triples(&path)?;
    for t in triples.iter_mut() {
        *t = perm.permute(*t);
    }
    if let Some(i) = triples.windows(2).position(|w| w[0] >= w[1]) {
        bail!(
            "{} is not sorted in {} order: {} follows {} at triple {}",
            path.display(),
            perm,
            perm.unpermute(triples[i + 1]),
            perm.unpermute(triples[i]),
            i + 2
        );
    }
    debug!(path = %path.display(), triples = triples.len(), "loaded corpus file");
    Ok(triples)
}

/// Write (s,p,o) triples one per line.
pub fn write_triples<'a>(path: &Path, triples: impl IntoIterator<Item = &'a Triple>) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for t in triples {
        writeln!(out, "{} {} {}", t.s, t.p, t.o)?;
    }
    out.flush().with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Sort and deduplicate (s,p,o) triples.
pub fn normalize(triples: &mut Vec<Triple>) {
    triples.par_sort_unstable();
    triples.dedup();
}

/// Turn one unsorted triple file into the per-permutation corpus files
/// and the parameters file of `basename`.
pub fn prepare(input: &Path, basename: &Path, perms: &[Permutation]) -> Result<TripleParams> {
    let mut triples = read_triples(input)?;
    let read = triples.len();
    normalize(&mut triples);
    if triples.is_empty() {
        bail!("{} holds no triples", input.display());
    }
    info!(read, distinct = triples.len(), "normalized input triples");

    if let Some(parent) = basename.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    perms.par_iter().try_for_each(|&perm| -> Result<()> {
        let mut sorted = triples.clone();
        sorted.par_sort_unstable_by_key(|t| perm.permute(*t));
        write_triples(&corpus_path(basename, perm), &sorted)?;
        debug!(%perm, "wrote corpus file");
        Ok(())
    })?;

    let params = TripleParams::from_triples(&triples);
    params.save(basename)?;
    Ok(params)
}
