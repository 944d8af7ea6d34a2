use super::composite::{AnyIndex, Index, NodeCodecs};
use super::types::LevelKind;
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Space used by one trie level.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LevelReport {
    pub perm: String,
    pub level: &'static str,
    pub entries: u64,
    pub bytes: u64,
    pub bits_per_triple: f64,
}

/// Space report of a whole index.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IndexReport {
    pub layout: String,
    pub codec: String,
    pub log_partition_size: u8,
    pub triples: u64,
    pub bytes: u64,
    pub bits_per_triple: f64,
    pub levels: Vec<LevelReport>,
}

fn bits_per_triple(bytes: u64, triples: u64) -> f64 {
    if triples == 0 {
        0.0
    } else {
        bytes as f64 * 8.0 / triples as f64
    }
}

fn level_name(kind: LevelKind) -> &'static str {
    match kind {
        LevelKind::First => "first",
        LevelKind::Second => "second",
        LevelKind::Third => "third",
    }
}

pub fn report<C: NodeCodecs>(index: &Index<C>) -> IndexReport {
    let triples = index.triples();
    let mut levels: Vec<_> = index
        .tries()
        .into_iter()
        .flat_map(|trie| {
            trie.level_stats().map(|level| LevelReport {
                perm: trie.perm().to_string(),
                level: level_name(level.kind),
                entries: level.size,
                bytes: level.bytes as u64,
                bits_per_triple: bits_per_triple(level.bytes as u64, triples),
            })
        })
        .collect();
    if let Some(predicates) = index.predicates() {
        let bytes = predicates.bytes() as u64;
        levels.push(LevelReport {
            perm: "p".to_owned(),
            level: "subjects",
            entries: predicates.pairs(),
            bytes,
            bits_per_triple: bits_per_triple(bytes, triples),
        });
    }
    IndexReport {
        layout: index.layout().to_string(),
        codec: index.codec().to_string(),
        log_partition_size: index.params().log_partition_size,
        triples,
        bytes: index.bytes() as u64,
        bits_per_triple: index.bits_per_triple(),
        levels,
    }
}

pub fn report_any(index: &AnyIndex) -> IndexReport {
    crate::with_index!(index, index => report(index))
}

/// Write one JSON object per level, then the summary line.
pub fn write_json_lines<W: Write>(report: &IndexReport, out: &mut W) -> Result<()> {
    for level in &report.levels {
        serde_json::to_writer(&mut *out, level).context("Failed to serialize level report")?;
        writeln!(out)?;
    }
    let summary = serde_json::json!({
        "layout": report.layout,
        "codec": report.codec,
        "log_partition_size": report.log_partition_size,
        "triples": report.triples,
        "bytes": report.bytes,
        "bits_per_triple": report.bits_per_triple,
    });
    writeln!(out, "{}", summary)?;
    Ok(())
}

/// Display index statistics
pub fn show_stats(path: &Path, json: bool) -> Result<()> {
    let index = AnyIndex::load(path)?;
    let report = report_any(&index);

    if json {
        let stdout = std::io::stdout();
        return write_json_lines(&report, &mut stdout.lock());
    }

    println!("Index Statistics");
    println!("================");
    println!();
    println!("Index file:       {}", path.display());
    println!("Layout:           {}", report.layout);
    println!("Nodes codec:      {}", report.codec);
    println!("Partition size:   {}", 1u64 << report.log_partition_size);
    println!("Triples:          {}", report.triples);
    println!("Size:             {}", format_size(report.bytes));
    println!("Bits per triple:  {:.2}", report.bits_per_triple);

    println!();
    println!("Levels:");
    for level in &report.levels {
        println!(
            "  {:4} {:7} {:>12} entries {:>12} {:>8.2} bpt",
            level.perm,
            level.level,
            level.entries,
            format_size(level.bytes),
            level.bits_per_triple
        );
    }

    Ok(())
}

/// Format byte size to human readable
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
