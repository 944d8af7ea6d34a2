//! Terminal output for triples, check results and query timings

use crate::index::Triple;
use crate::index::check::TrieCheck;
use crate::query::RunReport;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

fn stdout(color: bool) -> StandardStream {
    let choice = if color { ColorChoice::Auto } else { ColorChoice::Never };
    StandardStream::stdout(choice)
}

/// Print triples as `s p o` lines, at most `limit` of them.
/// Returns the number of matches seen, including those not printed.
pub fn write_triples<W: WriteColor>(
    out: &mut W,
    triples: impl Iterator<Item = Triple>,
    limit: Option<usize>,
) -> io::Result<u64> {
    let mut seen = 0u64;
    for t in triples {
        seen += 1;
        if limit.is_some_and(|limit| seen > limit as u64) {
            continue;
        }
        out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        write!(out, "{}", t.s)?;
        out.reset()?;
        write!(out, " ")?;
        out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        write!(out, "{}", t.p)?;
        out.reset()?;
        writeln!(out, " {}", t.o)?;
    }
    if let Some(limit) = limit.filter(|&limit| seen > limit as u64) {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
        writeln!(out, "-- {} more not shown", seen - limit as u64)?;
        out.reset()?;
    }
    Ok(seen)
}

pub fn print_triples(triples: impl Iterator<Item = Triple>, color: bool, limit: Option<usize>) -> io::Result<u64> {
    write_triples(&mut stdout(color), triples, limit)
}

/// Print one line per checked trie. Returns whether every trie passed.
pub fn write_check_report<W: WriteColor>(out: &mut W, results: &[TrieCheck]) -> io::Result<bool> {
    let mut all_passed = true;
    for r in results {
        let passed = r.passed();
        all_passed &= passed;

        let (label, color) = if passed { ("PASS", Color::Green) } else { ("FAIL", Color::Red) };
        out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        write!(out, "{}", label)?;
        out.reset()?;
        writeln!(
            out,
            " {}: {} of {} triples, {} samples",
            r.perm, r.found, r.expected, r.samples
        )?;

        if !passed {
            writeln!(
                out,
                "     {} mismatches, {} lookup failures, {} sample failures",
                r.mismatches, r.lookup_failures, r.sample_failures
            )?;
            if let Some(first) = &r.first_mismatch {
                writeln!(out, "     first: {}", first)?;
            }
        }
    }
    Ok(all_passed)
}

pub fn print_check_report(results: &[TrieCheck], color: bool) -> io::Result<bool> {
    write_check_report(&mut stdout(color), results)
}

pub fn write_run_report<W: Write>(out: &mut W, report: &RunReport) -> io::Result<()> {
    writeln!(out, "\t# returned triples: {}", report.returned)?;
    writeln!(out, "\tMean per run: {:.6} [sec]", report.mean_run_secs)?;
    writeln!(out, "\tMean per query: {:.3} [musec]", report.mean_per_query_us)?;
    writeln!(out, "\tMean per triple: {:.3} [ns]", report.mean_per_triple_ns)?;
    Ok(())
}

pub fn print_run_report(report: &RunReport) -> io::Result<()> {
    write_run_report(&mut io::stdout().lock(), report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Permutation;
    use termcolor::Buffer;

    fn text(buf: Buffer) -> String {
        String::from_utf8(buf.into_inner()).unwrap()
    }

    #[test]
    fn test_triples_respect_limit() {
        let triples = (0..5u64).map(|i| Triple::new(i, 1, 2));
        let mut buf = Buffer::no_color();
        let seen = write_triples(&mut buf, triples, Some(2)).unwrap();
        assert_eq!(seen, 5);
        assert_eq!(text(buf), "0 1 2\n1 1 2\n-- 3 more not shown\n");

        let mut buf = Buffer::no_color();
        write_triples(&mut buf, std::iter::once(Triple::new(7, 8, 9)), None).unwrap();
        assert_eq!(text(buf), "7 8 9\n");
    }

    #[test]
    fn test_check_report_lines() {
        let ok = TrieCheck {
            perm: Permutation::Spo,
            expected: 3,
            found: 3,
            mismatches: 0,
            first_mismatch: None,
            lookup_failures: 0,
            samples: 3,
            sample_failures: 0,
        };
        let bad = TrieCheck {
            perm: Permutation::Pos,
            mismatches: 1,
            first_mismatch: Some("triple 1: expected (1,1,3) found (1,1,2)".to_owned()),
            ..ok.clone()
        };

        let mut buf = Buffer::no_color();
        assert!(write_check_report(&mut buf, std::slice::from_ref(&ok)).unwrap());
        assert_eq!(text(buf), "PASS spo: 3 of 3 triples, 3 samples\n");

        let mut buf = Buffer::no_color();
        assert!(!write_check_report(&mut buf, &[ok, bad]).unwrap());
        let out = text(buf);
        assert!(out.contains("FAIL pos"));
        assert!(out.contains("first: triple 1"));
    }
}
