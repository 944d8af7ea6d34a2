use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use trix::index::{
    AnyIndex, CompactPefLevels, IndexBuilder, Layout, PefCompactLevels, Permutation, check, corpus, stats,
};
use trix::output;
use trix::query::{self, LiteralDictionary, Pattern};
use trix::sequence::{Codec, CompactVector, EfSequence, PefSequence, SequenceParams};
use trix::utils::{AppConfig, logging};
use trix::with_index;

#[derive(Parser)]
#[command(name = "trix")]
#[command(about = "Compressed trie index over integer-encoded RDF triples")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log debug output (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn an unsorted triple file into sorted corpus files and parameters
    Prepare {
        /// Input file, one `s p o` triple per line
        input: PathBuf,
        /// Output basename; writes <basename>.<perm> and <basename>.stats
        basename: PathBuf,
        /// Permutations to write (default: all six)
        #[arg(long, value_delimiter = ',')]
        perms: Vec<Permutation>,
    },
    /// Build an index from prepared corpus files
    Build {
        /// Corpus basename
        basename: PathBuf,
        /// Output index file
        #[arg(short, long)]
        output: PathBuf,
        /// three-tries, ranked-three-tries, spo-pos or spo-ops
        #[arg(short, long)]
        layout: Option<Layout>,
        /// compact, ef, pef, pef-compact or compact-pef
        #[arg(short, long)]
        codec: Option<Codec>,
        /// log2 of the partition size (1..=16)
        #[arg(long)]
        log_partition_size: Option<u8>,
        /// Hide the progress spinner
        #[arg(long)]
        no_progress: bool,
    },
    /// Verify an index against the corpus it was built from
    Check {
        index: PathBuf,
        basename: PathBuf,
    },
    /// Time a query workload (a full scan when no query file is given)
    Query {
        index: PathBuf,
        /// Query triples, one `s p o` per line
        #[arg(short, long)]
        queries: Option<PathBuf>,
        /// Bound positions, e.g. `s??`, `?p?`, `s?o`, `spo`
        #[arg(short, long, default_value = "spo")]
        pattern: Pattern,
        /// Maximum number of queries to load
        #[arg(short = 'n', long)]
        num_queries: Option<usize>,
        #[arg(long, default_value_t = 5)]
        runs: u32,
        /// Print the timings as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show index statistics
    Stats {
        index: PathBuf,
        /// One JSON object per line
        #[arg(long)]
        json: bool,
    },
    /// Print the triples matching one pattern, e.g. `1 ? 3`
    Lookup {
        index: PathBuf,
        /// Three fields; `?`, `*` or `_` is a wildcard
        #[arg(num_args = 3, required = true)]
        pattern: Vec<String>,
        /// Print at most this many triples
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(long)]
        no_color: bool,
    },
    /// Print the triples of a predicate whose object literal lies in [lower, upper)
    Range {
        index: PathBuf,
        /// Object literal values, one per line in id order
        #[arg(short, long)]
        dictionary: PathBuf,
        predicate: u64,
        lower: u64,
        upper: u64,
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(long)]
        no_color: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let config = AppConfig::load()?;

    // Ignore the error: the global pool may already be running.
    let _ = rayon::ThreadPoolBuilder::new()
        .num_threads(config.effective_threads())
        .build_global();

    match cli.command {
        Commands::Prepare {
            input,
            basename,
            perms,
        } => {
            let perms = if perms.is_empty() { Permutation::ALL.to_vec() } else { perms };
            let params = corpus::prepare(&input, &basename, &perms)?;
            println!(
                "Prepared {} triples ({} subjects, {} predicates, {} objects)",
                params.triples, params.subjects, params.predicates, params.objects
            );
        }
        Commands::Build {
            basename,
            output,
            layout,
            codec,
            log_partition_size,
            no_progress,
        } => {
            let params = SequenceParams {
                log_partition_size: log_partition_size.unwrap_or(config.log_partition_size),
            };
            let builder = IndexBuilder::new(layout.unwrap_or(config.layout), params)
                .with_progress(config.progress && !no_progress);
            match codec.unwrap_or(config.codec) {
                Codec::Compact => builder.build_from_corpus::<CompactVector>(&basename)?.save(&output)?,
                Codec::EliasFano => builder.build_from_corpus::<EfSequence>(&basename)?.save(&output)?,
                Codec::PartitionedEliasFano => builder.build_from_corpus::<PefSequence>(&basename)?.save(&output)?,
                Codec::PefCompact => builder.build_from_corpus::<PefCompactLevels>(&basename)?.save(&output)?,
                Codec::CompactPef => builder.build_from_corpus::<CompactPefLevels>(&basename)?.save(&output)?,
            }
            println!("Index written to {}", output.display());
        }
        Commands::Check { index, basename } => {
            let loaded = AnyIndex::load(&index)?;
            let results = check::check_any(&loaded, &basename)?;
            if !output::print_check_report(&results, true)? {
                bail!("{} does not match its corpus", index.display());
            }
        }
        Commands::Query {
            index,
            queries,
            pattern,
            num_queries,
            runs,
            json,
        } => {
            let loaded = AnyIndex::load(&index)?;
            let report = match queries {
                Some(path) => {
                    let queries = query::load_queries(&path, num_queries, pattern)?;
                    with_index!(&loaded, idx => query::run_queries(idx, &queries, runs))
                }
                None => with_index!(&loaded, idx => query::run_select_all(idx, runs)),
            };
            if json {
                println!("{}", serde_json::to_string(&report)?);
            } else {
                output::print_run_report(&report)?;
            }
        }
        Commands::Stats { index, json } => {
            stats::show_stats(&index, json)?;
        }
        Commands::Lookup {
            index,
            pattern,
            limit,
            no_color,
        } => {
            let pattern = query::parse_triple_pattern(&pattern.join(" "))?;
            let loaded = AnyIndex::load(&index)?;
            let matches = output::print_triples(loaded.select(&pattern), !no_color, limit)?;
            eprintln!("{} matches for {}", matches, pattern);
        }
        Commands::Range {
            index,
            dictionary,
            predicate,
            lower,
            upper,
            limit,
            no_color,
        } => {
            let dictionary = LiteralDictionary::load(&dictionary)?;
            let loaded = AnyIndex::load(&index)?;
            let matches = with_index!(&loaded, idx => {
                let results = idx.select_range(predicate, lower, upper, &dictionary)?;
                output::print_triples(results, !no_color, limit)?
            });
            eprintln!("{} matches", matches);
        }
    }

    Ok(())
}
