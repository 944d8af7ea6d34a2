//! Log output for the command line tool.

use tracing_subscriber::EnvFilter;

/// Default filter: warnings globally, info for this crate.
const DEFAULT_FILTER: &str = "warn,trix=info";
const VERBOSE_FILTER: &str = "warn,trix=debug";

/// Filter used when `RUST_LOG` is unset or invalid.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER }
}

/// Install the global subscriber, writing to stderr so query output on
/// stdout stays clean. `RUST_LOG` overrides the default filter.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose).into());
    // A second call (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
