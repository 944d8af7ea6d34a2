//! Query-side helpers around an [`Index`](crate::index::Index).
//!
//! - [`dictionary`] - literal dictionaries for object range queries
//! - [`runner`] - timed query workloads

pub mod dictionary;
pub mod runner;

pub use dictionary::{Dictionary, LiteralDictionary};
pub use runner::{Pattern, RunReport, load_queries, parse_triple_pattern, run_queries, run_select_all};
