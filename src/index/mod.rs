//! Trie index over integer triples.
//!
//! ## Architecture
//!
//! ```text
//! corpus files ──► TrieBuilder ──► Trie (one permutation)
//!                                   ├── first:  pointers
//!                                   ├── second: nodes + pointers
//!                                   └── third:  nodes (+ mapper)
//!
//! Index = SPO + secondary (POS | OPS) [+ OSP] [+ predicate index], chosen by Layout
//! ```
//!
//! A query pattern is routed to the trie whose permutation puts its bound
//! coordinates first, answered there by walking the levels with cursors,
//! and rewritten back to (s,p,o) order.

pub mod builder;
pub mod check;
pub mod composite;
pub mod corpus;
pub mod level;
pub mod mapper;
pub mod params;
pub mod persist;
pub mod predicates;
pub mod stats;
pub mod trie;
pub mod types;

pub use builder::{IndexBuilder, TrieBuilder};
pub use composite::{AnyIndex, CompactPefLevels, Index, IndexIter, IndexTrie, Layout, NodeCodecs, PefCompactLevels, Route};
pub use predicates::PredicateIndex;
pub use params::TripleParams;
pub use trie::Trie;
pub use types::*;
