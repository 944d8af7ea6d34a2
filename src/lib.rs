//! # trix - Compressed Triple Index
//!
//! trix stores integer-encoded RDF triples in a few bits per triple and
//! answers membership and wildcard pattern queries directly on the
//! compressed form.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`sequence`] - Compressed monotone sequences (partitioned Elias-Fano,
//!   Elias-Fano, bit-packed)
//! - [`index`] - Three-level tries, multi-permutation indexes, building,
//!   persistence and verification
//! - [`query`] - Literal dictionaries and timed query workloads
//! - [`output`] - Terminal formatting
//! - [`utils`] - Byte codec, configuration, logging, progress
//!
//! ## Quick Start
//!
//! ```no_run
//! use trix::index::{IndexBuilder, Layout, Triple, WILDCARD};
//! use trix::sequence::{PefSequence, SequenceParams};
//!
//! let triples = vec![Triple::new(1, 1, 1), Triple::new(1, 2, 1), Triple::new(2, 1, 1)];
//! let index = IndexBuilder::new(Layout::ThreeTries, SequenceParams::default())
//!     .build::<PefSequence>(&triples)
//!     .unwrap();
//!
//! for t in index.select(&Triple::new(WILDCARD, 1, WILDCARD)) {
//!     println!("{}", t);
//! }
//! assert!(index.is_member(&Triple::new(2, 1, 1)));
//! ```
//!
//! ## Layout
//!
//! Each trie stores one permutation of the coordinates. Its first level
//! maps an identifier to a range of second-level nodes, whose pointers map
//! each node to a range of third-level nodes. Nodes and pointers are
//! [`MonotoneSequence`](sequence::MonotoneSequence)s, so every level is a
//! compressed integer sequence searched in place.

pub mod index;
pub mod output;
pub mod query;
pub mod sequence;
pub mod utils;
