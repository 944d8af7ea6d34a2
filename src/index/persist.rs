//! Binary index files.
//!
//! A file starts with a fixed header (magic, format version, layout, nodes
//! codec, partition size) followed by the materialized tries in layout
//! order and, for layouts that keep one, the predicate index. Every integer is little-endian. Loading maps the file and decodes
//! it through [`ByteReader`], so a truncated or corrupted file surfaces as
//! a [`DecodeError`] instead of a bad read.

use super::composite::{AnyIndex, CompactPefLevels, Index, IndexTrie, Layout, NodeCodecs, PefCompactLevels};
use super::predicates::PredicateIndex;
use super::types::Permutation;
use crate::sequence::partitioned::LOG_PARTITION_SIZE_RANGE;
use crate::sequence::{Codec, CompactVector, EfSequence, PefSequence, SequenceParams};
use crate::utils::encoding::{ByteReader, DecodeError, Persist, put_u8, put_u32};
use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub const MAGIC: [u8; 4] = *b"TRIX";
pub const FORMAT_VERSION: u32 = 2;

/// Conventional extension of index files.
pub const INDEX_EXTENSION: &str = "trix";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub layout: Layout,
    pub codec: Codec,
    pub log_partition_size: u8,
}

impl Header {
    pub fn params(&self) -> SequenceParams {
        SequenceParams {
            log_partition_size: self.log_partition_size,
        }
    }
}

impl Persist for Header {
    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&MAGIC);
        put_u32(buf, FORMAT_VERSION);
        put_u8(buf, self.layout as u8);
        put_u8(buf, self.codec as u8);
        put_u8(buf, self.log_partition_size);
    }

    fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let magic = reader.read_u32()?;
        if magic != u32::from_le_bytes(MAGIC) {
            return Err(DecodeError::BadMagic(magic));
        }
        let version = reader.read_u32()?;
        if version != FORMAT_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        let layout = Layout::from_tag(reader.read_u8()?)?;
        let codec = Codec::from_tag(reader.read_u8()?)?;
        let log_partition_size = reader.read_u8()?;
        if !LOG_PARTITION_SIZE_RANGE.contains(&log_partition_size) {
            return Err(DecodeError::Inconsistent(format!(
                "log partition size {} out of range",
                log_partition_size
            )));
        }
        Ok(Self {
            layout,
            codec,
            log_partition_size,
        })
    }
}

impl<C: NodeCodecs> Index<C> {
    pub fn header(&self) -> Header {
        Header {
            layout: self.layout(),
            codec: C::NODES_CODEC,
            log_partition_size: self.params().log_partition_size,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.bytes() + 16);
        self.header().write_to(&mut buf);
        for trie in self.tries() {
            trie.write_to(&mut buf);
        }
        if let Some(predicates) = self.predicates() {
            predicates.write_to(&mut buf);
        }
        buf
    }

    /// Decode an index whose nodes codecs are `C`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = ByteReader::new(bytes);
        let header = Header::read_from(&mut reader)?;
        if header.codec != C::NODES_CODEC {
            return Err(DecodeError::Inconsistent(format!(
                "index stores {} nodes, expected {}",
                header.codec,
                C::NODES_CODEC
            )));
        }
        Self::read_body(header, &mut reader)
    }

    fn read_body(header: Header, reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let spo = IndexTrie::<C>::read_from(reader)?;
        let secondary = IndexTrie::<C>::read_from(reader)?;
        let osp = if header.layout.has_osp() {
            Some(Arc::new(IndexTrie::<C>::read_from(reader)?))
        } else {
            None
        };
        let predicates = if header.layout.has_predicate_index() {
            Some(PredicateIndex::<C::Second>::read_from(reader)?)
        } else {
            None
        };
        if reader.remaining() > 0 {
            return Err(DecodeError::TrailingBytes(reader.remaining()));
        }
        Self::from_parts(header.layout, header.params(), spo, secondary, osp, predicates)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes();
        fs::write(path, &bytes).with_context(|| format!("Failed to write index {}", path.display()))?;
        info!(path = %path.display(), bytes = bytes.len(), "index saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mmap = map_file(path)?;
        Self::from_bytes(&mmap).with_context(|| format!("Failed to decode index {}", path.display()))
    }
}

fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path).with_context(|| format!("Failed to open index {}", path.display()))?;
    // Safety: decoding copies every field out of the map, which callers drop
    // right after; index files are never written in place.
    unsafe { Mmap::map(&file) }.with_context(|| format!("Failed to map index {}", path.display()))
}

/// Read only the header of an index file.
pub fn read_header(path: &Path) -> Result<Header> {
    let mmap = map_file(path)?;
    let header = Header::read_from(&mut ByteReader::new(&mmap))
        .with_context(|| format!("Failed to decode index header {}", path.display()))?;
    Ok(header)
}

impl AnyIndex {
    /// Decode an index of whichever codec its header names.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = ByteReader::new(bytes);
        let header = Header::read_from(&mut reader)?;
        Ok(match header.codec {
            Codec::Compact => AnyIndex::Compact(Index::<CompactVector>::read_body(header, &mut reader)?),
            Codec::EliasFano => AnyIndex::EliasFano(Index::<EfSequence>::read_body(header, &mut reader)?),
            Codec::PartitionedEliasFano => {
                AnyIndex::Partitioned(Index::<PefSequence>::read_body(header, &mut reader)?)
            }
            Codec::PefCompact => AnyIndex::PefCompact(Index::<PefCompactLevels>::read_body(header, &mut reader)?),
            Codec::CompactPef => AnyIndex::CompactPef(Index::<CompactPefLevels>::read_body(header, &mut reader)?),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mmap = map_file(path)?;
        let index = Self::from_bytes(&mmap).with_context(|| format!("Failed to decode index {}", path.display()))?;
        debug!(
            path = %path.display(),
            layout = %index.layout(),
            codec = %index.codec(),
            triples = index.triples(),
            "index loaded"
        );
        Ok(index)
    }
}

/// Permutations stored in a file with `header`, in file order.
pub fn stored_permutations(header: &Header) -> Vec<Permutation> {
    header.layout.permutations()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::builder::IndexBuilder;
    use crate::index::types::{Triple, WILDCARD};

    fn triples() -> Vec<Triple> {
        (0..300u64).map(|i| Triple::new(i % 17, i % 5, i * 3 % 101)).collect()
    }

    fn sample<C: NodeCodecs>(layout: Layout) -> Index<C> {
        IndexBuilder::new(layout, SequenceParams { log_partition_size: 3 })
            .build(&triples())
            .unwrap()
    }

    #[test]
    fn test_round_trip_every_layout_and_codec() {
        for layout in Layout::ALL {
            let index = sample::<PefSequence>(layout);
            let loaded = Index::<PefSequence>::from_bytes(&index.to_bytes()).unwrap();
            assert_eq!(loaded.layout(), layout);
            assert_eq!(loaded.params(), index.params());
            assert!(loaded.select_all().eq(index.select_all()));
            let pattern = Triple::new(WILDCARD, 3, WILDCARD);
            assert!(loaded.select(&pattern).eq(index.select(&pattern)), "{}", layout);
        }

        let compact = sample::<CompactVector>(Layout::SpoPos);
        assert!(matches!(AnyIndex::from_bytes(&compact.to_bytes()).unwrap(), AnyIndex::Compact(_)));
        let ef = sample::<EfSequence>(Layout::SpoOps);
        assert!(matches!(AnyIndex::from_bytes(&ef.to_bytes()).unwrap(), AnyIndex::EliasFano(_)));

        for layout in Layout::ALL {
            let index = sample::<PefCompactLevels>(layout);
            let loaded = AnyIndex::from_bytes(&index.to_bytes()).unwrap();
            assert!(matches!(loaded, AnyIndex::PefCompact(_)), "{}", layout);
            assert!(loaded.select(&Triple::wildcard()).eq(index.select_all()));

            let index = sample::<CompactPefLevels>(layout);
            let loaded = AnyIndex::from_bytes(&index.to_bytes()).unwrap();
            assert!(matches!(loaded, AnyIndex::CompactPef(_)), "{}", layout);
            assert_eq!(loaded.bytes(), index.bytes());
        }
    }

    #[test]
    fn test_predicate_index_is_persisted() {
        let index = sample::<PefSequence>(Layout::SpoOps);
        let bytes = index.to_bytes();
        let loaded = Index::<PefSequence>::from_bytes(&bytes).unwrap();
        assert_eq!(loaded.predicates(), index.predicates());
        assert_eq!(loaded.bytes(), index.bytes());
        let pattern = Triple::new(WILDCARD, 4, WILDCARD);
        assert!(loaded.select(&pattern).eq(index.select(&pattern)));

        // the predicate index sits at the end of the file
        let predicates = index.predicates().unwrap();
        let mut tail = Vec::new();
        predicates.write_to(&mut tail);
        assert!(bytes.ends_with(&tail));
        let cut = bytes.len() - tail.len();
        assert!(Index::<PefSequence>::from_bytes(&bytes[..cut]).is_err());
    }

    #[test]
    fn test_header_errors() {
        let index = sample::<PefSequence>(Layout::ThreeTries);
        let bytes = index.to_bytes();

        let mut bad = bytes.clone();
        bad[0] = b'X';
        assert!(matches!(Index::<PefSequence>::from_bytes(&bad), Err(DecodeError::BadMagic(_))));

        let mut bad = bytes.clone();
        bad[4] = 9;
        assert!(matches!(
            Index::<PefSequence>::from_bytes(&bad),
            Err(DecodeError::UnsupportedVersion(9))
        ));

        let mut bad = bytes.clone();
        bad[8] = 0;
        assert!(matches!(
            Index::<PefSequence>::from_bytes(&bad),
            Err(DecodeError::InvalidTag { field: "layout", .. })
        ));

        assert!(matches!(
            Index::<CompactVector>::from_bytes(&bytes),
            Err(DecodeError::Inconsistent(_))
        ));
    }

    #[test]
    fn test_truncation_and_trailing_bytes() {
        let bytes = sample::<PefSequence>(Layout::SpoPos).to_bytes();
        for cut in [3, 11, bytes.len() / 2, bytes.len() - 1] {
            assert!(Index::<PefSequence>::from_bytes(&bytes[..cut]).is_err(), "cut at {}", cut);
        }
        let mut longer = bytes.clone();
        longer.push(0);
        assert!(matches!(
            Index::<PefSequence>::from_bytes(&longer),
            Err(DecodeError::TrailingBytes(1))
        ));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.trix");
        let index = sample::<PefSequence>(Layout::RankedThreeTries);
        index.save(&path).unwrap();

        let header = read_header(&path).unwrap();
        assert_eq!(header.layout, Layout::RankedThreeTries);
        assert_eq!(header.codec, Codec::PartitionedEliasFano);
        assert_eq!(stored_permutations(&header), vec![Permutation::Spo, Permutation::Pos, Permutation::Osp]);

        let loaded = AnyIndex::load(&path).unwrap();
        assert_eq!(loaded.triples(), index.triples());
        let pattern = Triple::new(WILDCARD, 2, 6);
        let expected: Vec<_> = index.select(&pattern).collect();
        assert_eq!(loaded.select(&pattern).collect::<Vec<_>>(), expected);
    }
}
