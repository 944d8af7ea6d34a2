//! Little-endian field codec for the persisted index.
//!
//! Every structure is written field by field in declaration order with no
//! padding. Decoding never reinterprets bytes in place: each integer is
//! assembled with `from_le_bytes`, and every read is bounds-checked so a
//! truncated or corrupted file surfaces as a [`DecodeError`].

use thiserror::Error;

/// Errors raised while decoding a persisted index.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unexpected end of data: needed {needed} bytes at offset {offset}")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),

    #[error("invalid {field} tag {value}")]
    InvalidTag { field: &'static str, value: u8 },

    #[error("inconsistent data: {0}")]
    Inconsistent(String),

    #[error("{0} trailing bytes after index payload")]
    TrailingBytes(usize),
}

/// Types with a fixed-order binary representation.
pub trait Persist: Sized {
    fn write_to(&self, buf: &mut Vec<u8>);
    fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError>;
}

#[inline]
pub fn put_u8(buf: &mut Vec<u8>, value: u8) {
    buf.push(value);
}

#[inline]
pub fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

#[inline]
pub fn put_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Write a length-prefixed run of 64-bit words.
pub fn put_words(buf: &mut Vec<u8>, words: &[u64]) {
    put_u64(buf, words.len() as u64);
    buf.reserve(words.len() * 8);
    for &word in words {
        buf.extend_from_slice(&word.to_le_bytes());
    }
}

/// Bounds-checked cursor over an encoded byte slice.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.offset.checked_add(N).filter(|&end| end <= self.data.len());
        let Some(end) = end else {
            return Err(DecodeError::UnexpectedEof {
                offset: self.offset,
                needed: N,
            });
        };
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.data[self.offset..end]);
        self.offset = end;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take::<1>()?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take::<4>()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.take::<8>()?))
    }

    /// Read a run written by [`put_words`].
    pub fn read_words(&mut self) -> Result<Vec<u64>, DecodeError> {
        let count = self.read_u64()?;
        let needed = count
            .checked_mul(8)
            .and_then(|n| usize::try_from(n).ok())
            .filter(|&n| n <= self.remaining())
            .ok_or(DecodeError::UnexpectedEof {
                offset: self.offset,
                needed: count.saturating_mul(8) as usize,
            })?;

        let bytes = &self.data[self.offset..self.offset + needed];
        let words = bytes
            .chunks_exact(8)
            .map(|chunk| {
                let mut word = [0u8; 8];
                word.copy_from_slice(chunk);
                u64::from_le_bytes(word)
            })
            .collect();
        self.offset += needed;
        Ok(words)
    }
}
