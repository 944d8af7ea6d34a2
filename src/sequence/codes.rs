//! Elias gamma and delta codes for small header fields.

use super::bits::{BitReader, BitVectorBuilder, msb};

pub fn write_gamma(out: &mut BitVectorBuilder, n: u64) {
    let nn = n + 1;
    let l = msb(nn);
    let hb = 1u64 << l;
    out.append_bits(hb, l + 1);
    out.append_bits(nn ^ hb, l);
}

pub fn read_gamma(reader: &mut BitReader<'_>) -> u64 {
    let l = reader.skip_zeros();
    (reader.get_bits(l) | (1u64 << l)) - 1
}

pub fn write_delta(out: &mut BitVectorBuilder, n: u64) {
    let nn = n + 1;
    let l = msb(nn);
    let hb = 1u64 << l;
    write_gamma(out, l as u64);
    out.append_bits(nn ^ hb, l);
}

pub fn read_delta(reader: &mut BitReader<'_>) -> u64 {
    let l = read_gamma(reader) as u32;
    (reader.get_bits(l) | (1u64 << l)) - 1
}

/// Bounds-checked [`read_gamma`] for untrusted buffers.
pub fn try_read_gamma(reader: &mut BitReader<'_>) -> Option<u64> {
    let start = reader.position();
    let l = reader.skip_zeros();
    if l > 63 || reader.position() == start + l as u64 || reader.remaining() < l as u64 {
        return None;
    }
    Some((reader.get_bits(l) | (1u64 << l)) - 1)
}

/// Bounds-checked [`read_delta`] for untrusted buffers.
pub fn try_read_delta(reader: &mut BitReader<'_>) -> Option<u64> {
    let l = try_read_gamma(reader)?;
    if l > 63 || reader.remaining() < l {
        return None;
    }
    let l = l as u32;
    Some((reader.get_bits(l) | (1u64 << l)) - 1)
}
