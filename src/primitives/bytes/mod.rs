#![forbid(unsafe_code)]
//! Little-endian field codec over raw byte regions.
//!
//! Records are never borrowed out of the region; every access decodes a
//! field at an offset and every mutation encodes it back.

use crate::types::LinkAddress;

/// Decodes an address-width field stored at `offset`.
///
/// Panics if the region is shorter than `offset + T::BYTES`; callers size
/// regions from the header before touching them.
#[inline]
pub fn get<T: LinkAddress>(region: &[u8], offset: usize) -> T {
    T::read_le(&region[offset..offset + T::BYTES])
}

/// Encodes an address-width field at `offset`.
#[inline]
pub fn put<T: LinkAddress>(region: &mut [u8], offset: usize, value: T) {
    value.write_le(&mut region[offset..offset + T::BYTES]);
}

/// Zero-fills `len` bytes starting at `offset`.
#[inline]
pub fn zero(region: &mut [u8], offset: usize, len: usize) {
    region[offset..offset + len].fill(0);
}

/// Encodes a `u64` at the front of `dst`.
#[inline]
pub fn put_u64_le(dst: &mut [u8], v: u64) {
    dst[..8].copy_from_slice(&v.to_le_bytes());
}

/// Decodes a `u64` from the front of `src`.
#[inline]
pub fn get_u64_le(src: &[u8]) -> u64 {
    u64::read_le(src)
}

/// Encodes a `u32` at the front of `dst`.
#[inline]
pub fn put_u32_le(dst: &mut [u8], v: u32) {
    dst[..4].copy_from_slice(&v.to_le_bytes());
}

/// Decodes a `u32` from the front of `src`.
#[inline]
pub fn get_u32_le(src: &[u8]) -> u32 {
    u32::read_le(src)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_do_not_overlap() {
        let mut region = vec![0u8; 8];
        put::<u16>(&mut region, 0, 0xAAAA);
        put::<u16>(&mut region, 2, 0xBBBB);
        put::<u32>(&mut region, 4, 7);
        assert_eq!(get::<u16>(&region, 0), 0xAAAA);
        assert_eq!(get::<u16>(&region, 2), 0xBBBB);
        assert_eq!(get::<u32>(&region, 4), 7);
        zero(&mut region, 2, 2);
        assert_eq!(get::<u16>(&region, 2), 0);
        assert_eq!(get::<u16>(&region, 0), 0xAAAA);
    }
}
