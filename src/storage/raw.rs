//! Binary layout of a stored link.
//!
//! Every slot is `8 * T::BYTES` bytes, little-endian:
//!
//! | field | meaning |
//! |---|---|
//! | `Source`, `Target` | the doublet |
//! | `LeftAsSource`, `RightAsSource`, `SizeAsSource` | node of the sources tree |
//! | `LeftAsTarget`, `RightAsTarget`, `SizeAsTarget` | node of the targets tree |
//!
//! Slot 0 holds the header (see [`super::header`]) so index 0 never addresses a link.

use std::marker::PhantomData;

use crate::primitives::bytes;
use crate::types::LinkAddress;

/// Fields of a raw link record, in storage order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(usize)]
pub enum Field {
    /// First element of the doublet.
    Source = 0,
    /// Second element of the doublet.
    Target = 1,
    /// Left child in the sources tree.
    LeftAsSource = 2,
    /// Right child in the sources tree.
    RightAsSource = 3,
    /// Subtree size in the sources tree; zero when not attached.
    SizeAsSource = 4,
    /// Left child in the targets tree.
    LeftAsTarget = 5,
    /// Right child in the targets tree.
    RightAsTarget = 6,
    /// Subtree size in the targets tree; zero when not attached.
    SizeAsTarget = 7,
}

pub(crate) const FIELD_COUNT: usize = 8;

/// Layout helpers for records addressed by `T`.
pub struct RawLink<T>(PhantomData<T>);

impl<T: LinkAddress> RawLink<T> {
    /// Size of one record in bytes.
    pub const SIZE_IN_BYTES: usize = FIELD_COUNT * T::BYTES;

    #[inline]
    fn offset(index: T, field: Field) -> usize {
        index.as_usize() * Self::SIZE_IN_BYTES + field as usize * T::BYTES
    }

    /// Reads one field of the record at `index`.
    #[inline]
    pub fn get(region: &[u8], index: T, field: Field) -> T {
        bytes::get(region, Self::offset(index, field))
    }

    /// Writes one field of the record at `index`.
    #[inline]
    pub fn set(region: &mut [u8], index: T, field: Field, value: T) {
        bytes::put(region, Self::offset(index, field), value);
    }

    /// Zero-fills the whole record at `index`.
    #[inline]
    pub fn clear(region: &mut [u8], index: T) {
        bytes::zero(
            region,
            index.as_usize() * Self::SIZE_IN_BYTES,
            Self::SIZE_IN_BYTES,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_size_scales_with_width() {
        assert_eq!(RawLink::<u8>::SIZE_IN_BYTES, 8);
        assert_eq!(RawLink::<u32>::SIZE_IN_BYTES, 32);
        assert_eq!(RawLink::<u64>::SIZE_IN_BYTES, 64);
    }

    #[test]
    fn fields_are_isolated_per_record() {
        let mut region = vec![0u8; RawLink::<u16>::SIZE_IN_BYTES * 3];
        RawLink::<u16>::set(&mut region, 1, Field::Target, 7);
        RawLink::<u16>::set(&mut region, 2, Field::Source, 9);
        RawLink::<u16>::set(&mut region, 2, Field::SizeAsTarget, 3);
        assert_eq!(RawLink::<u16>::get(&region, 1, Field::Target), 7);
        assert_eq!(RawLink::<u16>::get(&region, 1, Field::Source), 0);
        assert_eq!(RawLink::<u16>::get(&region, 2, Field::Source), 9);
        RawLink::<u16>::clear(&mut region, 2);
        assert_eq!(RawLink::<u16>::get(&region, 2, Field::SizeAsTarget), 0);
        assert_eq!(RawLink::<u16>::get(&region, 1, Field::Target), 7);
    }
}
