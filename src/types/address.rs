use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::ops::{Add, Sub};

/// Unsigned integer used to address links.
///
/// The store is generic over this trait so the same code serves `u8` test
/// stores and `u64` production stores; every implementation is monomorphized.
pub trait LinkAddress:
    Copy
    + Eq
    + Ord
    + Hash
    + Default
    + Debug
    + Display
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + 'static
{
    /// Additive identity, also the null reference.
    const ZERO: Self;
    /// Multiplicative identity.
    const ONE: Self;
    /// Largest representable value.
    const MAX: Self;
    /// Encoded width in bytes.
    const BYTES: usize;

    /// Converts from `u64`, returning `None` when the value does not fit.
    fn from_u64(value: u64) -> Option<Self>;

    /// Widens to `u64`.
    fn as_u64(self) -> u64;

    /// Widens to `usize` for offset arithmetic.
    fn as_usize(self) -> usize;

    /// Reads a little-endian value from the front of `src`.
    fn read_le(src: &[u8]) -> Self;

    /// Writes a little-endian value to the front of `dst`.
    fn write_le(self, dst: &mut [u8]);

    /// `self + 1`.
    #[inline]
    fn increment(self) -> Self {
        self + Self::ONE
    }

    /// `self - 1`.
    #[inline]
    fn decrement(self) -> Self {
        self - Self::ONE
    }

    /// Converts from `u64`, clamping to [`LinkAddress::MAX`].
    #[inline]
    fn saturating_from_u64(value: u64) -> Self {
        Self::from_u64(value).unwrap_or(Self::MAX)
    }
}

macro_rules! impl_link_address {
    ($($ty:ty),* $(,)?) => {
        $(
            impl LinkAddress for $ty {
                const ZERO: Self = 0;
                const ONE: Self = 1;
                const MAX: Self = <$ty>::MAX;
                const BYTES: usize = core::mem::size_of::<$ty>();

                #[inline]
                fn from_u64(value: u64) -> Option<Self> {
                    <$ty>::try_from(value).ok()
                }

                #[inline]
                fn as_u64(self) -> u64 {
                    self as u64
                }

                #[inline]
                fn as_usize(self) -> usize {
                    self as usize
                }

                #[inline]
                fn read_le(src: &[u8]) -> Self {
                    let mut buf = [0u8; core::mem::size_of::<$ty>()];
                    buf.copy_from_slice(&src[..core::mem::size_of::<$ty>()]);
                    <$ty>::from_le_bytes(buf)
                }

                #[inline]
                fn write_le(self, dst: &mut [u8]) {
                    dst[..core::mem::size_of::<$ty>()].copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_link_address!(u8, u16, u32, u64);
