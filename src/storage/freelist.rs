//! List of deleted link slots awaiting reuse.
//!
//! The list is circular and doubly linked through the records themselves:
//! `Source` holds the previous slot and `Target` the next one. A free slot
//! therefore always has a non-null `Source` and a zero `SizeAsSource`, which
//! is what distinguishes it from a live link.

use std::marker::PhantomData;

use crate::types::{Flow, LinkAddress};

use super::header::{self, HeaderField};
use super::raw::{Field, RawLink};

/// Free-list operations over a store region.
pub struct UnusedLinks<T>(PhantomData<T>);

impl<T: LinkAddress> UnusedLinks<T> {
    #[inline]
    fn previous(mem: &[u8], link: T) -> T {
        RawLink::get(mem, link, Field::Source)
    }

    #[inline]
    fn next(mem: &[u8], link: T) -> T {
        RawLink::get(mem, link, Field::Target)
    }

    #[inline]
    fn set_previous(mem: &mut [u8], link: T, value: T) {
        RawLink::set(mem, link, Field::Source, value);
    }

    #[inline]
    fn set_next(mem: &mut [u8], link: T, value: T) {
        RawLink::set(mem, link, Field::Target, value);
    }

    /// Head of the list, or zero when empty.
    #[inline]
    pub fn first(mem: &[u8]) -> T {
        header::get(mem, HeaderField::FirstFreeLink)
    }

    /// Number of slots on the list.
    #[inline]
    pub fn len(mem: &[u8]) -> T {
        header::get(mem, HeaderField::FreeLinks)
    }

    /// Pushes `link` as the new head. The slot's value fields are overwritten.
    pub fn attach_as_first(mem: &mut [u8], link: T) {
        let first = Self::first(mem);
        if first == T::ZERO {
            Self::set_previous(mem, link, link);
            Self::set_next(mem, link, link);
            header::set(mem, HeaderField::LastFreeLink, link);
        } else {
            let last: T = header::get(mem, HeaderField::LastFreeLink);
            Self::set_previous(mem, link, last);
            Self::set_next(mem, link, first);
            Self::set_next(mem, last, link);
            Self::set_previous(mem, first, link);
        }
        header::set(mem, HeaderField::FirstFreeLink, link);
        let len = Self::len(mem);
        header::set(mem, HeaderField::FreeLinks, len.increment());
    }

    /// Unlinks `link`, which must be on the list, and zeroes its value fields.
    pub fn detach(mem: &mut [u8], link: T) {
        let previous = Self::previous(mem, link);
        let next = Self::next(mem, link);
        if next == link {
            header::set(mem, HeaderField::FirstFreeLink, T::ZERO);
            header::set(mem, HeaderField::LastFreeLink, T::ZERO);
        } else {
            Self::set_next(mem, previous, next);
            Self::set_previous(mem, next, previous);
            if Self::first(mem) == link {
                header::set(mem, HeaderField::FirstFreeLink, next);
            }
            if header::get::<T>(mem, HeaderField::LastFreeLink) == link {
                header::set(mem, HeaderField::LastFreeLink, previous);
            }
        }
        Self::set_previous(mem, link, T::ZERO);
        Self::set_next(mem, link, T::ZERO);
        let len = Self::len(mem);
        header::set(mem, HeaderField::FreeLinks, len.decrement());
    }

    /// Visits the list from head to tail.
    pub fn each<F>(mem: &[u8], mut handler: F) -> Flow
    where
        F: FnMut(T) -> Flow,
    {
        let first = Self::first(mem);
        if first == T::ZERO {
            return Flow::Continue;
        }
        let mut link = first;
        loop {
            if handler(link).is_break() {
                return Flow::Break;
            }
            link = Self::next(mem, link);
            if link == first || link == T::ZERO {
                return Flow::Continue;
            }
        }
    }
}
