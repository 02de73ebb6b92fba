use std::fmt;

use crate::primitives::bytes;
use crate::types::{LinkAddress, LinkError, Result};

use super::raw::RawLink;

/// Fields of the header record stored in slot 0.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(usize)]
pub enum HeaderField {
    /// High-water mark of the dense link array.
    AllocatedLinks = 0,
    /// Number of link slots backed by memory.
    ReservedLinks = 1,
    /// Length of the free list.
    FreeLinks = 2,
    /// Head of the free list.
    FirstFreeLink = 3,
    /// Root of the sources tree.
    RootAsSource = 4,
    /// Root of the targets tree.
    RootAsTarget = 5,
    /// Tail of the free list.
    LastFreeLink = 6,
    /// Unused, kept zero.
    Reserved = 7,
}

/// Size of the header in bytes. Equal to one link record.
pub fn header_size<T: LinkAddress>() -> usize {
    RawLink::<T>::SIZE_IN_BYTES
}

/// Reads one header field.
#[inline]
pub fn get<T: LinkAddress>(region: &[u8], field: HeaderField) -> T {
    bytes::get(region, field as usize * T::BYTES)
}

/// Writes one header field.
#[inline]
pub fn set<T: LinkAddress>(region: &mut [u8], field: HeaderField, value: T) {
    bytes::put(region, field as usize * T::BYTES, value);
}

/// Decoded copy of the header.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LinksHeader<T> {
    /// High-water mark of the dense link array.
    pub allocated_links: T,
    /// Number of link slots backed by memory.
    pub reserved_links: T,
    /// Length of the free list.
    pub free_links: T,
    /// Head of the free list.
    pub first_free_link: T,
    /// Root of the sources tree.
    pub root_as_source: T,
    /// Root of the targets tree.
    pub root_as_target: T,
    /// Tail of the free list.
    pub last_free_link: T,
}

impl<T: LinkAddress> LinksHeader<T> {
    /// Decodes the header from the front of a region.
    pub fn read(region: &[u8]) -> Result<Self> {
        if region.len() < header_size::<T>() {
            return Err(LinkError::Corruption("header region truncated"));
        }
        if get::<T>(region, HeaderField::Reserved) != T::ZERO {
            return Err(LinkError::Corruption("header reserved field non-zero"));
        }
        Ok(Self {
            allocated_links: get(region, HeaderField::AllocatedLinks),
            reserved_links: get(region, HeaderField::ReservedLinks),
            free_links: get(region, HeaderField::FreeLinks),
            first_free_link: get(region, HeaderField::FirstFreeLink),
            root_as_source: get(region, HeaderField::RootAsSource),
            root_as_target: get(region, HeaderField::RootAsTarget),
            last_free_link: get(region, HeaderField::LastFreeLink),
        })
    }

    /// Encodes the header to the front of a region.
    pub fn write(&self, region: &mut [u8]) -> Result<()> {
        if region.len() < header_size::<T>() {
            return Err(LinkError::Corruption("header region truncated"));
        }
        set(region, HeaderField::AllocatedLinks, self.allocated_links);
        set(region, HeaderField::ReservedLinks, self.reserved_links);
        set(region, HeaderField::FreeLinks, self.free_links);
        set(region, HeaderField::FirstFreeLink, self.first_free_link);
        set(region, HeaderField::RootAsSource, self.root_as_source);
        set(region, HeaderField::RootAsTarget, self.root_as_target);
        set(region, HeaderField::LastFreeLink, self.last_free_link);
        set(region, HeaderField::Reserved, T::ZERO);
        Ok(())
    }

    /// Checks the invariants that must hold for any header the store accepts.
    pub fn validate(&self) -> Result<()> {
        if self.allocated_links > self.reserved_links {
            return Err(LinkError::Corruption(
                "allocated links exceed reserved links",
            ));
        }
        if self.free_links > self.allocated_links {
            return Err(LinkError::Corruption("free links exceed allocated links"));
        }
        let within = |link: T| link <= self.allocated_links;
        if !within(self.first_free_link) || !within(self.last_free_link) {
            return Err(LinkError::Corruption("free list pointer out of range"));
        }
        if (self.free_links == T::ZERO) != (self.first_free_link == T::ZERO) {
            return Err(LinkError::Corruption(
                "free list head disagrees with free count",
            ));
        }
        if !within(self.root_as_source) || !within(self.root_as_target) {
            return Err(LinkError::Corruption("tree root out of range"));
        }
        Ok(())
    }
}

impl<T: fmt::Display> fmt::Display for LinksHeader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LinksHeader(allocated={}, reserved={}, free={}, first_free={}, last_free={}, root_as_source={}, root_as_target={})",
            self.allocated_links,
            self.reserved_links,
            self.free_links,
            self.first_free_link,
            self.last_free_link,
            self.root_as_source,
            self.root_as_target,
        )
    }
}
