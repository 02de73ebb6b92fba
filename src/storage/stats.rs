use serde::Serialize;

use crate::primitives::memory::ResizableMemory;
use crate::types::LinkAddress;

use super::links::MemoryLinks;
use super::tree::{SizeBalancedTree, SourcesTree, TargetsTree};

/// Occupancy and layout figures for a store.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    /// Width of one identifier in bytes.
    pub address_bytes: usize,
    /// Size of one link record in bytes.
    pub link_size_bytes: usize,
    /// Live links.
    pub total_links: u64,
    /// High-water mark of the dense array.
    pub allocated_links: u64,
    /// Slots backed by memory.
    pub reserved_links: u64,
    /// Slots waiting on the free list.
    pub free_links: u64,
    /// Bytes in use, header included.
    pub used_bytes: u64,
    /// Bytes backed by the region.
    pub reserved_bytes: u64,
    /// Height of the sources tree.
    pub source_tree_depth: usize,
    /// Height of the targets tree.
    pub target_tree_depth: usize,
}

/// Collects a [`StatsReport`] for `links`.
pub fn stats<T, M>(links: &MemoryLinks<T, M>) -> StatsReport
where
    T: LinkAddress,
    M: ResizableMemory,
{
    let mem = links.region();
    let (root_as_source, root_as_target) = links.roots();
    StatsReport {
        address_bytes: T::BYTES,
        link_size_bytes: MemoryLinks::<T, M>::LINK_SIZE_IN_BYTES,
        total_links: links.total().as_u64(),
        allocated_links: links.allocated_links().as_u64(),
        reserved_links: links.reserved_links().as_u64(),
        free_links: links.free_links().as_u64(),
        used_bytes: links.memory().used_capacity(),
        reserved_bytes: links.memory().reserved_capacity(),
        source_tree_depth: SizeBalancedTree::<SourcesTree>::depth(mem, root_as_source),
        target_tree_depth: SizeBalancedTree::<TargetsTree>::depth(mem, root_as_target),
    }
}
