#![forbid(unsafe_code)]

use std::path::Path;

use tracing::{debug, info};

use crate::constants::LinksConstants;
use crate::primitives::memory::{FileMemory, HeapMemory, ResizableMemory};
use crate::types::{Flow, Link, LinkAddress, LinkError, Result};

use super::freelist::UnusedLinks;
use super::header::{self, header_size, HeaderField, LinksHeader};
use super::options::LinksOptions;
use super::raw::{Field, RawLink};
use super::tree::{SizeBalancedTree, SourcesTree, TargetsTree};

type Sources = SizeBalancedTree<SourcesTree>;
type Targets = SizeBalancedTree<TargetsTree>;

/// Link store laid out directly in a resizable byte region.
///
/// The region starts with a header record followed by a dense array of link
/// records addressed from 1. Two size-balanced trees threaded through the
/// records index every link by `Source` and by `Target`; deleted slots are
/// kept on a free list and reused before the array grows.
///
/// The store performs no locking. Wrap it in
/// [`crate::decorators::SynchronizedLinks`] to share it between threads.
pub struct MemoryLinks<T: LinkAddress, M: ResizableMemory = HeapMemory> {
    memory: M,
    reservation_step: u64,
    constants: LinksConstants<T>,
}

impl<T: LinkAddress> MemoryLinks<T, HeapMemory> {
    /// Opens an empty store in process memory with default options.
    pub fn in_memory() -> Result<Self> {
        Self::open(HeapMemory::new(), LinksOptions::default())
    }
}

impl<T: LinkAddress> MemoryLinks<T, FileMemory> {
    /// Opens (or creates) a store persisted in the file at `path`. See
    /// [`FileMemory`] for the cost of [`MemoryLinks::flush`] on this backing.
    pub fn open_file(path: impl AsRef<Path>, options: LinksOptions) -> Result<Self> {
        Self::open(FileMemory::open(path)?, options)
    }
}

impl<T: LinkAddress, M: ResizableMemory> MemoryLinks<T, M> {
    /// Size of one link record in bytes, for callers sizing external files.
    pub const LINK_SIZE_IN_BYTES: usize = RawLink::<T>::SIZE_IN_BYTES;

    /// Opens a store over `memory`, which may be empty or hold a region
    /// previously written by a store of the same identifier width.
    pub fn open(mut memory: M, options: LinksOptions) -> Result<Self> {
        let reservation_step = options.step_in_bytes::<T>()?;
        if memory.reserved_capacity() < reservation_step {
            memory.set_reserved_capacity(reservation_step)?;
        }
        let mut header = LinksHeader::<T>::read(memory.bytes())?;
        header.reserved_links = Self::links_for_capacity(memory.reserved_capacity());
        header.validate()?;
        header.write(memory.bytes_mut())?;
        memory.set_used_capacity(Self::capacity_for_links(header.allocated_links))?;
        info!(
            allocated = %header.allocated_links,
            reserved = %header.reserved_links,
            free = %header.free_links,
            "links.open"
        );
        Ok(Self {
            memory,
            reservation_step,
            constants: LinksConstants::new(),
        })
    }

    fn links_for_capacity(bytes: u64) -> T {
        let record = Self::LINK_SIZE_IN_BYTES as u64;
        let links = bytes.saturating_sub(header_size::<T>() as u64) / record;
        T::saturating_from_u64(links)
    }

    fn capacity_for_links(links: T) -> u64 {
        header_size::<T>() as u64 + links.as_u64() * Self::LINK_SIZE_IN_BYTES as u64
    }

    #[inline]
    fn mem(&self) -> &[u8] {
        self.memory.bytes()
    }

    #[inline]
    fn header_value(&self, field: HeaderField) -> T {
        header::get(self.mem(), field)
    }

    /// Sentinels and positional parts used by this store.
    pub fn constants(&self) -> &LinksConstants<T> {
        &self.constants
    }

    /// Decoded copy of the header.
    pub fn header(&self) -> Result<LinksHeader<T>> {
        LinksHeader::read(self.mem())
    }

    /// High-water mark of the dense link array.
    pub fn allocated_links(&self) -> T {
        self.header_value(HeaderField::AllocatedLinks)
    }

    /// Number of link slots currently backed by memory.
    pub fn reserved_links(&self) -> T {
        self.header_value(HeaderField::ReservedLinks)
    }

    /// Number of deleted slots waiting on the free list.
    pub fn free_links(&self) -> T {
        self.header_value(HeaderField::FreeLinks)
    }

    /// Number of live links.
    pub fn total(&self) -> T {
        self.allocated_links() - self.free_links()
    }

    /// Backing region.
    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// Raw bytes of the region, header included.
    pub(crate) fn region(&self) -> &[u8] {
        self.mem()
    }

    /// Consumes the store and returns its backing region.
    pub fn into_memory(self) -> M {
        self.memory
    }

    /// Persists the backing region.
    pub fn flush(&mut self) -> Result<()> {
        self.memory.flush()?;
        info!(allocated = %self.allocated_links(), "links.flush");
        Ok(())
    }

    /// Whether the slot at `link` lies inside the dense array but holds no
    /// link. The free-list head is always unused.
    pub(crate) fn is_unused(&self, link: T) -> bool {
        if self.header_value(HeaderField::FirstFreeLink) == link {
            return true;
        }
        let mem = self.mem();
        RawLink::<T>::get(mem, link, Field::SizeAsSource) == T::ZERO
            && RawLink::<T>::get(mem, link, Field::Source) != T::ZERO
    }

    /// Whether `link` addresses a live link.
    pub fn exists(&self, link: T) -> bool {
        link >= *self.constants.internal_references.start()
            && link <= self.allocated_links()
            && !self.is_unused(link)
    }

    fn link_at(&self, index: T) -> Link<T> {
        let mem = self.mem();
        Link::new(
            index,
            RawLink::get(mem, index, Field::Source),
            RawLink::get(mem, index, Field::Target),
        )
    }

    /// The link at `index`, if it exists.
    pub fn get_link(&self, index: T) -> Option<Link<T>> {
        self.exists(index).then(|| self.link_at(index))
    }

    /// Number of links matching `restrictions`.
    pub fn count(&self, restrictions: &[T]) -> Result<T> {
        let any = self.constants.any;
        let mem = self.mem();
        match *restrictions {
            [] => Ok(self.total()),
            [index] => {
                if index == any {
                    Ok(self.total())
                } else {
                    Ok(self.single(index, |_| true))
                }
            }
            [index, value] => {
                if index == any {
                    if value == any {
                        return Ok(self.total());
                    }
                    let sources = self.root(HeaderField::RootAsSource);
                    let targets = self.root(HeaderField::RootAsTarget);
                    sum_counts(
                        Sources::count_usages(mem, sources, value),
                        Targets::count_usages(mem, targets, value),
                    )
                } else {
                    Ok(self.single(index, |link| {
                        value == any || link.source == value || link.target == value
                    }))
                }
            }
            [index, source, target] => {
                if index != any {
                    return Ok(self.single(index, |link| {
                        (source == any || link.source == source)
                            && (target == any || link.target == target)
                    }));
                }
                let sources = self.root(HeaderField::RootAsSource);
                let targets = self.root(HeaderField::RootAsTarget);
                Ok(match (source == any, target == any) {
                    (true, true) => self.total(),
                    (true, false) => Targets::count_usages(mem, targets, target),
                    (false, true) => Sources::count_usages(mem, sources, source),
                    (false, false) => {
                        if Sources::search(mem, sources, source, target) == T::ZERO {
                            T::ZERO
                        } else {
                            T::ONE
                        }
                    }
                })
            }
            _ => Err(LinkError::UnsupportedRestriction {
                len: restrictions.len(),
            }),
        }
    }

    fn single<P>(&self, index: T, matches: P) -> T
    where
        P: Fn(&Link<T>) -> bool,
    {
        match self.get_link(index) {
            Some(link) if matches(&link) => T::ONE,
            _ => T::ZERO,
        }
    }

    fn root(&self, field: HeaderField) -> T {
        self.header_value(field)
    }

    /// Roots of the sources and targets trees.
    pub(crate) fn roots(&self) -> (T, T) {
        (
            self.root(HeaderField::RootAsSource),
            self.root(HeaderField::RootAsTarget),
        )
    }

    /// Calls `handler` for every link matching `restrictions`, stopping as
    /// soon as it returns [`Flow::Break`]. Returns `Break` if iteration was
    /// cut short, `Continue` otherwise.
    pub fn each<F>(&self, restrictions: &[T], mut handler: F) -> Result<Flow>
    where
        F: FnMut(Link<T>) -> Flow,
    {
        let any = self.constants.any;
        let mem = self.mem();
        match *restrictions {
            [] => Ok(self.each_link(&mut handler)),
            [index] => {
                if index == any {
                    Ok(self.each_link(&mut handler))
                } else {
                    Ok(self.each_single(index, |_| true, &mut handler))
                }
            }
            [index, value] => {
                if index != any {
                    return Ok(self.each_single(
                        index,
                        |link| value == any || link.source == value || link.target == value,
                        &mut handler,
                    ));
                }
                if value == any {
                    return Ok(self.each_link(&mut handler));
                }
                let sources = self.root(HeaderField::RootAsSource);
                let targets = self.root(HeaderField::RootAsTarget);
                let mut visit = |node: T| handler(self.link_at(node));
                if Sources::each_usage(mem, sources, value, &mut visit).is_break() {
                    return Ok(Flow::Break);
                }
                Ok(Targets::each_usage(mem, targets, value, &mut visit))
            }
            [index, source, target] => {
                if index != any {
                    return Ok(self.each_single(
                        index,
                        |link| {
                            (source == any || link.source == source)
                                && (target == any || link.target == target)
                        },
                        &mut handler,
                    ));
                }
                if source == any && target == any {
                    return Ok(self.each_link(&mut handler));
                }
                let sources = self.root(HeaderField::RootAsSource);
                let targets = self.root(HeaderField::RootAsTarget);
                let mut visit = |node: T| handler(self.link_at(node));
                Ok(match (source == any, target == any) {
                    (true, _) => Targets::each_usage(mem, targets, target, &mut visit),
                    (false, true) => Sources::each_usage(mem, sources, source, &mut visit),
                    (false, _) => {
                        let found = Sources::search(mem, sources, source, target);
                        if found == T::ZERO {
                            Flow::Continue
                        } else {
                            visit(found)
                        }
                    }
                })
            }
            _ => Err(LinkError::UnsupportedRestriction {
                len: restrictions.len(),
            }),
        }
    }

    fn each_link<F>(&self, handler: &mut F) -> Flow
    where
        F: FnMut(Link<T>) -> Flow,
    {
        let allocated = self.allocated_links();
        let mut index = T::ONE;
        while index <= allocated {
            if !self.is_unused(index) && handler(self.link_at(index)).is_break() {
                return Flow::Break;
            }
            index = index.increment();
        }
        Flow::Continue
    }

    fn each_single<P, F>(&self, index: T, matches: P, handler: &mut F) -> Flow
    where
        P: Fn(&Link<T>) -> bool,
        F: FnMut(Link<T>) -> Flow,
    {
        match self.get_link(index) {
            Some(link) if matches(&link) => handler(link),
            _ => Flow::Continue,
        }
    }

    /// Allocates a link with value `(0, 0)` and returns its address. A slot
    /// from the free list is reused when one is available.
    pub fn create(&mut self, _restrictions: &[T]) -> Result<T> {
        let free = UnusedLinks::<T>::first(self.mem());
        if free != T::ZERO {
            let mem = self.memory.bytes_mut();
            UnusedLinks::detach(mem, free);
            RawLink::clear(mem, free);
            debug!(link = %free, "links.create.recycled");
            return Ok(free);
        }

        let limit = self.constants.max_inner_reference();
        let allocated = self.allocated_links();
        if allocated >= limit {
            return Err(LinkError::CapacityExhausted {
                limit: limit.as_u64(),
            });
        }
        if allocated >= self.reserved_links().decrement() {
            self.grow()?;
        }
        let link = allocated.increment();
        self.memory.set_used_capacity(Self::capacity_for_links(link))?;
        let mem = self.memory.bytes_mut();
        header::set(mem, HeaderField::AllocatedLinks, link);
        RawLink::clear(mem, link);
        debug!(link = %link, "links.create");
        Ok(link)
    }

    fn grow(&mut self) -> Result<()> {
        let requested = self
            .memory
            .reserved_capacity()
            .checked_add(self.reservation_step)
            .ok_or(LinkError::MemoryGrowth { requested: u64::MAX })?;
        self.memory.set_reserved_capacity(requested)?;
        let reserved = Self::links_for_capacity(self.memory.reserved_capacity());
        header::set(self.memory.bytes_mut(), HeaderField::ReservedLinks, reserved);
        debug!(bytes = requested, reserved = %reserved, "links.memory.grow");
        Ok(())
    }

    /// Replaces the value of the link selected by `restrictions[index_part]`
    /// with the source and target of `substitution`, re-indexing it in both
    /// trees. Returns the link's unchanged address.
    pub fn update(&mut self, restrictions: &[T], substitution: &[T]) -> Result<T> {
        let link = *restrictions
            .get(self.constants.index_part)
            .ok_or(LinkError::Invalid("update requires the address of a link"))?;
        if substitution.len() != 3 {
            return Err(LinkError::Invalid(
                "substitution must hold index, source and target",
            ));
        }
        if !self.exists(link) {
            return Err(LinkError::NotExists(link.as_u64()));
        }
        let source = substitution[self.constants.source_part];
        let target = substitution[self.constants.target_part];
        self.set_value(link, source, target);
        debug!(link = %link, source = %source, target = %target, "links.update");
        Ok(link)
    }

    /// Detaches `link` from both trees under its old value, stores the new
    /// value and re-attaches it. Null values are not indexed.
    fn set_value(&mut self, link: T, source: T, target: T) {
        let mem = self.memory.bytes_mut();
        let old_source: T = RawLink::get(mem, link, Field::Source);
        let old_target: T = RawLink::get(mem, link, Field::Target);
        if old_source != T::ZERO {
            let root = header::get(mem, HeaderField::RootAsSource);
            let root = Sources::detach(mem, root, link);
            header::set(mem, HeaderField::RootAsSource, root);
        }
        if old_target != T::ZERO {
            let root = header::get(mem, HeaderField::RootAsTarget);
            let root = Targets::detach(mem, root, link);
            header::set(mem, HeaderField::RootAsTarget, root);
        }
        RawLink::set(mem, link, Field::Source, source);
        RawLink::set(mem, link, Field::Target, target);
        if source != T::ZERO {
            let root = header::get(mem, HeaderField::RootAsSource);
            let root = Sources::attach(mem, root, link);
            header::set(mem, HeaderField::RootAsSource, root);
        }
        if target != T::ZERO {
            let root = header::get(mem, HeaderField::RootAsTarget);
            let root = Targets::attach(mem, root, link);
            header::set(mem, HeaderField::RootAsTarget, root);
        }
    }

    /// Removes the link selected by `restrictions[index_part]`. Deleting the
    /// last slot shrinks the dense array past any trailing free slots;
    /// deleting any other slot puts it on the free list. Deleting a link that
    /// does not exist does nothing.
    pub fn delete(&mut self, restrictions: &[T]) -> Result<()> {
        let link = *restrictions
            .get(self.constants.index_part)
            .ok_or(LinkError::Invalid("delete requires the address of a link"))?;
        if !self.exists(link) {
            debug!(link = %link, "links.delete.missing");
            return Ok(());
        }
        self.set_value(link, T::ZERO, T::ZERO);
        let allocated = self.allocated_links();
        if link < allocated {
            let mem = self.memory.bytes_mut();
            RawLink::clear(mem, link);
            UnusedLinks::attach_as_first(mem, link);
            debug!(link = %link, "links.delete.freed");
            return Ok(());
        }

        let mut allocated = allocated.decrement();
        {
            let mem = self.memory.bytes_mut();
            RawLink::clear(mem, link);
            header::set(mem, HeaderField::AllocatedLinks, allocated);
        }
        while allocated > T::ZERO && self.is_unused(allocated) {
            let mem = self.memory.bytes_mut();
            UnusedLinks::detach(mem, allocated);
            RawLink::clear(mem, allocated);
            allocated = allocated.decrement();
            header::set(mem, HeaderField::AllocatedLinks, allocated);
        }
        self.memory
            .set_used_capacity(Self::capacity_for_links(allocated))?;
        debug!(link = %link, allocated = %allocated, "links.delete.trim");
        Ok(())
    }
}

/// Adds two counts, failing when the total does not fit the address width.
/// A link can match both as a source and as a target, so the sum may exceed
/// the number of links.
pub(crate) fn sum_counts<T: LinkAddress>(first: T, second: T) -> Result<T> {
    T::from_u64(first.as_u64() + second.as_u64())
        .ok_or(LinkError::Invalid("count exceeds address width"))
}
