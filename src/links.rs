//! The narrow store interface shared by [`MemoryLinks`] and every decorator.

use std::collections::BTreeSet;

use crate::constants::LinksConstants;
use crate::primitives::memory::ResizableMemory;
use crate::storage::{sum_counts, MemoryLinks};
use crate::types::{Flow, Link, LinkAddress, Result};

/// Handler invoked once per matching link by [`Links::each`].
pub type EachHandler<'a, T> = &'a mut dyn FnMut(Link<T>) -> Flow;

/// Create/update/delete and restriction queries over doublets.
///
/// Restriction lists are positional `(index, source, target)` prefixes of
/// length 0 to 3; positions holding [`LinksConstants::any`] are
/// unconstrained. Decorators implement this trait over an inner store and
/// compose by nesting.
pub trait Links<T: LinkAddress> {
    /// Sentinels and positional parts of this store.
    fn constants(&self) -> &LinksConstants<T>;

    /// Number of links matching `restrictions`.
    fn count(&self, restrictions: &[T]) -> Result<T>;

    /// Visits every link matching `restrictions` until `handler` breaks.
    fn each(&self, restrictions: &[T], handler: EachHandler<'_, T>) -> Result<Flow>;

    /// Allocates a link with value `(0, 0)` and returns its address.
    fn create(&mut self, restrictions: &[T]) -> Result<T>;

    /// Sets the value of the link selected by `restrictions` to the source
    /// and target of `substitution`. Returns the address the value now
    /// lives at.
    fn update(&mut self, restrictions: &[T], substitution: &[T]) -> Result<T>;

    /// Removes the link selected by `restrictions`.
    fn delete(&mut self, restrictions: &[T]) -> Result<()>;
}

impl<T: LinkAddress, M: ResizableMemory> Links<T> for MemoryLinks<T, M> {
    fn constants(&self) -> &LinksConstants<T> {
        MemoryLinks::constants(self)
    }

    fn count(&self, restrictions: &[T]) -> Result<T> {
        MemoryLinks::count(self, restrictions)
    }

    fn each(&self, restrictions: &[T], handler: EachHandler<'_, T>) -> Result<Flow> {
        MemoryLinks::each(self, restrictions, handler)
    }

    fn create(&mut self, restrictions: &[T]) -> Result<T> {
        MemoryLinks::create(self, restrictions)
    }

    fn update(&mut self, restrictions: &[T], substitution: &[T]) -> Result<T> {
        MemoryLinks::update(self, restrictions, substitution)
    }

    fn delete(&mut self, restrictions: &[T]) -> Result<()> {
        MemoryLinks::delete(self, restrictions)
    }
}

/// Convenience operations built only on [`Links`].
pub trait LinksExt<T: LinkAddress>: Links<T> {
    /// Number of live links.
    fn total(&self) -> Result<T> {
        self.count(&[])
    }

    /// Whether `index` addresses a live link.
    fn exists(&self, index: T) -> Result<bool> {
        if !self.constants().is_internal_reference(index) {
            return Ok(false);
        }
        Ok(self.count(&[index])? != T::ZERO)
    }

    /// The link at `index`, if it exists.
    fn get_link(&self, index: T) -> Result<Option<Link<T>>> {
        if !self.constants().is_internal_reference(index) {
            return Ok(None);
        }
        let mut found = None;
        self.each(&[index], &mut |link| {
            found = Some(link);
            Flow::Break
        })?;
        Ok(found)
    }

    /// Every link matching `restrictions`, in visiting order.
    fn all(&self, restrictions: &[T]) -> Result<Vec<Link<T>>> {
        let mut out = Vec::new();
        self.each(restrictions, &mut |link| {
            out.push(link);
            Flow::Continue
        })?;
        Ok(out)
    }

    /// Lowest address holding exactly `(source, target)`.
    fn search(&self, source: T, target: T) -> Result<Option<T>> {
        let any = self.constants().any;
        let mut found = None;
        self.each(&[any, source, target], &mut |link| {
            found = Some(link.index);
            Flow::Break
        })?;
        Ok(found)
    }

    /// Sets the value of the link at `index`.
    fn update_link(&mut self, index: T, source: T, target: T) -> Result<T> {
        self.update(&[index], &[index, source, target])
    }

    /// Removes the link at `index`.
    fn delete_link(&mut self, index: T) -> Result<()> {
        self.delete(&[index])
    }

    /// Creates a link whose source and target are its own address.
    fn create_point(&mut self) -> Result<T> {
        let index = self.create(&[])?;
        self.update_link(index, index, index)
    }

    /// Creates a link and sets its value.
    fn create_and_update(&mut self, source: T, target: T) -> Result<T> {
        let index = self.create(&[])?;
        self.update_link(index, source, target)
    }

    /// Address of an existing `(source, target)` link, or of a newly created one.
    fn get_or_create(&mut self, source: T, target: T) -> Result<T> {
        match self.search(source, target)? {
            Some(index) => Ok(index),
            None => self.create_and_update(source, target),
        }
    }

    /// Number of references to `index` held by other links. A link that
    /// refers to itself does not count as its own usage.
    fn count_usages(&self, index: T) -> Result<T> {
        let any = self.constants().any;
        let Some(link) = self.get_link(index)? else {
            return Ok(T::ZERO);
        };
        let mut as_source = self.count(&[any, index, any])?;
        if link.source == index {
            as_source = as_source - T::ONE;
        }
        let mut as_target = self.count(&[any, any, index])?;
        if link.target == index {
            as_target = as_target - T::ONE;
        }
        sum_counts(as_source, as_target)
    }

    /// Addresses of the other links that refer to `index`, ascending.
    fn usages(&self, index: T) -> Result<Vec<T>> {
        let any = self.constants().any;
        let mut found = BTreeSet::new();
        self.each(&[any, index], &mut |link| {
            if link.index != index {
                found.insert(link.index);
            }
            Flow::Continue
        })?;
        Ok(found.into_iter().collect())
    }

    /// Rewrites every reference to `old` held by other links to point at
    /// `new`. Returns `new`.
    fn merge_usages(&mut self, old: T, new: T) -> Result<T> {
        if old == new {
            return Ok(new);
        }
        for usage in self.usages(old)? {
            let Some(link) = self.get_link(usage)? else {
                continue;
            };
            let source = if link.source == old { new } else { link.source };
            let target = if link.target == old { new } else { link.target };
            self.update_link(usage, source, target)?;
        }
        Ok(new)
    }
}

impl<T: LinkAddress, L: Links<T> + ?Sized> LinksExt<T> for L {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LinkError;

    fn store() -> Result<MemoryLinks<u32>> {
        MemoryLinks::in_memory()
    }

    #[test]
    fn point_refers_to_itself() -> Result<()> {
        let mut links = store()?;
        let point = links.create_point()?;
        let link = LinksExt::get_link(&links, point)?;
        assert_eq!(link, Some(Link::new(point, point, point)));
        assert_eq!(LinksExt::count_usages(&links, point)?, 0);
        Ok(())
    }

    #[test]
    fn get_or_create_reuses_existing_doublet() -> Result<()> {
        let mut links = store()?;
        let a = links.create_point()?;
        let b = links.create_point()?;
        let ab = links.get_or_create(a, b)?;
        assert_eq!(links.get_or_create(a, b)?, ab);
        assert_eq!(links.search(a, b)?, Some(ab));
        assert_eq!(links.search(b, a)?, None);
        assert_eq!(LinksExt::total(&links)?, 3);
        Ok(())
    }

    #[test]
    fn usages_exclude_the_link_itself() -> Result<()> {
        let mut links = store()?;
        let a = links.create_point()?;
        let b = links.create_point()?;
        let ab = links.create_and_update(a, b)?;
        let ba = links.create_and_update(b, a)?;
        let aa = links.create_and_update(a, a)?;
        assert_eq!(links.usages(a)?, vec![ab, ba, aa]);
        assert_eq!(LinksExt::count_usages(&links, a)?, 4);
        assert_eq!(LinksExt::count_usages(&links, b)?, 2);
        Ok(())
    }

    #[test]
    fn usage_count_overflowing_the_width_is_an_error() -> Result<()> {
        let mut links = MemoryLinks::<u8>::in_memory()?;
        let a = links.create_point()?;
        for _ in 0..100 {
            links.create_and_update(a, a)?;
        }
        assert_eq!(LinksExt::count_usages(&links, a)?, 200);
        for _ in 0..50 {
            links.create_and_update(a, a)?;
        }
        let err = LinksExt::count_usages(&links, a).unwrap_err();
        assert!(matches!(err, LinkError::Invalid(_)));
        Ok(())
    }

    #[test]
    fn merge_usages_rewires_references() -> Result<()> {
        let mut links = store()?;
        let a = links.create_point()?;
        let b = links.create_point()?;
        let c = links.create_point()?;
        let ac = links.create_and_update(a, c)?;
        let ca = links.create_and_update(c, a)?;
        links.merge_usages(a, b)?;
        assert_eq!(LinksExt::get_link(&links, ac)?, Some(Link::new(ac, b, c)));
        assert_eq!(LinksExt::get_link(&links, ca)?, Some(Link::new(ca, c, b)));
        assert_eq!(LinksExt::get_link(&links, a)?, Some(Link::new(a, a, a)));
        assert_eq!(LinksExt::count_usages(&links, a)?, 0);
        Ok(())
    }

    #[test]
    fn exists_ignores_sentinels() -> Result<()> {
        let mut links = store()?;
        links.create(&[])?;
        let any = Links::constants(&links).any;
        assert!(LinksExt::exists(&links, 1)?);
        assert!(!LinksExt::exists(&links, any)?);
        assert!(!LinksExt::exists(&links, 0)?);
        Ok(())
    }
}
