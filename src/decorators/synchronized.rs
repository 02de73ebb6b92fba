use parking_lot::RwLock;
use tracing::trace;

use crate::constants::LinksConstants;
use crate::links::{EachHandler, Links};
use crate::types::{Flow, Link, LinkAddress, Result};

/// Shares an inner store between threads behind a reader-writer lock.
///
/// `count` and `each` take the shared lock for their whole duration;
/// `create`, `update` and `delete` take the exclusive lock. All of them are
/// available through `&self`.
pub struct SynchronizedLinks<T, L> {
    inner: RwLock<L>,
    constants: LinksConstants<T>,
}

impl<T: LinkAddress, L: Links<T>> SynchronizedLinks<T, L> {
    /// Wraps `inner`.
    pub fn new(inner: L) -> Self {
        let constants = inner.constants().clone();
        Self {
            inner: RwLock::new(inner),
            constants,
        }
    }

    /// Sentinels of the wrapped store.
    pub fn constants(&self) -> &LinksConstants<T> {
        &self.constants
    }

    /// Runs `f` under the shared lock.
    pub fn read<R>(&self, f: impl FnOnce(&L) -> R) -> R {
        let guard = self.inner.read();
        f(&guard)
    }

    /// Runs `f` under the exclusive lock, so several operations apply as
    /// one step with respect to other threads.
    pub fn write<R>(&self, f: impl FnOnce(&mut L) -> R) -> R {
        let mut guard = self.inner.write();
        trace!("links.sync.write");
        f(&mut guard)
    }

    /// Number of links matching `restrictions`.
    pub fn count(&self, restrictions: &[T]) -> Result<T> {
        self.inner.read().count(restrictions)
    }

    /// Visits every link matching `restrictions` while holding the shared lock.
    pub fn each<F>(&self, restrictions: &[T], mut handler: F) -> Result<Flow>
    where
        F: FnMut(Link<T>) -> Flow,
    {
        self.inner.read().each(restrictions, &mut handler)
    }

    /// Allocates a link.
    pub fn create(&self, restrictions: &[T]) -> Result<T> {
        self.inner.write().create(restrictions)
    }

    /// Sets the value of a link.
    pub fn update(&self, restrictions: &[T], substitution: &[T]) -> Result<T> {
        self.inner.write().update(restrictions, substitution)
    }

    /// Removes a link.
    pub fn delete(&self, restrictions: &[T]) -> Result<()> {
        self.inner.write().delete(restrictions)
    }

    /// Unwraps the inner store.
    pub fn into_inner(self) -> L {
        self.inner.into_inner()
    }
}

impl<T: LinkAddress, L: Links<T>> Links<T> for SynchronizedLinks<T, L> {
    fn constants(&self) -> &LinksConstants<T> {
        &self.constants
    }

    fn count(&self, restrictions: &[T]) -> Result<T> {
        self.inner.read().count(restrictions)
    }

    fn each(&self, restrictions: &[T], handler: EachHandler<'_, T>) -> Result<Flow> {
        self.inner.read().each(restrictions, handler)
    }

    fn create(&mut self, restrictions: &[T]) -> Result<T> {
        self.inner.get_mut().create(restrictions)
    }

    fn update(&mut self, restrictions: &[T], substitution: &[T]) -> Result<T> {
        self.inner.get_mut().update(restrictions, substitution)
    }

    fn delete(&mut self, restrictions: &[T]) -> Result<()> {
        self.inner.get_mut().delete(restrictions)
    }
}
