use tracing::debug;

use crate::constants::LinksConstants;
use crate::links::{EachHandler, Links, LinksExt};
use crate::types::{Flow, LinkAddress, LinkError, Result};

/// What [`UniqueLinks`] does when an update would duplicate an existing
/// doublet.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ConflictPolicy {
    /// Delete the updated link and hand back the existing one.
    #[default]
    ReturnExisting,
    /// Repoint every usage of the updated link to the existing one, then
    /// delete the updated link.
    CascadeMergeUsages,
}

/// Keeps at most one link per `(source, target)` pair.
///
/// Uniqueness is enforced on update, the only operation that gives a link a
/// value. The returned address is where the requested doublet lives, which
/// differs from the updated address when a conflict was resolved.
pub struct UniqueLinks<T, L> {
    inner: L,
    policy: ConflictPolicy,
    constants: LinksConstants<T>,
}

impl<T: LinkAddress, L: Links<T>> UniqueLinks<T, L> {
    /// Wraps `inner`, resolving conflicts with `policy`.
    pub fn new(inner: L, policy: ConflictPolicy) -> Self {
        let constants = inner.constants().clone();
        Self {
            inner,
            policy,
            constants,
        }
    }

    /// Conflict resolution in effect.
    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// The wrapped store.
    pub fn inner(&self) -> &L {
        &self.inner
    }

    /// Unwraps the inner store.
    pub fn into_inner(self) -> L {
        self.inner
    }
}

impl<T: LinkAddress, L: Links<T>> Links<T> for UniqueLinks<T, L> {
    fn constants(&self) -> &LinksConstants<T> {
        &self.constants
    }

    fn count(&self, restrictions: &[T]) -> Result<T> {
        self.inner.count(restrictions)
    }

    fn each(&self, restrictions: &[T], handler: EachHandler<'_, T>) -> Result<Flow> {
        self.inner.each(restrictions, handler)
    }

    fn create(&mut self, restrictions: &[T]) -> Result<T> {
        self.inner.create(restrictions)
    }

    fn update(&mut self, restrictions: &[T], substitution: &[T]) -> Result<T> {
        let c = &self.constants;
        let (Some(&old), Some(&source), Some(&target)) = (
            restrictions.get(c.index_part),
            substitution.get(c.source_part),
            substitution.get(c.target_part),
        ) else {
            return Err(LinkError::Invalid(
                "update requires an address and a full substitution",
            ));
        };
        let existing = match self.inner.search(source, target)? {
            None => return self.inner.update(restrictions, substitution),
            Some(existing) if existing == old => return Ok(old),
            Some(existing) => existing,
        };
        if !self.inner.exists(old)? {
            return Err(LinkError::NotExists(old.as_u64()));
        }
        if self.policy == ConflictPolicy::CascadeMergeUsages {
            self.inner.merge_usages(old, existing)?;
        }
        self.inner.delete_link(old)?;
        debug!(
            old = %old,
            existing = %existing,
            policy = ?self.policy,
            "links.unique.conflict"
        );
        Ok(existing)
    }

    fn delete(&mut self, restrictions: &[T]) -> Result<()> {
        self.inner.delete(restrictions)
    }
}
