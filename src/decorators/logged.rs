use tracing::{debug, info};

use crate::constants::LinksConstants;
use crate::links::{EachHandler, Links, LinksExt};
use crate::primitives::wal::{TransitionKind, TransitionLog};
use crate::types::{Flow, Link, LinkAddress, LinkError, Result};

fn widen<T: LinkAddress>(link: Link<T>) -> Link<u64> {
    Link::new(link.index.as_u64(), link.source.as_u64(), link.target.as_u64())
}

fn narrow<T: LinkAddress>(value: u64) -> Result<T> {
    T::from_u64(value).ok_or(LinkError::Corruption("logged value exceeds address width"))
}

/// Records every create, update and delete applied to the inner store in a
/// [`TransitionLog`].
///
/// A transition is appended after the inner operation succeeds, so the log
/// never describes an operation the store rejected.
pub struct LoggedLinks<T, L> {
    inner: L,
    log: TransitionLog,
    constants: LinksConstants<T>,
}

impl<T: LinkAddress, L: Links<T>> LoggedLinks<T, L> {
    /// Wraps `inner`, appending to `log`.
    pub fn new(inner: L, log: TransitionLog) -> Self {
        let constants = inner.constants().clone();
        Self {
            inner,
            log,
            constants,
        }
    }

    /// The transition log.
    pub fn log(&self) -> &TransitionLog {
        &self.log
    }

    /// The wrapped store.
    pub fn inner(&self) -> &L {
        &self.inner
    }

    /// Unwraps the inner store and the log.
    pub fn into_parts(self) -> (L, TransitionLog) {
        (self.inner, self.log)
    }
}

impl<T: LinkAddress, L: Links<T>> Links<T> for LoggedLinks<T, L> {
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
        let index = self.inner.create(restrictions)?;
        let after = self
            .inner
            .get_link(index)?
            .unwrap_or_else(|| Link::nothing(index));
        self.log.append(Link::nothing(0), widen(after))?;
        Ok(index)
    }

    fn update(&mut self, restrictions: &[T], substitution: &[T]) -> Result<T> {
        let selected = *restrictions
            .get(self.constants.index_part)
            .ok_or(LinkError::Invalid("update requires the address of a link"))?;
        let before = self
            .inner
            .get_link(selected)?
            .ok_or(LinkError::NotExists(selected.as_u64()))?;
        let index = self.inner.update(restrictions, substitution)?;
        let after = self.inner.get_link(index)?;
        match after {
            Some(after) if after.index == selected => {
                self.log.append(widen(before), widen(after))?;
            }
            // A decorator underneath resolved the update to another link and
            // removed the selected one.
            _ => {
                self.log.append(widen(before), Link::nothing(0))?;
            }
        }
        Ok(index)
    }

    fn delete(&mut self, restrictions: &[T]) -> Result<()> {
        let selected = *restrictions
            .get(self.constants.index_part)
            .ok_or(LinkError::Invalid("delete requires the address of a link"))?;
        let before = self.inner.get_link(selected)?;
        self.inner.delete(restrictions)?;
        if let Some(before) = before {
            self.log.append(widen(before), Link::nothing(0))?;
        }
        Ok(())
    }
}

/// Re-applies every transition in `log` to `links`, which should start out
/// in the state the log was begun from (usually empty). Returns the number
/// of transitions applied.
///
/// Fails with [`LinkError::Corruption`] if a replayed create hands out a
/// different address than the one recorded.
pub fn replay<T, L>(log: &TransitionLog, links: &mut L) -> Result<u64>
where
    T: LinkAddress,
    L: Links<T> + ?Sized,
{
    let mut applied = 0u64;
    for transition in log.transitions()? {
        match transition.kind() {
            TransitionKind::Create => {
                let expected: T = narrow(transition.after.index)?;
                let index = links.create(&[])?;
                if index != expected {
                    return Err(LinkError::Corruption("replayed create diverged from log"));
                }
                let after = transition.after;
                if after.source != 0 || after.target != 0 {
                    links.update_link(index, narrow(after.source)?, narrow(after.target)?)?;
                }
            }
            TransitionKind::Update => {
                let after = transition.after;
                let index: T = narrow(after.index)?;
                links.update_link(index, narrow(after.source)?, narrow(after.target)?)?;
            }
            TransitionKind::Delete => {
                links.delete_link(narrow(transition.before.index)?)?;
            }
        }
        debug!(seq = transition.seq, "wal.replay.apply");
        applied += 1;
    }
    info!(applied, "wal.replay");
    Ok(applied)
}
