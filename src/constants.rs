//! Positional meaning of restriction lists and the sentinel encoding for an
//! identifier width.
//!
//! Sentinels live at the top of the identifier range, so collaborators must
//! read them from [`LinksConstants`] instead of hard-coding values.

use std::ops::RangeInclusive;

use crate::types::{Flow, LinkAddress};

/// Sentinels and positional parts for links addressed by `T`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LinksConstants<T> {
    /// Position of the link address in a restriction list.
    pub index_part: usize,
    /// Position of the source in a restriction or substitution list.
    pub source_part: usize,
    /// Position of the target in a restriction or substitution list.
    pub target_part: usize,
    /// Reference to no link.
    pub null: T,
    /// Raw handler result meaning "keep iterating".
    pub r#continue: T,
    /// Raw handler result meaning "stop iterating".
    pub r#break: T,
    /// Reserved for skipping a value during iteration.
    pub skip: T,
    /// Unconstrained restriction position.
    pub any: T,
    /// Placeholder for "the link being created/updated itself".
    pub itself: T,
    /// Addresses that may refer to stored links.
    pub internal_references: RangeInclusive<T>,
}

impl<T: LinkAddress> LinksConstants<T> {
    /// Builds the default encoding for `T`.
    pub fn new() -> Self {
        let max = T::MAX;
        let one = T::ONE;
        Self {
            index_part: 0,
            source_part: 1,
            target_part: 2,
            null: T::ZERO,
            r#continue: max,
            r#break: T::ZERO,
            skip: max - one,
            any: max - one - one,
            itself: max - one - one - one,
            internal_references: one..=max - one - one - one - one,
        }
    }

    /// Whether `value` may address a stored link.
    #[inline]
    pub fn is_internal_reference(&self, value: T) -> bool {
        self.internal_references.contains(&value)
    }

    /// Largest address a store may hand out.
    #[inline]
    pub fn max_inner_reference(&self) -> T {
        *self.internal_references.end()
    }

    /// Interprets a raw handler result. Anything other than `break` continues.
    #[inline]
    pub fn flow(&self, raw: T) -> Flow {
        if raw == self.r#break {
            Flow::Break
        } else {
            Flow::Continue
        }
    }

    /// Encodes a [`Flow`] as its raw sentinel.
    #[inline]
    pub fn raw_flow(&self, flow: Flow) -> T {
        match flow {
            Flow::Break => self.r#break,
            Flow::Continue => self.r#continue,
        }
    }
}

impl<T: LinkAddress> Default for LinksConstants<T> {
    fn default() -> Self {
        Self::new()
    }
}
