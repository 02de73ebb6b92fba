use std::fmt;

use super::LinkAddress;

/// A stored link as seen by callers: its address plus its doublet value.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Link<T> {
    /// Address of the link.
    pub index: T,
    /// First element of the doublet.
    pub source: T,
    /// Second element of the doublet.
    pub target: T,
}

impl<T: LinkAddress> Link<T> {
    /// Creates a link view.
    pub fn new(index: T, source: T, target: T) -> Self {
        Self {
            index,
            source,
            target,
        }
    }

    /// A link at `index` that points at nothing, the state of a freshly created link.
    pub fn nothing(index: T) -> Self {
        Self::new(index, T::ZERO, T::ZERO)
    }

    /// The value part of the link.
    pub fn doublet(&self) -> Doublet<T> {
        Doublet::new(self.source, self.target)
    }

    /// Whether both value fields are null.
    pub fn is_nothing(&self) -> bool {
        self.source == T::ZERO && self.target == T::ZERO
    }

    /// The link in positional `(index, source, target)` form.
    pub fn as_array(&self) -> [T; 3] {
        [self.index, self.source, self.target]
    }
}

impl<T: fmt::Display> fmt::Display for Link<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}: {}->{})", self.index, self.source, self.target)
    }
}

/// Ordered pair of link references.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Doublet<T> {
    /// Source reference.
    pub source: T,
    /// Target reference.
    pub target: T,
}

impl<T> Doublet<T> {
    /// Creates a doublet.
    pub fn new(source: T, target: T) -> Self {
        Self { source, target }
    }
}

impl<T: fmt::Display> fmt::Display for Doublet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source, self.target)
    }
}

/// Iteration control returned by `each` handlers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Flow {
    /// Keep visiting links.
    Continue,
    /// Stop the iteration early.
    Break,
}

impl Flow {
    /// Whether this value stops iteration.
    #[inline]
    pub fn is_break(self) -> bool {
        matches!(self, Flow::Break)
    }
}
