//! Size-balanced binary search trees threaded through link records.
//!
//! Two trees index every link: one keyed by `Source`, one keyed by `Target`.
//! Tree nodes are the link slots themselves; child pointers and subtree
//! sizes live in the record's `*AsSource` / `*AsTarget` fields, so the trees
//! never allocate. Nodes are ordered by `(key, other, index)`, which makes
//! every node position unique even when several links share a doublet.
//!
//! Subtree sizes give rank queries, so counting the links that use a value is
//! two `O(log n)` descents rather than a scan.

mod kinds;

#[cfg(test)]
mod tests;

use std::cmp::Ordering;
use std::marker::PhantomData;

pub use kinds::{SourcesTree, TargetsTree};

use crate::types::{Flow, LinkAddress};

use super::raw::{Field, RawLink};

/// Which record fields a tree uses.
pub trait TreeKind {
    /// Short name used in logs and integrity reports.
    const NAME: &'static str;
    /// Field holding the node's key.
    const KEY: Field;
    /// Field breaking ties between equal keys.
    const OTHER: Field;
    /// Left child pointer.
    const LEFT: Field;
    /// Right child pointer.
    const RIGHT: Field;
    /// Subtree size.
    const SIZE: Field;
}

/// Tree operations for one [`TreeKind`]. Roots are passed in and returned;
/// the caller stores them in the header.
pub struct SizeBalancedTree<K>(PhantomData<K>);

impl<K: TreeKind> SizeBalancedTree<K> {
    #[inline]
    fn left<T: LinkAddress>(mem: &[u8], node: T) -> T {
        if node == T::ZERO {
            T::ZERO
        } else {
            RawLink::get(mem, node, K::LEFT)
        }
    }

    #[inline]
    fn right<T: LinkAddress>(mem: &[u8], node: T) -> T {
        if node == T::ZERO {
            T::ZERO
        } else {
            RawLink::get(mem, node, K::RIGHT)
        }
    }

    /// Subtree size of `node`; zero for the null node.
    #[inline]
    pub fn size<T: LinkAddress>(mem: &[u8], node: T) -> T {
        if node == T::ZERO {
            T::ZERO
        } else {
            RawLink::get(mem, node, K::SIZE)
        }
    }

    #[inline]
    fn set_left<T: LinkAddress>(mem: &mut [u8], node: T, value: T) {
        RawLink::set(mem, node, K::LEFT, value);
    }

    #[inline]
    fn set_right<T: LinkAddress>(mem: &mut [u8], node: T, value: T) {
        RawLink::set(mem, node, K::RIGHT, value);
    }

    #[inline]
    fn set_size<T: LinkAddress>(mem: &mut [u8], node: T, value: T) {
        RawLink::set(mem, node, K::SIZE, value);
    }

    #[inline]
    fn fix_size<T: LinkAddress>(mem: &mut [u8], node: T) {
        let (left, right) = Self::children(mem, node);
        let size = Self::size(mem, left) + Self::size(mem, right);
        Self::set_size(mem, node, size.increment());
    }

    /// Key of `node` in this tree.
    #[inline]
    pub fn key<T: LinkAddress>(mem: &[u8], node: T) -> T {
        RawLink::get(mem, node, K::KEY)
    }

    #[inline]
    fn sort_key<T: LinkAddress>(mem: &[u8], node: T) -> (T, T, T) {
        (
            RawLink::get(mem, node, K::KEY),
            RawLink::get(mem, node, K::OTHER),
            node,
        )
    }

    /// Whether `first` sorts before `second`.
    #[inline]
    pub fn is_left_of<T: LinkAddress>(mem: &[u8], first: T, second: T) -> bool {
        Self::sort_key(mem, first) < Self::sort_key(mem, second)
    }

    fn rotate_left<T: LinkAddress>(mem: &mut [u8], root: T) -> T {
        let pivot = Self::right(mem, root);
        let moved = Self::left(mem, pivot);
        Self::set_right(mem, root, moved);
        Self::set_left(mem, pivot, root);
        let size = Self::size(mem, root);
        Self::set_size(mem, pivot, size);
        Self::fix_size(mem, root);
        pivot
    }

    fn rotate_right<T: LinkAddress>(mem: &mut [u8], root: T) -> T {
        let pivot = Self::left(mem, root);
        let moved = Self::right(mem, pivot);
        Self::set_left(mem, root, moved);
        Self::set_right(mem, pivot, root);
        let size = Self::size(mem, root);
        Self::set_size(mem, pivot, size);
        Self::fix_size(mem, root);
        pivot
    }

    /// Restores the size-balance property at `root`. `right_heavy` names the
    /// side that may have grown too large relative to its sibling.
    fn maintain<T: LinkAddress>(mem: &mut [u8], root: T, right_heavy: bool) -> T {
        if root == T::ZERO {
            return root;
        }
        let left = Self::left(mem, root);
        let right = Self::right(mem, root);
        let mut root = root;
        if !right_heavy {
            let right_size = Self::size(mem, right);
            if Self::size(mem, Self::left(mem, left)) > right_size {
                root = Self::rotate_right(mem, root);
            } else if Self::size(mem, Self::right(mem, left)) > right_size {
                let rotated = Self::rotate_left(mem, left);
                Self::set_left(mem, root, rotated);
                root = Self::rotate_right(mem, root);
            } else {
                return root;
            }
        } else {
            let left_size = Self::size(mem, left);
            if Self::size(mem, Self::right(mem, right)) > left_size {
                root = Self::rotate_left(mem, root);
            } else if Self::size(mem, Self::left(mem, right)) > left_size {
                let rotated = Self::rotate_right(mem, right);
                Self::set_right(mem, root, rotated);
                root = Self::rotate_left(mem, root);
            } else {
                return root;
            }
        }
        let (left, right) = Self::children(mem, root);
        let left = Self::maintain(mem, left, false);
        Self::set_left(mem, root, left);
        let right = Self::maintain(mem, right, true);
        Self::set_right(mem, root, right);
        let root = Self::maintain(mem, root, false);
        Self::maintain(mem, root, true)
    }

    /// Inserts `node` under its current key and returns the new root.
    pub fn attach<T: LinkAddress>(mem: &mut [u8], root: T, node: T) -> T {
        if root == T::ZERO {
            Self::set_left(mem, node, T::ZERO);
            Self::set_right(mem, node, T::ZERO);
            Self::set_size(mem, node, T::ONE);
            return node;
        }
        let size = Self::size(mem, root);
        Self::set_size(mem, root, size.increment());
        let (left, right) = Self::children(mem, root);
        if Self::is_left_of(mem, node, root) {
            let left = Self::attach(mem, left, node);
            Self::set_left(mem, root, left);
            Self::maintain(mem, root, false)
        } else {
            let right = Self::attach(mem, right, node);
            Self::set_right(mem, root, right);
            Self::maintain(mem, root, true)
        }
    }

    /// Removes `node`, which must be attached under its current key, and
    /// returns the new root. The node's tree fields are zeroed.
    pub fn detach<T: LinkAddress>(mem: &mut [u8], root: T, node: T) -> T {
        if root == T::ZERO {
            return root;
        }
        if root == node {
            let left = Self::left(mem, root);
            let right = Self::right(mem, root);
            let size = Self::size(mem, root);
            Self::clear(mem, root);
            if left == T::ZERO {
                return right;
            }
            if right == T::ZERO {
                return left;
            }
            let (rest, successor) = Self::detach_min(mem, right);
            Self::set_left(mem, successor, left);
            Self::set_right(mem, successor, rest);
            Self::set_size(mem, successor, size.decrement());
            return Self::maintain(mem, successor, false);
        }
        let size = Self::size(mem, root);
        Self::set_size(mem, root, size.decrement());
        let (left, right) = Self::children(mem, root);
        if Self::is_left_of(mem, node, root) {
            let left = Self::detach(mem, left, node);
            Self::set_left(mem, root, left);
            Self::maintain(mem, root, true)
        } else {
            let right = Self::detach(mem, right, node);
            Self::set_right(mem, root, right);
            Self::maintain(mem, root, false)
        }
    }

    /// Unlinks the minimum of the subtree at `root`; returns the remaining
    /// subtree and the unlinked node.
    fn detach_min<T: LinkAddress>(mem: &mut [u8], root: T) -> (T, T) {
        let left = Self::left(mem, root);
        if left == T::ZERO {
            let right = Self::right(mem, root);
            Self::clear(mem, root);
            return (right, root);
        }
        let size = Self::size(mem, root);
        Self::set_size(mem, root, size.decrement());
        let (rest, min) = Self::detach_min(mem, left);
        Self::set_left(mem, root, rest);
        (Self::maintain(mem, root, true), min)
    }

    fn clear<T: LinkAddress>(mem: &mut [u8], node: T) {
        Self::set_left(mem, node, T::ZERO);
        Self::set_right(mem, node, T::ZERO);
        Self::set_size(mem, node, T::ZERO);
    }

    /// Number of nodes whose key is below `value` (or equal, when `inclusive`).
    fn rank<T: LinkAddress>(mem: &[u8], root: T, value: T, inclusive: bool) -> T {
        let mut node = root;
        let mut count = T::ZERO;
        while node != T::ZERO {
            let key = Self::key(mem, node);
            let below = if inclusive { key <= value } else { key < value };
            if below {
                count = count + Self::size(mem, Self::left(mem, node)) + T::ONE;
                node = Self::right(mem, node);
            } else {
                node = Self::left(mem, node);
            }
        }
        count
    }

    /// Number of attached links whose key equals `value`.
    pub fn count_usages<T: LinkAddress>(mem: &[u8], root: T, value: T) -> T {
        Self::rank(mem, root, value, true) - Self::rank(mem, root, value, false)
    }

    /// Lowest-indexed node whose `(key, other)` equals the arguments, or zero.
    pub fn search<T: LinkAddress>(mem: &[u8], root: T, key: T, other: T) -> T {
        let wanted = (key, other);
        let mut node = root;
        let mut found = T::ZERO;
        while node != T::ZERO {
            let current = (
                RawLink::get(mem, node, K::KEY),
                RawLink::get(mem, node, K::OTHER),
            );
            match current.cmp(&wanted) {
                Ordering::Less => node = Self::right(mem, node),
                Ordering::Greater => node = Self::left(mem, node),
                Ordering::Equal => {
                    found = node;
                    node = Self::left(mem, node);
                }
            }
        }
        found
    }

    /// Visits, in tree order, every node whose key equals `value`.
    pub fn each_usage<T, F>(mem: &[u8], root: T, value: T, handler: &mut F) -> Flow
    where
        T: LinkAddress,
        F: FnMut(T) -> Flow,
    {
        if root == T::ZERO {
            return Flow::Continue;
        }
        let key = Self::key(mem, root);
        match key.cmp(&value) {
            Ordering::Greater => Self::each_usage(mem, Self::left(mem, root), value, handler),
            Ordering::Less => Self::each_usage(mem, Self::right(mem, root), value, handler),
            Ordering::Equal => {
                if Self::each_usage(mem, Self::left(mem, root), value, handler).is_break() {
                    return Flow::Break;
                }
                if handler(root).is_break() {
                    return Flow::Break;
                }
                Self::each_usage(mem, Self::right(mem, root), value, handler)
            }
        }
    }

    /// Visits every node of the tree in order. Used by integrity checks.
    pub fn each_node<T, F>(mem: &[u8], root: T, handler: &mut F) -> Flow
    where
        T: LinkAddress,
        F: FnMut(T) -> Flow,
    {
        if root == T::ZERO {
            return Flow::Continue;
        }
        if Self::each_node(mem, Self::left(mem, root), handler).is_break() {
            return Flow::Break;
        }
        if handler(root).is_break() {
            return Flow::Break;
        }
        Self::each_node(mem, Self::right(mem, root), handler)
    }

    /// Left and right children of `node`.
    pub fn children<T: LinkAddress>(mem: &[u8], node: T) -> (T, T) {
        (Self::left(mem, node), Self::right(mem, node))
    }

    /// Height of the subtree at `root`.
    pub fn depth<T: LinkAddress>(mem: &[u8], root: T) -> usize {
        if root == T::ZERO {
            return 0;
        }
        let (left, right) = Self::children(mem, root);
        1 + Self::depth(mem, left).max(Self::depth(mem, right))
    }
}
