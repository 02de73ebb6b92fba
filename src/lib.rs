//! Doublet link store: fixed-size `(source, target)` records addressed by
//! index, with source and target index trees and a free list threaded
//! through the records of a single resizable memory region.
//!
//! [`MemoryLinks`] is the store itself. The [`Links`] trait is the narrow
//! interface it shares with the wrappers in [`decorators`].

#![warn(missing_docs)]

pub mod constants;
pub mod decorators;
pub mod links;
pub mod primitives;
pub mod storage;
pub mod types;

pub use constants::LinksConstants;
pub use links::{EachHandler, Links, LinksExt};
pub use primitives::memory::{FileMemory, HeapMemory, ResizableMemory};
pub use primitives::wal::{LogOptions, TransitionLog};
pub use storage::{LinksOptions, MemoryLinks};
pub use types::{Doublet, Flow, Link, LinkAddress, LinkError, Result};
