//! Direct-memory link store and the structures threaded through its region.
//!
//! The region is a header record followed by a dense array of link records.
//! Both index trees and the free list live inside those records, so the
//! store owns exactly one allocation: its [`ResizableMemory`](crate::primitives::memory::ResizableMemory).

/// Free list of deleted slots.
pub mod freelist;

/// Header record layout.
pub mod header;

/// Link record layout.
pub mod raw;

/// Source and target index trees.
pub mod tree;

mod links;
mod options;
mod stats;
mod verify;


pub use header::{HeaderField, LinksHeader};
pub use links::MemoryLinks;
pub(crate) use links::sum_counts;
pub use options::{LinksOptions, DEFAULT_RESERVATION_LINKS};
pub use raw::{Field, RawLink};
pub use stats::{stats, StatsReport};
pub use verify::{verify, VerifyCounts, VerifyFinding, VerifyReport, VerifySeverity};
