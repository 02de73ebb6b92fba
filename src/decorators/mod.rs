//! Wrappers that add behaviour around an inner [`Links`](crate::links::Links)
//! store. Each holds its inner store exclusively and implements the same
//! interface, so they compose by nesting:
//!
//! ```no_run
//! use doublets::decorators::{ConflictPolicy, SynchronizedLinks, UniqueLinks};
//! use doublets::MemoryLinks;
//!
//! # fn main() -> doublets::Result<()> {
//! let store = MemoryLinks::<u64>::in_memory()?;
//! let shared = SynchronizedLinks::new(UniqueLinks::new(store, ConflictPolicy::ReturnExisting));
//! let point = shared.create(&[])?;
//! # let _ = point;
//! # Ok(())
//! # }
//! ```

mod logged;
mod synchronized;
mod unique;

pub use logged::{replay, LoggedLinks};
pub use synchronized::SynchronizedLinks;
pub use unique::{ConflictPolicy, UniqueLinks};
