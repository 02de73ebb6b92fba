#![forbid(unsafe_code)]
//! Core value types shared by every layer of the link store.

mod address;
mod link;

pub use address::LinkAddress;
pub use link::{Doublet, Flow, Link};

/// Errors surfaced by the link store and its collaborators.
#[derive(thiserror::Error, Debug)]
pub enum LinkError {
    /// The maximum representable inner reference has been handed out.
    #[error("links limit reached: cannot allocate beyond {limit}")]
    CapacityExhausted {
        /// Highest index the identifier type can address.
        limit: u64,
    },
    /// A restriction list had a length outside `0..=3`.
    #[error("restriction of length {len} is not supported")]
    UnsupportedRestriction {
        /// Length of the rejected restriction list.
        len: usize,
    },
    /// The addressed link is not allocated.
    #[error("link {0} does not exist")]
    NotExists(u64),
    /// The backing region could not grow to the requested size.
    #[error("memory region cannot grow to {requested} bytes")]
    MemoryGrowth {
        /// Reserved capacity that was requested, in bytes.
        requested: u64,
    },
    /// Underlying I/O failure.
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// Persisted structures failed validation.
    #[error("corruption: {0}")]
    Corruption(&'static str),
    /// Malformed argument.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LinkError>;
