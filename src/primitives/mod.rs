//! Low-level primitives underneath the link store.
//!
//! Includes byte utilities, positioned file I/O, resizable memory regions
//! and the append-only transition log.

/// Byte-level field encoding.
pub mod bytes;

/// Positioned file I/O.
pub mod io;

/// Growable byte regions backing a store.
pub mod memory;

/// Append-only log of link transitions.
pub mod wal;
