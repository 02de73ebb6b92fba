#![forbid(unsafe_code)]
//! Resizable byte regions that back a link store.
//!
//! A region exposes two capacities: `reserved` is how many bytes are backed
//! and addressable, `used` is how many of them the owner considers live.
//! Growing `reserved` preserves existing bytes and zero-fills the new tail.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::primitives::io::{FileIo, StdFileIo};
use crate::types::{LinkError, Result};

/// A contiguous, growable byte region.
pub trait ResizableMemory {
    /// Bytes the owner considers in use.
    fn used_capacity(&self) -> u64;

    /// Records how many bytes are in use. Must not exceed the reserved capacity.
    fn set_used_capacity(&mut self, bytes: u64) -> Result<()>;

    /// Bytes currently backed and addressable through [`ResizableMemory::bytes`].
    fn reserved_capacity(&self) -> u64;

    /// Grows (or shrinks, down to the used capacity) the backed region.
    fn set_reserved_capacity(&mut self, bytes: u64) -> Result<()>;

    /// The whole reserved region.
    fn bytes(&self) -> &[u8];

    /// The whole reserved region, mutably.
    fn bytes_mut(&mut self) -> &mut [u8];

    /// Persists the region if it has a durable backing. No-op otherwise.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

fn check_used(used: u64, reserved: u64) -> Result<()> {
    if used > reserved {
        return Err(LinkError::Invalid(
            "used capacity exceeds reserved capacity",
        ));
    }
    Ok(())
}

fn resize_buffer(buf: &mut Vec<u8>, used: u64, bytes: u64) -> Result<()> {
    if bytes < used {
        return Err(LinkError::Invalid(
            "reserved capacity cannot drop below used capacity",
        ));
    }
    let target = usize::try_from(bytes).map_err(|_| LinkError::MemoryGrowth { requested: bytes })?;
    if target > buf.len() {
        buf.try_reserve_exact(target - buf.len())
            .map_err(|_| LinkError::MemoryGrowth { requested: bytes })?;
    }
    buf.resize(target, 0);
    Ok(())
}

/// Region held in process memory.
#[derive(Debug, Default)]
pub struct HeapMemory {
    buf: Vec<u8>,
    used: u64,
}

impl HeapMemory {
    /// Creates an empty region. The store reserves its first step on open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a region with `bytes` reserved up front.
    pub fn with_reserved(bytes: u64) -> Result<Self> {
        let mut memory = Self::new();
        memory.set_reserved_capacity(bytes)?;
        Ok(memory)
    }
}

impl ResizableMemory for HeapMemory {
    fn used_capacity(&self) -> u64 {
        self.used
    }

    fn set_used_capacity(&mut self, bytes: u64) -> Result<()> {
        check_used(bytes, self.reserved_capacity())?;
        self.used = bytes;
        Ok(())
    }

    fn reserved_capacity(&self) -> u64 {
        self.buf.len() as u64
    }

    fn set_reserved_capacity(&mut self, bytes: u64) -> Result<()> {
        resize_buffer(&mut self.buf, self.used, bytes)
    }

    fn bytes(&self) -> &[u8] {
        &self.buf
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

/// Region mirrored from a file.
///
/// The file is read into memory on open; every reserved-capacity change is
/// applied to the file length immediately and the contents are written back on
/// [`ResizableMemory::flush`] or drop.
///
/// A flush after any mutation rewrites and syncs the whole region, so its cost
/// grows with the reserved size rather than with the bytes changed. Flushing a
/// clean region does no I/O.
pub struct FileMemory {
    io: StdFileIo,
    path: PathBuf,
    buf: Vec<u8>,
    used: u64,
    dirty: bool,
}

impl FileMemory {
    /// Opens (or creates) the file at `path` as a region.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let io = StdFileIo::open(&path)?;
        let len = io.len()?;
        let size = usize::try_from(len).map_err(|_| LinkError::MemoryGrowth { requested: len })?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(size)
            .map_err(|_| LinkError::MemoryGrowth { requested: len })?;
        buf.resize(size, 0);
        if size > 0 {
            io.read_at(0, &mut buf)?;
        }
        info!(path = %path.display(), bytes = len, "memory.file.open");
        Ok(Self {
            io,
            path,
            buf,
            used: 0,
            dirty: false,
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResizableMemory for FileMemory {
    fn used_capacity(&self) -> u64 {
        self.used
    }

    fn set_used_capacity(&mut self, bytes: u64) -> Result<()> {
        check_used(bytes, self.reserved_capacity())?;
        self.used = bytes;
        Ok(())
    }

    fn reserved_capacity(&self) -> u64 {
        self.buf.len() as u64
    }

    fn set_reserved_capacity(&mut self, bytes: u64) -> Result<()> {
        resize_buffer(&mut self.buf, self.used, bytes)?;
        self.io.truncate(bytes)?;
        self.dirty = true;
        debug!(path = %self.path.display(), bytes, "memory.file.resize");
        Ok(())
    }

    fn bytes(&self) -> &[u8] {
        &self.buf
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self.dirty = true;
        &mut self.buf
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.io.write_at(0, &self.buf)?;
        self.io.sync_all()?;
        self.dirty = false;
        debug!(path = %self.path.display(), bytes = self.buf.len(), "memory.file.flush");
        Ok(())
    }
}

impl Drop for FileMemory {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            warn!(path = %self.path.display(), error = %err, "memory.file.flush_on_drop_failed");
        }
    }
}
