#![forbid(unsafe_code)]
//! Append-only log of link transitions.
//!
//! The file starts with a fixed header followed by fixed-size frames. Each
//! frame records one create, update or delete as the link's state before and
//! after the operation, and carries a CRC32 salted with its sequence number.
//! Opening a log validates the frames and truncates a torn or corrupt tail.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::primitives::bytes::{get_u32_le, get_u64_le, put_u32_le, put_u64_le};
use crate::primitives::io::{FileIo, StdFileIo};
use crate::types::{Link, LinkError, Result};

const LOG_MAGIC: [u8; 4] = *b"DBLT";
const LOG_FORMAT_VERSION: u16 = 1;
const FILE_HEADER_LEN: usize = 16;
const FRAME_PAYLOAD_LEN: usize = 6 * 8;
/// Encoded size of one frame: sequence, payload, CRC32.
pub const FRAME_LEN: usize = 8 + FRAME_PAYLOAD_LEN + 4;

/// Configuration options for opening a [`TransitionLog`].
#[derive(Clone, Debug)]
pub struct LogOptions {
    /// Identifier width of the store the log belongs to, in bytes. A log is
    /// rejected when reopened for a different width.
    pub address_bytes: u32,
    /// Fsync after every append.
    pub sync_on_append: bool,
}

impl LogOptions {
    /// Creates options for a store with `address_bytes`-wide identifiers.
    pub fn new(address_bytes: u32) -> Self {
        Self {
            address_bytes,
            sync_on_append: false,
        }
    }

    /// Sets whether every append is followed by an fsync.
    pub fn sync_on_append(mut self, sync: bool) -> Self {
        self.sync_on_append = sync;
        self
    }
}

/// What a [`Transition`] did to its link.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransitionKind {
    /// The link came into existence.
    Create,
    /// The link's value changed.
    Update,
    /// The link was removed.
    Delete,
}

/// One logged operation. A null `before` index marks a create and a null
/// `after` index marks a delete.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Transition {
    /// Position in the log, starting at 1.
    pub seq: u64,
    /// State of the link before the operation.
    pub before: Link<u64>,
    /// State of the link after the operation.
    pub after: Link<u64>,
}

impl Transition {
    /// Classifies the transition.
    pub fn kind(&self) -> TransitionKind {
        match (self.before.index, self.after.index) {
            (0, _) => TransitionKind::Create,
            (_, 0) => TransitionKind::Delete,
            _ => TransitionKind::Update,
        }
    }

    fn encode(&self) -> [u8; FRAME_LEN] {
        let mut buf = [0u8; FRAME_LEN];
        put_u64_le(&mut buf[0..8], self.seq);
        let values = self.before.as_array().into_iter().chain(self.after.as_array());
        for (slot, value) in values.enumerate() {
            let offset = 8 + slot * 8;
            put_u64_le(&mut buf[offset..offset + 8], value);
        }
        let crc = frame_crc32(self.seq, &buf[8..8 + FRAME_PAYLOAD_LEN]);
        put_u32_le(&mut buf[8 + FRAME_PAYLOAD_LEN..], crc);
        buf
    }

    fn decode(src: &[u8]) -> Result<Self> {
        if src.len() < FRAME_LEN {
            return Err(LinkError::Corruption("log frame truncated"));
        }
        let seq = get_u64_le(&src[0..8]);
        let payload = &src[8..8 + FRAME_PAYLOAD_LEN];
        let stored_crc = get_u32_le(&src[8 + FRAME_PAYLOAD_LEN..FRAME_LEN]);
        if frame_crc32(seq, payload) != stored_crc {
            return Err(LinkError::Corruption("log frame crc mismatch"));
        }
        let value = |slot: usize| get_u64_le(&payload[slot * 8..slot * 8 + 8]);
        Ok(Self {
            seq,
            before: Link::new(value(0), value(1), value(2)),
            after: Link::new(value(3), value(4), value(5)),
        })
    }
}

/// CRC32 over a frame payload, salted with the sequence number so a frame
/// copied to another position fails validation.
fn frame_crc32(seq: u64, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&seq.to_le_bytes());
    hasher.update(payload);
    hasher.finalize()
}

fn encode_header(address_bytes: u32) -> [u8; FILE_HEADER_LEN] {
    let mut buf = [0u8; FILE_HEADER_LEN];
    buf[0..4].copy_from_slice(&LOG_MAGIC);
    buf[4..6].copy_from_slice(&LOG_FORMAT_VERSION.to_le_bytes());
    put_u32_le(&mut buf[8..12], address_bytes);
    let crc = crc32fast::hash(&buf[0..12]);
    put_u32_le(&mut buf[12..16], crc);
    buf
}

fn decode_header(src: &[u8]) -> Result<u32> {
    if src.len() < FILE_HEADER_LEN {
        return Err(LinkError::Corruption("log header truncated"));
    }
    if src[0..4] != LOG_MAGIC {
        return Err(LinkError::Corruption("log magic mismatch"));
    }
    if src[4..6] != LOG_FORMAT_VERSION.to_le_bytes() {
        return Err(LinkError::Corruption("log format version mismatch"));
    }
    if src[6..8] != [0, 0] {
        return Err(LinkError::Corruption("log reserved header bytes non-zero"));
    }
    if crc32fast::hash(&src[0..12]) != get_u32_le(&src[12..16]) {
        return Err(LinkError::Corruption("log header crc mismatch"));
    }
    Ok(get_u32_le(&src[8..12]))
}

/// Counters for a [`TransitionLog`] since it was opened.
#[derive(Clone, Debug, Default)]
pub struct LogStats {
    /// Frames appended.
    pub frames_appended: u64,
    /// Sync operations performed.
    pub syncs: u64,
    /// Bytes dropped from a torn tail on open.
    pub truncated_bytes: u64,
}

struct LogState {
    append_offset: u64,
    next_seq: u64,
    stats: LogStats,
}

/// Append-only transition log backed by a single file.
pub struct TransitionLog {
    io: Arc<dyn FileIo>,
    options: LogOptions,
    state: Mutex<LogState>,
}

impl TransitionLog {
    /// Opens (or creates) the log at `path`.
    pub fn open(path: impl AsRef<Path>, options: LogOptions) -> Result<Self> {
        let io = StdFileIo::open(path.as_ref())?;
        Self::with_io(Arc::new(io), options)
    }

    /// Opens a log over an existing file handle.
    pub fn with_io(io: Arc<dyn FileIo>, options: LogOptions) -> Result<Self> {
        let len = io.len()?;
        if len < FILE_HEADER_LEN as u64 {
            io.write_at(0, &encode_header(options.address_bytes))?;
            io.truncate(FILE_HEADER_LEN as u64)?;
            io.sync_all()?;
        } else {
            let mut buf = [0u8; FILE_HEADER_LEN];
            io.read_at(0, &mut buf)?;
            if decode_header(&buf)? != options.address_bytes {
                return Err(LinkError::Corruption("log address width mismatch"));
            }
        }

        let len = io.len()?;
        let mut offset = FILE_HEADER_LEN as u64;
        let mut next_seq = 1u64;
        let mut frame = [0u8; FRAME_LEN];
        while offset + FRAME_LEN as u64 <= len {
            io.read_at(offset, &mut frame)?;
            match Transition::decode(&frame) {
                Ok(transition) if transition.seq == next_seq => {
                    next_seq += 1;
                    offset += FRAME_LEN as u64;
                }
                _ => break,
            }
        }
        let mut stats = LogStats::default();
        if offset < len {
            stats.truncated_bytes = len - offset;
            warn!(valid_up_to = offset, len, "wal.truncate_tail");
            io.truncate(offset)?;
            io.sync_all()?;
        }
        info!(frames = next_seq - 1, "wal.open");
        Ok(Self {
            io,
            options,
            state: Mutex::new(LogState {
                append_offset: offset,
                next_seq,
                stats,
            }),
        })
    }

    /// Appends one transition and returns its sequence number.
    pub fn append(&self, before: Link<u64>, after: Link<u64>) -> Result<u64> {
        let mut state = self.state.lock();
        let transition = Transition {
            seq: state.next_seq,
            before,
            after,
        };
        self.io.write_at(state.append_offset, &transition.encode())?;
        state.append_offset += FRAME_LEN as u64;
        state.next_seq += 1;
        state.stats.frames_appended += 1;
        if self.options.sync_on_append {
            self.io.sync_all()?;
            state.stats.syncs += 1;
        }
        debug!(seq = transition.seq, kind = ?transition.kind(), "wal.append");
        Ok(transition.seq)
    }

    /// Syncs appended frames to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.io.sync_all()?;
        self.state.lock().stats.syncs += 1;
        Ok(())
    }

    /// Every frame in the log, in order.
    pub fn transitions(&self) -> Result<Vec<Transition>> {
        let end = self.state.lock().append_offset;
        let mut out = Vec::new();
        let mut offset = FILE_HEADER_LEN as u64;
        let mut frame = [0u8; FRAME_LEN];
        while offset < end {
            self.io.read_at(offset, &mut frame)?;
            out.push(Transition::decode(&frame)?);
            offset += FRAME_LEN as u64;
        }
        Ok(out)
    }

    /// Sequence number the next append will receive.
    pub fn next_seq(&self) -> u64 {
        self.state.lock().next_seq
    }

    /// Number of frames in the log.
    pub fn len(&self) -> u64 {
        self.next_seq() - 1
    }

    /// Returns true if the log holds no frames.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counters since open.
    pub fn stats(&self) -> LogStats {
        self.state.lock().stats.clone()
    }

    /// Options the log was opened with.
    pub fn options(&self) -> &LogOptions {
        &self.options
    }
}
