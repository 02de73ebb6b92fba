use serde::{Deserialize, Serialize};

use crate::storage::raw::RawLink;
use crate::types::{LinkAddress, LinkError, Result};

/// Link slots added per growth step when no explicit step is configured.
pub const DEFAULT_RESERVATION_LINKS: u64 = 64 * 1024;

/// Configuration options supplied when opening a [`super::MemoryLinks`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinksOptions {
    /// Bytes added to the backing region each time the reserved link slots
    /// run out. Rounded up to whole records; defaults to
    /// [`DEFAULT_RESERVATION_LINKS`] records.
    pub reservation_step: Option<u64>,
}

impl LinksOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the growth step in bytes.
    pub fn reservation_step(mut self, bytes: u64) -> Self {
        self.reservation_step = Some(bytes);
        self
    }

    /// Sets the growth step as a number of link records of width `T`.
    pub fn reservation_links<T: LinkAddress>(self, links: u64) -> Self {
        self.reservation_step(links.saturating_mul(RawLink::<T>::SIZE_IN_BYTES as u64))
    }

    /// Growth step in bytes for links of width `T`, rounded up to whole
    /// records. At least two records are required so every growth leaves room
    /// for the next create.
    pub fn step_in_bytes<T: LinkAddress>(&self) -> Result<u64> {
        let record = RawLink::<T>::SIZE_IN_BYTES as u64;
        let step = self
            .reservation_step
            .unwrap_or(record * DEFAULT_RESERVATION_LINKS);
        let rounded = step
            .div_ceil(record)
            .checked_mul(record)
            .ok_or(LinkError::Invalid("reservation step overflows"))?;
        if rounded < 2 * record {
            return Err(LinkError::Invalid(
                "reservation step must cover at least two links",
            ));
        }
        Ok(rounded)
    }
}
