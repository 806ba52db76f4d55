use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

/// Trait for reading byte ranges from a container file.
///
/// The catalog builder, byte-range resolver and tile decoder only ever see
/// files through this trait, so none of them load a whole file into memory.
/// Implementations must be thread-safe.
#[async_trait]
pub trait RangeReader: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Returns an error if the range is out of bounds or if the read fails.
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError>;

    /// Get the total size of the resource in bytes.
    fn size(&self) -> u64;

    /// Get a unique identifier for this resource (for logging).
    fn identifier(&self) -> &str;

    /// Read up to `len` bytes starting at `offset`, stopping at end of file.
    ///
    /// Returns an empty buffer when `offset` is at or past the end.
    async fn read_at_most(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let remaining = self.size().saturating_sub(offset);
        let len = (len as u64).min(remaining) as usize;
        if len == 0 {
            return Ok(Bytes::new());
        }
        self.read_exact_at(offset, len).await
    }
}

// =============================================================================
// Endian Helper Functions
// =============================================================================
//
// Encapsulation item tags and RLE segment headers are always little-endian,
// regardless of the transfer syntax of the surrounding data set.

/// Read a little-endian u16 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 2 bytes.
#[inline]
pub fn read_u16_le(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

/// Read a little-endian u32 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 4 bytes.
#[inline]
pub fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
