use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

/// Random access to a byte source.
///
/// The TIFF parser only ever asks for small, scattered ranges (headers, IFDs,
/// offset tables, single tiles), so slides are never loaded whole.
#[async_trait]
pub trait RangeReader: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Returns an error if the range is out of bounds or if the read fails.
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError>;

    /// Total size of the resource in bytes.
    fn size(&self) -> u64;

    /// Human readable identifier, used in log lines.
    fn identifier(&self) -> &str;
}

/// Bounds check for a read of `len` bytes at `offset` from a source of
/// `size` bytes. Ranges whose end does not fit in a u64 are out of bounds.
pub fn check_range(offset: u64, len: usize, size: u64) -> Result<(), IoError> {
    offset
        .checked_add(len as u64)
        .filter(|end| *end <= size)
        .map(|_| ())
        .ok_or(IoError::RangeOutOfBounds {
            offset,
            requested: len as u64,
            size,
        })
}

// =============================================================================
// Endian Helpers
// =============================================================================
//
// Callers guarantee the slice length; these panic on short input.

#[inline]
pub fn read_u16_le(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

#[inline]
pub fn read_u16_be(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

#[inline]
pub fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[inline]
pub fn read_u32_be(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[inline]
pub fn read_u64_le(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

#[inline]
pub fn read_u64_be(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(buf)
}
