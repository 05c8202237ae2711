//! Payload Compression
//!
//! LZ4 block compression for values sent to the remote tier. Compressed
//! payloads are tagged with [`FLAG_COMPRESSED`] in the memcached item flags so
//! any reader can tell them apart.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use tiercache::cache::compression::PayloadCompressor;
//!
//! let compressor = PayloadCompressor::new(true, 16);
//!
//! let data = Bytes::from("Hello, this is test data that should compress well! ".repeat(8));
//! let (packed, flags) = compressor.pack(data.clone());
//!
//! let unpacked = compressor.unpack(packed, flags).unwrap();
//! assert_eq!(unpacked, data);
//! ```

use bytes::Bytes;

use super::config::CacheSettings;
use crate::error::{Error, Result};

/// Item flag bit marking an LZ4-compressed payload
pub const FLAG_COMPRESSED: u32 = 0x2;

/// LZ4 compression level
const LZ4_LEVEL: i32 = 4;

/// Compresses outgoing payloads and restores incoming ones
#[derive(Debug, Clone)]
pub struct PayloadCompressor {
    /// Compression tunable
    enabled: bool,
    /// Minimum size to compress (smaller payloads are sent as-is)
    threshold: usize,
}

impl PayloadCompressor {
    /// Create a compressor
    pub fn new(enabled: bool, threshold: usize) -> Self {
        Self { enabled, threshold }
    }

    /// Create from cache settings
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(settings.compression, settings.compression_threshold)
    }

    /// Whether compression is switched on
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Prepare a payload for storage.
    ///
    /// Returns the bytes to send and the item flags. Falls back to the
    /// uncompressed payload when compression is off, the payload is small,
    /// compression fails, or the result would not be smaller.
    pub fn pack(&self, data: Bytes) -> (Bytes, u32) {
        self.pack_with(data, self.enabled)
    }

    /// Like [`pack`](Self::pack) with a per-call compression switch
    pub fn pack_with(&self, data: Bytes, compress: bool) -> (Bytes, u32) {
        if !compress || data.len() < self.threshold {
            return (data, 0);
        }

        match lz4_compress(&data) {
            Ok(compressed) if compressed.len() < data.len() => {
                (Bytes::from(compressed), FLAG_COMPRESSED)
            }
            Ok(_) => (data, 0),
            Err(e) => {
                tracing::warn!("Compression failed, using uncompressed: {}", e);
                (data, 0)
            }
        }
    }

    /// Restore a payload read from storage
    pub fn unpack(&self, data: Bytes, flags: u32) -> Result<Bytes> {
        if flags & FLAG_COMPRESSED == 0 {
            return Ok(data);
        }
        lz4_decompress(&data).map(Bytes::from)
    }
}

impl Default for PayloadCompressor {
    fn default() -> Self {
        Self::new(true, super::DEFAULT_COMPRESSION_THRESHOLD)
    }
}

fn lz4_compress(data: &[u8]) -> Result<Vec<u8>> {
    lz4::block::compress(
        data,
        Some(lz4::block::CompressionMode::HIGHCOMPRESSION(LZ4_LEVEL)),
        true,
    )
    .map_err(|e| Error::CompressionFailed {
        algorithm: "LZ4".into(),
        reason: e.to_string(),
    })
}

fn lz4_decompress(data: &[u8]) -> Result<Vec<u8>> {
    lz4::block::decompress(data, None).map_err(|e| Error::DecompressionFailed {
        algorithm: "LZ4".into(),
        reason: e.to_string(),
    })
}
