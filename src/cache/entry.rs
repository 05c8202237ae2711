//! Cache Entry Types
//!
//! Values travel through both tiers as JSON-encoded bytes. The local tier also
//! needs to remember keys the remote tier confirmed missing, which is what
//! [`LocalEntry::Absent`] is for.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::MAX_KEY_LENGTH;
use crate::error::{Error, Result};

/// What the local tier knows about a key.
///
/// A key with no `LocalEntry` has never been looked up. `Absent` is a recorded
/// miss, which is not the same thing as an empty or zero value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalEntry {
    /// Encoded value seen on (or written to) the remote tier
    Present(Bytes),
    /// Remote tier had nothing for this key
    Absent,
}

impl LocalEntry {
    /// Encoded value, if any
    pub fn value(&self) -> Option<&Bytes> {
        match self {
            LocalEntry::Present(data) => Some(data),
            LocalEntry::Absent => None,
        }
    }

    /// Whether this is a recorded miss
    pub fn is_absent(&self) -> bool {
        matches!(self, LocalEntry::Absent)
    }
}

impl From<Option<Bytes>> for LocalEntry {
    fn from(lookup: Option<Bytes>) -> Self {
        match lookup {
            Some(data) => LocalEntry::Present(data),
            None => LocalEntry::Absent,
        }
    }
}

/// Encode a value for storage
pub fn encode_value<V: Serialize + ?Sized>(value: &V) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

/// Decode a stored value
pub fn decode_value<V: DeserializeOwned>(data: &[u8]) -> Result<V> {
    Ok(serde_json::from_slice(data)?)
}

/// Check that a key can be sent over the memcached text protocol.
pub fn validate_key(key: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.is_empty() {
        return Err(invalid("empty key"));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(invalid("longer than 250 bytes"));
    }
    if key.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control()) {
        return Err(invalid("contains whitespace or control characters"));
    }

    Ok(())
}

/// Fast non-cryptographic hash (FxHash algorithm), used to pick a server.
#[inline]
pub fn fx_hash(bytes: &[u8]) -> u64 {
    const SEED: u64 = 0x517cc1b727220a95;
    let mut hash = SEED;
    for &byte in bytes {
        hash = hash.rotate_left(5) ^ (byte as u64);
        hash = hash.wrapping_mul(SEED);
    }
    hash
}
