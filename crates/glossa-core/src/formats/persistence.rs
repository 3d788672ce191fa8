//! # Binary Framing
//!
//! Header and MessagePack payload for the `msgpack.gz` snapshot format.
//!
//! Format: Header (5 bytes) + MessagePack-encoded snapshot.
//! - 4 bytes: Magic ("GLSA")
//! - 1 byte: Version
//!
//! Compression is applied around the framed bytes by the snapshot layer.
//! The size limit and the header are checked before the payload is decoded.

use crate::GlossaError;
use crate::primitives::{FORMAT_VERSION, HEADER_LEN, MAGIC_BYTES, MAX_SNAPSHOT_SIZE};
use serde::Serialize;
use serde::de::DeserializeOwned;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The header that precedes every binary payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    /// Create a new header with the current framing version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *MAGIC_BYTES,
            version: FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), GlossaError> {
        if &self.magic != MAGIC_BYTES {
            return Err(GlossaError::Deserialization(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != FORMAT_VERSION {
            return Err(GlossaError::Deserialization(format!(
                "Unsupported version: {} (expected {})",
                self.version, FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GlossaError> {
        if bytes.len() < HEADER_LEN {
            return Err(GlossaError::Deserialization(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// PAYLOAD
// =============================================================================

/// Encode a value as header + MessagePack with named struct fields.
///
/// Field names are kept so the payload stays self-describing: unknown
/// fields are skipped on load and internally tagged entities decode.
pub fn payload_to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, GlossaError> {
    let payload =
        rmp_serde::to_vec_named(value).map_err(|e| GlossaError::Serialization(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_LEN + payload.len());
    result.extend_from_slice(&SnapshotHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Decode header + MessagePack bytes.
///
/// The size limit and the header are checked first; nothing is decoded
/// from a payload that fails either check.
pub fn payload_from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, GlossaError> {
    if bytes.len() < HEADER_LEN {
        return Err(GlossaError::Deserialization(format!(
            "Data too short: minimum {} bytes required",
            HEADER_LEN
        )));
    }
    if bytes.len() as u64 > MAX_SNAPSHOT_SIZE {
        return Err(GlossaError::Deserialization(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_SIZE
        )));
    }

    SnapshotHeader::from_bytes(bytes)?.validate()?;

    rmp_serde::from_slice(&bytes[HEADER_LEN..]).map_err(|e| {
        GlossaError::Deserialization(format!("Failed to decode snapshot payload: {}", e))
    })
}

// =============================================================================
// TESTS
// =============================================================================
