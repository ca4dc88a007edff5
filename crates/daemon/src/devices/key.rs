//! Device key material.

use std::fmt;

use rand::RngCore;
use thiserror::Error;

/// Size in bytes of freshly generated keys.
pub const KEY_BYTES: usize = 32;

/// Opaque key material shared between the host and a device.
///
/// The store only cares whether a key record exists; the bytes are never
/// interpreted. On disk a key is its lowercase hex encoding followed by a
/// newline.
#[derive(Clone, PartialEq, Eq)]
pub struct Key {
    data: Vec<u8>,
}

/// Error returned when a key file cannot be decoded.
#[derive(Debug, Error)]
pub enum KeyDecodeError {
    /// The file holds no key material.
    #[error("key file is empty")]
    Empty,
    /// The contents are not valid hex.
    #[error("malformed key: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl Key {
    /// Generates a new random key of [`KEY_BYTES`] bytes.
    pub fn generate() -> Self {
        let mut data = vec![0u8; KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut data);
        Self { data }
    }

    /// Wraps existing key material.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Lowercase hex of the key bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.data)
    }

    /// Encodes the key for its on-disk record.
    pub fn encode(&self) -> String {
        let mut out = self.to_hex();
        out.push('\n');
        out
    }

    /// Decodes an on-disk key record. Surrounding whitespace is ignored.
    pub fn decode(contents: &str) -> Result<Self, KeyDecodeError> {
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            return Err(KeyDecodeError::Empty);
        }
        Ok(Self {
            data: hex::decode(trimmed)?,
        })
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("len", &self.data.len())
            .finish_non_exhaustive()
    }
}
