//! Content-addressed hashing for artifacts and checkpoints.

use serde::{de::Visitor, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A 256-bit BLAKE3 content hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

/// Errors constructing or parsing a [`ContentHash`].
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// The byte slice was not exactly 32 bytes long.
    #[error("invalid hash length: expected 32 bytes, got {actual}")]
    InvalidLength {
        /// Number of bytes actually supplied.
        actual: usize,
    },
    /// The hex string could not be decoded.
    #[error("invalid hex encoding: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

impl ContentHash {
    /// The all-zero hash, used as a sentinel default.
    pub const ZERO: ContentHash = ContentHash([0u8; 32]);

    /// Compute the hash of raw bytes.
    #[must_use]
    pub fn compute(bytes: &[u8]) -> Self {
        let digest = blake3::hash(bytes);
        Self(*digest.as_bytes())
    }

    /// Compute the hash of any serializable value via its canonical JSON encoding.
    pub fn compute_serializable<T: Serialize>(value: &T) -> Result<Self, HashError> {
        let bytes = serde_json::to_vec(value).map_err(|_| HashError::InvalidLength { actual: 0 })?;
        Ok(Self::compute(&bytes))
    }

    /// Build a hash from an exact 32-byte slice.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, HashError> {
        if bytes.len() != 32 {
            return Err(HashError::InvalidLength {
                actual: bytes.len(),
            });
        }
        let mut buf = [0u8; 32];
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }

    /// Borrow the raw 32 bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 8 hex characters, useful in log lines.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Whether this is the sentinel zero hash.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl Default for ContentHash {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for ContentHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

struct ContentHashVisitor;

impl<'de> Visitor<'de> for ContentHashVisitor {
    type Value = ContentHash;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a 32-byte content hash, hex-encoded or raw")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
        ContentHash::from_str(v).map_err(E::custom)
    }

    fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        ContentHash::from_slice(v).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_str(ContentHashVisitor)
        } else {
            deserializer.deserialize_bytes(ContentHashVisitor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_is_deterministic() {
        let a = ContentHash::compute(b"hello");
        let b = ContentHash::compute(b"hello");
        assert_eq!(a, b);
    }

    #[test]
    fn different_input_different_hash() {
        assert_ne!(ContentHash::compute(b"a"), ContentHash::compute(b"b"));
    }

    #[test]
    fn round_trips_through_display_and_from_str() {
        let h = ContentHash::compute(b"round trip");
        let s = h.to_string();
        let parsed: ContentHash = s.parse().unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn round_trips_through_json() {
        let h = ContentHash::compute(b"json");
        let json = serde_json::to_string(&h).unwrap();
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert!(matches!(
            ContentHash::from_slice(&[0u8; 4]),
            Err(HashError::InvalidLength { actual: 4 })
        ));
    }

    #[test]
    fn zero_is_zero() {
        assert!(ContentHash::ZERO.is_zero());
        assert!(!ContentHash::compute(b"x").is_zero());
    }
}
