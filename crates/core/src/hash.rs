//! Content version hash type and utilities.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A SHA-256 content hash represented as 32 bytes.
///
/// This is the canonical content address of an artifact. The wire and
/// database representation is the lowercase hex encoding (64 characters).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionHash([u8; 32]);

impl VersionHash {
    /// Create a new VersionHash from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Compute the SHA-256 hash of data.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Create an incremental hasher.
    pub fn hasher() -> VersionHasher {
        VersionHasher(Sha256::new())
    }

    /// Parse from a hex string (either case accepted, 64 chars required).
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        if s.len() != 64 {
            return Err(crate::Error::InvalidHash(format!(
                "expected 64 hex chars, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hex_str =
                std::str::from_utf8(chunk).map_err(|e| crate::Error::InvalidHash(e.to_string()))?;
            bytes[i] = u8::from_str_radix(hex_str, 16)
                .map_err(|e| crate::Error::InvalidHash(e.to_string()))?;
        }
        Ok(Self(bytes))
    }

    /// Encode as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for VersionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for VersionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Incremental SHA-256 hasher.
pub struct VersionHasher(Sha256);

impl VersionHasher {
    /// Update the hasher with data.
    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> VersionHash {
        VersionHash(self.0.finalize().into())
    }
}

impl Default for VersionHasher {
    fn default() -> Self {
        VersionHash::hasher()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let hash = VersionHash::compute(b"hello world");

        let hex = hash.to_hex();
        assert_eq!(hex.len(), 64);
        let parsed = VersionHash::from_hex(&hex).unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn test_known_vector() {
        // sha256("abc")
        let hash = VersionHash::compute(b"abc");
        assert_eq!(
            hash.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_uppercase_hex_normalized() {
        let hash = VersionHash::compute(b"abc");
        let upper = hash.to_hex().to_uppercase();
        let parsed = VersionHash::from_hex(&upper).unwrap();
        assert_eq!(hash, parsed);
        assert_eq!(parsed.to_hex(), hash.to_hex());
    }

    #[test]
    fn test_invalid_hex_rejected() {
        assert!(VersionHash::from_hex("abc").is_err());
        assert!(VersionHash::from_hex(&"z".repeat(64)).is_err());
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let mut hasher = VersionHash::hasher();
        hasher.update(b"hello ");
        hasher.update(b"world");
        assert_eq!(hasher.finalize(), VersionHash::compute(b"hello world"));
    }
}
