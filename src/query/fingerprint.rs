//! Deterministic content fingerprints.
//!
//! Queries and records are identified by a SHA-1 digest over a canonical
//! byte encoding of their stable fields. The fingerprint itself is never
//! part of the hashed content, so it can be recomputed from the fields at
//! any time and used as a stable identity key across processes.

use sha1::{Digest, Sha1};

/// Byte separating a field name from its value in the canonical encoding.
const UNIT_SEP: u8 = 0x1f;

/// Byte terminating a field in the canonical encoding.
const FIELD_SEP: u8 = 0x1e;

/// Incremental hasher producing a 40-hex SHA-1 fingerprint.
///
/// Callers feed named fields in a canonical order (sorted by name for
/// map-like data, declaration order for fixed-shape records). Separator
/// bytes make the encoding unambiguous: `("ab", "c")` and `("a", "bc")`
/// hash differently.
#[derive(Debug, Default)]
pub(crate) struct FingerprintHasher {
    hasher: Sha1,
}

impl FingerprintHasher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feeds one named field into the digest.
    pub(crate) fn field(&mut self, name: &str, value: &str) {
        self.hasher.update(name.as_bytes());
        self.hasher.update([UNIT_SEP]);
        self.hasher.update(value.as_bytes());
        self.hasher.update([FIELD_SEP]);
    }

    /// Finalizes the digest into a lowercase 40-hex string.
    pub(crate) fn finish(self) -> String {
        hex_encode(&self.hasher.finalize())
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}
