//! Content hashing with blake3.
//!
//! Static data assets are addressed by the hash of their content, so two
//! routes producing identical data share one file.

use std::fmt;

/// A 256-bit blake3 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash arbitrary bytes.
    #[inline]
    pub fn of(data: impl AsRef<[u8]>) -> Self {
        Self(*blake3::hash(data.as_ref()).as_bytes())
    }

    /// Full lowercase hex.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// First `len` hex characters, for file names and table keys.
    pub fn short(self, len: usize) -> String {
        let mut hex = self.to_hex();
        hex.truncate(len.min(64));
        hex
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short(16))
    }
}

/// Short hex digest of `data`, as used in asset file names.
#[inline]
pub fn fingerprint(data: impl AsRef<[u8]>) -> String {
    ContentHash::of(data).short(16)
}
