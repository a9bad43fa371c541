// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

/// Number of leading bytes that make up a fingerprint.
pub const FINGERPRINT_SIZE: usize = 256;

/// A fingerprint identifies a file by its first bytes, independently of its inode.
///
/// It is stored hex encoded so the persisted state stays human readable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint {
    hex: String,
}

impl Fingerprint {
    /// Read the first `FINGERPRINT_SIZE` bytes of the file (or fewer if it is shorter).
    /// Leaves the file position at the end of the bytes read.
    pub fn new(file: &mut File) -> io::Result<Self> {
        file.seek(SeekFrom::Start(0))?;

        let mut buf = Vec::with_capacity(FINGERPRINT_SIZE);
        file.by_ref()
            .take(FINGERPRINT_SIZE as u64)
            .read_to_end(&mut buf)?;

        Ok(Self::from_bytes(&buf))
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            hex: hex::encode(bytes),
        }
    }

    pub fn as_hex(&self) -> &str {
        &self.hex
    }

    /// Length of the hex encoding (twice the number of raw bytes).
    pub fn len(&self) -> usize {
        self.hex.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hex.is_empty()
    }

    /// Whether `self`, observed now, is a continuation of `stored`.
    ///
    /// True iff `stored` is a prefix of `self` and `self` is at least as long.
    /// The relation is directional: a current fingerprint that is shorter than
    /// the stored one never matches, even if it is a prefix of it.
    pub fn continues(&self, stored: &Fingerprint) -> bool {
        fingerprints_match(self.as_hex(), stored.as_hex())
    }
}

/// Directional prefix law on hex fingerprints: `current` matches `stored` iff
/// `len(current) >= len(stored)` and `stored` is a prefix of `current`.
/// Two empty fingerprints match.
pub fn fingerprints_match(current: &str, stored: &str) -> bool {
    current.len() >= stored.len() && current.as_bytes().starts_with(stored.as_bytes())
}
