// SPDX-License-Identifier: Apache-2.0

//! On-disk schema for per-path position state.
//!
//! The state file is a single JSON object mapping absolute file paths to
//! their [`FileState`]:
//!
//! ```json
//! {
//!   "/var/log/app.log": { "offset": 1024, "inode": 393219, "fingerprint": "323032..." }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::checks::logfile::input::Fingerprint;

/// Position and identity of one monitored file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    /// Raw bytes already consumed
    pub offset: i64,
    /// Platform file identity, 0 when unknown
    #[serde(default)]
    pub inode: u64,
    /// Hex of the first bytes of the file when last observed
    #[serde(default)]
    pub fingerprint: Fingerprint,
}

impl FileState {
    pub fn new(offset: u64, inode: u64, fingerprint: Fingerprint) -> Self {
        Self {
            offset: offset_to_i64(offset),
            inode,
            fingerprint,
        }
    }

    /// Offset as an unsigned byte position. Negative values read from a
    /// hand-edited state file count as 0.
    pub fn position(&self) -> u64 {
        u64::try_from(self.offset).unwrap_or(0)
    }

    pub fn set_position(&mut self, offset: u64) {
        self.offset = offset_to_i64(offset);
    }
}

fn offset_to_i64(offset: u64) -> i64 {
    i64::try_from(offset).unwrap_or(i64::MAX)
}

/// Full persisted map, ordered for stable output.
pub type StateMap = BTreeMap<String, FileState>;
