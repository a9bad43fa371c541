// SPDX-License-Identifier: Apache-2.0

mod file_id;
mod finder;
mod fingerprint;
mod reader;

pub use file_id::{UNKNOWN_INODE, inode_changed, inode_of};
pub use finder::{FileFinder, MissingTarget, Resolution, absolute_path};
pub use fingerprint::{FINGERPRINT_SIZE, Fingerprint, fingerprints_match};
pub use reader::{FileReader, ReadError, ReadOutcome, commit_complete_lines};
