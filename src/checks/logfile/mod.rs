// SPDX-License-Identifier: Apache-2.0

//! Incremental logfile monitoring.
//!
//! Tails a set of files (explicit paths or glob patterns), remembers a byte
//! offset per file across restarts, and reports newly appended lines that
//! match the configured filters. Rotation is detected through the inode and
//! a fingerprint of the first bytes of each file.

pub mod check;
pub mod config;
pub mod decode;
pub mod error;
pub mod input;
pub mod matcher;
pub mod persistence;

pub use check::{CHECK_NAME, LogfileCheck};
pub use config::{LogfileConfig, StartAt};
pub use error::{Error, Result};
