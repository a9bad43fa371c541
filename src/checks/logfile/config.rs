// SPDX-License-Identifier: Apache-2.0

//! Configuration for the logfile check.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::checks::logfile::decode::LineDecoder;
use crate::checks::logfile::error::{Error, Result};
use crate::event::Severity;

/// Largest accepted value for `context_before` / `context_after`.
pub const MAX_CONTEXT_LINES: usize = 10;

pub const DEFAULT_STATE_DIR: &str = "/var/lib/hostcheck";

/// Where to start reading when a file is first seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartAt {
    /// Read the whole existing content
    Beginning,
    /// Only content appended after the file was first seen
    #[default]
    End,
}

impl FromStr for StartAt {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginning" => Ok(Self::Beginning),
            "end" => Ok(Self::End),
            _ => Err(Error::Config(format!(
                "initial_position must be \"end\" or \"beginning\", got {:?}",
                s
            ))),
        }
    }
}

impl fmt::Display for StartAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Beginning => f.write_str("beginning"),
            Self::End => f.write_str("end"),
        }
    }
}

/// Configuration for one logfile check instance
#[derive(Debug, Clone)]
pub struct LogfileConfig {
    /// Explicit paths and/or glob patterns, in priority order
    pub targets: Vec<String>,
    pub initial_position: StartAt,
    /// Lines must match one of these to be reported
    pub filter_include: Vec<String>,
    /// Lines matching one of these are dropped even when included
    pub filter_exclude: Vec<String>,
    /// Matched lines displayed per event
    pub max_lines: usize,
    /// Bytes read per file per cycle
    pub max_read_bytes: u64,
    /// Display width of a single line, in bytes
    pub max_line_length: usize,
    /// Resolved files processed per cycle
    pub max_targets: usize,
    pub context_before: usize,
    pub context_after: usize,
    /// Text encoding of the monitored files
    pub encoding: String,
    /// Explicit state file; derived from the targets when unset
    pub state_file: Option<PathBuf>,
    /// Directory for derived state files
    pub state_dir: PathBuf,
    /// Wall-clock budget for one gather cycle
    pub gather_timeout: Duration,
    /// Severity of match events
    pub match_severity: Severity,
}

impl Default for LogfileConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            initial_position: StartAt::End,
            filter_include: Vec::new(),
            filter_exclude: Vec::new(),
            max_lines: 10,
            max_read_bytes: 1024 * 1024,
            max_line_length: 8192,
            max_targets: 100,
            context_before: 0,
            context_after: 0,
            encoding: "utf-8".to_string(),
            state_file: None,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            gather_timeout: Duration::from_secs(10),
            match_severity: Severity::Warning,
        }
    }
}

impl LogfileConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.targets.iter().all(|t| t.trim().is_empty()) {
            return Err(Error::Config("targets must not be empty".to_string()));
        }

        if self.filter_include.iter().all(|p| p.is_empty()) {
            return Err(Error::Config("filter_include must not be empty".to_string()));
        }

        if self.context_before > MAX_CONTEXT_LINES || self.context_after > MAX_CONTEXT_LINES {
            return Err(Error::Config(format!(
                "context_before and context_after must be between 0 and {}",
                MAX_CONTEXT_LINES
            )));
        }

        if self.max_lines == 0 {
            return Err(Error::Config("max_lines must be positive".to_string()));
        }

        if self.max_read_bytes == 0 {
            return Err(Error::Config("max_read_bytes must be positive".to_string()));
        }

        if self.max_line_length == 0 {
            return Err(Error::Config("max_line_length must be positive".to_string()));
        }

        if self.max_targets == 0 {
            return Err(Error::Config("max_targets must be positive".to_string()));
        }

        if self.gather_timeout.is_zero() {
            return Err(Error::Config("gather_timeout must be positive".to_string()));
        }

        LineDecoder::for_name(&self.encoding)?;

        Ok(())
    }

    /// The configured state file, or one derived from a hash of the targets so
    /// that instances watching different targets never share position state.
    pub fn state_file_path(&self) -> PathBuf {
        match &self.state_file {
            Some(path) => path.clone(),
            None => self
                .state_dir
                .join(format!("logfile-{}.json", targets_digest(&self.targets))),
        }
    }
}

/// Short, stable digest of a target list.
pub fn targets_digest(targets: &[String]) -> String {
    let mut hasher = Sha256::new();
    for target in targets {
        hasher.update(target.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(&hasher.finalize()[..8])
}
