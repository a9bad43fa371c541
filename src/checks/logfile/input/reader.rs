// SPDX-License-Identifier: Apache-2.0

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("seek to offset {offset} failed: {source}")]
    Seek { offset: u64, source: io::Error },

    #[error("read failed: {0}")]
    Read(io::Error),
}

/// New, complete content read from a file.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Nothing to consume this cycle: either no new bytes, or only an
    /// unterminated trailing line.
    NoNewContent,
    /// Raw bytes ending at a line boundary (or a forced full block).
    /// The offset advances by exactly `bytes.len()`.
    Lines { bytes: Vec<u8> },
}

/// FileReader reads the bytes appended to a file since a given offset,
/// committing only complete lines.
pub struct FileReader<'a> {
    file: &'a mut File,
    max_read_bytes: u64,
}

impl<'a> FileReader<'a> {
    pub fn new(file: &'a mut File, max_read_bytes: u64) -> Self {
        Self {
            file,
            max_read_bytes,
        }
    }

    /// Read at most `max_read_bytes` starting at `offset` of a file whose
    /// current size is `size`.
    pub fn read_new_lines(&mut self, offset: u64, size: u64) -> Result<ReadOutcome, ReadError> {
        let to_read = size.saturating_sub(offset).min(self.max_read_bytes);
        if to_read == 0 {
            return Ok(ReadOutcome::NoNewContent);
        }

        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|source| ReadError::Seek { offset, source })?;

        let mut buf = Vec::with_capacity(to_read as usize);
        self.file
            .by_ref()
            .take(to_read)
            .read_to_end(&mut buf)
            .map_err(ReadError::Read)?;

        Ok(commit_complete_lines(buf, self.max_read_bytes))
    }
}

/// Keep everything up to and including the last newline.
///
/// A buffer without any newline is held back, unless it fills a whole
/// `max_read_bytes` block, in which case it is committed as one line so a
/// single oversized line cannot stall the offset forever.
pub fn commit_complete_lines(mut buf: Vec<u8>, max_read_bytes: u64) -> ReadOutcome {
    if buf.is_empty() {
        return ReadOutcome::NoNewContent;
    }

    match memchr::memrchr(b'\n', &buf) {
        Some(pos) => {
            buf.truncate(pos + 1);
            ReadOutcome::Lines { bytes: buf }
        }
        None if (buf.len() as u64) < max_read_bytes => ReadOutcome::NoNewContent,
        None => ReadOutcome::Lines { bytes: buf },
    }
}
