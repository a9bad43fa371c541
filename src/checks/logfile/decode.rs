// SPDX-License-Identifier: Apache-2.0

//! Turns committed raw bytes into displayable lines.

use std::borrow::Cow;

use encoding_rs::{
    BIG5, EUC_JP, EUC_KR, Encoding, GB18030, GBK, ISO_8859_15, SHIFT_JIS, UTF_8, WINDOWS_1252,
};
use tracing::debug;

use crate::checks::logfile::error::{Error, Result};

/// Marker appended to lines cut for display.
pub const ELLIPSIS: &str = "...";

/// Encoding names accepted in configuration (lowercase), and their codecs.
/// Only ASCII-compatible encodings: line boundaries are found on raw bytes.
const SUPPORTED: &[(&str, &Encoding)] = &[
    ("utf-8", UTF_8),
    ("utf8", UTF_8),
    ("gbk", GBK),
    ("gb2312", GBK),
    ("gb18030", GB18030),
    ("big5", BIG5),
    ("shift_jis", SHIFT_JIS),
    ("sjis", SHIFT_JIS),
    ("euc-jp", EUC_JP),
    ("euc-kr", EUC_KR),
    ("iso-8859-1", WINDOWS_1252),
    ("latin1", WINDOWS_1252),
    ("windows-1252", WINDOWS_1252),
    ("iso-8859-15", ISO_8859_15),
];

/// Decoder for the configured text encoding.
#[derive(Debug, Clone, Copy)]
pub struct LineDecoder {
    encoding: &'static Encoding,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self { encoding: UTF_8 }
    }
}

impl LineDecoder {
    /// Look up an encoding by its configured name (case insensitive).
    pub fn for_name(name: &str) -> Result<Self> {
        let wanted = name.trim().to_ascii_lowercase();
        SUPPORTED
            .iter()
            .find(|(n, _)| *n == wanted)
            .map(|(_, encoding)| Self { encoding })
            .ok_or_else(|| Error::Config(format!("unsupported encoding: {:?}", name)))
    }

    pub fn encoding_name(&self) -> &'static str {
        self.encoding.name()
    }

    /// Decode a raw block into text. UTF-8 (and any block that fails to
    /// decode with the configured codec) is read as lossy UTF-8.
    pub fn decode<'b>(&self, raw: &'b [u8]) -> Cow<'b, str> {
        if self.encoding == UTF_8 {
            return String::from_utf8_lossy(raw);
        }

        match self
            .encoding
            .decode_without_bom_handling_and_without_replacement(raw)
        {
            Some(text) => text,
            None => {
                debug!(
                    encoding = self.encoding.name(),
                    "Decode failed, falling back to raw text"
                );
                String::from_utf8_lossy(raw)
            }
        }
    }

    /// Decode and split into lines.
    pub fn lines(&self, raw: &[u8]) -> Vec<String> {
        split_lines(&self.decode(raw))
    }
}

/// Split on `\n`, dropping the empty element left by a terminating newline
/// and a trailing `\r` on each line.
pub fn split_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
        .collect();

    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

/// Cut `line` to at most `max_len` bytes on a char boundary, appending
/// `...` when anything was removed.
pub fn truncate_for_display(line: &str, max_len: usize) -> Cow<'_, str> {
    if line.len() <= max_len {
        return Cow::Borrowed(line);
    }

    let mut end = max_len;
    while !line.is_char_boundary(end) {
        end -= 1;
    }

    let mut out = String::with_capacity(end + ELLIPSIS.len());
    out.push_str(&line[..end]);
    out.push_str(ELLIPSIS);
    Cow::Owned(out)
}
