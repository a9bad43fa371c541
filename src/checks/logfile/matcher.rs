// SPDX-License-Identifier: Apache-2.0

//! Line matching and excerpt rendering.

use std::fmt::Write;

use crate::checks::logfile::decode::truncate_for_display;
use crate::filter::Filter;

/// Include/exclude filter pair. A line matches when it satisfies the include
/// filter and does not satisfy the exclude filter.
#[derive(Debug, Clone)]
pub struct LineMatcher {
    include: Filter,
    exclude: Option<Filter>,
}

impl LineMatcher {
    pub fn new(include: Filter, exclude: Option<Filter>) -> Self {
        Self { include, exclude }
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.include.matches(line) && !self.exclude.as_ref().is_some_and(|f| f.matches(line))
    }

    /// Indexes of all matching lines, in order.
    pub fn matching_indexes(&self, lines: &[String]) -> Vec<usize> {
        lines
            .iter()
            .enumerate()
            .filter(|(_, l)| self.is_match(l))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Display limits for an excerpt.
#[derive(Debug, Clone, Copy)]
pub struct ExcerptOptions {
    pub max_lines: usize,
    pub max_line_length: usize,
    pub context_before: usize,
    pub context_after: usize,
}

impl ExcerptOptions {
    fn has_context(&self) -> bool {
        self.context_before > 0 || self.context_after > 0
    }
}

/// Render the excerpt for `matches` (indexes into `lines`, ascending).
///
/// Only the first `max_lines` matches are shown; a trailing
/// `... and K more lines` marker accounts for the rest.
pub fn render_excerpt(lines: &[String], matches: &[usize], opts: &ExcerptOptions) -> String {
    let shown = &matches[..matches.len().min(opts.max_lines)];
    let mut out = String::new();

    if opts.has_context() {
        render_with_context(lines, matches, shown, opts, &mut out);
    } else {
        for &i in shown {
            push_line(&mut out, "", &lines[i], opts.max_line_length);
        }
    }

    let hidden = matches.len() - shown.len();
    if hidden > 0 {
        let _ = writeln!(out, "... and {} more lines", hidden);
    }

    // no trailing newline in the description
    if out.ends_with('\n') {
        out.pop();
    }
    out
}

fn render_with_context(
    lines: &[String],
    all_matches: &[usize],
    shown: &[usize],
    opts: &ExcerptOptions,
    out: &mut String,
) {
    if lines.is_empty() {
        return;
    }

    let last = lines.len() - 1;
    let ranges = shown.iter().map(|&i| {
        (
            i.saturating_sub(opts.context_before),
            (i + opts.context_after).min(last),
        )
    });

    for (n, (start, end)) in merge_ranges(ranges).into_iter().enumerate() {
        if n > 0 {
            out.push_str("...\n");
        }
        for i in start..=end {
            let prefix = if all_matches.binary_search(&i).is_ok() {
                "> "
            } else {
                "  "
            };
            push_line(out, prefix, &lines[i], opts.max_line_length);
        }
    }
}

/// Merge ascending inclusive ranges that overlap or touch.
pub fn merge_ranges(ranges: impl IntoIterator<Item = (usize, usize)>) -> Vec<(usize, usize)> {
    let mut merged: Vec<(usize, usize)> = Vec::new();
    for (start, end) in ranges {
        match merged.last_mut() {
            Some(prev) if start <= prev.1 + 1 => prev.1 = prev.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

fn push_line(out: &mut String, prefix: &str, line: &str, max_len: usize) {
    out.push_str(prefix);
    out.push_str(&truncate_for_display(line, max_len));
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn opts(max_lines: usize, before: usize, after: usize) -> ExcerptOptions {
        ExcerptOptions {
            max_lines,
            max_line_length: 8192,
            context_before: before,
            context_after: after,
        }
    }

    #[test]
    fn test_include_exclude() {
        let m = LineMatcher::new(
            Filter::compile(&["ERROR"]).unwrap(),
            Some(Filter::compile(&["healthcheck"]).unwrap()),
        );
        assert!(m.is_match("ERROR db down"));
        assert!(!m.is_match("ERROR healthcheck failed"));
        assert!(!m.is_match("INFO ok"));

        let m = LineMatcher::new(Filter::compile(&["ERROR"]).unwrap(), None);
        assert!(m.is_match("ERROR healthcheck failed"));
    }

    #[test]
    fn test_plain_excerpt_with_overflow() {
        let l = lines(&["E1", "ok", "E2", "E3"]);
        let out = render_excerpt(&l, &[0, 2, 3], &opts(2, 0, 0));
        assert_eq!(out, "E1\nE2\n... and 1 more lines");
    }

    #[test]
    fn test_plain_excerpt_truncates_after_matching() {
        let l = lines(&["aaaaaaaaaa ERROR"]);
        let o = ExcerptOptions {
            max_line_length: 4,
            ..opts(10, 0, 0)
        };
        assert_eq!(render_excerpt(&l, &[0], &o), "aaaa...");
    }

    #[test]
    fn test_context_merges_adjacent_blocks() {
        let l = lines(&["a", "E1", "b", "E2", "c", "d", "e", "f", "E3", "g"]);
        let out = render_excerpt(&l, &[1, 3, 8], &opts(10, 1, 0));
        assert_eq!(out, "  a\n> E1\n  b\n> E2\n...\n  f\n> E3");
    }

    #[test]
    fn test_context_clamps_to_bounds() {
        let l = lines(&["E1", "x", "E2"]);
        let out = render_excerpt(&l, &[0, 2], &opts(10, 3, 3));
        assert_eq!(out, "> E1\n  x\n> E2");
    }

    #[test]
    fn test_context_only_first_max_lines_get_blocks() {
        let l = lines(&["E1", "a", "b", "c", "E2", "d"]);
        let out = render_excerpt(&l, &[0, 4], &opts(1, 0, 1));
        assert_eq!(out, "> E1\n  a\n... and 1 more lines");
    }

    #[test]
    fn test_merge_ranges() {
        assert_eq!(merge_ranges(vec![(0, 2), (3, 4)]), vec![(0, 4)]);
        assert_eq!(merge_ranges(vec![(0, 2), (4, 5)]), vec![(0, 2), (4, 5)]);
        assert_eq!(merge_ranges(vec![(0, 5), (1, 2)]), vec![(0, 5)]);
        assert!(merge_ranges(vec![]).is_empty());
    }
}
