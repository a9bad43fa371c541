// SPDX-License-Identifier: Apache-2.0

use glob::glob;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::filter::has_glob_meta;

/// A configured target that failed to stat.
#[derive(Debug)]
pub struct MissingTarget {
    pub path: PathBuf,
    pub error: io::Error,
}

/// Outcome of resolving the configured targets for one cycle.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Existing, non-directory files in stable order, capped at `max_targets`
    pub files: Vec<PathBuf>,
    /// Number of files resolved before capping
    pub total: usize,
    /// Every path that currently resolved, including those cut by the cap
    pub matched: HashSet<PathBuf>,
    /// Explicit (non-glob) targets that could not be stat'ed
    pub missing: Vec<MissingTarget>,
}

impl Resolution {
    pub fn overflowed(&self) -> bool {
        self.total > self.files.len()
    }
}

/// FileFinder expands explicit paths and glob patterns into a deduplicated
/// list of files.
#[derive(Debug, Clone)]
pub struct FileFinder {
    targets: Vec<String>,
    explicit: HashSet<PathBuf>,
    max_targets: usize,
}

impl FileFinder {
    pub fn new(targets: Vec<String>, max_targets: usize) -> Self {
        let explicit = targets
            .iter()
            .filter(|t| !has_glob_meta(t))
            .map(|t| absolute_path(Path::new(t)))
            .collect();

        Self {
            targets,
            explicit,
            max_targets,
        }
    }

    /// Whether `path` was configured literally, as opposed to produced by a glob.
    pub fn is_explicit(&self, path: &Path) -> bool {
        self.explicit.contains(path)
    }

    /// Resolve all targets. Malformed glob patterns are logged and contribute
    /// no files.
    pub fn resolve(&self) -> Resolution {
        let mut resolution = Resolution::default();
        let mut ordered = Vec::new();

        for target in &self.targets {
            if has_glob_meta(target) {
                self.expand_glob(target, &mut resolution.matched, &mut ordered);
                continue;
            }

            let path = absolute_path(Path::new(target));
            match fs::metadata(&path) {
                Ok(meta) if meta.is_dir() => {
                    debug!(path = ?path, "Skipping directory target");
                }
                Ok(_) => {
                    if resolution.matched.insert(path.clone()) {
                        ordered.push(path);
                    }
                }
                Err(error) => resolution.missing.push(MissingTarget { path, error }),
            }
        }

        resolution.total = ordered.len();
        ordered.truncate(self.max_targets);
        resolution.files = ordered;
        resolution
    }

    fn expand_glob(&self, pattern: &str, seen: &mut HashSet<PathBuf>, out: &mut Vec<PathBuf>) {
        let matches = match glob(pattern) {
            Ok(m) => m,
            Err(e) => {
                warn!(pattern, error = %e, "Invalid glob pattern, skipping");
                return;
            }
        };

        for entry in matches {
            let path = match entry {
                Ok(p) => absolute_path(&p),
                Err(e) => {
                    debug!(error = %e, "Unreadable glob entry");
                    continue;
                }
            };

            if path.is_dir() {
                continue;
            }

            if seen.insert(path.clone()) {
                out.push(path);
            }
        }
    }
}

/// Make a path absolute relative to the current directory, without touching
/// the filesystem (symlinks are kept as configured).
pub fn absolute_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}
