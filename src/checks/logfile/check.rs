// SPDX-License-Identifier: Apache-2.0

//! The logfile check.
//!
//! Each gather cycle resolves the configured targets, then processes the
//! resolved files one after another while holding the instance lock:
//! - identify the file (inode + fingerprint) and detect rotation
//! - read new, complete lines from the stored offset
//! - decode, match and render an excerpt
//! - emit exactly one event for the file
//!
//! Position state is loaded at init and written back at the end of every
//! cycle that changed it, and once more on shutdown.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::BoxError;
use crate::checks::Check;
use crate::checks::logfile::config::{LogfileConfig, StartAt};
use crate::checks::logfile::decode::LineDecoder;
use crate::checks::logfile::error::Result;
use crate::checks::logfile::input::{
    FileFinder, FileReader, Fingerprint, ReadOutcome, Resolution, UNKNOWN_INODE, inode_changed,
    inode_of,
};
use crate::checks::logfile::matcher::{ExcerptOptions, LineMatcher, render_excerpt};
use crate::checks::logfile::persistence::{FileState, JsonStateStore, StateMap};
use crate::event::{Event, Severity};
use crate::event_queue::EventSender;
use crate::filter::Filter;

pub const CHECK_NAME: &str = "logfile";

/// Target label of the overflow warning.
pub const TARGET_GLOB: &str = "glob";
/// Target label of the cycle timeout marker.
pub const TARGET_GATHER_TIMEOUT: &str = "gather_timeout";

pub const ATTR_MATCHED_LINES: &str = "matched_lines";
pub const ATTR_BYTES_READ: &str = "bytes_read";

/// Everything built from the configuration at init.
struct Runtime {
    finder: FileFinder,
    matcher: LineMatcher,
    decoder: LineDecoder,
    store: JsonStateStore,
    excerpt: ExcerptOptions,
}

#[derive(Default)]
struct Inner {
    runtime: Option<Runtime>,
    states: StateMap,
    /// Set whenever `states` diverges from what is on disk
    dirty: bool,
}

/// Result of identifying a file against its stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    /// Never seen before
    New,
    /// Same stream as last cycle
    Same,
    /// Rotated, truncated or replaced
    Rotated,
}

/// Whether a file with this identity and size is no longer the stream described by `stored`.
pub fn detect_rotation(stored: &FileState, inode: u64, current: &Fingerprint, size: u64) -> bool {
    inode_changed(stored.inode, inode)
        || !current.continues(&stored.fingerprint)
        || size < stored.position()
}

pub struct LogfileCheck {
    config: LogfileConfig,
    inner: Mutex<Inner>,
}

impl LogfileCheck {
    pub fn new(config: LogfileConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Point-in-time copy of the position state.
    pub fn snapshot(&self) -> StateMap {
        self.lock().states.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // states are only mutated by whole-entry assignments
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("Logfile state lock was poisoned, continuing");
            poisoned.into_inner()
        })
    }

    fn build_runtime(&self) -> Result<Runtime> {
        self.config.validate()?;

        let include = Filter::compile(&self.config.filter_include)?;
        let exclude = Filter::compile(&self.config.filter_exclude)?;
        let exclude = (!exclude.is_empty()).then_some(exclude);

        Ok(Runtime {
            finder: FileFinder::new(self.config.targets.clone(), self.config.max_targets),
            matcher: LineMatcher::new(include, exclude),
            decoder: LineDecoder::for_name(&self.config.encoding)?,
            store: JsonStateStore::new(self.config.state_file_path()),
            excerpt: ExcerptOptions {
                max_lines: self.config.max_lines,
                max_line_length: self.config.max_line_length,
                context_before: self.config.context_before,
                context_after: self.config.context_after,
            },
        })
    }

    fn event(&self, target: &str, severity: Severity, description: impl Into<String>) -> Event {
        Event::new(CHECK_NAME, target, severity, description)
    }

    fn run_cycle(&self, inner: &mut Inner, queue: &EventSender) {
        let started = Instant::now();
        let deadline = started + self.config.gather_timeout;

        let Some(rt) = inner.runtime.as_ref() else {
            warn!("Logfile check gathered before a successful init");
            return;
        };

        let resolution = rt.finder.resolve();

        if resolution.overflowed() {
            warn!(
                resolved = resolution.total,
                max_targets = self.config.max_targets,
                "Too many files resolved, truncating"
            );
            queue.send(
                self.event(
                    TARGET_GLOB,
                    Severity::Warning,
                    format!(
                        "targets resolved to {} files, only the first {} are monitored (max_targets)",
                        resolution.total, self.config.max_targets
                    ),
                )
                .with_attribute("resolved", resolution.total)
                .with_attribute("max_targets", self.config.max_targets),
            );
        }

        if remove_stale_states(&mut inner.states, &resolution, &rt.finder) {
            inner.dirty = true;
        }

        for missing in &resolution.missing {
            let target = missing.path.display().to_string();
            if missing.error.kind() == io::ErrorKind::NotFound {
                if inner.states.contains_key(&target) {
                    queue.send(self.event(
                        &target,
                        Severity::Critical,
                        format!("log file {} disappeared", target),
                    ));
                } else {
                    debug!(path = %target, "Log file does not exist yet");
                }
            } else {
                queue.send(self.event(
                    &target,
                    Severity::Critical,
                    format!("log file {} is inaccessible: {}", target, missing.error),
                ));
            }
        }

        let total = resolution.files.len();
        for (n, path) in resolution.files.iter().enumerate() {
            if Instant::now() >= deadline {
                warn!(
                    processed = n,
                    skipped = total - n,
                    "Gather cycle exceeded its time budget"
                );
                queue.send(
                    self.event(
                        TARGET_GATHER_TIMEOUT,
                        Severity::Critical,
                        format!(
                            "gather exceeded {:?} after {} of {} files, the rest are retried next cycle",
                            self.config.gather_timeout, n, total
                        ),
                    )
                    .with_attribute("processed", n)
                    .with_attribute("skipped", total - n),
                );
                break;
            }

            let event = self.process_file(rt, &mut inner.states, &mut inner.dirty, path);
            queue.send(event);
        }

        debug!(
            files = total,
            elapsed = ?started.elapsed(),
            "Logfile gather cycle finished"
        );
    }

    /// Process one resolved file. Always yields exactly one event.
    fn process_file(
        &self,
        rt: &Runtime,
        states: &mut StateMap,
        dirty: &mut bool,
        path: &Path,
    ) -> Event {
        let key = path.display().to_string();

        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                return self.event(&key, Severity::Critical, format!("stat {} failed: {}", key, e));
            }
        };
        let size = metadata.len();

        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                return self.event(&key, Severity::Critical, format!("open {} failed: {}", key, e));
            }
        };
        let inode = inode_of(&metadata, Some(&file));

        let fingerprint = match Fingerprint::new(&mut file) {
            Ok(fp) => fp,
            Err(e) => {
                return self.event(&key, Severity::Critical, format!("read {} failed: {}", key, e));
            }
        };

        let (identity, offset) = self.identify(states, &key, inode, fingerprint, size, dirty);
        if identity != Identity::Same {
            *dirty = true;
        }
        if identity == Identity::Rotated {
            info!(path = %key, size, "Log file rotated, reading from the beginning");
        }

        let outcome = match FileReader::new(&mut file, self.config.max_read_bytes)
            .read_new_lines(offset, size)
        {
            Ok(o) => o,
            Err(e) => {
                return self.event(&key, Severity::Critical, format!("{}: {}", key, e));
            }
        };

        let bytes = match outcome {
            ReadOutcome::NoNewContent => {
                return self
                    .event(&key, Severity::Ok, format!("no new lines in {}", key))
                    .with_attribute(ATTR_MATCHED_LINES, 0)
                    .with_attribute(ATTR_BYTES_READ, 0);
            }
            ReadOutcome::Lines { bytes } => bytes,
        };

        let committed = bytes.len() as u64;
        if let Some(state) = states.get_mut(&key) {
            state.set_position(offset + committed);
            *dirty = true;
        }
        debug!(path = %key, offset, committed, "Read new log content");

        let lines = rt.decoder.lines(&bytes);
        let matches = rt.matcher.matching_indexes(&lines);

        if matches.is_empty() {
            return self
                .event(&key, Severity::Ok, format!("no matching lines in {}", key))
                .with_attribute(ATTR_MATCHED_LINES, 0)
                .with_attribute(ATTR_BYTES_READ, committed);
        }

        let excerpt = render_excerpt(&lines, &matches, &rt.excerpt);
        self.event(
            &key,
            self.config.match_severity,
            format!("{} matching lines in {}:\n{}", matches.len(), key, excerpt),
        )
        .with_attribute(ATTR_MATCHED_LINES, matches.len())
        .with_attribute(ATTR_BYTES_READ, committed)
    }

    /// Create or reconcile the state for `key`, returning the offset to read from.
    fn identify(
        &self,
        states: &mut StateMap,
        key: &str,
        inode: u64,
        fingerprint: Fingerprint,
        size: u64,
        dirty: &mut bool,
    ) -> (Identity, u64) {
        let Some(state) = states.get_mut(key) else {
            let offset = match self.config.initial_position {
                StartAt::Beginning => 0,
                StartAt::End => size,
            };
            info!(path = %key, offset, "Tracking new log file");
            states.insert(key.to_string(), FileState::new(offset, inode, fingerprint));
            return (Identity::New, offset);
        };

        if detect_rotation(state, inode, &fingerprint, size) {
            *state = FileState::new(0, inode, fingerprint);
            return (Identity::Rotated, 0);
        }

        if fingerprint.len() > state.fingerprint.len() {
            state.fingerprint = fingerprint;
            *dirty = true;
        }
        if state.inode == UNKNOWN_INODE && inode != UNKNOWN_INODE {
            state.inode = inode;
            *dirty = true;
        }
        (Identity::Same, state.position())
    }

    fn persist(&self, inner: &mut Inner) {
        if !inner.dirty {
            return;
        }
        let Some(rt) = inner.runtime.as_ref() else {
            return;
        };

        match rt.store.save(&inner.states) {
            Ok(()) => {
                inner.dirty = false;
                debug!(path = ?rt.store.path(), files = inner.states.len(), "Saved logfile state");
            }
            Err(e) => {
                // stays dirty, the next cycle retries
                warn!(path = ?rt.store.path(), error = %e, "Failed to save logfile state");
            }
        }
    }
}

/// Drop state for glob-sourced paths that no longer resolve. State for
/// explicit targets is kept while the file is missing.
fn remove_stale_states(
    states: &mut StateMap,
    resolution: &Resolution,
    finder: &FileFinder,
) -> bool {
    let before = states.len();
    states.retain(|key, _| {
        let path = Path::new(key);
        let keep = resolution.matched.contains(path) || finder.is_explicit(path);
        if !keep {
            debug!(path = %key, "Forgetting log file that no longer matches");
        }
        keep
    });
    states.len() != before
}

impl Check for LogfileCheck {
    fn name(&self) -> &str {
        CHECK_NAME
    }

    fn init(&self) -> std::result::Result<(), BoxError> {
        let runtime = self.build_runtime()?;
        let states = runtime.store.load();

        info!(
            targets = ?self.config.targets,
            state_file = ?runtime.store.path(),
            known_files = states.len(),
            encoding = runtime.decoder.encoding_name(),
            initial_position = %self.config.initial_position,
            "Initialized logfile check"
        );

        let mut inner = self.lock();
        inner.states = states;
        inner.dirty = false;
        inner.runtime = Some(runtime);
        Ok(())
    }

    fn gather(&self, queue: &EventSender) {
        let mut inner = self.lock();
        self.run_cycle(&mut inner, queue);
        self.persist(&mut inner);
    }

    fn shutdown(&self) {
        let mut inner = self.lock();
        self.persist(&mut inner);
        debug!("Logfile check shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::logfile::error::Error;
    use crate::event_queue;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    fn config_for(dir: &TempDir, targets: Vec<String>) -> LogfileConfig {
        LogfileConfig {
            targets,
            initial_position: StartAt::Beginning,
            filter_include: vec!["ERROR".to_string()],
            state_file: Some(dir.path().join("state.json")),
            ..Default::default()
        }
    }

    fn target(dir: &TempDir, name: &str) -> String {
        dir.path().join(name).display().to_string()
    }

    fn gather(check: &LogfileCheck) -> Vec<Event> {
        let (tx, rx) = event_queue::unbounded();
        check.gather(&tx);
        rx.drain()
    }

    fn append(path: &str, content: &str) {
        let mut f = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_gather_before_init_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir, "app.log");
        fs::write(&path, "ERROR boom\n").unwrap();

        let check = LogfileCheck::new(config_for(&dir, vec![path]));
        assert!(gather(&check).is_empty());
    }

    #[test]
    fn test_init_rejects_invalid_regex() {
        let dir = TempDir::new().unwrap();
        let mut config = config_for(&dir, vec![target(&dir, "app.log")]);
        config.filter_include = vec!["/[unclosed/".to_string()];

        let check = LogfileCheck::new(config);
        assert!(check.init().is_err());
        assert!(matches!(check.build_runtime(), Err(Error::Filter(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_explicit_target_is_inaccessible() {
        let dir = TempDir::new().unwrap();
        let file = target(&dir, "plain.log");
        fs::write(&file, "x\n").unwrap();

        // a regular file used as a directory: stat fails with ENOTDIR
        let path = format!("{}/child.log", file);
        let check = LogfileCheck::new(config_for(&dir, vec![path.clone()]));
        check.init().unwrap();

        for _ in 0..2 {
            let events = gather(&check);
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].target, path);
            assert_eq!(events[0].severity, Severity::Critical);
            assert!(events[0].description.contains("inaccessible"));
        }
        assert!(check.snapshot().is_empty());
    }

    #[test]
    fn test_idle_cycle_does_not_rewrite_state() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir, "app.log");
        fs::write(&path, "hello\n").unwrap();

        let check = LogfileCheck::new(config_for(&dir, vec![path.clone()]));
        check.init().unwrap();
        gather(&check);

        let state_file = dir.path().join("state.json");
        assert!(state_file.exists());
        fs::remove_file(&state_file).unwrap();

        let events = gather(&check);
        assert_eq!(events[0].severity, Severity::Ok);
        check.shutdown();
        assert!(!state_file.exists());

        // a change is written again
        append(&path, "ERROR more\n");
        gather(&check);
        assert!(state_file.exists());
    }

    #[test]
    fn test_first_sight_at_end_skips_existing_content() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir, "app.log");
        fs::write(&path, "ERROR old\n").unwrap();

        let mut config = config_for(&dir, vec![path.clone()]);
        config.initial_position = StartAt::End;
        let check = LogfileCheck::new(config);
        check.init().unwrap();

        let events = gather(&check);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, Severity::Ok);
        assert_eq!(events[0].target, path);
        assert_eq!(check.snapshot()[&path].position(), 10);

        append(&path, "ERROR new\n");
        let events = gather(&check);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, Severity::Warning);
        assert!(events[0].description.contains("ERROR new"));
        assert!(!events[0].description.contains("ERROR old"));
    }

    #[test]
    fn test_partial_line_is_left_for_next_cycle() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir, "app.log");
        fs::write(&path, "ERROR a\npartial ERR").unwrap();

        let check = LogfileCheck::new(config_for(&dir, vec![path.clone()]));
        check.init().unwrap();

        let events = gather(&check);
        assert_eq!(events[0].attribute(ATTR_MATCHED_LINES), Some("1"));
        assert_eq!(events[0].attribute(ATTR_BYTES_READ), Some("8"));
        assert_eq!(check.snapshot()[&path].position(), 8);

        append(&path, "OR tail\n");
        let events = gather(&check);
        assert_eq!(events.len(), 1);
        assert!(events[0].description.contains("partial ERROR tail"));
        assert_eq!(check.snapshot()[&path].position(), 27);
    }

    #[test]
    fn test_exclude_filter_suppresses_match() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir, "app.log");
        fs::write(&path, "ERROR expected noise\n").unwrap();

        let mut config = config_for(&dir, vec![path]);
        config.filter_exclude = vec!["noise".to_string()];
        let check = LogfileCheck::new(config);
        check.init().unwrap();

        let events = gather(&check);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, Severity::Ok);
    }

    #[test]
    fn test_truncation_restarts_from_beginning() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir, "app.log");
        fs::write(&path, "line one is long enough\nline two\n").unwrap();

        let check = LogfileCheck::new(config_for(&dir, vec![path.clone()]));
        check.init().unwrap();
        gather(&check);

        fs::write(&path, "ERROR x\n").unwrap();
        let events = gather(&check);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, Severity::Warning);
        assert!(events[0].description.contains("ERROR x"));
        assert_eq!(check.snapshot()[&path].position(), 8);
    }

    #[traced_test]
    #[test]
    fn test_replaced_file_is_logged_as_rotation() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir, "app.log");
        fs::write(&path, "first generation\n").unwrap();

        let check = LogfileCheck::new(config_for(&dir, vec![path.clone()]));
        check.init().unwrap();
        gather(&check);
        assert!(!logs_contain("rotated"));

        // same length, different content
        fs::write(&path, "ERROR generation\n").unwrap();
        let events = gather(&check);
        assert_eq!(events[0].severity, Severity::Warning);
        assert!(logs_contain("Log file rotated"));
    }

    #[test]
    fn test_missing_explicit_target() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir, "app.log");

        let check = LogfileCheck::new(config_for(&dir, vec![path.clone()]));
        check.init().unwrap();

        // never seen: silent
        assert!(gather(&check).is_empty());

        fs::write(&path, "hello\n").unwrap();
        gather(&check);
        fs::remove_file(&path).unwrap();

        for _ in 0..2 {
            let events = gather(&check);
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].severity, Severity::Critical);
            assert!(events[0].description.contains("disappeared"));
        }
        assert!(check.snapshot().contains_key(&path));
    }

    #[test]
    fn test_glob_state_is_forgotten_when_file_goes_away() {
        let dir = TempDir::new().unwrap();
        let a = target(&dir, "a.log");
        let b = target(&dir, "b.log");
        fs::write(&a, "a\n").unwrap();
        fs::write(&b, "b\n").unwrap();

        let pattern = format!("{}/*.log", dir.path().display());
        let check = LogfileCheck::new(config_for(&dir, vec![pattern]));
        check.init().unwrap();
        gather(&check);
        assert_eq!(check.snapshot().len(), 2);

        fs::remove_file(&b).unwrap();
        let events = gather(&check);
        assert_eq!(events.len(), 1);

        let states = check.snapshot();
        assert!(states.contains_key(&a));
        assert!(!states.contains_key(&b));
    }

    #[test]
    fn test_overflow_warning_and_cap() {
        let dir = TempDir::new().unwrap();
        for i in 0..5 {
            fs::write(dir.path().join(format!("{}.log", i)), "x\n").unwrap();
        }

        let pattern = format!("{}/*.log", dir.path().display());
        let mut config = config_for(&dir, vec![pattern]);
        config.max_targets = 3;
        let check = LogfileCheck::new(config);
        check.init().unwrap();

        let events = gather(&check);
        let overflow: Vec<_> = events.iter().filter(|e| e.target == TARGET_GLOB).collect();
        assert_eq!(overflow.len(), 1);
        assert_eq!(overflow[0].severity, Severity::Warning);
        assert_eq!(overflow[0].attribute("resolved"), Some("5"));

        let per_file = events.iter().filter(|e| e.target != TARGET_GLOB).count();
        assert_eq!(per_file, 3);
        assert_eq!(check.snapshot().len(), 3);
    }

    #[test]
    fn test_gather_timeout_stops_processing() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir, "app.log");
        fs::write(&path, "ERROR boom\n").unwrap();

        let mut config = config_for(&dir, vec![path]);
        config.gather_timeout = Duration::from_nanos(1);
        let check = LogfileCheck::new(config);
        check.init().unwrap();

        let events = gather(&check);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].target, TARGET_GATHER_TIMEOUT);
        assert_eq!(events[0].attribute("skipped"), Some("1"));
        assert!(check.snapshot().is_empty());
    }

    #[test]
    fn test_state_survives_restart() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir, "app.log");
        fs::write(&path, "ERROR one\n").unwrap();

        let check = LogfileCheck::new(config_for(&dir, vec![path.clone()]));
        check.init().unwrap();
        gather(&check);
        check.shutdown();
        drop(check);

        append(&path, "ERROR two\n");
        let check = LogfileCheck::new(config_for(&dir, vec![path.clone()]));
        check.init().unwrap();
        assert_eq!(check.snapshot()[&path].position(), 10);

        let events = gather(&check);
        assert!(events[0].description.contains("ERROR two"));
        assert!(!events[0].description.contains("ERROR one"));
    }

    #[test]
    fn test_detect_rotation() {
        let stored = FileState::new(10, 42, Fingerprint::from_bytes(b"hello world"));

        let longer = Fingerprint::from_bytes(b"hello world and more");
        assert!(!detect_rotation(&stored, 42, &longer, 20));
        assert!(!detect_rotation(&stored, UNKNOWN_INODE, &longer, 20));
        assert!(detect_rotation(&stored, 43, &longer, 20));
        assert!(detect_rotation(&stored, 42, &longer, 5));

        let other = Fingerprint::from_bytes(b"goodbye world");
        assert!(detect_rotation(&stored, 42, &other, 20));
    }
}
