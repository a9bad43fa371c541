// SPDX-License-Identifier: Apache-2.0

use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::BoxError;
use crate::checks::logfile::config::{DEFAULT_STATE_DIR, LogfileConfig, StartAt};
use crate::checks::logfile::{Error, LogfileCheck, Result};
use crate::event::Severity;
use crate::init::parse;
use crate::init::registry::Instance;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MatchArgs {
    /// Severity of events reporting matching lines
    pub severity: String,
}

impl Default for MatchArgs {
    fn default() -> Self {
        Self {
            severity: Severity::Warning.to_string(),
        }
    }
}

/// One `[[logfile]]` table of the agent configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogfileArgs {
    #[serde(deserialize_with = "parse::deser_duration")]
    pub interval: Duration,

    /// Explicit paths and glob patterns
    pub targets: Vec<String>,

    /// Where to start on files with no stored position: beginning or end
    pub initial_position: String,

    pub filter_include: Vec<String>,
    pub filter_exclude: Vec<String>,

    pub max_lines: usize,
    pub max_read_bytes: u64,
    pub max_line_length: usize,
    pub max_targets: usize,
    pub context_before: usize,
    pub context_after: usize,

    pub encoding: String,

    /// Explicit position state file, overrides `state_dir`
    pub state_file: Option<PathBuf>,
    pub state_dir: PathBuf,

    #[serde(deserialize_with = "parse::deser_duration")]
    pub gather_timeout: Duration,

    #[serde(rename = "match")]
    pub match_args: MatchArgs,
}

impl Default for LogfileArgs {
    fn default() -> Self {
        let config = LogfileConfig::default();
        Self {
            interval: DEFAULT_INTERVAL,
            targets: Vec::new(),
            initial_position: config.initial_position.to_string(),
            filter_include: Vec::new(),
            filter_exclude: Vec::new(),
            max_lines: config.max_lines,
            max_read_bytes: config.max_read_bytes,
            max_line_length: config.max_line_length,
            max_targets: config.max_targets,
            context_before: config.context_before,
            context_after: config.context_after,
            encoding: config.encoding,
            state_file: None,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            gather_timeout: config.gather_timeout,
            match_args: MatchArgs::default(),
        }
    }
}

impl LogfileArgs {
    /// Build and validate the check config
    pub fn build_config(&self) -> Result<LogfileConfig> {
        let initial_position: StartAt = self.initial_position.parse()?;
        let match_severity: Severity = self
            .match_args
            .severity
            .parse()
            .map_err(|e| Error::Config(format!("match.severity: {}", e)))?;

        let config = LogfileConfig {
            targets: self.targets.clone(),
            initial_position,
            filter_include: self.filter_include.clone(),
            filter_exclude: self.filter_exclude.clone(),
            max_lines: self.max_lines,
            max_read_bytes: self.max_read_bytes,
            max_line_length: self.max_line_length,
            max_targets: self.max_targets,
            context_before: self.context_before,
            context_after: self.context_after,
            encoding: self.encoding.clone(),
            state_file: self.state_file.clone(),
            state_dir: self.state_dir.clone(),
            gather_timeout: self.gather_timeout,
            match_severity,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Registry constructor for the `logfile` plugin.
pub fn instantiate(value: &figment::value::Value) -> std::result::Result<Instance, BoxError> {
    let args: LogfileArgs = value
        .deserialize()
        .map_err(|e| format!("failed to parse logfile config: {}", e))?;
    if args.interval.is_zero() {
        return Err("logfile interval must be positive".into());
    }

    let config = args.build_config()?;
    Ok(Instance {
        check: Arc::new(LogfileCheck::new(config)),
        interval: args.interval,
    })
}
