// SPDX-License-Identifier: Apache-2.0

use clap::Args;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/hostcheck/hostcheck.toml";

#[derive(Debug, Args, Clone)]
pub struct AgentRun {
    /// Path to the TOML configuration file
    #[arg(long, env = "HOSTCHECK_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}
