// SPDX-License-Identifier: Apache-2.0

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use figment::value::Value;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::BoxError;
use crate::init::parse;
use crate::init::registry::{Instance, Registry};

pub const ENV_PREFIX: &str = "HOSTCHECK_";

/// Table holding agent-wide settings, every other table names a check.
pub const AGENT_SECTION: &str = "agent";

// Variables consumed by the command line parser
const CLI_ENV_KEYS: &[&str] = &["config", "log_format"];

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AgentSettings {
    /// How long to wait for checks to flush state on shutdown
    #[serde(deserialize_with = "parse::deser_duration")]
    pub shutdown_timeout: Duration,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    pub agent: AgentSettings,
    /// Raw check sections keyed by plugin name
    pub checks: BTreeMap<String, Value>,
}

impl AgentConfig {
    /// Load the TOML file at `path`, with `HOSTCHECK_` environment overrides
    /// (`HOSTCHECK_AGENT__SHUTDOWN_TIMEOUT=10s`).
    pub fn load(path: &Path) -> Result<Self, BoxError> {
        if !path.is_file() {
            return Err(format!("config file not found: {}", path.display()).into());
        }

        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).ignore(CLI_ENV_KEYS).split("__"));
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self, BoxError> {
        let mut sections: BTreeMap<String, Value> = match figment.extract() {
            Ok(s) => s,
            Err(e) => return Err(format!("failed to parse config: {}", e).into()),
        };

        let agent = match sections.remove(AGENT_SECTION) {
            Some(v) => v
                .deserialize()
                .map_err(|e| format!("failed to parse [{}]: {}", AGENT_SECTION, e))?,
            None => AgentSettings::default(),
        };

        Ok(Self {
            agent,
            checks: sections,
        })
    }

    /// Build every configured check instance.
    pub fn build_instances(&self, registry: &Registry) -> Result<Vec<Instance>, BoxError> {
        if let Some(name) = self.checks.keys().find(|name| !registry.contains(name)) {
            return Err(format!("unknown check type: {}", name).into());
        }
        registry.build_all(&self.checks)
    }
}
