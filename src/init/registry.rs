// SPDX-License-Identifier: Apache-2.0

use figment::value::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use crate::BoxError;
use crate::checks::Check;
use crate::checks::logfile;
use crate::init::logfile_check;

/// A configured check together with its gather interval.
#[derive(Clone)]
pub struct Instance {
    pub check: Arc<dyn Check>,
    pub interval: Duration,
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("check", &self.check.name())
            .field("interval", &self.interval)
            .finish()
    }
}

/// Builds one instance from its raw configuration table.
pub type Constructor = fn(&Value) -> Result<Instance, BoxError>;

/// Maps plugin names to their constructors.
#[derive(Default)]
pub struct Registry {
    constructors: HashMap<String, Constructor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every plugin shipped in this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(logfile::CHECK_NAME, logfile_check::instantiate);
        registry
    }

    pub fn register(&mut self, name: &str, constructor: Constructor) {
        self.constructors.insert(name.to_string(), constructor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Build all instances of plugin `name`. `value` is either a single table
    /// or an array of tables.
    pub fn build(&self, name: &str, value: &Value) -> Result<Vec<Instance>, BoxError> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| format!("unknown check type: {}", name))?;

        match value {
            Value::Array(_, tables) => tables
                .iter()
                .enumerate()
                .map(|(i, table)| {
                    constructor(table)
                        .map_err(|e| BoxError::from(format!("{}[{}]: {}", name, i, e)))
                })
                .collect(),
            Value::Dict(_, _) => {
                let instance = constructor(value).map_err(|e| format!("{}: {}", name, e))?;
                Ok(vec![instance])
            }
            _ => Err(format!("{}: expected a table or an array of tables", name).into()),
        }
    }

    /// Build instances for every plugin section in `sections`, in name order.
    pub fn build_all(
        &self,
        sections: &BTreeMap<String, Value>,
    ) -> Result<Vec<Instance>, BoxError> {
        let mut instances = Vec::new();
        for (name, value) in sections {
            instances.extend(self.build(name, value)?);
        }
        Ok(instances)
    }
}
