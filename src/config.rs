//! Configuration provider for data search paths.
//!
//! Factories only know the *names* of two properties (the full search path and
//! its writable subset); the values come from whatever implements
//! [`ConfigProvider`]. `PathConfig` is the JSON-backed provider used by the
//! application and by tests; it also carries the variable table consulted when
//! `${name}` placeholders in path strings are expanded.

use crate::error::DataError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Variable naming the per-user data directory in path strings.
pub const USER_DIR_VAR: &str = "user_dir";
/// Variable naming the shared, installed data directory in path strings.
pub const DATA_DIR_VAR: &str = "data_dir";

/// Source of named string properties and path variables.
pub trait ConfigProvider {
    /// Value of a named property, `None` when it is not set.
    fn property(&self, name: &str) -> Option<String>;

    /// Value of a `${name}` path variable; the environment is consulted only
    /// when this returns `None`.
    fn variable(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Property table plus path variables, deserializable from JSON.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathConfig {
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl PathConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style property assignment.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_property(name, value);
        self
    }

    /// Builder-style variable assignment.
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn remove_property(&mut self, name: &str) -> Option<String> {
        self.properties.remove(name)
    }
}

impl ConfigProvider for PathConfig {
    fn property(&self, name: &str) -> Option<String> {
        self.properties.get(name).cloned()
    }

    fn variable(&self, name: &str) -> Option<String> {
        self.variables.get(name).cloned()
    }
}

impl ConfigProvider for BTreeMap<String, String> {
    fn property(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Read and parse a JSON path configuration from disk.
pub fn load_config_from_path(path: &Path) -> Result<PathConfig, DataError> {
    let parsed = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))
        .and_then(|data| {
            serde_json::from_str::<PathConfig>(&data)
                .with_context(|| format!("parsing {}", path.display()))
        });
    parsed.map_err(|source| DataError::Config {
        path: path.to_path_buf(),
        source,
    })
}

/// Conventional search path for a kind folder: the user's copy first, then
/// the installed one.
pub fn build_data_path(name: &str) -> String {
    let separator = if cfg!(windows) { ';' } else { ':' };
    format!(
        "${{{USER_DIR_VAR}}}{sep}{name}{separator}${{{DATA_DIR_VAR}}}{sep}{name}",
        sep = std::path::MAIN_SEPARATOR
    )
}

/// Conventional writable subset for a kind folder.
pub fn build_writable_path(name: &str) -> String {
    format!(
        "${{{USER_DIR_VAR}}}{sep}{name}",
        sep = std::path::MAIN_SEPARATOR
    )
}
