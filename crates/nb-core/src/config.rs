//! Compiler configuration (`nebula.yml`)

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for one compilation session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompilerConfig {
    /// Prefix of the aliases introduced while flattening (`<prefix>_<n>`)
    #[serde(default = "default_fresh_prefix")]
    pub fresh_prefix: String,

    /// Run checked schema inference before flattening
    #[serde(default)]
    pub check_types: bool,
}

fn default_fresh_prefix() -> String {
    "gx".to_string()
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            fresh_prefix: default_fresh_prefix(),
            check_types: false,
        }
    }
}

impl CompilerConfig {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(content: &str) -> CoreResult<Self> {
        let config: CompilerConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> CoreResult<()> {
        let prefix = &self.fresh_prefix;
        let starts_ok = prefix
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !starts_ok || !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(CoreError::ConfigInvalid {
                message: format!("fresh_prefix '{prefix}' must be a SQL identifier"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
