//! Configuration management for linkage.
//!
//! Provides the field-naming conventions the optimizer recognises and the
//! limits of its rewrite loop.

use common_error::{LinkageError, LinkageResult};
use serde::{Deserialize, Serialize};

/// Global linkage configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkageConfig {
    /// Reserved field and index names.
    pub conventions: FieldConventions,
    /// Optimizer loop settings.
    pub optimizer: OptimizerSettings,
}

impl LinkageConfig {
    /// Load a configuration from a JSON document.
    ///
    /// Missing keys fall back to their defaults.
    pub fn from_json_str(json: &str) -> LinkageResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize this configuration as pretty-printed JSON.
    pub fn to_json_string(&self) -> LinkageResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that the configured sentinels are usable.
    pub fn validate(&self) -> LinkageResult<()> {
        let conventions = &self.conventions;
        if conventions.wildcard_field.is_empty() {
            return Err(LinkageError::config("wildcard_field must not be empty"));
        }
        if conventions.meta_field_prefix.is_empty() {
            return Err(LinkageError::config("meta_field_prefix must not be empty"));
        }
        if conventions.deferred_index_name.is_empty() {
            return Err(LinkageError::config(
                "deferred_index_name must not be empty",
            ));
        }
        if self.optimizer.max_rollup_iterations == 0 {
            return Err(LinkageError::config(
                "max_rollup_iterations must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Reserved names recognised while resolving fields and links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConventions {
    /// Field name that stands for "every field".
    pub wildcard_field: String,
    /// Leading marker of meta fields, which own no index link.
    pub meta_field_prefix: String,
    /// Index name meaning "resolve from the left field later".
    pub deferred_index_name: String,
}

impl Default for FieldConventions {
    fn default() -> Self {
        Self {
            wildcard_field: "_all".to_string(),
            meta_field_prefix: "_".to_string(),
            deferred_index_name: "this.index".to_string(),
        }
    }
}

impl FieldConventions {
    /// Whether `field` is the wildcard field.
    pub fn is_wildcard(&self, field: &str) -> bool {
        field == self.wildcard_field
    }

    /// Whether `field` is a meta field.
    pub fn is_meta_field(&self, field: &str) -> bool {
        field.starts_with(self.meta_field_prefix.as_str())
    }

    /// Whether `index_name` is the deferred-resolution sentinel.
    pub fn is_deferred_index(&self, index_name: &str) -> bool {
        index_name == self.deferred_index_name
    }
}

/// Settings for the merge/rollup loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    /// Upper bound on outer merge/rollup iterations.
    pub max_rollup_iterations: usize,
    /// Capture before/after explain output for every pass.
    pub enable_trace: bool,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            max_rollup_iterations: 100,
            enable_trace: false,
        }
    }
}
