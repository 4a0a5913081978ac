//! Loader and prediction option structures.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options controlling how a model is pulled from the artifact cache
/// and how its weights are materialised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Literal prefix prepended to both cache keys before lookup
    #[serde(default)]
    pub key_prefix: Option<String>,

    /// Reject weight blobs with bytes left over after the manifest is consumed
    #[serde(default)]
    pub strict: bool,

    /// Accelerator ordinal for decoded weights (CPU when no accelerator feature is enabled)
    #[serde(default)]
    pub device_id: Option<usize>,
}

impl LoadOptions {
    /// Load options from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let options: LoadOptions = serde_json::from_str(&content)?;
        Ok(options)
    }

    /// Set the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Enable or disable strict weight blob checking
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Select the accelerator ordinal
    pub fn with_device_id(mut self, device_id: usize) -> Self {
        self.device_id = Some(device_id);
        self
    }

    /// Apply the configured prefix to a cache key
    pub fn resolve_key(&self, key: &str) -> String {
        match self.key_prefix {
            Some(ref prefix) => format!("{}{}", prefix, key),
            None => key.to_string(),
        }
    }
}

/// Prediction options.
///
/// Accepted by `GraphModel::predict` for parity with the wider inference
/// contract. None of the fields currently change execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictConfig {
    /// Batch size hint
    #[serde(default)]
    pub batch_size: Option<usize>,

    /// Verbose mode hint
    #[serde(default)]
    pub verbose: bool,
}
