//! Engine instance settings.
//!
//! These belong to one running engine, not to a storage class: who we are,
//! how directories are laid out, and whether deletes honour reclaim policy.
//! They can be saved to and loaded from a JSON file; CLI flags override them.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ProvisionerError;
use crate::types::{PathLayout, ReclaimCheck};
use crate::volume::PROVISIONER_NAME;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineSettings {
    /// Written into the ownership annotation of every volume we create
    pub identity: String,
    pub layout: PathLayout,
    pub reclaim_check: ReclaimCheck,
    /// Trace every call of this instance, whatever the storage class says
    pub trace: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            identity: PROVISIONER_NAME.to_string(),
            layout: PathLayout::default(),
            reclaim_check: ReclaimCheck::default(),
            trace: false,
        }
    }
}

impl EngineSettings {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..Self::default()
        }
    }

    /// Save settings to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize settings to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write settings to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load settings from a JSON file; missing fields take their defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {:?}", path.as_ref()))?;

        let settings: Self =
            serde_json::from_str(&content).context("Failed to parse settings JSON")?;

        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.identity.trim().is_empty() {
            return Err(ProvisionerError::config("identity must not be empty"));
        }
        if self.identity.contains(char::is_whitespace) {
            return Err(ProvisionerError::config("identity cannot contain whitespace"));
        }
        Ok(())
    }
}
