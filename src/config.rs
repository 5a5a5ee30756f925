//! Config model and persistence helpers.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Top-level configuration stored in `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Dispatch backend connection values.
    pub backend: BackendCfg,
    /// Technician profile values shown in the UI.
    pub technician: TechnicianCfg,
}

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendCfg {
    /// Base URL of the dispatch API.
    pub base_url: String,
    /// Path of the bearer token cache on disk.
    pub token_path: String,
}

/// Technician metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicianCfg {
    /// Display name used in the status bar.
    pub full_name: String,
}

impl Config {
    /// Load from disk or create defaults when missing.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let s = fs::read_to_string(path)?;
            Ok(toml::from_str(&s)?)
        } else {
            let cfg = Self::default();
            cfg.save(path)?;
            Ok(cfg)
        }
    }

    /// Persist the config as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let s = toml::to_string_pretty(self)?;
        fs::write(path, s)?;
        Ok(())
    }

    /// Whether the first-run wizard still needs to collect values.
    pub fn needs_setup(&self) -> bool {
        self.backend.base_url.is_empty() || self.technician.full_name == "Your Name"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendCfg {
                base_url: "".into(),
                token_path: "token.json".into(),
            },
            technician: TechnicianCfg {
                full_name: "Your Name".into(),
            },
        }
    }
}
