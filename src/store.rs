//! Local persistence for the profile and service settings.
//!
//! The extension keeps these in `chrome.storage.local`; the CLI analog is
//! a JSON file, read then written whole (single-user assumption, no
//! contention handling).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::profile::Profile;

/// Answer-service settings stored alongside the profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub api_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileStore {
    pub profile: Profile,
    pub settings: Settings,
}

impl ProfileStore {
    /// Default store location: `<config dir>/formpilot/profile.json`.
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| Error::StoreError("no config directory available".into()))?;
        Ok(dir.join("formpilot").join("profile.json"))
    }

    /// Load the store from `path`. A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(data) => {
                let store = serde_json::from_str(&data)
                    .map_err(|e| Error::StoreError(format!("{}: {e}", path.display())))?;
                Ok(store)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no profile store yet, starting empty");
                Ok(Self::default())
            }
            Err(e) => Err(Error::IoError(e)),
        }
    }

    /// Write the store to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }
}
