// ============================================================================
// File: src/credentials.rs
// Client-side credential slots and API key provisioning
// ============================================================================

use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::ChatSettings;

/// Name of the chat provider's credential slot, in the environment and in
/// the credential file alike
pub const API_KEY_NAME: &str = "OPENAI_API_KEY";

/// A small JSON file of named secrets, one slot per provider
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/paperchat/credentials.json`, when the platform has one
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("paperchat").join("credentials.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| anyhow!("Failed to read credentials {}: {}", self.path.display(), e))?;
        serde_json::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse credentials {}: {}", self.path.display(), e))
    }

    pub fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(name).filter(|v| !v.trim().is_empty()))
    }

    pub fn set(&self, name: &str, value: &str) -> Result<()> {
        let mut slots = self.read_all()?;
        slots.insert(name.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&slots)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        debug!(name, path = %self.path.display(), "stored credential");
        Ok(())
    }
}

/// Resolve the chat API key: config file first, then the environment value,
/// then the credential store.
pub fn resolve_api_key(
    settings: &ChatSettings,
    env_value: Option<String>,
    store: Option<&CredentialStore>,
) -> Result<Option<String>> {
    let non_blank = |v: &String| !v.trim().is_empty();

    if let Some(key) = settings.api_key.clone().filter(non_blank) {
        return Ok(Some(key));
    }
    if let Some(key) = env_value.filter(non_blank) {
        return Ok(Some(key));
    }
    match store {
        Some(store) => store.get(API_KEY_NAME),
        None => Ok(None),
    }
}
