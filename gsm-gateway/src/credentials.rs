use std::fs;
use std::path::PathBuf;

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};

/// The locally persisted API key authorizing this agent against the
/// collection endpoint. Loaded once at startup and immutable for the
/// lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: String,
}

impl Credentials {
    /// Preview safe for logs: only the first characters of the key.
    pub fn masked(&self) -> String {
        let prefix: String = self.api_key.chars().take(8).collect();
        format!("{prefix}...")
    }
}

/// Simple JSON key/value store holding the credentials between runs.
pub struct CredentialsStore {
    path: PathBuf,
}

impl CredentialsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A missing file means no credentials yet; an unreadable or malformed
    /// file is an error the operator has to resolve.
    pub fn load(&self) -> Result<Option<Credentials>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path).wrap_err_with(|| {
            format!("failed to read credentials file {}", self.path.display())
        })?;
        let credentials = serde_json::from_str(&raw).wrap_err_with(|| {
            format!("credentials file {} is not valid JSON", self.path.display())
        })?;

        Ok(Some(credentials))
    }

    pub fn save(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).wrap_err_with(|| {
                    format!("failed to create {}", parent.display())
                })?;
            }
        }

        let raw = serde_json::to_string_pretty(credentials)?;
        fs::write(&self.path, raw).wrap_err_with(|| {
            format!("failed to write credentials file {}", self.path.display())
        })
    }
}
