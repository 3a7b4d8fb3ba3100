//! Persisted local credential
//!
//! The API key set with `setkey` survives restarts. It is stored in
//! `~/.matrixterm/credentials.toml` under a fixed key, restored on start-up and
//! removed when the credential is cleared.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

/// Key the credential is stored under
pub const CREDENTIAL_KEY: &str = "openai_api_key";

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Failed to access credential file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize credentials: {0}")]
    Serialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, CredentialError>;

/// Storage for the local credential; `None` path keeps it in memory only
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    path: Option<PathBuf>,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Store that never touches disk
    pub fn in_memory() -> Self {
        Self { path: None }
    }

    /// Default location under the app directory
    pub fn default_location() -> Self {
        match crate::config::app_dir() {
            Some(dir) => Self::new(dir.join("credentials.toml")),
            None => Self::in_memory(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Restore the stored credential, if any
    pub fn load(&self) -> Option<String> {
        let path = self.path.as_ref()?;
        let content = fs::read_to_string(path).ok()?;
        let entries: BTreeMap<String, String> = match toml::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Ignoring unreadable credential file {}: {}", path.display(), e);
                return None;
            }
        };
        entries.get(CREDENTIAL_KEY).filter(|v| !v.is_empty()).cloned()
    }

    /// Persist the credential; an empty value removes it
    pub fn save(&self, credential: &str) -> Result<()> {
        if credential.is_empty() {
            return self.clear();
        }
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| CredentialError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut entries = BTreeMap::new();
        entries.insert(CREDENTIAL_KEY.to_string(), credential.to_string());
        let content = toml::to_string(&entries)?;
        fs::write(path, content).map_err(|source| CredentialError::Io {
            path: path.clone(),
            source,
        })?;
        restrict_permissions(path);

        info!("Stored local credential at {}", path.display());
        Ok(())
    }

    /// Remove the stored credential
    pub fn clear(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        match fs::remove_file(path) {
            Ok(()) => {
                info!("Removed stored credential {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CredentialError::Io {
                path: path.clone(),
                source,
            }),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        warn!("Could not restrict permissions on {}: {}", path.display(), e);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}
