//! Persisted session file for the hosted identity client.
//!
//! The session is stored as a single JSON document. A missing file means no
//! session; anything unreadable is reported so the caller can discard it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::types::{IdentityError, Session};

#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted session, `None` when nothing has been saved.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Storage`] on I/O failure and
    /// [`IdentityError::Parse`] when the file is not a valid session.
    pub async fn load(&self) -> Result<Option<Session>, IdentityError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(IdentityError::Storage(format!("{}: {e}", self.path.display()))),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| IdentityError::Parse(format!("{}: {e}", self.path.display())))
    }

    /// Overwrite the file with `session`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Storage`] if the file cannot be written.
    pub async fn save(&self, session: &Session) -> Result<(), IdentityError> {
        let json = serde_json::to_vec_pretty(session).map_err(|e| IdentityError::Storage(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| IdentityError::Storage(format!("{}: {e}", parent.display())))?;
        }
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| IdentityError::Storage(format!("{}: {e}", self.path.display())))
    }

    /// Remove the file. Succeeds if it is already gone.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Storage`] if the file exists but cannot be removed.
    pub async fn clear(&self) -> Result<(), IdentityError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(IdentityError::Storage(format!("{}: {e}", self.path.display()))),
        }
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
