//! On-disk persistence for `save` / `load`.
//!
//! A saved session is a JSON envelope holding the core snapshot (base64),
//! the user table and the working directory. Files are written to a temp
//! name in the state directory and renamed into place.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::users::UserManager;

const FILE_SUFFIX: &str = ".treefs";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SavedSession {
    pub saved_at: DateTime<Utc>,
    /// Absolute path of the working directory at save time.
    pub cwd: String,
    pub users: UserManager,
    /// Base64 of the core snapshot bytes.
    pub tree: String,
}

impl SavedSession {
    pub fn new(snapshot: &[u8], cwd: String, users: UserManager) -> Self {
        Self {
            saved_at: Utc::now(),
            cwd,
            users,
            tree: STANDARD.encode(snapshot),
        }
    }

    pub fn snapshot_bytes(&self) -> Result<Vec<u8>> {
        STANDARD.decode(&self.tree).context("saved tree is not valid base64")
    }
}

#[derive(Clone, Debug)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Hidden file backing the save called `name`.
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\', '\0']) {
            bail!("invalid save name {name:?}");
        }
        Ok(self.dir.join(format!(".{name}{FILE_SUFFIX}")))
    }

    pub fn save(&self, name: &str, session: &SavedSession) -> Result<PathBuf> {
        let path = self.path_for(name)?;
        let bytes = serde_json::to_vec_pretty(session).context("failed to encode session")?;

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("failed to move session into {}", path.display()))?;
        tracing::info!(path = %path.display(), "saved session");
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<SavedSession> {
        let path = self.path_for(name)?;
        let bytes = fs::read(&path).with_context(|| format!("no saved session at {}", path.display()))?;
        let session = serde_json::from_slice(&bytes)
            .with_context(|| format!("corrupt session file {}", path.display()))?;
        tracing::info!(path = %path.display(), "loaded session file");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_path_for_is_hidden() {
        let store = SessionStore::new("/state");
        assert_eq!(store.path_for("work").unwrap(), PathBuf::from("/state/.work.treefs"));
        assert!(store.path_for("").is_err());
        assert!(store.path_for("../escape").is_err());
        assert!(store.path_for("a/b").is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let session = SavedSession::new(b"snapshot bytes", "/docs".to_string(), UserManager::new());

        let path = store.save("work", &session).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        let loaded = store.load("work").unwrap();
        assert_eq!(loaded.cwd, "/docs");
        assert_eq!(loaded.users, UserManager::new());
        assert_eq!(loaded.snapshot_bytes().unwrap(), b"snapshot bytes");
        assert_eq!(loaded.saved_at, session.saved_at);
    }

    #[test]
    fn test_load_missing_or_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.load("absent").is_err());

        fs::write(store.path_for("broken").unwrap(), b"not json").unwrap();
        assert!(store.load("broken").is_err());
    }
}
