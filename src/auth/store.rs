// Allow dead code: Infrastructure methods for future use
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Token file name in the data directory
const TOKEN_FILE: &str = "token";

/// Durable key-value storage for the bearer token.
///
/// The session manager is the only writer; the token is a single opaque
/// string under one well-known key. The trait exists so tests can swap the
/// file-backed store for an in-memory fake.
pub trait TokenStore {
    fn get(&self) -> Result<Option<String>>;
    fn set(&mut self, token: &str) -> Result<()>;
    fn remove(&mut self) -> Result<()>;
}

/// File-backed store: the raw token string in `<data_dir>/token`.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(TOKEN_FILE),
        }
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)
            .context("Failed to read token file")?;
        let token = contents.trim();
        if token.is_empty() {
            Ok(None)
        } else {
            Ok(Some(token.to_string()))
        }
    }

    fn set(&mut self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create data directory")?;
        }
        std::fs::write(&self.path, token).context("Failed to write token file")?;
        Ok(())
    }

    fn remove(&mut self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove token file")?;
        }
        Ok(())
    }
}

/// In-memory store for tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Option<String>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Result<Option<String>> {
        Ok(self.token.clone())
    }

    fn set(&mut self, token: &str) -> Result<()> {
        self.token = Some(token.to_string());
        Ok(())
    }

    fn remove(&mut self) -> Result<()> {
        self.token = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = FileTokenStore::new(dir.path());

        assert_eq!(store.get().expect("empty get"), None);

        store.set("T1").expect("set");
        assert_eq!(store.get().expect("get").as_deref(), Some("T1"));

        store.set("T2").expect("overwrite");
        assert_eq!(store.get().expect("get").as_deref(), Some("T2"));

        store.remove().expect("remove");
        assert_eq!(store.get().expect("get after remove"), None);
    }

    #[test]
    fn test_file_store_remove_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = FileTokenStore::new(dir.path());
        store.remove().expect("remove on missing file");
    }

    #[test]
    fn test_file_store_creates_data_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("deeper");
        let mut store = FileTokenStore::new(&nested);
        store.set("T1").expect("set through missing dir");
        assert_eq!(store.get().expect("get").as_deref(), Some("T1"));
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryTokenStore::new();
        assert_eq!(store.get().expect("get"), None);
        store.set("T1").expect("set");
        assert_eq!(store.get().expect("get").as_deref(), Some("T1"));
        store.remove().expect("remove");
        assert_eq!(store.get().expect("get"), None);
    }
}
