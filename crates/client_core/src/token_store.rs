//! Persistence for the single bearer token.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("failed to access token file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Key/value cell holding at most one token. Writes replace the previous value.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn store(&self, token: &str) -> Result<(), TokenStoreError>;
    fn remove(&self) -> Result<(), TokenStoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<String> {
        self.token.lock().ok()?.clone()
    }

    fn store(&self, token: &str) -> Result<(), TokenStoreError> {
        if let Ok(mut guard) = self.token.lock() {
            *guard = Some(token.to_string());
        }
        Ok(())
    }

    fn remove(&self) -> Result<(), TokenStoreError> {
        if let Ok(mut guard) = self.token.lock() {
            *guard = None;
        }
        Ok(())
    }
}

/// Stores the raw token string in a single file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> TokenStoreError {
        TokenStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<String> {
        let raw = fs::read_to_string(&self.path).ok()?;
        let token = raw.trim();
        if token.is_empty() {
            return None;
        }
        Some(token.to_string())
    }

    fn store(&self, token: &str) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        fs::write(&self.path, token).map_err(|e| self.io_error(e))
    }

    fn remove(&self) -> Result<(), TokenStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }
}

pub fn default_token_path() -> PathBuf {
    if let Some(data_dir) = dirs::data_local_dir() {
        return data_dir.join("yuna").join("token");
    }

    PathBuf::from(".yuna").join("token")
}
