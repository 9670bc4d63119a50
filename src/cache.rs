//! Persistence cache.
//!
//! The board survives restarts through a deliberately dumb keyed string
//! store, mirroring the browser-local storage contract the view layer used
//! to rely on. Two keys matter: [`LEADS_KEY`] holds the serialized lead
//! collection and [`LAST_SYNC_KEY`] the RFC 3339 timestamp of the last
//! successful sync.
//!
//! Cache failures are never fatal. The manager logs them, announces a
//! `CacheDegraded` event, and keeps operating in memory.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::errors::CacheError;

/// Cache key for the serialized lead collection (JSON array).
pub const LEADS_KEY: &str = "pipeline_leads";
/// Cache key for the last successful sync timestamp (RFC 3339).
pub const LAST_SYNC_KEY: &str = "pipeline_last_sync";

pub trait BoardCache: Send + Sync {
    /// Fetch a value. `Ok(None)` means the key was never written.
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value, overwriting any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;
}

/// One file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default location under the platform cache directory.
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("leadflow")
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl BoardCache for FileCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Read {
                key: key.to_string(),
                source: e,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let write_err = |source| CacheError::Write {
            key: key.to_string(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(write_err)?;
        fs::write(self.path_for(key), value).map_err(write_err)
    }
}

/// In-memory cache for tests and cache-disabled runs. Nothing survives the
/// process.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BoardCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self.entries.lock().map_err(|_| CacheError::Read {
            key: key.to_string(),
            source: std::io::Error::other("cache lock poisoned"),
        })?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Write {
            key: key.to_string(),
            source: std::io::Error::other("cache lock poisoned"),
        })?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
