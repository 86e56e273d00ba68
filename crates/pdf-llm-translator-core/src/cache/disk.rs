use std::path::Path;

use sled::Db;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Persistent layer backed by sled
pub struct DiskCache {
    db: Db,
}

impl DiskCache {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::CacheInit(format!(
                    "Failed to create cache directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let db = sled::open(path).map_err(|e| {
            let reason = e.to_string();
            if reason.contains("WouldBlock") || reason.contains("lock") {
                Error::CacheInit(format!(
                    "Cache locked at {}\n\n\
                    Another process is using the cache, or a previous run crashed.\n\
                    To fix: rm {}/db/LOCK, or pass --no-cache",
                    path.display(),
                    path.display()
                ))
            } else {
                Error::CacheInit(format!("Failed to open cache at {}: {e}", path.display()))
            }
        })?;

        debug!("Opened disk cache at {}", path.display());

        Ok(Self { db })
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self.db.get(key.as_bytes()) {
            Ok(value) => value.map(|v| v.to_vec()),
            Err(e) => {
                warn!("Cache read error: {e}");
                None
            }
        }
    }

    pub fn insert(&self, key: &str, value: &[u8]) -> Result<()> {
        self.db
            .insert(key.as_bytes(), value)
            .map_err(|e| Error::CacheWrite(e.to_string()))?;
        self.db
            .flush()
            .map_err(|e| Error::CacheWrite(format!("Flush failed: {e}")))?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.db
            .remove(key.as_bytes())
            .map_err(|e| Error::CacheWrite(e.to_string()))?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.db.clear().map_err(|e| Error::CacheWrite(e.to_string()))?;
        self.db
            .flush()
            .map_err(|e| Error::CacheWrite(format!("Flush failed: {e}")))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}
