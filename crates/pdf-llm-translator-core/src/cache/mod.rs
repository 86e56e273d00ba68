//! Two-layer cache (memory, then disk) for finished page results.

mod disk;
mod key;
mod memory;

pub use disk::DiskCache;
pub use key::{PageKey, PageKeyParts};
pub use memory::MemoryCache;

use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::Result;
use crate::model::TranslatedPage;

/// Page results stored as JSON, shared by every pipeline run of a process
pub struct PageCache {
    memory: Option<MemoryCache>,
    disk: Option<DiskCache>,
}

impl PageCache {
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let memory = config
            .memory_enabled
            .then(|| MemoryCache::new(config.memory_max_mb, config.memory_ttl_seconds));

        let disk = if config.disk_enabled {
            let path = config
                .disk_path
                .clone()
                .unwrap_or_else(crate::util::page_cache_path);
            Some(DiskCache::new(path)?)
        } else {
            None
        };

        Ok(Self { memory, disk })
    }

    /// Cache that stores nothing
    pub const fn disabled() -> Self {
        Self {
            memory: None,
            disk: None,
        }
    }

    pub const fn is_enabled(&self) -> bool {
        self.memory.is_some() || self.disk.is_some()
    }

    pub async fn get(&self, key: &PageKey) -> Option<TranslatedPage> {
        let bytes = self.get_bytes(key).await?;
        match serde_json::from_slice::<TranslatedPage>(&bytes) {
            Ok(mut page) => {
                page.from_cache = true;
                Some(page)
            }
            Err(e) => {
                // Entry from an older layout; treat as a miss
                warn!("Discarding unreadable cache entry {key}: {e}");
                None
            }
        }
    }

    async fn get_bytes(&self, key: &PageKey) -> Option<Vec<u8>> {
        let key_str = key.as_str();

        if let Some(ref memory) = self.memory
            && let Some(value) = memory.get(key_str).await
        {
            return Some(value);
        }

        if let Some(ref disk) = self.disk
            && let Some(value) = disk.get(key_str)
        {
            debug!("Disk cache hit for {key_str}");
            if let Some(ref memory) = self.memory {
                memory.insert(key_str.to_string(), value.clone()).await;
            }
            return Some(value);
        }

        None
    }

    pub async fn insert(&self, key: &PageKey, page: &TranslatedPage) {
        if !self.is_enabled() {
            return;
        }

        let bytes = match serde_json::to_vec(page) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to serialize page {} for cache: {e}", page.page_num);
                return;
            }
        };

        if let Some(ref disk) = self.disk
            && let Err(e) = disk.insert(key.as_str(), &bytes)
        {
            warn!("Failed to write cache entry: {e}");
        }

        if let Some(ref memory) = self.memory {
            memory.insert(key.as_str().to_string(), bytes).await;
        }
    }

    pub async fn remove(&self, key: &PageKey) {
        if let Some(ref memory) = self.memory {
            memory.remove(key.as_str()).await;
        }
        if let Some(ref disk) = self.disk
            && let Err(e) = disk.remove(key.as_str())
        {
            warn!("Failed to remove cache entry: {e}");
        }
    }

    pub fn clear(&self) {
        if let Some(ref memory) = self.memory {
            memory.clear();
        }
        if let Some(ref disk) = self.disk
            && let Err(e) = disk.clear()
        {
            warn!("Failed to clear disk cache: {e}");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Lang;

    fn page() -> TranslatedPage {
        TranslatedPage {
            page_num: 2,
            page_width: 595.0,
            page_height: 842.0,
            detected_language: "de".to_string(),
            language_confidence: 0.95,
            blocks: Vec::new(),
            quality: None,
            attempts: 1,
            passed: true,
            skipped_reason: None,
            from_cache: false,
        }
    }

    fn key() -> PageKey {
        PageKey::new(PageKeyParts {
            doc_id: "doc",
            page_num: 2,
            page_text: "Hallo",
            model: "m",
            source_lang: &Lang::auto(),
            target_lang: &Lang::new("en"),
            quality_threshold: 0.75,
        })
    }

    #[tokio::test]
    async fn test_memory_round_trip_marks_cache_hit() {
        let cache = PageCache::new(&CacheConfig {
            disk_enabled: false,
            ..CacheConfig::default()
        })
        .unwrap();

        assert!(cache.get(&key()).await.is_none());
        cache.insert(&key(), &page()).await;

        let hit = cache.get(&key()).await.unwrap();
        assert!(hit.from_cache);
        assert_eq!(hit.page_num, 2);

        cache.remove(&key()).await;
        assert!(cache.get(&key()).await.is_none());
    }

    #[tokio::test]
    async fn test_disk_layer_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            memory_enabled: false,
            disk_enabled: true,
            disk_path: Some(dir.path().join("pages")),
            ..CacheConfig::default()
        };

        {
            let cache = PageCache::new(&config).unwrap();
            cache.insert(&key(), &page()).await;
        }

        let cache = PageCache::new(&config).unwrap();
        assert_eq!(cache.get(&key()).await.unwrap().detected_language, "de");

        cache.clear();
        assert!(cache.get(&key()).await.is_none());
    }

    #[tokio::test]
    async fn test_disabled_cache_stores_nothing() {
        let cache = PageCache::disabled();
        cache.insert(&key(), &page()).await;
        assert!(!cache.is_enabled());
        assert!(cache.get(&key()).await.is_none());
    }
}
