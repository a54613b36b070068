use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::CacheConfig;

struct CachedVideo {
    path: PathBuf,
    stored_at: Instant,
}

/// Bounded cache mapping a source URL to an already-downloaded video file.
/// Entries expire after the configured TTL and capacity evicts LRU-first,
/// so the cache can't grow without limit between nightly wipes.
pub struct VideoCache {
    entries: Mutex<LruCache<String, CachedVideo>>,
    ttl: Duration,
}

impl VideoCache {
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: Duration::from_secs(config.ttl_secs),
        }
    }

    /// Cached file path for a URL, if the entry is fresh and the file is
    /// still on disk (the nightly cleanup may have deleted it).
    pub async fn get(&self, url: &str) -> Option<PathBuf> {
        let mut entries = self.entries.lock().await;
        match entries.get(url) {
            Some(entry) if entry.stored_at.elapsed() <= self.ttl && entry.path.exists() => {
                debug!("Cache hit for {}", url);
                Some(entry.path.clone())
            }
            Some(_) => {
                entries.pop(url);
                None
            }
            None => None,
        }
    }

    pub async fn insert(&self, url: &str, path: &Path) {
        let mut entries = self.entries.lock().await;
        entries.put(
            url.to_string(),
            CachedVideo {
                path: path.to_path_buf(),
                stored_at: Instant::now(),
            },
        );
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        let count = entries.len();
        entries.clear();
        info!("Cleared {} cached video entries", count);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with(capacity: usize, ttl_secs: u64) -> VideoCache {
        VideoCache::new(&CacheConfig {
            capacity,
            ttl_secs,
            cleanup_cron: String::new(),
        })
    }

    fn temp_file(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("linkfixer-cache-test-{name}"));
        std::fs::write(&path, b"video").unwrap();
        path
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = cache_with(8, 3600);
        let file = temp_file("hit.mp4");
        cache.insert("https://vm.tiktok.com/abc", &file).await;
        assert_eq!(cache.get("https://vm.tiktok.com/abc").await, Some(file));
        assert_eq!(cache.get("https://vm.tiktok.com/other").await, None);
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_used() {
        let cache = cache_with(2, 3600);
        let f1 = temp_file("one.mp4");
        let f2 = temp_file("two.mp4");
        let f3 = temp_file("three.mp4");
        cache.insert("u1", &f1).await;
        cache.insert("u2", &f2).await;
        cache.insert("u3", &f3).await;
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get("u1").await, None);
        assert!(cache.get("u3").await.is_some());
    }

    #[tokio::test]
    async fn test_expired_entry_is_dropped() {
        let cache = cache_with(8, 0);
        let file = temp_file("expired.mp4");
        cache.insert("u", &file).await;
        // ttl of zero means the entry is stale by the time we read it
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.get("u").await, None);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_missing_file_invalidates_entry() {
        let cache = cache_with(8, 3600);
        let file = temp_file("deleted.mp4");
        cache.insert("u", &file).await;
        std::fs::remove_file(&file).unwrap();
        assert_eq!(cache.get("u").await, None);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = cache_with(8, 3600);
        let file = temp_file("clear.mp4");
        cache.insert("a", &file).await;
        cache.insert("b", &file).await;
        cache.clear().await;
        assert_eq!(cache.len().await, 0);
    }
}
