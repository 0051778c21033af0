use crate::logging::log_info;
use anyhow::Result;
use chrono::Utc;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Response bodies keyed by API path. Plugged into `MetroApi` to avoid
/// hammering the feed while iterating on the map.
pub trait ResponseCache {
    fn get(&mut self, path: &str) -> Option<String>;
    fn put(&mut self, path: &str, body: String);
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CachedResponse {
    pub fetched_at: i64,
    pub body: String,
}

pub struct MemoryCache {
    ttl: Duration,
    entries: HashMap<CompactString, CachedResponse>,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn get_at(&mut self, path: &str, now: i64) -> Option<String> {
        let ttl = self.ttl.as_secs() as i64;
        match self.entries.get(path) {
            Some(entry) if entry.fetched_at + ttl >= now => Some(entry.body.clone()),
            Some(_) => {
                self.entries.remove(path);
                None
            }
            None => None,
        }
    }

    fn put_at(&mut self, path: &str, body: String, now: i64) {
        self.entries.insert(
            CompactString::from(path),
            CachedResponse {
                fetched_at: now,
                body,
            },
        );
    }
}

impl ResponseCache for MemoryCache {
    fn get(&mut self, path: &str) -> Option<String> {
        self.get_at(path, Utc::now().timestamp())
    }

    fn put(&mut self, path: &str, body: String) {
        self.put_at(path, body, Utc::now().timestamp());
    }
}

/// A `MemoryCache` that is loaded from and flushed to `<dir>/responses.bin`.
pub struct DiskCache {
    path: PathBuf,
    inner: MemoryCache,
}

impl DiskCache {
    pub fn open(dir: &Path, ttl: Duration) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("responses.bin");
        let mut inner = MemoryCache::new(ttl);
        if path.exists() {
            let f = File::open(&path)?;
            inner.entries = bincode::deserialize_from(f)?;
            log_info(&format!(
                "Loaded {} cached responses from {}",
                inner.len(),
                path.display()
            ));
        }
        Ok(Self { path, inner })
    }
}

impl ResponseCache for DiskCache {
    fn get(&mut self, path: &str) -> Option<String> {
        self.inner.get(path)
    }

    fn put(&mut self, path: &str, body: String) {
        self.inner.put(path, body);
    }

    fn flush(&mut self) -> Result<()> {
        let f = File::create(&self.path)?;
        bincode::serialize_into(f, &self.inner.entries)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_cache_expires() {
        let mut cache = MemoryCache::new(Duration::from_secs(60));
        cache.put_at("times/WTL/1", "[]".to_string(), 1_000);

        assert_eq!(cache.get_at("times/WTL/1", 1_030).as_deref(), Some("[]"));
        assert_eq!(cache.get_at("times/WTL/2", 1_030), None);
        assert_eq!(cache.get_at("times/WTL/1", 1_061), None);
        assert_eq!(cache.len(), 0, "Expired entry should be dropped");
    }

    #[test]
    fn test_disk_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut cache = DiskCache::open(dir.path(), Duration::from_secs(3600)).unwrap();
            cache.put("stations", r#"{"WTL":"Wallsend"}"#.to_string());
            cache.flush().unwrap();
        }
        let mut reopened = DiskCache::open(dir.path(), Duration::from_secs(3600)).unwrap();
        assert_eq!(
            reopened.get("stations").as_deref(),
            Some(r#"{"WTL":"Wallsend"}"#)
        );
        assert_eq!(reopened.get("times/WTL/1"), None);
    }
}
