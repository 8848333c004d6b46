use std::{collections::HashMap, sync::Mutex, time::Duration};

use serde_json::{json, Value};
use tokio::time::Instant;

use crate::logging::ScopedLogger;

/// Process-local key/value store shared by controllers.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    /// Store with the default TTL.
    fn set(&self, key: &str, value: Value);

    fn set_with_ttl(&self, key: &str, value: Value, ttl: Duration);

    /// Returns whether a live entry was removed.
    fn remove(&self, key: &str) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CacheConfig {
    pub default_ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
            max_entries: 10_000,
        }
    }
}

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// TTL cache with a size bound.
///
/// When full, expired entries are purged first; if that frees nothing the
/// entry closest to expiry is evicted.
pub struct MemoryCache {
    cfg: CacheConfig,
    entries: Mutex<HashMap<String, Entry>>,
    log: ScopedLogger,
}

impl MemoryCache {
    pub fn new(cfg: CacheConfig, log: ScopedLogger) -> Self {
        Self {
            cfg,
            entries: Mutex::new(HashMap::new()),
            log,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn make_room(&self, entries: &mut HashMap<String, Entry>, now: Instant) {
        if self.cfg.max_entries == 0 || entries.len() < self.cfg.max_entries {
            return;
        }
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        if entries.len() >= self.cfg.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.expires_at)
                .map(|(k, _)| k.clone());
            if let Some(k) = oldest {
                entries.remove(&k);
            }
        }
        self.log.debug(
            "cache full, evicted entries",
            Some(json!({ "evicted": before - entries.len(), "max_entries": self.cfg.max_entries })),
        );
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(e) if e.expires_at > now => Some(e.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: Value) {
        self.set_with_ttl(key, value, self.cfg.default_ttl);
    }

    fn set_with_ttl(&self, key: &str, value: Value, ttl: Duration) {
        if self.cfg.max_entries == 0 {
            return;
        }
        let now = Instant::now();
        let mut entries = self.lock();
        if !entries.contains_key(key) {
            self.make_room(&mut entries, now);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    fn remove(&self, key: &str) -> bool {
        let now = Instant::now();
        self.lock()
            .remove(key)
            .is_some_and(|e| e.expires_at > now)
    }

    fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().values().filter(|e| e.expires_at > now).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::RunMode, logging::Logger};

    fn cache(ttl_secs: u64, max_entries: usize) -> MemoryCache {
        MemoryCache::new(
            CacheConfig {
                default_ttl: Duration::from_secs(ttl_secs),
                max_entries,
            },
            Logger::new(RunMode::Development).with_scope("cache"),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let c = cache(10, 100);
        c.set("k", json!("v"));
        assert_eq!(c.get("k"), Some(json!("v")));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(c.get("k"), Some(json!("v")));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(c.get("k"), None);
        assert!(c.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn per_entry_ttl_overrides_default() {
        let c = cache(3600, 100);
        c.set_with_ttl("short", json!(1), Duration::from_secs(1));
        c.set("long", json!(2));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(c.get("short"), None);
        assert_eq!(c.get("long"), Some(json!(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn full_cache_evicts_expired_first() {
        let c = cache(3600, 2);
        c.set_with_ttl("stale", json!(0), Duration::from_secs(1));
        c.set("a", json!(1));
        tokio::time::advance(Duration::from_secs(2)).await;

        c.set("b", json!(2));

        assert_eq!(c.len(), 2);
        assert_eq!(c.get("a"), Some(json!(1)));
        assert_eq!(c.get("b"), Some(json!(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn full_cache_evicts_entry_closest_to_expiry() {
        let c = cache(3600, 2);
        c.set_with_ttl("soon", json!(0), Duration::from_secs(60));
        c.set("a", json!(1));

        c.set("b", json!(2));

        assert_eq!(c.get("soon"), None);
        assert_eq!(c.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_does_not_evict() {
        let c = cache(3600, 2);
        c.set("a", json!(1));
        c.set("b", json!(2));
        c.set("a", json!(3));

        assert_eq!(c.get("a"), Some(json!(3)));
        assert_eq!(c.get("b"), Some(json!(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn remove_reports_live_entries_only() {
        let c = cache(1, 10);
        c.set("a", json!(1));
        assert!(c.remove("a"));
        assert!(!c.remove("a"));

        c.set("b", json!(1));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!c.remove("b"));
    }
}
