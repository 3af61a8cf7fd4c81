//缓存层实现
// resolve_cache.rs
use dashmap::DashMap;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Key/value store where every entry lives for a fixed TTL from its last set.
///
/// Expired entries are dropped lazily on `get` and, when a purger is running,
/// eagerly in the background. Concurrent misses are not coalesced: callers
/// racing on the same key each compute and `set`, and the last one wins.
pub struct ResolveCache<K, V> {
    cache: DashMap<K, (V, Instant)>,
    ttl: Duration,
}

impl<K, V> ResolveCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let expired = match self.cache.get(key) {
            Some(entry) => {
                let (value, inserted) = entry.value();
                if inserted.elapsed() < self.ttl {
                    return Some(value.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            // 重新检查时间戳，避免删掉并发写入的新值
            self.cache
                .remove_if(key, |_, (_, inserted)| inserted.elapsed() >= self.ttl);
        }
        None
    }

    pub fn set(&self, key: K, value: V) {
        self.cache.insert(key, (value, Instant::now()));
    }

    /// Removes `key`, returning whether a live entry was removed.
    pub fn delete(&self, key: &K) -> bool {
        match self.cache.remove(key) {
            Some((_, (_, inserted))) => inserted.elapsed() < self.ttl,
            None => false,
        }
    }

    /// Copy of every live entry.
    pub fn snapshot(&self) -> HashMap<K, V> {
        self.cache
            .iter()
            .filter(|entry| entry.value().1.elapsed() < self.ttl)
            .map(|entry| (entry.key().clone(), entry.value().0.clone()))
            .collect()
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut purged = 0;
        self.cache.retain(|_, (_, inserted)| {
            let live = inserted.elapsed() < self.ttl;
            if !live {
                purged += 1;
            }
            live
        });
        purged
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl<K, V> ResolveCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Spawns a task purging expired entries every `every`. The task only
    /// holds a weak reference and exits once the cache is dropped.
    pub fn spawn_purger(cache: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(cache);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // 第一次 tick 立即返回
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                let purged = cache.purge_expired();
                if purged > 0 {
                    log::debug!("purged {} expired cache entries", purged);
                }
            }
        })
    }
}
