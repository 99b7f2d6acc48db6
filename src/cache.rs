//! Table of resolved remote objects, keyed by (server, path).
//!
//! The cache owns a strong reference to each entry and evicts the least
//! recently used one beyond its capacity. Eviction only forgets a node:
//! callers holding it keep a working object, and the next lookup of the same
//! path creates a fresh one.
//!
//! Lookups of one path are serialized through [`ObjectCache::lock_path`], so
//! concurrent resolutions of a path issue at most one LOOKUP and converge on
//! a single node.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

use crate::node::NfsNode;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub server: String,
    pub path: String,
}

impl CacheKey {
    pub fn new(server: &str, path: &str) -> Self {
        Self { server: server.to_string(), path: path.to_string() }
    }
}

#[derive(Default)]
struct Table {
    next_use: u64,
    entries: HashMap<CacheKey, (u64, Arc<NfsNode>)>,
    /// Last use to key, oldest first
    recency: BTreeMap<u64, CacheKey>,
}

impl Table {
    fn touch(&mut self, key: &CacheKey) -> Option<Arc<NfsNode>> {
        self.next_use += 1;
        let next_use = self.next_use;
        let (used, node) = self.entries.get_mut(key)?;
        self.recency.remove(used);
        *used = next_use;
        self.recency.insert(next_use, key.clone());
        Some(Arc::clone(node))
    }

    fn remove(&mut self, key: &CacheKey) -> Option<Arc<NfsNode>> {
        let (used, node) = self.entries.remove(key)?;
        self.recency.remove(&used);
        Some(node)
    }
}

pub struct ObjectCache {
    capacity: usize,
    table: Mutex<Table>,
    path_locks: Mutex<HashMap<CacheKey, Weak<AsyncMutex<()>>>>,
}

impl ObjectCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            table: Mutex::new(Table::default()),
            path_locks: Mutex::new(HashMap::new()),
        }
    }

    fn table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.table().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<NfsNode>> {
        self.table().touch(key)
    }

    /// Adds `node` under its own server and path, replacing any previous entry.
    pub fn insert(&self, node: Arc<NfsNode>) {
        let key = CacheKey::new(node.server(), node.path());
        let mut table = self.table();
        table.remove(&key);
        table.next_use += 1;
        let used = table.next_use;
        table.recency.insert(used, key.clone());
        table.entries.insert(key, (used, node));

        while table.entries.len() > self.capacity {
            let Some((_, oldest)) = table.recency.pop_first() else {
                break;
            };
            trace!("evicting {}:{}", oldest.server, oldest.path);
            table.entries.remove(&oldest);
        }
    }

    pub fn remove(&self, key: &CacheKey) -> Option<Arc<NfsNode>> {
        self.table().remove(key)
    }

    /// Removes `key` and every entry below it.
    pub fn remove_tree(&self, key: &CacheKey) {
        let prefix =
            if key.path.ends_with('/') { key.path.clone() } else { format!("{}/", key.path) };
        let mut table = self.table();
        let doomed: Vec<CacheKey> = table
            .entries
            .keys()
            .filter(|k| {
                k.server == key.server && (k.path == key.path || k.path.starts_with(&prefix))
            })
            .cloned()
            .collect();
        for key in doomed {
            table.remove(&key);
        }
    }

    pub fn clear(&self) {
        let mut table = self.table();
        table.entries.clear();
        table.recency.clear();
    }

    /// Serializes resolution of one path. The guard is held across the
    /// LOOKUP round trip.
    pub async fn lock_path(&self, key: &CacheKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.path_locks.lock().unwrap_or_else(PoisonError::into_inner);
            if locks.len() > self.capacity {
                locks.retain(|_, lock| lock.strong_count() > 0);
            }
            match locks.get(key).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(AsyncMutex::new(()));
                    locks.insert(key.clone(), Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NfsClient;
    use crate::config::ClientConfig;

    #[test]
    fn least_recently_used_entry_is_evicted() {
        let client = NfsClient::new(ClientConfig::default().with_cache_capacity(2));
        let cache = client.cache();
        client.public_root("a");
        client.public_root("b");
        assert!(cache.get(&CacheKey::new("a", "/")).is_some());

        client.public_root("c");
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&CacheKey::new("b", "/")).is_none());
        assert!(cache.get(&CacheKey::new("a", "/")).is_some());
        assert!(cache.get(&CacheKey::new("c", "/")).is_some());
    }

    #[test]
    fn evicted_node_stays_usable() {
        let client = NfsClient::new(ClientConfig::default().with_cache_capacity(1));
        let first = client.public_root("a");
        client.public_root("b");
        assert!(client.cache().get(&CacheKey::new("a", "/")).is_none());
        assert_eq!(first.server(), "a");
        assert!(!Arc::ptr_eq(&first, &client.public_root("a")));
    }

    #[tokio::test]
    async fn path_locks_are_shared_per_key() {
        let cache = ObjectCache::new(4);
        let key = CacheKey::new("s", "/x");
        let guard = cache.lock_path(&key).await;
        assert!(cache.path_locks.lock().unwrap()[&key].upgrade().unwrap().try_lock().is_err());
        let other = cache.lock_path(&CacheKey::new("s", "/y")).await;
        drop(guard);
        drop(other);
        assert!(cache.path_locks.lock().unwrap()[&key].upgrade().is_none());
    }
}
