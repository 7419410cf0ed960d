use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::RwLock;

use lru::LruCache;
use sha2::{Digest, Sha256};

use modelql_core::Value;

use crate::descriptor::Record;

/// Opt-in LRU memo of read results. Keys hash the rendered SQL and its
/// arguments; entries remember which tables the query touched so any
/// write through the executor can drop the results it may have
/// invalidated. Hits hand back deep copies.
#[derive(Debug)]
pub struct ResultCache {
    inner: RwLock<LruCache<String, CachedResult>>,
}

#[derive(Debug, Clone)]
struct CachedResult {
    tables: BTreeSet<String>,
    records: Vec<Record>,
}

impl ResultCache {
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: RwLock::new(LruCache::new(capacity)),
        }
    }

    /// Deterministic key: SHA-256 over the SQL text and the canonical
    /// rendering of every argument.
    #[must_use]
    pub fn key(sql: &str, args: &[Value]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(sql.as_bytes());
        for arg in args {
            hasher.update([0]);
            hasher.update(arg.cache_repr().as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<Record>> {
        let mut cache = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.get(key).map(|cached| cached.records.clone())
    }

    pub fn put(&self, key: String, tables: BTreeSet<String>, records: Vec<Record>) {
        let mut cache = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.put(key, CachedResult { tables, records });
    }

    /// Drops every entry whose query touched `table`.
    pub fn invalidate_table(&self, table: &str) {
        let mut cache = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let stale = cache
            .iter()
            .filter(|(_, cached)| cached.tables.contains(table))
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();
        for key in stale {
            cache.pop(&key);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
