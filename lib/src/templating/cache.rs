use std::collections::VecDeque;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;

/// A bounded store of loaded template text.
///
/// Eviction is by insertion order: when a new key is inserted into a full
/// cache, the key that was inserted first is removed. Reads never change the
/// eviction order.
///
/// ```rust
/// use gazette::templating::TemplateCache;
///
/// let mut cache = TemplateCache::new(2);
/// cache.put("a.html", "A");
/// cache.put("b.html", "B");
/// assert!(cache.get("a.html").is_some());
///
/// cache.put("c.html", "C");
/// assert!(cache.get("a.html").is_none());
///
/// let stats = cache.stats();
/// let keys: Vec<&str> = stats.keys.iter().map(|k| &**k).collect();
/// assert_eq!(keys, ["b.html", "c.html"]);
/// ```
#[derive(Debug, Default)]
pub struct TemplateCache {
    max_entries: usize,
    order: VecDeque<Arc<str>>,
    entries: FxHashMap<Arc<str>, Arc<str>>,
}

/// A snapshot of a [`TemplateCache`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    /// Cached keys, oldest first.
    pub keys: Vec<Arc<str>>,
}

impl TemplateCache {
    /// A cache holding at most `max_entries` templates. A cache with a
    /// capacity of `0` stores nothing.
    pub fn new(max_entries: usize) -> Self {
        TemplateCache {
            max_entries,
            order: VecDeque::with_capacity(max_entries.min(64)),
            entries: FxHashMap::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<str>> {
        self.entries.get(key).cloned()
    }

    /// Inserts `text` at `key`, first evicting the oldest entry if the cache
    /// is full. Replacing the text of a cached key evicts nothing and keeps
    /// the key's position.
    pub fn put<K: Into<Arc<str>>, V: Into<Arc<str>>>(&mut self, key: K, text: V) {
        if self.max_entries == 0 {
            return;
        }

        let key = key.into();
        if let Some(existing) = self.entries.get_mut(&key) {
            *existing = text.into();
            return;
        }

        if self.entries.len() >= self.max_entries {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                tracing::debug!(template = %oldest, "evicted template from cache");
            }
        }

        self.order.push_back(key.clone());
        self.entries.insert(key, text.into());
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len(),
            max_size: self.max_entries,
            keys: self.order.iter().cloned().collect(),
        }
    }
}
