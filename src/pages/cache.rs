use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Clone)]
struct CachedPage {
    model: Value,
    created_at: Instant,
}

/// Which cached pages a write makes stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    Nothing,
    Prefixes(&'static [&'static str]),
    /// Layout sources feed every page.
    All,
}

/// Page models keyed by method plus arguments, e.g. `pages.notices:2`.
pub struct PageCache {
    ttl: Duration,
    max_entries: usize,
    entries: HashMap<String, CachedPage>,
}

impl PageCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: HashMap::new(),
        }
    }

    pub fn get(&mut self, key: &str) -> Option<Value> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&mut self, key: &str, now: Instant) -> Option<Value> {
        let ttl = self.ttl;
        self.entries
            .retain(|_, v| now.saturating_duration_since(v.created_at) <= ttl);
        self.entries.get(key).map(|e| e.model.clone())
    }

    pub fn insert(&mut self, key: String, model: Value) {
        self.insert_at(key, model, Instant::now());
    }

    fn insert_at(&mut self, key: String, model: Value, now: Instant) {
        if self.max_entries == 0 {
            return;
        }
        let ttl = self.ttl;
        self.entries
            .retain(|_, v| now.saturating_duration_since(v.created_at) <= ttl);
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            if let Some(victim) = self
                .entries
                .iter()
                .min_by_key(|(_, v)| v.created_at)
                .map(|(k, _)| k.clone())
            {
                self.entries.remove(&victim);
            }
        }
        self.entries.insert(
            key,
            CachedPage {
                model,
                created_at: now,
            },
        );
    }

    pub fn invalidate_prefix(&mut self, prefix: &str) {
        self.entries.retain(|k, _| !k.starts_with(prefix));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn apply(&mut self, invalidation: Invalidation) {
        match invalidation {
            Invalidation::Nothing => {}
            Invalidation::Prefixes(prefixes) => {
                for prefix in prefixes {
                    self.invalidate_prefix(prefix);
                }
                debug!(?prefixes, "page cache invalidated");
            }
            Invalidation::All => {
                self.clear();
                debug!("page cache cleared");
            }
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entries_expire_after_ttl() {
        let mut cache = PageCache::new(Duration::from_secs(10), 8);
        let start = Instant::now();
        cache.insert_at("pages.home".to_string(), json!({"n": 1}), start);
        assert_eq!(
            cache.get_at("pages.home", start + Duration::from_secs(10)),
            Some(json!({"n": 1}))
        );
        assert_eq!(cache.get_at("pages.home", start + Duration::from_secs(11)), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn oldest_entry_is_evicted_when_full() {
        let mut cache = PageCache::new(Duration::from_secs(60), 2);
        let start = Instant::now();
        cache.insert_at("a".to_string(), json!(1), start);
        cache.insert_at("b".to_string(), json!(2), start + Duration::from_secs(1));
        cache.insert_at("c".to_string(), json!(3), start + Duration::from_secs(2));
        let now = start + Duration::from_secs(3);
        assert_eq!(cache.get_at("a", now), None);
        assert_eq!(cache.get_at("b", now), Some(json!(2)));
        assert_eq!(cache.get_at("c", now), Some(json!(3)));
    }

    #[test]
    fn prefix_invalidation_leaves_other_pages() {
        let mut cache = PageCache::new(Duration::from_secs(60), 16);
        for key in ["pages.notices:1", "pages.notices:2", "pages.notice:4", "pages.staff"] {
            cache.insert(key.to_string(), json!(key));
        }
        cache.apply(Invalidation::Prefixes(&["pages.notice"]));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("pages.staff").is_some());
        cache.apply(Invalidation::All);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn zero_capacity_disables_caching() {
        let mut cache = PageCache::new(Duration::from_secs(60), 0);
        cache.insert("pages.home".to_string(), json!({}));
        assert!(cache.get("pages.home").is_none());
    }
}
