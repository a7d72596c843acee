//! Memoization for slow resolvers
//!
//! A [ResolverCache] is an explicit object instead of process-wide state. Each top-level resolution
//! creates its own unless the caller passes a shared one, which long-lived processes (for example a
//! test harness) can [clear](ResolverCache::clear) between independent runs.
use crate::value::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source_directory: PathBuf,
    pub resolver: String,
    pub key: String,
}

impl CacheKey {
    pub fn new(source_directory: &Path, resolver: &str, key: impl Into<String>) -> Self {
        Self {
            source_directory: source_directory.to_path_buf(),
            resolver: resolver.to_string(),
            key: key.into(),
        }
    }
}

/// Cached lookups: either a value or a remembered "nothing there"
#[derive(Debug, Default)]
pub struct ResolverCache {
    entries: parking_lot::Mutex<HashMap<CacheKey, Option<Value>>>,
}

impl ResolverCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` on a miss, `Some(None)` for a cached absence
    pub fn get(&self, key: &CacheKey) -> Option<Option<Value>> {
        self.entries.lock().get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, value: Option<Value>) {
        tracing::trace!(?key, "cache insert");
        self.entries.lock().insert(key, value);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Drop every entry of one resolver type
    pub fn clear_resolver(&self, resolver: &str) {
        self.entries.lock().retain(|key, _| key.resolver != resolver);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keyed_by_directory_and_resolver() {
        let cache = ResolverCache::new();
        let here = CacheKey::new(Path::new("/a"), "git", "branch");
        let there = CacheKey::new(Path::new("/b"), "git", "branch");

        cache.insert(here.clone(), Some(Value::from("main")));
        cache.insert(CacheKey::new(Path::new("/a"), "file", "x.json"), None);

        assert_eq!(cache.get(&here), Some(Some(Value::from("main"))));
        assert_eq!(cache.get(&there), None);
        assert_eq!(cache.len(), 2);

        cache.clear_resolver("git");
        assert_eq!(cache.get(&here), None);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
