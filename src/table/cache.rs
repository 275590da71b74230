use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use lru::LruCache;
use tracing::debug;

use crate::error::Result;
use crate::table::feather::{FeatherTable, open_feather};

/// Identity of an opened file: canonical path plus the length and
/// modification time observed at open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub path: PathBuf,
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl CacheKey {
    pub fn for_path(path: &Path) -> Result<Self> {
        let path = std::fs::canonicalize(path)?;
        let meta = std::fs::metadata(&path)?;
        Ok(Self {
            path,
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

pub struct HandleCache {
    entries: Mutex<LruCache<PathBuf, (CacheKey, Arc<FeatherTable>)>>,
}

pub const DEFAULT_CACHE_CAPACITY: usize = 8;

impl Default for HandleCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl fmt::Debug for HandleCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.lock();
        f.debug_struct("HandleCache")
            .field("capacity", &entries.cap())
            .field("len", &entries.len())
            .finish()
    }
}

impl HandleCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn open(&self, path: &Path) -> Result<Arc<FeatherTable>> {
        let key = CacheKey::for_path(path)?;
        {
            let mut entries = self.lock();
            let hit = entries
                .get(&key.path)
                .map(|(cached_key, table)| (*cached_key == key, Arc::clone(table)));
            match hit {
                Some((true, table)) => return Ok(table),
                Some((false, _)) => {
                    debug!(path = %key.path.display(), "file changed on disk; dropping cached handle");
                    entries.pop(&key.path);
                }
                None => {}
            }
        }

        // Opened without holding the lock.
        let table = Arc::new(open_feather(&key.path)?);
        let path = key.path.clone();
        let mut entries = self.lock();
        if let Some((evicted, _)) = entries.push(path.clone(), (key, Arc::clone(&table))) {
            if evicted != path {
                debug!(path = %evicted.display(), "evicted cached handle");
            }
        }
        Ok(table)
    }

    pub fn invalidate(&self, path: &Path) -> bool {
        let target = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.lock().pop(&target).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<PathBuf, (CacheKey, Arc<FeatherTable>)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/table/cache.rs"]
mod tests;
