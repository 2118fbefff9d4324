use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use super::entry::Entry;
use super::paths::NormalizedPath;

pub const DEFAULT_LISTING_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    stored_at: Instant,
}

/// Listings by normalized path, served while younger than the TTL.
///
/// Expired values stay in the map until overwritten or invalidated but are
/// never returned. Failed listings are never stored.
#[derive(Debug)]
pub struct PathCache<T = Vec<Entry>> {
    ttl: Duration,
    entries: HashMap<NormalizedPath, CacheEntry<T>>,
}

impl<T: Clone> PathCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, path: &NormalizedPath) -> Option<T> {
        let entry = self.entries.get(path)?;
        if entry.stored_at.elapsed() < self.ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    pub fn set(&mut self, path: NormalizedPath, value: T) {
        self.entries.insert(
            path,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&mut self, path: &NormalizedPath) {
        self.entries.remove(path);
    }

    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone> Default for PathCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_LISTING_TTL)
    }
}
