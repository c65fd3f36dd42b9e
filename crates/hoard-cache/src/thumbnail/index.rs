//! In-memory LRU index over the thumbnail directory.
//!
//! Pure bookkeeping: the index never touches the filesystem. Callers delete
//! the paths it hands back as eviction victims.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

#[derive(Debug)]
struct IndexEntry {
    path: PathBuf,
    size: u64,
    last_access: u64,
    pins: usize,
}

/// Size-bounded LRU bookkeeping keyed by URL hash.
#[derive(Debug)]
pub(crate) struct LruIndex {
    entries: HashMap<String, IndexEntry>,
    /// Access tick to key, oldest first.
    order: BTreeMap<u64, String>,
    tick: u64,
    used_bytes: u64,
    budget: u64,
}

impl LruIndex {
    pub(crate) fn new(budget: u64) -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            tick: 0,
            used_bytes: 0,
            budget,
        }
    }

    /// Path of `key`, marking it most recently used.
    pub(crate) fn get(&mut self, key: &str) -> Option<PathBuf> {
        let tick = self.next_tick();
        let entry = self.entries.get_mut(key)?;
        self.order.remove(&entry.last_access);
        entry.last_access = tick;
        self.order.insert(tick, key.to_string());
        Some(entry.path.clone())
    }

    /// Admit an entry, first evicting unpinned least-recently-used entries
    /// until it fits. Returns the paths of evicted entries.
    ///
    /// An entry larger than the whole budget is still admitted once nothing
    /// else can be evicted.
    pub(crate) fn insert(&mut self, key: String, path: PathBuf, size: u64) -> Vec<PathBuf> {
        let mut victims = Vec::new();
        if let Some(old) = self.remove(&key) {
            if old != path {
                victims.push(old);
            }
        }

        while self.used_bytes.saturating_add(size) > self.budget {
            let Some(victim) = self.oldest_unpinned() else {
                break;
            };
            if let Some(evicted) = self.remove(&victim) {
                tracing::debug!(target: "hoard.cache", key = %victim, "Evicting thumbnail");
                victims.push(evicted);
            }
        }

        let tick = self.next_tick();
        self.order.insert(tick, key.clone());
        self.entries.insert(
            key,
            IndexEntry {
                path,
                size,
                last_access: tick,
                pins: 0,
            },
        );
        self.used_bytes += size;
        victims
    }

    /// Protect `key` from eviction until a matching `unpin`.
    pub(crate) fn pin(&mut self, key: &str) -> Option<PathBuf> {
        let path = self.get(key)?;
        if let Some(entry) = self.entries.get_mut(key) {
            entry.pins += 1;
        }
        Some(path)
    }

    pub(crate) fn unpin(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.pins = entry.pins.saturating_sub(1);
        }
    }

    /// Forget `key`, returning its path.
    pub(crate) fn remove(&mut self, key: &str) -> Option<PathBuf> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.last_access);
        self.used_bytes -= entry.size;
        Some(entry.path)
    }

    /// Forget every unpinned entry, returning their paths.
    pub(crate) fn clear(&mut self) -> Vec<PathBuf> {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.pins == 0)
            .map(|(k, _)| k.clone())
            .collect();
        keys.iter().filter_map(|k| self.remove(k)).collect()
    }

    pub(crate) const fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn oldest_unpinned(&self) -> Option<String> {
        self.order
            .values()
            .find(|key| self.entries.get(*key).is_some_and(|e| e.pins == 0))
            .cloned()
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}
