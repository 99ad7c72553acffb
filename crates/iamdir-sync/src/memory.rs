//! In-memory directory
//!
//! A `DirectoryAdapter` over a map, used by tests and local dry runs. Paths are
//! compared in normalized form, adding an existing path fails, and deleting an
//! entry that still has children is refused, as a real directory server would.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::trace;

use iamdir_core::{
    is_descendant, normalize_path, DirectoryAdapter, Entry, IamDirError, Modification,
    ObjectClassFilter, Result,
};

#[derive(Default)]
pub struct MemoryDirectory {
    entries: RwLock<BTreeMap<String, Entry>>,
    writes: AtomicU64,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful add/modify/delete calls so far
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Copy of every entry, ordered by normalized path
    pub async fn snapshot(&self) -> Vec<Entry> {
        self.entries.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DirectoryAdapter for MemoryDirectory {
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.entries.read().await.contains_key(&normalize_path(path)))
    }

    async fn lookup(&self, path: &str) -> Result<Option<Entry>> {
        Ok(self.entries.read().await.get(&normalize_path(path)).cloned())
    }

    async fn add(&self, entry: Entry) -> Result<()> {
        let key = normalize_path(entry.path());
        let mut entries = self.entries.write().await;
        if entries.contains_key(&key) {
            return Err(IamDirError::already_exists(entry.path()));
        }
        trace!(path = %entry.path(), "add");
        entries.insert(key, entry);
        self.record_write();
        Ok(())
    }

    async fn modify(&self, path: &str, modifications: Vec<Modification>) -> Result<()> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&normalize_path(path))
            .ok_or_else(|| IamDirError::not_found("entry", path))?;
        trace!(path = %path, count = modifications.len(), "modify");
        for modification in &modifications {
            entry.apply(modification);
        }
        self.record_write();
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let key = normalize_path(path);
        let mut entries = self.entries.write().await;
        if !entries.contains_key(&key) {
            return Err(IamDirError::not_found("entry", path));
        }
        if entries.keys().any(|other| is_descendant(other, &key)) {
            return Err(IamDirError::directory(format!(
                "cannot delete non-leaf entry {}",
                path
            )));
        }
        trace!(path = %path, "delete");
        entries.remove(&key);
        self.record_write();
        Ok(())
    }

    async fn search(&self, base: &str, filter: &ObjectClassFilter) -> Result<Vec<Entry>> {
        let entries = self.entries.read().await;
        if !entries.contains_key(&normalize_path(base)) {
            return Err(IamDirError::not_found("search base", base));
        }
        Ok(entries
            .values()
            .filter(|entry| is_descendant(entry.path(), base) && filter.matches(entry))
            .cloned()
            .collect())
    }
}
