//! Numeric ID allocation
//!
//! `uidNumber` and `gidNumber` values come from one persisted counter. Every
//! allocation is a read-modify-write of that counter, serialised by a single
//! process-wide lock so the scheduled sync and any on-demand provisioning path
//! can never hand out the same value twice.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, instrument};

use iamdir_core::{
    schema, DirectoryAdapter, Entry, IamDirError, IdStore, Modification, NumericId, Result,
};

/// Guards every counter read-modify-write in the process, across all allocators
static ALLOCATION_LOCK: Mutex<()> = Mutex::const_new(());

/// Counter value written when the counter entry is first created
pub const INITIAL_COUNTER: NumericId = NumericId::new(1000);

/// Issues unique, strictly increasing numeric ids
#[derive(Clone)]
pub struct IdAllocator {
    store: Arc<dyn IdStore>,
}

impl IdAllocator {
    pub fn new(store: Arc<dyn IdStore>) -> Self {
        Self { store }
    }

    /// Allocate the next id.
    ///
    /// The new value is persisted before it is returned. A persistence failure
    /// propagates; callers abort only the principal being processed.
    #[instrument(skip(self))]
    pub async fn allocate(&self) -> Result<NumericId> {
        let _guard = ALLOCATION_LOCK.lock().await;

        let current = self.store.load().await.map_err(|e| {
            error!("Failed to read ID counter: {}", e);
            IamDirError::allocation(format!("reading counter: {}", e))
        })?;
        let next = current
            .next()
            .ok_or_else(|| IamDirError::allocation("counter exhausted"))?;

        self.store.persist(next).await.map_err(|e| {
            error!("Failed to persist ID counter {}: {}", next, e);
            IamDirError::allocation(format!("persisting counter {}: {}", next, e))
        })?;

        debug!(id = %next, "Allocated numeric id");
        Ok(next)
    }
}

// =============================================================================
// Directory-backed counter
// =============================================================================

/// Keeps the counter in a directory entry's `uidNumber` attribute.
///
/// The entry is created with `INITIAL_COUNTER` the first time it is read.
pub struct DirectoryIdStore {
    directory: Arc<dyn DirectoryAdapter>,
    path: String,
}

impl DirectoryIdStore {
    pub fn new(directory: Arc<dyn DirectoryAdapter>, path: impl Into<String>) -> Self {
        Self {
            directory,
            path: path.into(),
        }
    }

    fn counter_entry(&self) -> Entry {
        Entry::new(self.path.clone())
            .with_values(schema::OBJECT_CLASS, [schema::TOP, schema::EXTENSIBLE_OBJECT])
            .with(schema::CN, "idcounter")
            .with(schema::UID_NUMBER, INITIAL_COUNTER.to_string())
    }
}

#[async_trait]
impl IdStore for DirectoryIdStore {
    async fn load(&self) -> Result<NumericId> {
        let entry = match self.directory.lookup(&self.path).await? {
            Some(entry) => entry,
            None => {
                debug!(path = %self.path, "Creating ID counter entry");
                let entry = self.counter_entry();
                self.directory.add(entry.clone()).await?;
                entry
            }
        };

        let raw = entry.first(schema::UID_NUMBER).ok_or_else(|| {
            IamDirError::allocation(format!("{} has no {}", self.path, schema::UID_NUMBER))
        })?;
        raw.parse::<NumericId>().map_err(|e| {
            IamDirError::allocation(format!("{} holds non-numeric value {:?}: {}", self.path, raw, e))
        })
    }

    async fn persist(&self, value: NumericId) -> Result<()> {
        self.directory
            .modify(
                &self.path,
                vec![Modification::replace(schema::UID_NUMBER, value.to_string())],
            )
            .await
    }
}

// =============================================================================
// In-memory counter
// =============================================================================

/// Volatile counter for tests and dry runs
pub struct MemoryIdStore {
    value: std::sync::Mutex<NumericId>,
}

impl MemoryIdStore {
    pub fn new(start: NumericId) -> Self {
        Self {
            value: std::sync::Mutex::new(start),
        }
    }

    fn current(&self) -> Result<NumericId> {
        self.value
            .lock()
            .map(|v| *v)
            .map_err(|_| IamDirError::internal_error("ID counter lock poisoned"))
    }
}

impl Default for MemoryIdStore {
    fn default() -> Self {
        Self::new(INITIAL_COUNTER)
    }
}

#[async_trait]
impl IdStore for MemoryIdStore {
    async fn load(&self) -> Result<NumericId> {
        self.current()
    }

    async fn persist(&self, value: NumericId) -> Result<()> {
        let mut guard = self
            .value
            .lock()
            .map_err(|_| IamDirError::internal_error("ID counter lock poisoned"))?;
        *guard = value;
        Ok(())
    }
}
