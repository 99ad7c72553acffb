//! Collaborator traits
//!
//! The core never talks to a concrete directory server or IAM SDK; both sit
//! behind these seams so the engine can be driven by in-memory fakes in tests.

use crate::{
    directory::{Entry, Modification, ObjectClassFilter},
    error::Result,
    identity::{AccessKeyMetadata, Page, RemoteGroup, RemoteRole, RemoteUser},
    ids::NumericId,
};
use async_trait::async_trait;

// =============================================================================
// Directory
// =============================================================================

/// Path-addressed entry CRUD against the directory store.
///
/// Implementations report a missing entry as `IamDirError::NotFound` from
/// `modify`/`delete`; callers treat that as absence.
#[async_trait]
pub trait DirectoryAdapter: Send + Sync {
    /// Whether an entry exists at `path`
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Fetch an entry with all user attributes, `None` if absent
    async fn lookup(&self, path: &str) -> Result<Option<Entry>>;

    /// Add a new entry; fails with `AlreadyExists` if the path is taken
    async fn add(&self, entry: Entry) -> Result<()>;

    /// Apply attribute modifications to an existing entry
    async fn modify(&self, path: &str, modifications: Vec<Modification>) -> Result<()>;

    /// Delete a leaf entry
    async fn delete(&self, path: &str) -> Result<()>;

    /// Subtree search below `base` (the base entry itself is excluded)
    async fn search(&self, base: &str, filter: &ObjectClassFilter) -> Result<Vec<Entry>>;
}

// =============================================================================
// IAM Provider
// =============================================================================

/// Raw IAM listing calls, one page per call.
///
/// `marker` is the continuation cursor from the previous page (`None` for the
/// first page).
#[async_trait]
pub trait IamClient: Send + Sync {
    async fn list_groups(&self, marker: Option<String>) -> Result<Page<RemoteGroup>>;

    async fn list_users(&self, marker: Option<String>) -> Result<Page<RemoteUser>>;

    async fn list_roles(&self, marker: Option<String>) -> Result<Page<RemoteRole>>;

    async fn list_groups_for_user(
        &self,
        user_name: &str,
        marker: Option<String>,
    ) -> Result<Page<RemoteGroup>>;

    async fn list_access_keys(
        &self,
        user_name: &str,
        marker: Option<String>,
    ) -> Result<Page<AccessKeyMetadata>>;
}

// =============================================================================
// ID Counter Storage
// =============================================================================

/// Durable storage for the single numeric ID counter.
///
/// Only the allocator calls this, and always under its critical section.
#[async_trait]
pub trait IdStore: Send + Sync {
    /// Current (last issued) counter value
    async fn load(&self) -> Result<NumericId>;

    /// Persist a new counter value; must be durable before returning
    async fn persist(&self, value: NumericId) -> Result<()>;
}
