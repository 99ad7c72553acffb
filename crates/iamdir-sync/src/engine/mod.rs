//! Reconciliation engine
//!
//! One cycle converges the managed subtree to the remote IAM state:
//! - group pass, then user pass, then the optional role pass
//! - each pass fetches the full remote set, upserts every principal, then
//!   deletes directory entries that are no longer present remotely
//! - a failure while processing one principal is logged, recorded in the report
//!   and skipped; a failed remote listing skips the rest of that pass
//!
//! The first cycle bootstraps the subtree (creates the organizational units and
//! wipes their content). Only a bootstrap failure is returned as an error.

mod bootstrap;
mod entries;
mod groups;
mod roles;
mod users;

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info, instrument};

use iamdir_core::{
    normalize_path, DirectoryAdapter, DirectoryLayout, Entry, IamClient, ObjectClassFilter,
    PassStats, PrincipalKind, ReconciliationReport, Result,
};

use crate::allocator::IdAllocator;
use crate::config::EngineConfig;
use crate::fetcher::IamFetcher;

pub use entries::account_number_from_arn;

/// Engine lifecycle; moves to `Bootstrapped` once, on the first cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineLifecycle {
    Uninitialized,
    Bootstrapped,
}

/// Result of upserting one principal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Upsert {
    Created,
    Updated,
    Unchanged,
    Skipped,
    /// Skipped because the user has no mirrored primary group; the entry is
    /// treated as stale
    Ungrouped,
}

impl Upsert {
    fn tally(self, stats: &mut PassStats) {
        match self {
            Self::Created => stats.created += 1,
            Self::Updated => stats.updated += 1,
            Self::Unchanged => stats.unchanged += 1,
            Self::Skipped | Self::Ungrouped => stats.skipped += 1,
        }
    }
}

pub struct ReconciliationEngine {
    directory: Arc<dyn DirectoryAdapter>,
    fetcher: IamFetcher,
    allocator: IdAllocator,
    layout: DirectoryLayout,
    config: EngineConfig,
    lifecycle: EngineLifecycle,
}

impl ReconciliationEngine {
    pub fn new(
        directory: Arc<dyn DirectoryAdapter>,
        iam: Arc<dyn IamClient>,
        allocator: IdAllocator,
        layout: DirectoryLayout,
        config: EngineConfig,
    ) -> Self {
        let fetcher = IamFetcher::new(iam, config.call_timeout());
        Self {
            directory,
            fetcher,
            allocator,
            layout,
            config,
            lifecycle: EngineLifecycle::Uninitialized,
        }
    }

    pub fn lifecycle(&self) -> EngineLifecycle {
        self.lifecycle
    }

    pub fn layout(&self) -> &DirectoryLayout {
        &self.layout
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one poll cycle.
    ///
    /// Returns `Err` only when the first-cycle bootstrap fails; every other
    /// failure is carried in the report.
    #[instrument(skip(self), fields(root = %self.layout.root()))]
    pub async fn run_cycle(&mut self) -> Result<ReconciliationReport> {
        let mut report = ReconciliationReport::begin();

        if self.lifecycle == EngineLifecycle::Uninitialized {
            self.bootstrap().await?;
            report.bootstrapped = true;
        }

        info!(run_id = %report.run_id.to_prefixed(), "Updating accounts from IAM");

        if let Err(e) = self.reconcile_groups(&mut report).await {
            error!("Group pass aborted: {}", e);
            report.record_pass_failure(PrincipalKind::Group, e.to_string());
        }

        if let Err(e) = self.reconcile_users(&mut report).await {
            error!("User pass aborted: {}", e);
            report.record_pass_failure(PrincipalKind::User, e.to_string());
        }

        if self.config.sync_roles {
            report.stats_mut(PrincipalKind::Role);
            if let Err(e) = self.reconcile_roles(&mut report).await {
                error!("Role pass aborted: {}", e);
                report.record_pass_failure(PrincipalKind::Role, e.to_string());
            }
        }

        report.finish();
        info!(
            run_id = %report.run_id.to_prefixed(),
            status = ?report.status,
            changes = report.total_changes(),
            deleted = report.total_deleted(),
            errors = report.errors.len(),
            duration_ms = report.duration_ms,
            "Reconciliation cycle complete"
        );
        Ok(report)
    }

    /// Existing entry at `path` carrying `marker`, if any
    async fn tagged(&self, path: &str, marker: &str) -> Result<Option<Entry>> {
        Ok(self
            .directory
            .lookup(path)
            .await?
            .filter(|entry| entry.has_object_class(marker)))
    }

    /// Subtree search where a missing base reads as empty
    async fn search(&self, base: &str, class: &str) -> Result<Vec<Entry>> {
        match self
            .directory
            .search(base, &ObjectClassFilter::class(class))
            .await
        {
            Ok(entries) => Ok(entries),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Delete an entry; returns false when it was already gone
    async fn delete_if_present(&self, path: &str) -> Result<bool> {
        match self.directory.delete(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Split `current` against `desired`, comparing paths in normalized form.
///
/// Returns the values to remove (as stored) and the values to add.
fn path_diff(
    current: &BTreeSet<String>,
    desired: &BTreeSet<String>,
) -> (BTreeSet<String>, BTreeSet<String>) {
    let current_keys: BTreeSet<String> = current.iter().map(|p| normalize_path(p)).collect();
    let desired_keys: BTreeSet<String> = desired.iter().map(|p| normalize_path(p)).collect();

    let stale = current
        .iter()
        .filter(|p| !desired_keys.contains(&normalize_path(p)))
        .cloned()
        .collect();
    let missing = desired
        .iter()
        .filter(|p| !current_keys.contains(&normalize_path(p)))
        .cloned()
        .collect();
    (stale, missing)
}
