//! Reconciliation report models

use crate::{ids::SyncRunId, identity::PrincipalKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters for one pass (one principal kind)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassStats {
    pub created: u32,
    pub updated: u32,
    pub unchanged: u32,
    pub deleted: u32,
    /// Skipped by policy (no primary group, no active key in strict mode)
    pub skipped: u32,
    pub failed: u32,
}

impl PassStats {
    /// Directory writes caused by this pass
    pub fn changes(&self) -> u32 {
        self.created + self.updated + self.deleted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus {
    Success,
    PartialSuccess,
    Failed,
}

/// A failure isolated to one principal, or to a whole pass when `name` is empty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileError {
    pub kind: PrincipalKind,
    pub name: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of one reconciliation cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub run_id: SyncRunId,
    pub status: ReconcileStatus,
    /// Whether this cycle performed the one-time bootstrap
    pub bootstrapped: bool,
    pub groups: PassStats,
    pub users: PassStats,
    /// `None` when the role pass is disabled
    pub roles: Option<PassStats>,
    pub errors: Vec<ReconcileError>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ReconciliationReport {
    pub fn begin() -> Self {
        let now = Utc::now();
        Self {
            run_id: SyncRunId::new(),
            status: ReconcileStatus::Success,
            bootstrapped: false,
            groups: PassStats::default(),
            users: PassStats::default(),
            roles: None,
            errors: Vec::new(),
            started_at: now,
            completed_at: now,
            duration_ms: 0,
        }
    }

    pub fn stats_mut(&mut self, kind: PrincipalKind) -> &mut PassStats {
        match kind {
            PrincipalKind::Group => &mut self.groups,
            PrincipalKind::User => &mut self.users,
            PrincipalKind::Role => self.roles.get_or_insert_with(PassStats::default),
        }
    }

    /// Record a failure for one principal
    pub fn record_failure(&mut self, kind: PrincipalKind, name: &str, message: impl Into<String>) {
        self.stats_mut(kind).failed += 1;
        self.errors.push(ReconcileError {
            kind,
            name: Some(name.to_string()),
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    /// Record a failure that aborted a whole pass (e.g. the remote listing)
    pub fn record_pass_failure(&mut self, kind: PrincipalKind, message: impl Into<String>) {
        self.errors.push(ReconcileError {
            kind,
            name: None,
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn total_deleted(&self) -> u32 {
        self.groups.deleted + self.users.deleted + self.roles.map(|r| r.deleted).unwrap_or(0)
    }

    pub fn total_changes(&self) -> u32 {
        self.groups.changes() + self.users.changes() + self.roles.map(|r| r.changes()).unwrap_or(0)
    }

    /// Stamp completion time and derive the overall status
    pub fn finish(&mut self) {
        self.completed_at = Utc::now();
        self.duration_ms = (self.completed_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64;

        let succeeded = self.groups.created
            + self.groups.updated
            + self.groups.unchanged
            + self.users.created
            + self.users.updated
            + self.users.unchanged
            + self
                .roles
                .map(|r| r.created + r.updated + r.unchanged)
                .unwrap_or(0);

        self.status = if self.errors.is_empty() {
            ReconcileStatus::Success
        } else if succeeded == 0 {
            ReconcileStatus::Failed
        } else {
            ReconcileStatus::PartialSuccess
        };
    }
}
