//! Group pass

use std::collections::{BTreeSet, HashSet};
use tracing::{debug, error, info, instrument};

use iamdir_core::{
    normalize_path, schema, Entry, IamDirError, Modification, PrincipalKind, ReconciliationReport,
    Result,
};

use super::{entries, ReconciliationEngine, Upsert};

impl ReconciliationEngine {
    #[instrument(skip_all)]
    pub(super) async fn reconcile_groups(&self, report: &mut ReconciliationReport) -> Result<()> {
        let groups = self.fetcher.groups().await?;
        debug!(count = groups.len(), "Fetched IAM groups");

        for group in &groups {
            match self.upsert_group(&group.name, false).await {
                Ok((outcome, _)) => outcome.tally(&mut report.groups),
                Err(e) => {
                    error!(group = %group.name, "Exception processing group: {}", e);
                    report.record_failure(PrincipalKind::Group, &group.name, e.to_string());
                }
            }
        }

        let remote: HashSet<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        self.remove_stale_groups(&remote, report).await;
        Ok(())
    }

    /// Ensure a group entry exists, returning it.
    ///
    /// Groups have no mutable fields: an existing tagged entry is left as is.
    /// A group and a role sharing a name map to the same path; the entry
    /// belongs to whichever kind created it and the other one fails.
    pub(super) async fn upsert_group(&self, name: &str, role_group: bool) -> Result<(Upsert, Entry)> {
        let path = self.layout.group_path(name);
        if let Some(existing) = self.tagged(&path, schema::IAM_GROUP).await? {
            if existing.has_object_class(schema::IAM_ROLE_GROUP) != role_group {
                let owner = if role_group { "an IAM group" } else { "an IAM role" };
                return Err(IamDirError::directory(format!(
                    "{} is already mirrored from {}",
                    path, owner
                )));
            }
            return Ok((Upsert::Unchanged, existing));
        }

        let gid = self.allocator.allocate().await?;
        let entry = entries::group(&path, name, gid, role_group);
        self.directory.add(entry.clone()).await?;
        info!(group = %name, gid = %gid, role_group, "Created group");
        Ok((Upsert::Created, entry))
    }

    /// Delete IAM groups missing remotely, then drop them from users' `memberOf`
    async fn remove_stale_groups(&self, remote: &HashSet<&str>, report: &mut ReconciliationReport) {
        let existing = match self
            .search(&self.layout.groups_base(), schema::IAM_GROUP)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                error!("Unable to list directory groups: {}", e);
                report.record_pass_failure(PrincipalKind::Group, e.to_string());
                return;
            }
        };

        let mut removed = BTreeSet::new();
        for entry in existing {
            if entry.has_object_class(schema::IAM_ROLE_GROUP) {
                continue;
            }
            let Some(name) = entry.first(schema::CN) else {
                continue;
            };
            if remote.contains(name) {
                continue;
            }

            debug!("Deleting non-existent group {}", name);
            match self.delete_if_present(entry.path()).await {
                Ok(_) => {
                    report.groups.deleted += 1;
                    removed.insert(normalize_path(entry.path()));
                }
                Err(e) => {
                    error!(group = %name, "Exception deleting group: {}", e);
                    report.record_failure(PrincipalKind::Group, name, e.to_string());
                }
            }
        }

        if !removed.is_empty() {
            self.purge_member_of(&removed, report).await;
        }
    }

    /// Remove citations of deleted groups (normalized paths) from every user
    async fn purge_member_of(&self, removed: &BTreeSet<String>, report: &mut ReconciliationReport) {
        let users = match self
            .search(&self.layout.users_base(), schema::IAM_ACCOUNT)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                error!("Unable to list directory users: {}", e);
                report.record_pass_failure(PrincipalKind::Group, e.to_string());
                return;
            }
        };

        for user in users {
            let stale: BTreeSet<String> = user
                .value_set(schema::MEMBER_OF)
                .into_iter()
                .filter(|group_path| removed.contains(&normalize_path(group_path)))
                .collect();
            if stale.is_empty() {
                continue;
            }

            let modification = Modification::Remove(schema::MEMBER_OF.to_string(), stale);
            if let Err(e) = self.directory.modify(user.path(), vec![modification]).await {
                let name = user.first(schema::UID).unwrap_or(user.path());
                error!(user = %name, "Exception removing group citations: {}", e);
                report.record_failure(PrincipalKind::User, name, e.to_string());
            }
        }
    }
}
