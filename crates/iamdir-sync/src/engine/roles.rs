//! Role pass
//!
//! Each role is mirrored as a role group plus a role account that is the
//! group's only member.

use std::collections::HashSet;
use tracing::{debug, error, info, instrument};

use iamdir_core::{
    schema, IamDirError, Modification, PrincipalKind, ReconciliationReport, RemoteRole, Result,
};

use super::{entries, ReconciliationEngine, Upsert};

impl ReconciliationEngine {
    #[instrument(skip_all)]
    pub(super) async fn reconcile_roles(&self, report: &mut ReconciliationReport) -> Result<()> {
        let roles = self.fetcher.roles().await?;
        debug!(count = roles.len(), "Fetched IAM roles");

        for role in &roles {
            match self.upsert_role(role).await {
                Ok(outcome) => outcome.tally(report.stats_mut(PrincipalKind::Role)),
                Err(e) => {
                    error!(role = %role.name, "Exception processing role: {}", e);
                    report.record_failure(PrincipalKind::Role, &role.name, e.to_string());
                }
            }
        }

        let remote: HashSet<&str> = roles.iter().map(|r| r.name.as_str()).collect();
        self.remove_stale_roles(&remote, report).await;
        Ok(())
    }

    async fn upsert_role(&self, role: &RemoteRole) -> Result<Upsert> {
        let (_, group) = self.upsert_group(&role.name, true).await?;
        let gid = group
            .first(schema::GID_NUMBER)
            .ok_or_else(|| {
                IamDirError::directory(format!("group {} has no {}", role.name, schema::GID_NUMBER))
            })?
            .to_string();

        let path = self.layout.role_path(&role.name);
        let mut outcome = match self.tagged(&path, schema::IAM_ACCOUNT).await? {
            Some(existing) => {
                let mut modifications = Vec::new();
                if existing.first(schema::ACCESS_KEY) != Some(role.role_id.as_str()) {
                    modifications.push(Modification::replace(schema::ACCESS_KEY, &role.role_id));
                }
                if existing.first(schema::GID_NUMBER) != Some(gid.as_str()) {
                    modifications.push(Modification::replace(schema::GID_NUMBER, &gid));
                }
                if modifications.is_empty() {
                    Upsert::Unchanged
                } else {
                    self.directory.modify(&path, modifications).await?;
                    Upsert::Updated
                }
            }
            None => {
                let uid = self.allocator.allocate().await?;
                self.directory
                    .add(entries::role(&path, &role.name, uid, &gid, &role.role_id))
                    .await?;
                info!(role = %role.name, uid = %uid, gid = %gid, "Created role");
                Upsert::Created
            }
        };

        if !group.contains(schema::MEMBER_UID, &role.name) {
            self.directory
                .modify(
                    group.path(),
                    vec![Modification::add(schema::MEMBER_UID, &role.name)],
                )
                .await?;
            if outcome == Upsert::Unchanged {
                outcome = Upsert::Updated;
            }
        }
        Ok(outcome)
    }

    /// Delete role accounts and role groups missing remotely
    async fn remove_stale_roles(&self, remote: &HashSet<&str>, report: &mut ReconciliationReport) {
        let targets = [
            (self.layout.roles_base(), schema::IAM_ROLE, schema::UID),
            (self.layout.groups_base(), schema::IAM_ROLE_GROUP, schema::CN),
        ];

        for (base, marker, naming) in targets {
            let existing = match self.search(&base, marker).await {
                Ok(entries) => entries,
                Err(e) => {
                    error!("Unable to list {} entries: {}", marker, e);
                    report.record_pass_failure(PrincipalKind::Role, e.to_string());
                    continue;
                }
            };

            for entry in existing {
                let Some(name) = entry.first(naming) else {
                    continue;
                };
                if remote.contains(name) {
                    continue;
                }

                debug!("Deleting non-existent role entry {}", entry.path());
                match self.delete_if_present(entry.path()).await {
                    Ok(_) if marker == schema::IAM_ROLE => {
                        report.stats_mut(PrincipalKind::Role).deleted += 1;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(role = %name, "Exception deleting role entry: {}", e);
                        report.record_failure(PrincipalKind::Role, name, e.to_string());
                    }
                }
            }
        }
    }
}
