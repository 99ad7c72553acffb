//! User pass

use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, error, info, instrument, warn};

use iamdir_core::{
    schema, Entry, IamDirError, Modification, PrincipalKind, ReconciliationReport, RemoteUser,
    Result,
};

use super::{entries, path_diff, ReconciliationEngine, Upsert};
use crate::config::AccessKeyPolicy;

/// IAM group entries keyed by group name, kept current as memberships change
type GroupIndex = BTreeMap<String, Entry>;

impl ReconciliationEngine {
    #[instrument(skip_all)]
    pub(super) async fn reconcile_users(&self, report: &mut ReconciliationReport) -> Result<()> {
        let users = self.fetcher.users().await?;
        debug!(count = users.len(), "Fetched IAM users");
        let mut groups = self.group_index().await?;
        let mut ungrouped = HashSet::new();

        for user in &users {
            match self.upsert_user(user, &mut groups).await {
                Ok(outcome) => {
                    if outcome == Upsert::Ungrouped {
                        ungrouped.insert(user.name.as_str());
                    }
                    outcome.tally(&mut report.users);
                }
                Err(e) => {
                    error!(user = %user.name, "Exception processing user: {}", e);
                    report.record_failure(PrincipalKind::User, &user.name, e.to_string());
                }
            }
        }

        // Users without a mirrored primary group lose their entry and memberships
        let remote: HashSet<&str> = users
            .iter()
            .map(|u| u.name.as_str())
            .filter(|name| !ungrouped.contains(name))
            .collect();
        self.remove_stale_users(&remote, &mut groups, report).await;
        Ok(())
    }

    /// Plain IAM groups currently in the directory; role groups are excluded
    async fn group_index(&self) -> Result<GroupIndex> {
        let entries = self
            .search(&self.layout.groups_base(), schema::IAM_GROUP)
            .await?;
        Ok(entries
            .into_iter()
            .filter(|entry| !entry.has_object_class(schema::IAM_ROLE_GROUP))
            .filter_map(|entry| {
                let name = entry.first(schema::CN)?.to_string();
                Some((name, entry))
            })
            .collect())
    }

    async fn upsert_user(&self, user: &RemoteUser, groups: &mut GroupIndex) -> Result<Upsert> {
        let memberships = self.fetcher.groups_for_user(&user.name).await?;

        // The provider has no primary group; the first listed group stands in.
        let Some(primary) = memberships.first() else {
            warn!(user = %user.name, "Unable to determine primary group, skipping");
            return Ok(Upsert::Ungrouped);
        };
        let Some(primary_entry) = groups.get(&primary.name) else {
            warn!(
                user = %user.name,
                group = %primary.name,
                "Primary group not in directory, skipping"
            );
            return Ok(Upsert::Ungrouped);
        };
        let gid = primary_entry
            .first(schema::GID_NUMBER)
            .ok_or_else(|| {
                IamDirError::directory(format!("group {} has no {}", primary.name, schema::GID_NUMBER))
            })?
            .to_string();

        let access_key = match self.fetcher.active_access_key(&user.name).await? {
            Some(key) => key,
            None => match self.config.access_key_policy {
                AccessKeyPolicy::Strict => {
                    debug!(user = %user.name, "No active access key, skipping");
                    return Ok(Upsert::Skipped);
                }
                AccessKeyPolicy::Permissive => String::new(),
            },
        };

        let member_names: BTreeSet<String> = memberships.iter().map(|g| g.name.clone()).collect();
        let member_of: BTreeSet<String> = memberships
            .iter()
            .filter_map(|g| groups.get(&g.name).map(|entry| entry.path().to_string()))
            .collect();

        let path = self.layout.user_path(&user.name);
        let outcome = match self.tagged(&path, schema::IAM_ACCOUNT).await? {
            Some(existing) => {
                self.update_user(&existing, &access_key, &gid, &member_of)
                    .await?
            }
            None => {
                let account_number = entries::account_number_from_arn(&user.arn)?;
                let uid = self.allocator.allocate().await?;
                let entry = entries::user(entries::UserAccount {
                    path: &path,
                    name: &user.name,
                    uid,
                    gid: &gid,
                    access_key: &access_key,
                    account_number: &account_number,
                    member_of: &member_of,
                });
                self.directory.add(entry).await?;
                info!(user = %user.name, uid = %uid, gid = %gid, "Created user");
                Upsert::Created
            }
        };

        self.sync_group_members(&user.name, &member_names, groups)
            .await?;
        Ok(outcome)
    }

    /// Replace mutable fields that differ and diff `memberOf`; no-op when equal
    async fn update_user(
        &self,
        existing: &Entry,
        access_key: &str,
        gid: &str,
        member_of: &BTreeSet<String>,
    ) -> Result<Upsert> {
        let mut modifications = Vec::new();
        if existing.first(schema::ACCESS_KEY).unwrap_or_default() != access_key {
            modifications.push(Modification::replace(schema::ACCESS_KEY, access_key));
        }
        if existing.first(schema::GID_NUMBER) != Some(gid) {
            modifications.push(Modification::replace(schema::GID_NUMBER, gid));
        }

        let (stale, missing) = path_diff(&existing.value_set(schema::MEMBER_OF), member_of);
        if !stale.is_empty() {
            modifications.push(Modification::Remove(schema::MEMBER_OF.to_string(), stale));
        }
        if !missing.is_empty() {
            modifications.push(Modification::Add(schema::MEMBER_OF.to_string(), missing));
        }

        if modifications.is_empty() {
            return Ok(Upsert::Unchanged);
        }
        debug!(path = %existing.path(), count = modifications.len(), "Updating user");
        self.directory.modify(existing.path(), modifications).await?;
        Ok(Upsert::Updated)
    }

    /// Make `user_name` a `memberUid` of exactly the groups in `member_names`.
    ///
    /// Every group is attempted; the first failure is returned afterwards.
    async fn sync_group_members(
        &self,
        user_name: &str,
        member_names: &BTreeSet<String>,
        groups: &mut GroupIndex,
    ) -> Result<()> {
        let mut first_error = None;

        for (group_name, entry) in groups.iter_mut() {
            let wanted = member_names.contains(group_name);
            let present = entry.contains(schema::MEMBER_UID, user_name);
            let modification = match (wanted, present) {
                (true, false) => Modification::add(schema::MEMBER_UID, user_name),
                (false, true) => Modification::remove(schema::MEMBER_UID, user_name),
                _ => continue,
            };

            match self
                .directory
                .modify(entry.path(), vec![modification.clone()])
                .await
            {
                Ok(()) => entry.apply(&modification),
                Err(e) => {
                    error!(group = %group_name, user = %user_name, "Exception updating group members: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Delete users missing remotely and drop them from every group's `memberUid`
    async fn remove_stale_users(
        &self,
        remote: &HashSet<&str>,
        groups: &mut GroupIndex,
        report: &mut ReconciliationReport,
    ) {
        let existing = match self
            .search(&self.layout.users_base(), schema::IAM_ACCOUNT)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                error!("Unable to list directory users: {}", e);
                report.record_pass_failure(PrincipalKind::User, e.to_string());
                return;
            }
        };

        let mut removed = BTreeSet::new();
        for entry in existing {
            let Some(name) = entry.first(schema::UID).or_else(|| entry.first(schema::CN)) else {
                continue;
            };
            if remote.contains(name) {
                continue;
            }

            debug!("Deleting non-existent user {}", name);
            match self.delete_if_present(entry.path()).await {
                Ok(_) => {
                    report.users.deleted += 1;
                    removed.insert(name.to_string());
                }
                Err(e) => {
                    error!(user = %name, "Exception deleting user: {}", e);
                    report.record_failure(PrincipalKind::User, name, e.to_string());
                }
            }
        }

        if removed.is_empty() {
            return;
        }
        for (group_name, entry) in groups.iter_mut() {
            let stale: BTreeSet<String> = entry
                .value_set(schema::MEMBER_UID)
                .intersection(&removed)
                .cloned()
                .collect();
            if stale.is_empty() {
                continue;
            }

            let modification = Modification::Remove(schema::MEMBER_UID.to_string(), stale);
            match self
                .directory
                .modify(entry.path(), vec![modification.clone()])
                .await
            {
                Ok(()) => entry.apply(&modification),
                Err(e) => {
                    error!(group = %group_name, "Exception removing deleted users: {}", e);
                    report.record_failure(PrincipalKind::Group, group_name, e.to_string());
                }
            }
        }
    }
}
