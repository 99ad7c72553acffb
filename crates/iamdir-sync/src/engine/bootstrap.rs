//! One-time preparation of the managed subtree

use std::cmp::Reverse;
use tracing::{debug, error, info, instrument};

use iamdir_core::{path_depth, IamDirError, ObjectClassFilter, Result};

use super::{entries, EngineLifecycle, ReconciliationEngine};

impl ReconciliationEngine {
    /// Create the organizational units and wipe their content.
    ///
    /// Any failure here is a `BootstrapError`; the lifecycle only advances on
    /// success.
    #[instrument(skip(self), fields(root = %self.layout.root()))]
    pub(super) async fn bootstrap(&mut self) -> Result<()> {
        if let Err(e) = self.prepare_structure().await {
            error!("Exception preparing structure: {}", e);
            return Err(match e {
                IamDirError::BootstrapError { .. } => e,
                other => IamDirError::bootstrap(other.to_string()),
            });
        }
        self.lifecycle = EngineLifecycle::Bootstrapped;
        info!("Managed subtree bootstrapped");
        Ok(())
    }

    async fn prepare_structure(&self) -> Result<()> {
        let root = self.layout.root();
        if !self.directory.exists(root).await? {
            return Err(IamDirError::bootstrap(format!(
                "managed root {} does not exist",
                root
            )));
        }

        let units = [
            (self.layout.users_base(), "users"),
            (self.layout.groups_base(), "groups"),
            (self.layout.roles_base(), "roles"),
        ];
        for (path, name) in &units {
            if !self.directory.exists(path).await? {
                self.directory
                    .add(entries::organizational_unit(path, name))
                    .await?;
                info!(path = %path, "Created organizational unit");
            }
        }

        for (path, _) in &units {
            self.wipe_subtree(path).await?;
        }
        Ok(())
    }

    /// Delete every entry below `base`, deepest first. The base itself stays.
    async fn wipe_subtree(&self, base: &str) -> Result<()> {
        let mut entries = self.directory.search(base, &ObjectClassFilter::Any).await?;
        debug!("Deleting {} items from under {}", entries.len(), base);

        entries.sort_by_key(|entry| Reverse(path_depth(entry.path())));
        for entry in &entries {
            self.delete_if_present(entry.path()).await?;
        }
        Ok(())
    }
}
