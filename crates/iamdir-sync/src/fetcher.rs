//! IAM fetcher
//!
//! Wraps the raw listing calls of an `IamClient`:
//! - follows continuation markers until a page is no longer truncated, so every
//!   listing comes back fully materialized (deletion diffing needs the whole
//!   remote set)
//! - bounds every remote call with a deadline; a breach surfaces as
//!   `IamDirError::Timeout`

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use iamdir_core::{
    AccessKeyStatus, IamClient, IamDirError, Page, RemoteGroup, RemoteRole, RemoteUser, Result,
};

pub struct IamFetcher {
    client: Arc<dyn IamClient>,
    call_timeout: Duration,
}

impl IamFetcher {
    pub fn new(client: Arc<dyn IamClient>, call_timeout: Duration) -> Self {
        Self {
            client,
            call_timeout,
        }
    }

    /// All groups
    #[instrument(skip(self))]
    pub async fn groups(&self) -> Result<Vec<RemoteGroup>> {
        let client = self.client.clone();
        self.collect_pages("list_groups", move |marker| {
            let client = client.clone();
            async move { client.list_groups(marker).await }
        })
        .await
    }

    /// All users
    #[instrument(skip(self))]
    pub async fn users(&self) -> Result<Vec<RemoteUser>> {
        let client = self.client.clone();
        self.collect_pages("list_users", move |marker| {
            let client = client.clone();
            async move { client.list_users(marker).await }
        })
        .await
    }

    /// All roles
    #[instrument(skip(self))]
    pub async fn roles(&self) -> Result<Vec<RemoteRole>> {
        let client = self.client.clone();
        self.collect_pages("list_roles", move |marker| {
            let client = client.clone();
            async move { client.list_roles(marker).await }
        })
        .await
    }

    /// Groups of one user, in provider order.
    ///
    /// Only the first page is read. A user in more groups than the provider's
    /// default page size gets an incomplete membership view; this is logged,
    /// not corrected.
    #[instrument(skip(self))]
    pub async fn groups_for_user(&self, user_name: &str) -> Result<Vec<RemoteGroup>> {
        let page = self
            .call(
                "list_groups_for_user",
                self.client.list_groups_for_user(user_name, None),
            )
            .await?;
        if page.is_truncated {
            warn!(
                user = %user_name,
                fetched = page.items.len(),
                "Group membership listing truncated; only the first page is used"
            );
        }
        Ok(page.items)
    }

    /// Id of the user's first active access key, if any
    #[instrument(skip(self))]
    pub async fn active_access_key(&self, user_name: &str) -> Result<Option<String>> {
        let page = self
            .call(
                "list_access_keys",
                self.client.list_access_keys(user_name, None),
            )
            .await?;
        Ok(page
            .items
            .into_iter()
            .find(|key| key.status == AccessKeyStatus::Active)
            .map(|key| key.access_key_id))
    }

    async fn call<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(IamDirError::timeout(operation, self.call_timeout.as_secs())),
        }
    }

    async fn collect_pages<T, F, Fut>(&self, operation: &str, mut fetch: F) -> Result<Vec<T>>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
    {
        let mut items = Vec::new();
        let mut marker = None;
        let mut pages = 0usize;

        loop {
            let page = self.call(operation, fetch(marker.take())).await?;
            pages += 1;
            items.extend(page.items);

            if !page.is_truncated {
                break;
            }
            match page.marker {
                Some(next) => marker = Some(next),
                None => {
                    return Err(IamDirError::iam(format!(
                        "{} returned a truncated page without a marker",
                        operation
                    )))
                }
            }
        }

        debug!(operation, pages, count = items.len(), "Listing complete");
        Ok(items)
    }
}
