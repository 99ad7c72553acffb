//! AWS IAM client
//!
//! Configuration comes from the standard AWS SDK chain (env vars, profile,
//! instance role). Credentials are resolved once at construction so a host
//! without usable credentials fails at startup rather than on the first poll.
//!
//! Requires the `aws` feature to be enabled.

use async_trait::async_trait;
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_iam::error::DisplayErrorContext;
use aws_sdk_iam::primitives::DateTime as AwsDateTime;
use aws_sdk_iam::types::StatusType;
use aws_sdk_iam::Client;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use iamdir_core::{
    AccessKeyMetadata, AccessKeyStatus, IamClient, IamDirError, Page, RemoteGroup, RemoteRole,
    RemoteUser, Result,
};

pub struct AwsIamClient {
    client: Client,
}

impl AwsIamClient {
    /// Load SDK configuration and verify that credentials resolve
    pub async fn new(region: Option<String>) -> Result<Self> {
        let config = if let Some(region) = region {
            aws_config::defaults(aws_config::BehaviorVersion::latest())
                .region(aws_config::Region::new(region))
                .load()
                .await
        } else {
            aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await
        };

        let provider = config.credentials_provider().ok_or_else(|| {
            IamDirError::config_error("no AWS credentials provider configured")
        })?;
        let credentials = provider.provide_credentials().await.map_err(|e| {
            IamDirError::config_error(format!(
                "unable to resolve AWS credentials: {}",
                DisplayErrorContext(&e)
            ))
        })?;
        debug!(
            expires = ?credentials.expiry(),
            "Resolved AWS credentials"
        );

        let client = Client::new(&config);
        info!(region = ?config.region(), "Initialized AWS IAM client");
        Ok(Self { client })
    }

    /// Wrap an already configured SDK client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn to_utc(date: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(date.secs(), date.subsec_nanos())
}

fn page<T>(items: Vec<T>, is_truncated: bool, marker: Option<&str>) -> Page<T> {
    Page {
        items,
        marker: marker.map(str::to_string),
        is_truncated,
    }
}

fn iam_error<E>(operation: &str, e: E) -> IamDirError
where
    E: std::error::Error,
{
    IamDirError::iam(format!("{} failed: {}", operation, DisplayErrorContext(e)))
}

#[async_trait]
impl IamClient for AwsIamClient {
    #[instrument(skip(self))]
    async fn list_groups(&self, marker: Option<String>) -> Result<Page<RemoteGroup>> {
        let output = self
            .client
            .list_groups()
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| iam_error("ListGroups", e))?;

        let groups = output
            .groups()
            .iter()
            .map(|g| RemoteGroup {
                name: g.group_name().to_string(),
                group_id: g.group_id().to_string(),
                arn: g.arn().to_string(),
                path: g.path().to_string(),
                created_at: to_utc(g.create_date()),
            })
            .collect();
        Ok(page(groups, output.is_truncated(), output.marker()))
    }

    #[instrument(skip(self))]
    async fn list_users(&self, marker: Option<String>) -> Result<Page<RemoteUser>> {
        let output = self
            .client
            .list_users()
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| iam_error("ListUsers", e))?;

        let users = output
            .users()
            .iter()
            .map(|u| RemoteUser {
                name: u.user_name().to_string(),
                user_id: u.user_id().to_string(),
                arn: u.arn().to_string(),
                path: u.path().to_string(),
                created_at: to_utc(u.create_date()),
            })
            .collect();
        Ok(page(users, output.is_truncated(), output.marker()))
    }

    #[instrument(skip(self))]
    async fn list_roles(&self, marker: Option<String>) -> Result<Page<RemoteRole>> {
        let output = self
            .client
            .list_roles()
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| iam_error("ListRoles", e))?;

        let roles = output
            .roles()
            .iter()
            .map(|r| RemoteRole {
                name: r.role_name().to_string(),
                role_id: r.role_id().to_string(),
                arn: r.arn().to_string(),
                path: r.path().to_string(),
                created_at: to_utc(r.create_date()),
            })
            .collect();
        Ok(page(roles, output.is_truncated(), output.marker()))
    }

    #[instrument(skip(self))]
    async fn list_groups_for_user(
        &self,
        user_name: &str,
        marker: Option<String>,
    ) -> Result<Page<RemoteGroup>> {
        let output = self
            .client
            .list_groups_for_user()
            .user_name(user_name)
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| iam_error("ListGroupsForUser", e))?;

        let groups = output
            .groups()
            .iter()
            .map(|g| RemoteGroup {
                name: g.group_name().to_string(),
                group_id: g.group_id().to_string(),
                arn: g.arn().to_string(),
                path: g.path().to_string(),
                created_at: to_utc(g.create_date()),
            })
            .collect();
        Ok(page(groups, output.is_truncated(), output.marker()))
    }

    #[instrument(skip(self))]
    async fn list_access_keys(
        &self,
        user_name: &str,
        marker: Option<String>,
    ) -> Result<Page<AccessKeyMetadata>> {
        let output = self
            .client
            .list_access_keys()
            .user_name(user_name)
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| iam_error("ListAccessKeys", e))?;

        let keys = output
            .access_key_metadata()
            .iter()
            .filter_map(|k| {
                let access_key_id = k.access_key_id()?.to_string();
                let status = match k.status() {
                    Some(StatusType::Active) => AccessKeyStatus::Active,
                    _ => AccessKeyStatus::Inactive,
                };
                Some(AccessKeyMetadata {
                    access_key_id,
                    status,
                })
            })
            .collect();
        Ok(page(keys, output.is_truncated(), output.marker()))
    }
}
