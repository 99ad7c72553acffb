//! Unit tests for iamdir-sync

use async_trait::async_trait;
use iamdir_core::{
    AccessKeyMetadata, AccessKeyStatus, IamClient, IamDirError, Page, RemoteGroup, RemoteRole,
    RemoteUser, Result,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn group(name: &str) -> RemoteGroup {
    RemoteGroup {
        name: name.to_string(),
        group_id: format!("AGPA{}", name.to_uppercase()),
        arn: format!("arn:aws:iam::123456789012:group/{}", name),
        path: "/".to_string(),
        created_at: None,
    }
}

/// Serves groups in pages of two and answers the per-user calls from fixed maps
#[derive(Default)]
struct PagedClient {
    groups: Vec<RemoteGroup>,
    memberships: HashMap<String, Page<RemoteGroup>>,
    keys: HashMap<String, Vec<AccessKeyMetadata>>,
    drop_marker: bool,
    stall: Option<Duration>,
    calls: AtomicUsize,
}

#[async_trait]
impl IamClient for PagedClient {
    async fn list_groups(&self, marker: Option<String>) -> Result<Page<RemoteGroup>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(stall) = self.stall {
            tokio::time::sleep(stall).await;
        }
        let start: usize = marker.map(|m| m.parse().unwrap()).unwrap_or(0);
        let end = (start + 2).min(self.groups.len());
        let items = self.groups[start..end].to_vec();
        if end < self.groups.len() {
            if self.drop_marker {
                return Ok(Page {
                    items,
                    marker: None,
                    is_truncated: true,
                });
            }
            Ok(Page::truncated(items, end.to_string()))
        } else {
            Ok(Page::last(items))
        }
    }

    async fn list_users(&self, _marker: Option<String>) -> Result<Page<RemoteUser>> {
        Ok(Page::last(vec![]))
    }

    async fn list_roles(&self, _marker: Option<String>) -> Result<Page<RemoteRole>> {
        Ok(Page::last(vec![]))
    }

    async fn list_groups_for_user(
        &self,
        user_name: &str,
        _marker: Option<String>,
    ) -> Result<Page<RemoteGroup>> {
        self.memberships
            .get(user_name)
            .cloned()
            .ok_or_else(|| IamDirError::not_found("user", user_name))
    }

    async fn list_access_keys(
        &self,
        user_name: &str,
        _marker: Option<String>,
    ) -> Result<Page<AccessKeyMetadata>> {
        Ok(Page::last(
            self.keys.get(user_name).cloned().unwrap_or_default(),
        ))
    }
}

// =============================================================================
// Fetcher Tests
// =============================================================================

#[cfg(test)]
mod fetcher_tests {
    use super::*;
    use crate::fetcher::IamFetcher;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_pages_are_concatenated_in_order() {
        let client = Arc::new(PagedClient {
            groups: ["a", "b", "c", "d", "e"].iter().map(|n| group(n)).collect(),
            ..Default::default()
        });
        let fetcher = IamFetcher::new(client.clone(), Duration::from_secs(5));

        let names: Vec<String> = fetcher
            .groups()
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_truncated_page_without_marker_is_an_error() {
        let client = Arc::new(PagedClient {
            groups: ["a", "b", "c"].iter().map(|n| group(n)).collect(),
            drop_marker: true,
            ..Default::default()
        });
        let fetcher = IamFetcher::new(client, Duration::from_secs(5));

        let err = fetcher.groups().await.unwrap_err();
        assert!(matches!(err, IamDirError::IamError { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_call_times_out() {
        let client = Arc::new(PagedClient {
            groups: vec![group("a")],
            stall: Some(Duration::from_secs(120)),
            ..Default::default()
        });
        let fetcher = IamFetcher::new(client, Duration::from_secs(30));

        let err = fetcher.groups().await.unwrap_err();
        assert!(matches!(err, IamDirError::Timeout { secs: 30, .. }));
    }

    #[tokio::test]
    async fn test_membership_reads_only_first_page() {
        let mut memberships = HashMap::new();
        memberships.insert(
            "alice".to_string(),
            Page::truncated(vec![group("dev"), group("ops")], "next"),
        );
        let client = Arc::new(PagedClient {
            memberships,
            ..Default::default()
        });
        let fetcher = IamFetcher::new(client, Duration::from_secs(5));

        let groups = fetcher.groups_for_user("alice").await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "dev");
    }

    #[tokio::test]
    async fn test_first_active_key_wins() {
        let mut keys = HashMap::new();
        keys.insert(
            "alice".to_string(),
            vec![
                AccessKeyMetadata {
                    access_key_id: "AKIAOLD".to_string(),
                    status: AccessKeyStatus::Inactive,
                },
                AccessKeyMetadata {
                    access_key_id: "AKIANEW".to_string(),
                    status: AccessKeyStatus::Active,
                },
            ],
        );
        keys.insert(
            "bob".to_string(),
            vec![AccessKeyMetadata {
                access_key_id: "AKIABOB".to_string(),
                status: AccessKeyStatus::Inactive,
            }],
        );
        let client = Arc::new(PagedClient {
            keys,
            ..Default::default()
        });
        let fetcher = IamFetcher::new(client, Duration::from_secs(5));

        assert_eq!(
            fetcher.active_access_key("alice").await.unwrap().as_deref(),
            Some("AKIANEW")
        );
        assert_eq!(fetcher.active_access_key("bob").await.unwrap(), None);
        assert_eq!(fetcher.active_access_key("carol").await.unwrap(), None);
    }
}

// =============================================================================
// Config Tests
// =============================================================================

#[cfg(test)]
mod config_tests {
    use crate::config::{AccessKeyPolicy, EngineConfig, SchedulerConfig};
    use std::time::Duration;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.access_key_policy, AccessKeyPolicy::Permissive);
        assert!(!config.sync_roles);
        assert_eq!(config.call_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_engine_config_deserialization() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"access_key_policy": "strict", "sync_roles": true}"#).unwrap();
        assert_eq!(config.access_key_policy, AccessKeyPolicy::Strict);
        assert!(config.sync_roles);
        assert_eq!(config.call_timeout_secs, 30);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let result: Result<EngineConfig, _> =
            serde_json::from_str(r#"{"access_key_policy": "lenient"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_scheduler_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.period(), Duration::from_secs(600));
        assert_eq!(config.initial_delay(), Duration::from_secs(10));
        assert!(config.validate().is_ok());

        let zero = SchedulerConfig {
            poll_period_secs: 0,
            initial_delay_secs: 0,
        };
        assert!(zero.validate().is_err());
    }
}
