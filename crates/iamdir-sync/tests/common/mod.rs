//! Shared fixtures: a scripted IAM client and a seeded in-memory directory

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use iamdir_core::{
    schema, AccessKeyMetadata, AccessKeyStatus, DirectoryAdapter, DirectoryLayout, Entry,
    IamClient, IamDirError, Page, PrincipalKind, RemoteGroup, RemoteRole, RemoteUser, Result,
};
use iamdir_sync::{
    DirectoryIdStore, EngineConfig, IdAllocator, MemoryDirectory, ReconciliationEngine,
};

pub const ROOT: &str = "dc=example,dc=com";
pub const ACCOUNT: &str = "123456789012";

#[derive(Default)]
struct State {
    groups: Vec<RemoteGroup>,
    users: Vec<RemoteUser>,
    roles: Vec<RemoteRole>,
    memberships: HashMap<String, Vec<String>>,
    keys: HashMap<String, Vec<AccessKeyMetadata>>,
    failing_users: HashSet<String>,
    failing_listing: Option<PrincipalKind>,
}

/// IAM provider whose state tests edit between cycles
pub struct FakeIam {
    state: Mutex<State>,
    page_size: usize,
    group_listing_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    group_listings: AtomicUsize,
}

impl Default for FakeIam {
    fn default() -> Self {
        Self::new(100)
    }
}

impl FakeIam {
    pub fn new(page_size: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size,
            group_listing_delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            group_listings: AtomicUsize::new(0),
        }
    }

    /// Every `list_groups` call takes `delay`
    pub fn with_group_listing_delay(mut self, delay: Duration) -> Self {
        self.group_listing_delay = Some(delay);
        self
    }

    pub fn add_group(&self, name: &str) {
        self.state.lock().unwrap().groups.push(RemoteGroup {
            name: name.to_string(),
            group_id: format!("AGPA{}", name.to_uppercase()),
            arn: format!("arn:aws:iam::{}:group/{}", ACCOUNT, name),
            path: "/".to_string(),
            created_at: None,
        });
    }

    /// Drop a group, including from every user's memberships
    pub fn remove_group(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.groups.retain(|g| g.name != name);
        for groups in state.memberships.values_mut() {
            groups.retain(|g| g != name);
        }
    }

    pub fn add_user(&self, name: &str, groups: &[&str], access_key: Option<&str>) {
        self.add_user_with_arn(
            name,
            &format!("arn:aws:iam::{}:user/{}", ACCOUNT, name),
            groups,
            access_key,
        );
    }

    pub fn add_user_with_arn(&self, name: &str, arn: &str, groups: &[&str], access_key: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        state.users.push(RemoteUser {
            name: name.to_string(),
            user_id: format!("AIDA{}", name.to_uppercase()),
            arn: arn.to_string(),
            path: "/".to_string(),
            created_at: None,
        });
        state.memberships.insert(
            name.to_string(),
            groups.iter().map(|g| g.to_string()).collect(),
        );
        let keys = access_key
            .map(|id| {
                vec![AccessKeyMetadata {
                    access_key_id: id.to_string(),
                    status: AccessKeyStatus::Active,
                }]
            })
            .unwrap_or_default();
        state.keys.insert(name.to_string(), keys);
    }

    pub fn remove_user(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.users.retain(|u| u.name != name);
        state.memberships.remove(name);
        state.keys.remove(name);
    }

    pub fn set_memberships(&self, name: &str, groups: &[&str]) {
        self.state.lock().unwrap().memberships.insert(
            name.to_string(),
            groups.iter().map(|g| g.to_string()).collect(),
        );
    }

    pub fn set_access_key(&self, name: &str, access_key: &str) {
        self.state.lock().unwrap().keys.insert(
            name.to_string(),
            vec![AccessKeyMetadata {
                access_key_id: access_key.to_string(),
                status: AccessKeyStatus::Active,
            }],
        );
    }

    pub fn add_role(&self, name: &str) {
        self.state.lock().unwrap().roles.push(RemoteRole {
            name: name.to_string(),
            role_id: format!("AROA{}", name.to_uppercase()),
            arn: format!("arn:aws:iam::{}:role/{}", ACCOUNT, name),
            path: "/".to_string(),
            created_at: None,
        });
    }

    pub fn remove_role(&self, name: &str) {
        self.state.lock().unwrap().roles.retain(|r| r.name != name);
    }

    /// Membership lookups for `name` fail
    pub fn fail_user(&self, name: &str) {
        self.state.lock().unwrap().failing_users.insert(name.to_string());
    }

    /// The listing for `kind` fails
    pub fn fail_listing(&self, kind: Option<PrincipalKind>) {
        self.state.lock().unwrap().failing_listing = kind;
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn group_listings(&self) -> usize {
        self.group_listings.load(Ordering::SeqCst)
    }

    fn page<T: Clone>(&self, items: &[T], marker: Option<String>) -> Page<T> {
        let start: usize = marker.map(|m| m.parse().unwrap()).unwrap_or(0);
        let end = (start + self.page_size).min(items.len());
        let slice = items[start..end].to_vec();
        if end < items.len() {
            Page::truncated(slice, end.to_string())
        } else {
            Page::last(slice)
        }
    }

    fn check_listing(&self, kind: PrincipalKind) -> Result<()> {
        if self.state.lock().unwrap().failing_listing == Some(kind) {
            return Err(IamDirError::iam(format!("listing {} refused", kind)));
        }
        Ok(())
    }
}

#[async_trait]
impl IamClient for FakeIam {
    async fn list_groups(&self, marker: Option<String>) -> Result<Page<RemoteGroup>> {
        self.group_listings.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.group_listing_delay {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        self.check_listing(PrincipalKind::Group)?;
        let groups = self.state.lock().unwrap().groups.clone();
        Ok(self.page(&groups, marker))
    }

    async fn list_users(&self, marker: Option<String>) -> Result<Page<RemoteUser>> {
        self.check_listing(PrincipalKind::User)?;
        let users = self.state.lock().unwrap().users.clone();
        Ok(self.page(&users, marker))
    }

    async fn list_roles(&self, marker: Option<String>) -> Result<Page<RemoteRole>> {
        self.check_listing(PrincipalKind::Role)?;
        let roles = self.state.lock().unwrap().roles.clone();
        Ok(self.page(&roles, marker))
    }

    async fn list_groups_for_user(
        &self,
        user_name: &str,
        _marker: Option<String>,
    ) -> Result<Page<RemoteGroup>> {
        let state = self.state.lock().unwrap();
        if state.failing_users.contains(user_name) {
            return Err(IamDirError::iam(format!("membership of {} unavailable", user_name)));
        }
        let names = state.memberships.get(user_name).cloned().unwrap_or_default();
        let groups = names
            .iter()
            .filter_map(|n| state.groups.iter().find(|g| &g.name == n).cloned())
            .collect();
        Ok(Page::last(groups))
    }

    async fn list_access_keys(
        &self,
        user_name: &str,
        _marker: Option<String>,
    ) -> Result<Page<AccessKeyMetadata>> {
        let keys = self
            .state
            .lock()
            .unwrap()
            .keys
            .get(user_name)
            .cloned()
            .unwrap_or_default();
        Ok(Page::last(keys))
    }
}

/// Directory holding only the managed root
pub async fn directory_with_root() -> Arc<MemoryDirectory> {
    let directory = Arc::new(MemoryDirectory::new());
    directory
        .add(
            Entry::new(ROOT)
                .with_values(schema::OBJECT_CLASS, [schema::TOP, "domain"])
                .with("dc", "example"),
        )
        .await
        .unwrap();
    directory
}

pub fn layout() -> DirectoryLayout {
    DirectoryLayout::new(ROOT)
}

pub fn engine(
    directory: Arc<MemoryDirectory>,
    iam: Arc<FakeIam>,
    config: EngineConfig,
) -> ReconciliationEngine {
    let layout = layout();
    let store = Arc::new(DirectoryIdStore::new(
        directory.clone(),
        layout.default_counter_path(),
    ));
    ReconciliationEngine::new(directory, iam, IdAllocator::new(store), layout, config)
}

pub async fn entry(directory: &MemoryDirectory, path: &str) -> Option<Entry> {
    directory.lookup(path).await.unwrap()
}
