//! Directory entry model
//!
//! Entries are addressed by a hierarchical path (a distinguished name such as
//! `uid=alice,ou=users,dc=example,dc=com`) and carry multi-valued attributes.
//! Attribute names are case-insensitive and stored lowercased; values keep
//! their case and are kept ordered so two entries with the same content always
//! compare equal.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// Schema
// =============================================================================

/// Attribute and object class names written by the bridge
pub mod schema {
    pub const OBJECT_CLASS: &str = "objectClass";

    // Object classes
    pub const TOP: &str = "top";
    pub const ORGANIZATIONAL_UNIT: &str = "organizationalUnit";
    pub const EXTENSIBLE_OBJECT: &str = "extensibleObject";
    pub const POSIX_GROUP: &str = "posixGroup";
    pub const POSIX_ACCOUNT: &str = "posixAccount";
    pub const SHADOW_ACCOUNT: &str = "shadowAccount";
    /// Marker carried by every mirrored group (role groups included)
    pub const IAM_GROUP: &str = "iamgroup";
    /// Marker for groups created on behalf of a role
    pub const IAM_ROLE_GROUP: &str = "iamrolegroup";
    /// Marker carried by every mirrored account (users and roles)
    pub const IAM_ACCOUNT: &str = "iamaccount";
    pub const IAM_ROLE: &str = "iamrole";

    // Attributes
    pub const OU: &str = "ou";
    pub const CN: &str = "cn";
    pub const UID: &str = "uid";
    pub const UID_NUMBER: &str = "uidNumber";
    pub const GID_NUMBER: &str = "gidNumber";
    pub const MEMBER_UID: &str = "memberUid";
    pub const MEMBER_OF: &str = "memberOf";
    pub const ACCESS_KEY: &str = "accessKey";
    pub const ACCOUNT_NUMBER: &str = "accountNumber";
    pub const USER_PASSWORD: &str = "userPassword";
    pub const LOGIN_SHELL: &str = "loginShell";
    pub const HOME_DIRECTORY: &str = "homeDirectory";

    // Fixed account defaults
    pub const DEFAULT_LOGIN_SHELL: &str = "/bin/bash";
    pub const HOME_PREFIX: &str = "/home/";
    pub const SHADOW_DEFAULTS: [(&str, &str); 7] = [
        ("shadowLastChange", "10877"),
        ("shadowExpire", "-1"),
        ("shadowInactive", "-1"),
        ("shadowFlag", "0"),
        ("shadowWarning", "7"),
        ("shadowMin", "0"),
        ("shadowMax", "999999"),
    ];
}

// =============================================================================
// Entries and Modifications
// =============================================================================

/// A directory entry: a path plus multi-valued attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    path: String,
    attributes: BTreeMap<String, BTreeSet<String>>,
}

impl Entry {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Builder-style single value add
    pub fn with(mut self, attribute: &str, value: impl Into<String>) -> Self {
        self.put(attribute, value);
        self
    }

    /// Builder-style multi value add
    pub fn with_values<I, V>(mut self, attribute: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        for value in values {
            self.put(attribute, value);
        }
        self
    }

    pub fn put(&mut self, attribute: &str, value: impl Into<String>) {
        self.attributes
            .entry(attribute.to_ascii_lowercase())
            .or_default()
            .insert(value.into());
    }

    /// First value in sort order; use for single-valued attributes
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.values(attribute)
            .and_then(|values| values.iter().next())
            .map(String::as_str)
    }

    pub fn values(&self, attribute: &str) -> Option<&BTreeSet<String>> {
        self.attributes.get(&attribute.to_ascii_lowercase())
    }

    /// Owned copy of an attribute's values, empty when the attribute is absent
    pub fn value_set(&self, attribute: &str) -> BTreeSet<String> {
        self.values(attribute).cloned().unwrap_or_default()
    }

    pub fn contains(&self, attribute: &str, value: &str) -> bool {
        self.values(attribute)
            .map(|values| values.contains(value))
            .unwrap_or(false)
    }

    /// Object class names compare case-insensitively
    pub fn has_object_class(&self, class: &str) -> bool {
        self.values(schema::OBJECT_CLASS)
            .map(|classes| classes.iter().any(|c| c.eq_ignore_ascii_case(class)))
            .unwrap_or(false)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Apply one modification in place
    pub fn apply(&mut self, modification: &Modification) {
        match modification {
            Modification::Add(attribute, values) => {
                let key = attribute.to_ascii_lowercase();
                self.attributes
                    .entry(key)
                    .or_default()
                    .extend(values.iter().cloned());
            }
            Modification::Remove(attribute, values) => {
                let key = attribute.to_ascii_lowercase();
                if values.is_empty() {
                    self.attributes.remove(&key);
                } else if let Some(existing) = self.attributes.get_mut(&key) {
                    for value in values {
                        existing.remove(value);
                    }
                    if existing.is_empty() {
                        self.attributes.remove(&key);
                    }
                }
            }
            Modification::Replace(attribute, values) => {
                let key = attribute.to_ascii_lowercase();
                if values.is_empty() {
                    self.attributes.remove(&key);
                } else {
                    self.attributes.insert(key, values.clone());
                }
            }
        }
    }
}

/// Attribute-level change sent through `DirectoryAdapter::modify`
///
/// `Remove` with an empty value set removes the whole attribute, and so does
/// `Replace` with an empty set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modification {
    Add(String, BTreeSet<String>),
    Remove(String, BTreeSet<String>),
    Replace(String, BTreeSet<String>),
}

impl Modification {
    pub fn add(attribute: &str, value: impl Into<String>) -> Self {
        Self::Add(attribute.to_string(), BTreeSet::from([value.into()]))
    }

    pub fn remove(attribute: &str, value: impl Into<String>) -> Self {
        Self::Remove(attribute.to_string(), BTreeSet::from([value.into()]))
    }

    pub fn replace(attribute: &str, value: impl Into<String>) -> Self {
        Self::Replace(attribute.to_string(), BTreeSet::from([value.into()]))
    }
}

/// Object-class predicate for subtree searches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectClassFilter {
    Any,
    Class(String),
}

impl ObjectClassFilter {
    pub fn class(class: &str) -> Self {
        Self::Class(class.to_string())
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        match self {
            Self::Any => true,
            Self::Class(class) => entry.has_object_class(class),
        }
    }

    /// LDAP search filter string
    pub fn to_filter_string(&self) -> String {
        match self {
            Self::Any => "(objectClass=*)".to_string(),
            Self::Class(class) => format!("(objectClass={})", class),
        }
    }
}

// =============================================================================
// Paths
// =============================================================================

/// Escape a value for use inside an RDN (RFC 4514)
pub fn escape_rdn_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '#' if i == 0 => escaped.push_str("\\#"),
            ' ' if i == 0 || i == last => escaped.push_str("\\ "),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Split a path into RDN components, honouring backslash escapes
fn split_rdns(path: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in path.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            ',' => {
                parts.push(&path[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if !path.is_empty() {
        parts.push(&path[start..]);
    }
    parts
}

/// Canonical form used for path comparisons: lowercased attribute types and
/// values, no whitespace around separators
pub fn normalize_path(path: &str) -> String {
    split_rdns(path)
        .into_iter()
        .map(|rdn| match rdn.split_once('=') {
            Some((attr, value)) => format!(
                "{}={}",
                attr.trim().to_ascii_lowercase(),
                value.trim().to_lowercase()
            ),
            None => rdn.trim().to_lowercase(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Number of RDN components
pub fn path_depth(path: &str) -> usize {
    if path.trim().is_empty() {
        0
    } else {
        split_rdns(path).len()
    }
}

/// True when `path` is strictly below `base`
pub fn is_descendant(path: &str, base: &str) -> bool {
    let path = normalize_path(path);
    let base = normalize_path(base);
    path.len() > base.len() && path.ends_with(&format!(",{}", base))
}

// =============================================================================
// Managed Subtree Layout
// =============================================================================

/// Paths of the managed subtree: one organizational unit per principal kind
/// below a host-supplied root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryLayout {
    root: String,
}

impl DirectoryLayout {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn users_base(&self) -> String {
        format!("ou=users,{}", self.root)
    }

    pub fn groups_base(&self) -> String {
        format!("ou=groups,{}", self.root)
    }

    pub fn roles_base(&self) -> String {
        format!("ou=roles,{}", self.root)
    }

    /// The three organizational units wiped at bootstrap
    pub fn managed_bases(&self) -> [String; 3] {
        [self.users_base(), self.groups_base(), self.roles_base()]
    }

    pub fn user_path(&self, name: &str) -> String {
        format!("uid={},{}", escape_rdn_value(name), self.users_base())
    }

    pub fn group_path(&self, name: &str) -> String {
        format!("cn={},{}", escape_rdn_value(name), self.groups_base())
    }

    pub fn role_path(&self, name: &str) -> String {
        format!("uid={},{}", escape_rdn_value(name), self.roles_base())
    }

    /// Default location of the persisted ID counter, outside the wiped OUs
    pub fn default_counter_path(&self) -> String {
        format!("cn=idcounter,{}", self.root)
    }
}
