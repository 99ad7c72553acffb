//! IAM principals as returned by the provider
//!
//! These are owned by the IAM provider and re-fetched every cycle; nothing here
//! is cached between reconciliation passes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Principal Kinds
// =============================================================================

/// The three principal kinds mirrored into the directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    User,
    Group,
    Role,
}

impl std::fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Group => write!(f, "group"),
            Self::Role => write!(f, "role"),
        }
    }
}

// =============================================================================
// Remote Principals
// =============================================================================

/// An IAM user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub name: String,
    pub user_id: String,
    pub arn: String,
    pub path: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// An IAM group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteGroup {
    pub name: String,
    pub group_id: String,
    pub arn: String,
    pub path: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// An IAM role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRole {
    pub name: String,
    pub role_id: String,
    pub arn: String,
    pub path: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Access key status as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKeyStatus {
    Active,
    Inactive,
}

/// Metadata of one user access key (the secret part is never listed)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessKeyMetadata {
    pub access_key_id: String,
    pub status: AccessKeyStatus,
}

// =============================================================================
// Pagination
// =============================================================================

/// One page of a remote listing.
///
/// `is_truncated` signals more pages; `marker` is the opaque cursor to pass to
/// the next call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub marker: Option<String>,
    pub is_truncated: bool,
}

impl<T> Page<T> {
    /// A final page
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            marker: None,
            is_truncated: false,
        }
    }

    /// A page followed by more, resumable at `marker`
    pub fn truncated(items: Vec<T>, marker: impl Into<String>) -> Self {
        Self {
            items,
            marker: Some(marker.into()),
            is_truncated: true,
        }
    }
}
