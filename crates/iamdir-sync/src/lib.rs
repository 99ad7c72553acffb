//! iamdir Sync - Mirrors IAM principals into a directory subtree
//!
//! This crate provides the moving parts of the bridge:
//! - `IdAllocator`: unique `uidNumber`/`gidNumber` values from one persisted counter
//! - `IamFetcher`: fully materialized, deadline-bounded IAM listings
//! - `ReconciliationEngine`: the group, user and role convergence passes
//! - `SyncScheduler`: fixed-period, non-overlapping cycles
//!
//! # Providers
//!
//! - `aws` feature: `AwsIamClient` over `aws-sdk-iam`
//! - `ldap` feature: `LdapDirectory` over `ldap3`
//!
//! `MemoryDirectory` and `MemoryIdStore` are always available for tests and
//! dry runs.

pub mod allocator;
pub mod config;
pub mod engine;
pub mod fetcher;
pub mod memory;
pub mod providers;
pub mod scheduler;
pub mod seed;

#[cfg(test)]
mod tests;

// Re-export provider implementations
#[cfg(feature = "aws")]
pub use providers::aws::AwsIamClient;

#[cfg(feature = "ldap")]
pub use providers::ldap::{LdapConnectionConfig, LdapDirectory};

pub use allocator::{DirectoryIdStore, IdAllocator, MemoryIdStore, INITIAL_COUNTER};
pub use config::{AccessKeyPolicy, EngineConfig, SchedulerConfig};
pub use engine::{account_number_from_arn, EngineLifecycle, ReconciliationEngine};
pub use fetcher::IamFetcher;
pub use memory::MemoryDirectory;
pub use scheduler::{SchedulerHandle, SyncScheduler};
pub use seed::seed_credential;
