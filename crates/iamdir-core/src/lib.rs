//! iamdir Core - Domain types and collaborator traits for the IAM directory bridge
//!
//! The bridge mirrors cloud IAM principals (users, groups, roles) into a
//! directory subtree. This crate holds everything the reconciliation engine and
//! the credential verifier share:
//! - `directory`: path-addressed entries, attribute modifications, schema names
//!   and the managed subtree layout
//! - `identity`: principals as the IAM provider returns them, plus the
//!   pagination contract
//! - `models`: the per-cycle reconciliation report
//! - `traits`: the `DirectoryAdapter`, `IamClient` and `IdStore` seams

pub mod directory;
pub mod error;
pub mod identity;
pub mod ids;
pub mod models;
pub mod traits;

#[cfg(test)]
mod tests;

pub use directory::*;
pub use error::*;
pub use identity::*;
pub use ids::*;
pub use models::*;
pub use traits::*;
