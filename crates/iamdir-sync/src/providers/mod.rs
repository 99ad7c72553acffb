//! Collaborator implementations backed by real services

#[cfg(feature = "aws")]
pub mod aws;

#[cfg(feature = "ldap")]
pub mod ldap;
