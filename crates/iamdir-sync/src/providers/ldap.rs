//! LDAP directory adapter
//!
//! Binds once with a service account and multiplexes every operation over that
//! connection. Each operation carries its own timeout.
//!
//! Requires the `ldap` feature to be enabled.

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, LdapResult, Mod, Scope, SearchEntry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;
use tracing::{debug, info, instrument};

use iamdir_core::{
    normalize_path, DirectoryAdapter, Entry, IamDirError, Modification, ObjectClassFilter, Result,
};

const NO_SUCH_OBJECT: u32 = 32;
const ENTRY_ALREADY_EXISTS: u32 = 68;

/// Connection settings for the directory server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapConnectionConfig {
    pub url: String,
    pub bind_dn: String,
    #[serde(default)]
    pub bind_password: String,
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
}

fn default_operation_timeout_secs() -> u64 {
    30
}

pub struct LdapDirectory {
    ldap: Ldap,
    timeout: Duration,
}

impl LdapDirectory {
    /// Connect and bind with the service account
    #[instrument(skip(config), fields(url = %config.url))]
    pub async fn connect(config: &LdapConnectionConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.operation_timeout_secs);
        let settings = LdapConnSettings::new().set_conn_timeout(timeout);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &config.url)
            .await
            .map_err(|e| IamDirError::directory(format!("LDAP connection failed: {}", e)))?;

        ldap3::drive!(conn);

        ldap.with_timeout(timeout)
            .simple_bind(&config.bind_dn, &config.bind_password)
            .await
            .map_err(|e| IamDirError::directory(format!("LDAP bind failed: {}", e)))?
            .success()
            .map_err(|e| IamDirError::directory(format!("LDAP bind rejected: {}", e)))?;

        info!(bind_dn = %config.bind_dn, "LDAP connection established");
        Ok(Self { ldap, timeout })
    }

    fn handle(&self) -> Ldap {
        let mut ldap = self.ldap.clone();
        ldap.with_timeout(self.timeout);
        ldap
    }

    fn transport_error(&self, operation: &str, path: &str, e: LdapError) -> IamDirError {
        match e {
            LdapError::Timeout { .. } => {
                IamDirError::timeout(format!("ldap {} {}", operation, path), self.timeout.as_secs())
            }
            other => IamDirError::directory(format!("LDAP {} {} failed: {}", operation, path, other)),
        }
    }

    async fn search_entries(
        &self,
        base: &str,
        scope: Scope,
        filter: &ObjectClassFilter,
    ) -> Result<Option<Vec<Entry>>> {
        let result = self
            .handle()
            .search(base, scope, &filter.to_filter_string(), vec!["*"])
            .await
            .map_err(|e| self.transport_error("search", base, e))?;

        if result.1.rc == NO_SUCH_OBJECT {
            return Ok(None);
        }
        let (entries, _) = result
            .success()
            .map_err(|e| IamDirError::directory(format!("LDAP search {} failed: {}", base, e)))?;

        Ok(Some(
            entries
                .into_iter()
                .map(SearchEntry::construct)
                .map(to_entry)
                .collect(),
        ))
    }
}

fn to_entry(search_entry: SearchEntry) -> Entry {
    let mut entry = Entry::new(search_entry.dn);
    for (attribute, values) in search_entry.attrs {
        for value in values {
            entry.put(&attribute, value);
        }
    }
    entry
}

/// Values as ldap3 expects them; empty strings are not valid attribute values
fn value_set(values: &BTreeSet<String>) -> HashSet<String> {
    values.iter().filter(|v| !v.is_empty()).cloned().collect()
}

fn to_mod(modification: &Modification) -> Mod<String> {
    match modification {
        Modification::Add(attribute, values) => Mod::Add(attribute.clone(), value_set(values)),
        Modification::Remove(attribute, values) => Mod::Delete(attribute.clone(), value_set(values)),
        Modification::Replace(attribute, values) => {
            Mod::Replace(attribute.clone(), value_set(values))
        }
    }
}

fn check(result: LdapResult, operation: &str, path: &str) -> Result<()> {
    check_code(result.rc, &result.text, operation, path)
}

fn check_code(rc: u32, text: &str, operation: &str, path: &str) -> Result<()> {
    match rc {
        0 => Ok(()),
        NO_SUCH_OBJECT => Err(IamDirError::not_found("entry", path)),
        ENTRY_ALREADY_EXISTS => Err(IamDirError::already_exists(path)),
        rc => Err(IamDirError::directory(format!(
            "LDAP {} {} failed with code {}: {}",
            operation, path, rc, text
        ))),
    }
}

#[async_trait]
impl DirectoryAdapter for LdapDirectory {
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.lookup(path).await?.is_some())
    }

    async fn lookup(&self, path: &str) -> Result<Option<Entry>> {
        let entries = self
            .search_entries(path, Scope::Base, &ObjectClassFilter::Any)
            .await?;
        Ok(entries.and_then(|entries| entries.into_iter().next()))
    }

    #[instrument(skip(self, entry), fields(path = %entry.path()))]
    async fn add(&self, entry: Entry) -> Result<()> {
        let attributes: Vec<(String, HashSet<String>)> = entry
            .attributes()
            .map(|(attribute, values)| (attribute.to_string(), value_set(values)))
            .filter(|(_, values)| !values.is_empty())
            .collect();

        let result = self
            .handle()
            .add(entry.path(), attributes)
            .await
            .map_err(|e| self.transport_error("add", entry.path(), e))?;
        check(result, "add", entry.path())
    }

    #[instrument(skip(self, modifications))]
    async fn modify(&self, path: &str, modifications: Vec<Modification>) -> Result<()> {
        let mods: Vec<Mod<String>> = modifications.iter().map(to_mod).collect();
        debug!(count = mods.len(), "LDAP modify");

        let result = self
            .handle()
            .modify(path, mods)
            .await
            .map_err(|e| self.transport_error("modify", path, e))?;
        check(result, "modify", path)
    }

    #[instrument(skip(self))]
    async fn delete(&self, path: &str) -> Result<()> {
        let result = self
            .handle()
            .delete(path)
            .await
            .map_err(|e| self.transport_error("delete", path, e))?;
        check(result, "delete", path)
    }

    async fn search(&self, base: &str, filter: &ObjectClassFilter) -> Result<Vec<Entry>> {
        let entries = self
            .search_entries(base, Scope::Subtree, filter)
            .await?
            .ok_or_else(|| IamDirError::not_found("search base", base))?;

        let base_key = normalize_path(base);
        Ok(entries
            .into_iter()
            .filter(|entry| normalize_path(entry.path()) != base_key)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifications_map_to_ldap_mods() {
        match to_mod(&Modification::add("memberUid", "alice")) {
            Mod::Add(attribute, values) => {
                assert_eq!(attribute, "memberUid");
                assert_eq!(values, HashSet::from(["alice".to_string()]));
            }
            _ => panic!("expected Mod::Add"),
        }

        match to_mod(&Modification::Remove("memberOf".to_string(), BTreeSet::new())) {
            Mod::Delete(attribute, values) => {
                assert_eq!(attribute, "memberOf");
                assert!(values.is_empty());
            }
            _ => panic!("expected Mod::Delete"),
        }
    }

    #[test]
    fn test_empty_value_replace_clears_attribute() {
        match to_mod(&Modification::replace("accessKey", "")) {
            Mod::Replace(_, values) => assert!(values.is_empty()),
            _ => panic!("expected Mod::Replace"),
        }
    }

    #[test]
    fn test_result_codes() {
        assert!(check_code(0, "", "add", "cn=a").is_ok());
        assert!(check_code(32, "", "delete", "cn=a").unwrap_err().is_not_found());
        assert!(matches!(
            check_code(68, "", "add", "cn=a").unwrap_err(),
            IamDirError::AlreadyExists { .. }
        ));
        assert!(matches!(
            check_code(66, "not allowed on non-leaf", "delete", "cn=a").unwrap_err(),
            IamDirError::DirectoryError { .. }
        ));
    }
}
