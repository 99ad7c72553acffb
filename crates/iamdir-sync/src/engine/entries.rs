//! Builders for the entries the engine creates

use once_cell::sync::Lazy;
use regex::Regex;

use iamdir_core::{schema, Entry, IamDirError, NumericId, Result};

use crate::seed::seed_credential;

/// IAM user ARN; captures the account number
static USER_ARN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^arn:aws:iam::(\d+):user/.*$").unwrap());

/// Account number embedded in an IAM user ARN
pub fn account_number_from_arn(arn: &str) -> Result<String> {
    USER_ARN
        .captures(arn)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| IamDirError::invalid_input(format!("unrecognised user ARN {:?}", arn)))
}

pub(super) fn organizational_unit(path: &str, name: &str) -> Entry {
    Entry::new(path)
        .with_values(
            schema::OBJECT_CLASS,
            [schema::TOP, schema::ORGANIZATIONAL_UNIT],
        )
        .with(schema::OU, name)
}

pub(super) fn group(path: &str, name: &str, gid: NumericId, role_group: bool) -> Entry {
    let mut entry = Entry::new(path)
        .with_values(
            schema::OBJECT_CLASS,
            [schema::TOP, schema::POSIX_GROUP, schema::IAM_GROUP],
        )
        .with(schema::CN, name)
        .with(schema::GID_NUMBER, gid.to_string());
    if role_group {
        entry.put(schema::OBJECT_CLASS, schema::IAM_ROLE_GROUP);
    }
    entry
}

/// Shared user/role account shape, including schema defaults and the seed credential
fn account(path: &str, name: &str, uid: NumericId, gid: &str, access_key: &str) -> Entry {
    let mut entry = Entry::new(path)
        .with_values(
            schema::OBJECT_CLASS,
            [
                schema::POSIX_ACCOUNT,
                schema::SHADOW_ACCOUNT,
                schema::IAM_ACCOUNT,
            ],
        )
        .with(schema::UID, name)
        .with(schema::CN, name)
        .with(schema::UID_NUMBER, uid.to_string())
        .with(schema::GID_NUMBER, gid)
        .with(schema::ACCESS_KEY, access_key)
        .with(schema::LOGIN_SHELL, schema::DEFAULT_LOGIN_SHELL)
        .with(schema::HOME_DIRECTORY, format!("{}{}", schema::HOME_PREFIX, name))
        .with(schema::USER_PASSWORD, seed_credential());
    for (attribute, value) in schema::SHADOW_DEFAULTS {
        entry.put(attribute, value);
    }
    entry
}

pub(super) struct UserAccount<'a> {
    pub path: &'a str,
    pub name: &'a str,
    pub uid: NumericId,
    pub gid: &'a str,
    pub access_key: &'a str,
    pub account_number: &'a str,
    pub member_of: &'a std::collections::BTreeSet<String>,
}

pub(super) fn user(account_fields: UserAccount<'_>) -> Entry {
    let mut entry = account(
        account_fields.path,
        account_fields.name,
        account_fields.uid,
        account_fields.gid,
        account_fields.access_key,
    );
    entry.put(schema::OBJECT_CLASS, schema::EXTENSIBLE_OBJECT);
    entry.put(schema::ACCOUNT_NUMBER, account_fields.account_number);
    for group_path in account_fields.member_of {
        entry.put(schema::MEMBER_OF, group_path.as_str());
    }
    entry
}

pub(super) fn role(path: &str, name: &str, uid: NumericId, gid: &str, role_id: &str) -> Entry {
    let mut entry = account(path, name, uid, gid, role_id);
    entry.put(schema::OBJECT_CLASS, schema::IAM_ROLE);
    entry
}
