//! Unit tests for iamdir-core

use super::*;
use std::collections::BTreeSet;

// =============================================================================
// Entry Tests
// =============================================================================

#[cfg(test)]
mod entry_tests {
    use super::*;

    fn group_entry() -> Entry {
        Entry::new("cn=admins,ou=groups,dc=example,dc=com")
            .with_values(schema::OBJECT_CLASS, [schema::TOP, schema::POSIX_GROUP, schema::IAM_GROUP])
            .with(schema::CN, "admins")
            .with(schema::GID_NUMBER, "1001")
    }

    #[test]
    fn test_attribute_names_are_case_insensitive() {
        let entry = group_entry();
        assert_eq!(entry.first("GIDNUMBER"), Some("1001"));
        assert_eq!(entry.first("gidnumber"), Some("1001"));
        assert!(entry.contains("CN", "admins"));
    }

    #[test]
    fn test_object_class_match_ignores_case() {
        let entry = group_entry();
        assert!(entry.has_object_class("IAMGroup"));
        assert!(entry.has_object_class("posixgroup"));
        assert!(!entry.has_object_class(schema::IAM_ACCOUNT));
    }

    #[test]
    fn test_apply_add_and_remove_values() {
        let mut entry = group_entry();
        entry.apply(&Modification::add(schema::MEMBER_UID, "alice"));
        entry.apply(&Modification::add(schema::MEMBER_UID, "bob"));
        assert_eq!(entry.value_set(schema::MEMBER_UID).len(), 2);

        entry.apply(&Modification::remove(schema::MEMBER_UID, "alice"));
        assert!(!entry.contains(schema::MEMBER_UID, "alice"));
        assert!(entry.contains(schema::MEMBER_UID, "bob"));

        // Removing the last value drops the attribute entirely
        entry.apply(&Modification::remove(schema::MEMBER_UID, "bob"));
        assert!(entry.values(schema::MEMBER_UID).is_none());
    }

    #[test]
    fn test_apply_replace() {
        let mut entry = group_entry();
        entry.apply(&Modification::replace(schema::GID_NUMBER, "2000"));
        assert_eq!(entry.first(schema::GID_NUMBER), Some("2000"));
        assert_eq!(entry.value_set(schema::GID_NUMBER).len(), 1);

        entry.apply(&Modification::Replace(schema::GID_NUMBER.to_string(), BTreeSet::new()));
        assert!(entry.first(schema::GID_NUMBER).is_none());
    }

    #[test]
    fn test_remove_with_empty_set_clears_attribute() {
        let mut entry = group_entry().with_values(schema::MEMBER_UID, ["a", "b"]);
        entry.apply(&Modification::Remove(schema::MEMBER_UID.to_string(), BTreeSet::new()));
        assert!(entry.values(schema::MEMBER_UID).is_none());
    }

    #[test]
    fn test_object_class_filter() {
        let entry = group_entry();
        assert!(ObjectClassFilter::Any.matches(&entry));
        assert!(ObjectClassFilter::class(schema::IAM_GROUP).matches(&entry));
        assert!(!ObjectClassFilter::class(schema::IAM_ROLE).matches(&entry));
        assert_eq!(
            ObjectClassFilter::class("iamgroup").to_filter_string(),
            "(objectClass=iamgroup)"
        );
        assert_eq!(ObjectClassFilter::Any.to_filter_string(), "(objectClass=*)");
    }
}

// =============================================================================
// Path Tests
// =============================================================================

#[cfg(test)]
mod path_tests {
    use super::*;

    #[test]
    fn test_escape_rdn_value() {
        assert_eq!(escape_rdn_value("alice"), "alice");
        assert_eq!(escape_rdn_value("ops,eu"), "ops\\,eu");
        assert_eq!(escape_rdn_value("a+b=c"), "a\\+b\\=c");
        assert_eq!(escape_rdn_value("#tag"), "\\#tag");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("UID=Alice, OU=Users ,DC=Example,dc=com"),
            "uid=alice,ou=users,dc=example,dc=com"
        );
    }

    #[test]
    fn test_depth_respects_escapes() {
        let path = "cn=ops\\,eu,ou=groups,dc=example";
        assert_eq!(path_depth(path), 3);
        assert_eq!(path_depth(""), 0);
    }

    #[test]
    fn test_is_descendant() {
        assert!(is_descendant("uid=a,ou=users,dc=x", "ou=users,dc=x"));
        assert!(is_descendant("uid=a,OU=Users,dc=x", "ou=users,dc=x"));
        assert!(!is_descendant("ou=users,dc=x", "ou=users,dc=x"));
        assert!(!is_descendant("uid=a,ou=otherusers,dc=x", "ou=users,dc=x"));
    }

    #[test]
    fn test_layout_paths() {
        let layout = DirectoryLayout::new("dc=iam,dc=example,dc=com");
        assert_eq!(layout.users_base(), "ou=users,dc=iam,dc=example,dc=com");
        assert_eq!(
            layout.group_path("dev,ops"),
            "cn=dev\\,ops,ou=groups,dc=iam,dc=example,dc=com"
        );
        assert_eq!(
            layout.role_path("deployer"),
            "uid=deployer,ou=roles,dc=iam,dc=example,dc=com"
        );
        assert_eq!(
            layout.default_counter_path(),
            "cn=idcounter,dc=iam,dc=example,dc=com"
        );
        assert_eq!(layout.managed_bases().len(), 3);
    }
}

// =============================================================================
// Report Tests
// =============================================================================

#[cfg(test)]
mod report_tests {
    use super::*;

    #[test]
    fn test_clean_report_is_success() {
        let mut report = ReconciliationReport::begin();
        report.groups.created = 2;
        report.finish();
        assert_eq!(report.status, ReconcileStatus::Success);
        assert_eq!(report.total_changes(), 2);
    }

    #[test]
    fn test_errors_with_progress_is_partial() {
        let mut report = ReconciliationReport::begin();
        report.users.unchanged = 3;
        report.record_failure(PrincipalKind::User, "mallory", "boom");
        report.finish();
        assert_eq!(report.status, ReconcileStatus::PartialSuccess);
        assert_eq!(report.users.failed, 1);
        assert_eq!(report.errors[0].name.as_deref(), Some("mallory"));
    }

    #[test]
    fn test_errors_without_progress_is_failed() {
        let mut report = ReconciliationReport::begin();
        report.record_pass_failure(PrincipalKind::Group, "listing failed");
        report.finish();
        assert_eq!(report.status, ReconcileStatus::Failed);
    }

    #[test]
    fn test_role_stats_created_on_demand() {
        let mut report = ReconciliationReport::begin();
        assert!(report.roles.is_none());
        report.stats_mut(PrincipalKind::Role).deleted += 1;
        assert_eq!(report.total_deleted(), 1);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ReconcileStatus::PartialSuccess).unwrap();
        assert_eq!(json, "\"partial_success\"");
        let kind = serde_json::to_string(&PrincipalKind::Role).unwrap();
        assert_eq!(kind, "\"role\"");
    }
}

// =============================================================================
// Error Tests
// =============================================================================

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn test_error_predicates() {
        assert!(IamDirError::not_found("entry", "uid=x").is_not_found());
        assert!(!IamDirError::directory("down").is_not_found());
        assert!(IamDirError::bootstrap("no root").is_bootstrap());
        assert!(!IamDirError::timeout("list_users", 30).is_bootstrap());
    }

    #[test]
    fn test_error_display() {
        let err = IamDirError::timeout("list_users", 30);
        assert_eq!(err.to_string(), "Timed out after 30s: list_users");
    }

    #[test]
    fn test_page_constructors() {
        let page = Page::truncated(vec![1, 2], "m1");
        assert!(page.is_truncated);
        assert_eq!(page.marker.as_deref(), Some("m1"));

        let last: Page<u8> = Page::last(vec![]);
        assert!(!last.is_truncated);
        assert!(last.marker.is_none());
    }
}
