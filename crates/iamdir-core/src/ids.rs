//! Strongly-typed identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate strongly-typed UUID wrappers
macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Returns the identifier with its type prefix, as used in log fields
            pub fn to_prefixed(&self) -> String {
                format!("{}_{}", $prefix, self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let prefix = concat!($prefix, "_");
                Uuid::parse_str(s.strip_prefix(prefix).unwrap_or(s)).map(Self)
            }
        }
    };
}

// One reconciliation cycle
define_id!(SyncRunId, "run");

/// Numeric POSIX identifier (`uidNumber` / `gidNumber`) issued by the allocator.
///
/// Assigned exactly once when an entry is created and never reused, even after
/// the entry is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NumericId(u64);

impl NumericId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for NumericId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NumericId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_generation() {
        let id1 = SyncRunId::new();
        let id2 = SyncRunId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_run_id_prefixed_roundtrip() {
        let id = SyncRunId::new();
        let prefixed = id.to_prefixed();
        assert!(prefixed.starts_with("run_"));

        let parsed: SyncRunId = prefixed.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_numeric_id_parse_and_display() {
        let id: NumericId = " 1001 ".parse().unwrap();
        assert_eq!(id.value(), 1001);
        assert_eq!(id.to_string(), "1001");
        assert!("-1".parse::<NumericId>().is_err());
    }

    #[test]
    fn test_numeric_id_next_overflow() {
        assert_eq!(NumericId::new(1000).next(), Some(NumericId::new(1001)));
        assert_eq!(NumericId::new(u64::MAX).next(), None);
    }
}
