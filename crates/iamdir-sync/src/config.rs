//! Engine and scheduler settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

use iamdir_core::{IamDirError, Result};

/// What to do with a user that has no active access key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKeyPolicy {
    /// Skip the user for this cycle
    Strict,
    /// Mirror the user with an empty access key
    #[default]
    Permissive,
}

/// Reconciliation engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub access_key_policy: AccessKeyPolicy,

    /// Enables the role pass
    #[serde(default)]
    pub sync_roles: bool,

    /// Deadline for each remote IAM call
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl EngineConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            access_key_policy: AccessKeyPolicy::default(),
            sync_roles: false,
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

/// Poll timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_poll_period_secs")]
    pub poll_period_secs: u64,

    /// Delay before the first cycle
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_period_secs == 0 {
            return Err(IamDirError::config_error(
                "poll_period_secs must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.poll_period_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_period_secs: default_poll_period_secs(),
            initial_delay_secs: default_initial_delay_secs(),
        }
    }
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_poll_period_secs() -> u64 {
    600
}

fn default_initial_delay_secs() -> u64 {
    10
}
