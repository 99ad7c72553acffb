//! Daemon configuration

use anyhow::Result;
use serde::Deserialize;

use iamdir_auth::SignInConfig;
use iamdir_sync::{AccessKeyPolicy, EngineConfig, LdapConnectionConfig, SchedulerConfig};

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub directory: DirectorySettings,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub aws: AwsSettings,
    #[serde(default)]
    pub signin: SignInConfig,
}

#[derive(Debug, Deserialize)]
pub struct DirectorySettings {
    pub url: String,
    pub bind_dn: String,
    #[serde(default)]
    pub bind_password: String,
    /// Root of the managed subtree
    pub root_dn: String,
    /// Defaults to `cn=idcounter,<root_dn>`
    pub id_counter_dn: Option<String>,
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_poll_period")]
    pub poll_period_secs: u64,
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,
    #[serde(default)]
    pub access_key_policy: AccessKeyPolicy,
    #[serde(default)]
    pub sync_roles: bool,
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct AwsSettings {
    /// Falls back to the SDK's region chain when unset
    pub region: Option<String>,
}

fn default_operation_timeout() -> u64 {
    30
}

fn default_poll_period() -> u64 {
    600
}

fn default_initial_delay() -> u64 {
    10
}

fn default_call_timeout() -> u64 {
    30
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_period_secs: default_poll_period(),
            initial_delay_secs: default_initial_delay(),
            access_key_policy: AccessKeyPolicy::default(),
            sync_roles: false,
            call_timeout_secs: default_call_timeout(),
        }
    }
}

impl SyncSettings {
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            access_key_policy: self.access_key_policy,
            sync_roles: self.sync_roles,
            call_timeout_secs: self.call_timeout_secs,
        }
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_period_secs: self.poll_period_secs,
            initial_delay_secs: self.initial_delay_secs,
        }
    }
}

impl DirectorySettings {
    pub fn connection(&self) -> LdapConnectionConfig {
        LdapConnectionConfig {
            url: self.url.clone(),
            bind_dn: self.bind_dn.clone(),
            bind_password: self.bind_password.clone(),
            operation_timeout_secs: self.operation_timeout_secs,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            // Start with default values
            .set_default("directory.operation_timeout_secs", 30)?
            .set_default("sync.poll_period_secs", 600)?
            .set_default("sync.initial_delay_secs", 10)?
            .set_default("sync.access_key_policy", "permissive")?
            .set_default("sync.sync_roles", false)?
            .set_default("sync.call_timeout_secs", 30)?
            .set_default("signin.endpoint", iamdir_auth::config::DEFAULT_ENDPOINT)?
            .set_default("signin.timeout_secs", 15)?
            // Load from config file if present
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            // Load from environment variables with IAMDIR_ prefix
            .add_source(
                config::Environment::with_prefix("IAMDIR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
