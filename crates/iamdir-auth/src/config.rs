//! Sign-in endpoint configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://us-east-1.signin.aws.amazon.com/oauth";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInConfig {
    /// Form POST target
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Whole-request timeout; a breach denies the bind
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl SignInConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SignInConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    15
}
