//! Presented bind secret

use std::fmt;

const SEPARATOR: char = ',';

/// A bind secret: static password plus optional one-time code, as
/// `<password>,<code>`
#[derive(Clone, PartialEq, Eq)]
pub struct SignInSecret {
    password: String,
    mfa_code: String,
}

impl SignInSecret {
    /// Split on the last separator. Without one, the code is empty.
    pub fn parse(presented: &str) -> Self {
        match presented.rsplit_once(SEPARATOR) {
            Some((password, code)) => Self {
                password: password.to_string(),
                mfa_code: code.to_string(),
            },
            None => Self {
                password: presented.to_string(),
                mfa_code: String::new(),
            },
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn mfa_code(&self) -> &str {
        &self.mfa_code
    }
}

impl fmt::Debug for SignInSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignInSecret")
            .field("password", &"[REDACTED]")
            .field("has_mfa_code", &!self.mfa_code.is_empty())
            .finish()
    }
}
