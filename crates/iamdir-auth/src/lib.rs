//! iamdir Auth - Credential verification for directory binds
//!
//! Directory entries carry only a placeholder password. A bind is accepted
//! when the IAM provider's web sign-in accepts the presented credentials:
//! - `secret`: splits the presented secret into password and one-time code
//! - `verifier`: replays the sign-in form POST and reads the session cookies
//!
//! Network failures deny the bind. Anything else is returned as an error.

pub mod config;
pub mod secret;
pub mod verifier;


pub use config::SignInConfig;
pub use secret::SignInSecret;
pub use verifier::{CredentialVerifier, WebSignInVerifier};
