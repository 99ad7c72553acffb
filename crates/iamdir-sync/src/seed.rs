//! Non-authoritative seed credential
//!
//! Every account entry gets a `userPassword` so the field is never empty or
//! guessable. The value is never checked: binds are verified against the IAM
//! provider's sign-in flow instead.

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use sha2::{Digest, Sha256};

const SEED_LENGTH: usize = 8;
const SCHEME: &str = "SHA256";

/// Random 8-character alphanumeric secret, hashed to `{SHA256}<base64>`
pub fn seed_credential() -> String {
    let secret: String = OsRng
        .sample_iter(&Alphanumeric)
        .take(SEED_LENGTH)
        .map(char::from)
        .collect();
    hashed_credential(&secret)
}

fn hashed_credential(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    format!("{{{}}}{}", SCHEME, STANDARD.encode(digest))
}
