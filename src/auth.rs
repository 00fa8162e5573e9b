use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 8;
const DIGEST_ROUNDS: u32 = 4096;

pub fn new_salt() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Iterated, salted SHA-256 of `password`, lowercase hex.
pub fn password_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    let mut digest = hasher.finalize();
    for _ in 1..DIGEST_ROUNDS {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(digest);
        digest = hasher.finalize();
    }
    format!("{:x}", digest)
}

pub fn verify_password(salt: &str, expected_digest: &str, password: &str) -> bool {
    let actual = password_digest(salt, password);
    bool::from(actual.as_bytes().ct_eq(expected_digest.as_bytes()))
}
