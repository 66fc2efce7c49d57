//! Password hashing and verification using Argon2.
//!
//! The direct-credential backend stores PHC-formatted argon2id hashes; the
//! salt and parameters travel inside the hash string, so verification needs
//! no side table.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::types::{Result, WayrestError};

/// Hash a password with a fresh random salt.
///
/// Returns the PHC-formatted hash string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| WayrestError::Auth(format!("Failed to hash password: {e}")))
}

/// Verify a password against a stored PHC hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| WayrestError::Auth(format!("Invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("rest-stop-7").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("rest-stop-7", &hash).unwrap());
        assert!(!verify_password("rest-stop-8", &hash).unwrap());
    }

    #[test]
    fn test_salts_differ_per_hash() {
        let first = hash_password("same-password").unwrap();
        let second = hash_password("same-password").unwrap();
        assert_ne!(first, second);
        assert!(verify_password("same-password", &first).unwrap());
        assert!(verify_password("same-password", &second).unwrap());
    }

    #[test]
    fn test_garbage_hash_is_an_error() {
        assert!(verify_password("anything", "not-a-phc-hash").is_err());
    }
}
