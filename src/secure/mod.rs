//! Encrypted secure store.
//!
//! File-backed stand-in for the platform keychain. Each key is one file under
//! the store directory; values are sealed with ChaCha20-Poly1305 under a
//! 32-byte master key. The master key is zeroized when the store is dropped.
//!
//! # Security
//!
//! - ChaCha20-Poly1305 provides authenticated encryption (tamper detection)
//! - A fresh random 12-byte nonce is generated per write
//! - On-disk format is `base64(nonce || ciphertext)`

use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, Key, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::debug;
use zeroize::Zeroize;

use crate::types::{Result, WayrestError};

/// Nonce length for ChaCha20-Poly1305 (12 bytes)
const NONCE_LEN: usize = 12;

/// Storage key for the serialized auth session
pub const AUTH_SESSION_KEY: &str = "auth-session";

/// Storage key for the direct backend's user id
pub const DIRECT_USER_ID_KEY: &str = "direct-user-id";

/// Storage key for the direct backend's user email
pub const DIRECT_EMAIL_KEY: &str = "direct-user-email";

/// Storage key for the mobile REST API key
pub const API_KEY_KEY: &str = "api-key";

/// Storage key for the direct backend's connection string
pub const DIRECT_DATABASE_URL_KEY: &str = "direct-database-url";

/// Encrypted key-value store scoped to a directory.
pub struct SecureStore {
    dir: PathBuf,
    master_key: [u8; 32],
}

impl SecureStore {
    /// Open (or create) a secure store at `dir` with the given master key.
    pub fn open(dir: impl AsRef<Path>, master_key: [u8; 32]) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| WayrestError::Storage(format!("Failed to create store dir: {e}")))?;

        Ok(Self { dir, master_key })
    }

    /// Read and decrypt a value. Returns `Ok(None)` when the key is absent.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.entry_path(key)?;
        let encoded = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(WayrestError::Storage(format!("Failed to read {key}: {e}"))),
        };

        let raw = BASE64
            .decode(encoded.trim())
            .map_err(|e| WayrestError::Storage(format!("Corrupt entry for {key}: {e}")))?;

        if raw.len() <= NONCE_LEN {
            return Err(WayrestError::Storage(format!("Corrupt entry for {key}: too short")));
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.master_key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| WayrestError::Storage(format!("Failed to decrypt entry for {key}")))?;

        String::from_utf8(plaintext)
            .map(Some)
            .map_err(|e| WayrestError::Storage(format!("Corrupt entry for {key}: {e}")))
    }

    /// Encrypt and write a value, replacing any previous one.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.master_key));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), value.as_bytes())
            .map_err(|e| WayrestError::Storage(format!("Failed to encrypt entry for {key}: {e}")))?;

        let mut raw = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        raw.extend_from_slice(&nonce);
        raw.extend_from_slice(&ciphertext);

        let path = self.entry_path(key)?;
        fs::write(&path, BASE64.encode(raw))
            .map_err(|e| WayrestError::Storage(format!("Failed to write {key}: {e}")))?;

        debug!(key = %key, "Secure store entry written");
        Ok(())
    }

    /// Remove a value. Removing an absent key is not an error.
    pub fn delete(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(WayrestError::Storage(format!("Failed to delete {key}: {e}"))),
        }
    }

    /// Map a logical key to a file path, rejecting anything that could
    /// escape the store directory.
    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(WayrestError::Storage(format!("Invalid storage key: {key}")));
        }
        Ok(self.dir.join(format!("{key}.sealed")))
    }
}

impl Drop for SecureStore {
    fn drop(&mut self) {
        self.master_key.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (SecureStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("wayrest-secure-{}", uuid::Uuid::new_v4()));
        let store = SecureStore::open(&dir, [42u8; 32]).expect("open store");
        (store, dir)
    }

    #[test]
    fn test_set_get_roundtrip() {
        let (store, dir) = test_store();

        store.set("api-key", "sk-test-123").unwrap();
        assert_eq!(store.get("api-key").unwrap().as_deref(), Some("sk-test-123"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_missing_key_is_none() {
        let (store, dir) = test_store();
        assert!(store.get("never-written").unwrap().is_none());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_delete_removes_entry() {
        let (store, dir) = test_store();

        store.set("auth-session", "{}").unwrap();
        store.delete("auth-session").unwrap();
        assert!(store.get("auth-session").unwrap().is_none());

        // Deleting again is fine
        store.delete("auth-session").unwrap();

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_tampered_entry_fails_decrypt() {
        let (store, dir) = test_store();

        store.set("direct-user-id", "user-1").unwrap();
        let path = dir.join("direct-user-id.sealed");
        fs::write(&path, BASE64.encode(vec![0u8; 64])).unwrap();

        assert!(store.get("direct-user-id").is_err());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_wrong_master_key_fails() {
        let dir = std::env::temp_dir().join(format!("wayrest-secure-{}", uuid::Uuid::new_v4()));
        {
            let store = SecureStore::open(&dir, [1u8; 32]).unwrap();
            store.set("api-key", "secret").unwrap();
        }
        let other = SecureStore::open(&dir, [2u8; 32]).unwrap();
        assert!(other.get("api-key").is_err());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_invalid_key_rejected() {
        let (store, dir) = test_store();
        assert!(store.set("../escape", "x").is_err());
        assert!(store.get("").is_err());
        let _ = fs::remove_dir_all(dir);
    }
}
