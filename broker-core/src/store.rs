//! Filesystem key→blob store for V1 credentials, AES-encrypted at rest.
//!
//! One file per `keyId` (hex), named after the key itself. The encryption key
//! for a given file is derived from the per-entry `password` that the holder
//! of the AuthId already knows; nobody else can read the file even with
//! filesystem access alone.
use std::path::{Path, PathBuf};

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    AeadCore, Aes256Gcm, Nonce,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::error::{Error, Result};

/// The persisted, encrypted payload referenced by a V1 AuthId.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    /// Id of the service this entry authenticates against.
    pub service_id: String,
    /// When the current access token expires.
    pub expires: DateTime<Utc>,
    /// Most recently issued access token.
    pub access_token: String,
    /// Most recently issued refresh token.
    pub refresh_token: String,
    /// Raw provider response, verbatim, for providers that return extra fields.
    pub json: serde_json::Value,
}

fn derive_key(password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// Encrypt an arbitrary blob under `password`, using the same cipher as the
/// blob store. Exposed so the secrets document (`SECRETS_PASSPHRASE`) can
/// reuse it without duplicating the AES-GCM plumbing.
#[must_use]
pub fn encrypt_blob(password: &str, plaintext: &[u8]) -> Vec<u8> {
    encrypt(password, plaintext)
}

/// Decrypt an arbitrary blob under `password`, using the same cipher as the
/// blob store.
pub fn decrypt_blob(password: &str, data: &[u8]) -> Result<Vec<u8>> {
    decrypt(password, data)
}

fn encrypt(password: &str, plaintext: &[u8]) -> Vec<u8> {
    let key = derive_key(password);
    let cipher = Aes256Gcm::new_from_slice(&key).expect("key is exactly 32 bytes");
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .expect("in-memory AES-GCM encryption cannot fail");

    let mut out = Vec::with_capacity(nonce.len() + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    out
}

fn decrypt(password: &str, data: &[u8]) -> Result<Vec<u8>> {
    const NONCE_LEN: usize = 12;

    if data.len() < NONCE_LEN {
        return Err(Error::DecryptingFailed);
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let key = derive_key(password);
    let cipher = Aes256Gcm::new_from_slice(&key).expect("key is exactly 32 bytes");

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| Error::DecryptingFailed)
}

/// Encrypted-at-rest blob store, one directory, one file per `keyId`.
#[derive(Debug, Clone)]
pub struct EncryptedStore {
    dir: PathBuf,
}

impl EncryptedStore {
    /// Use `dir` as the storage root. The directory must already exist.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key_id: &str) -> PathBuf {
        self.dir.join(key_id)
    }

    /// Create or overwrite the entry named `key_id`, encrypted under `password`.
    ///
    /// The write truncates any prior content so a reader never observes a
    /// file that mixes old and new ciphertext.
    #[instrument(skip(self, password, entry))]
    pub async fn put(&self, key_id: &str, password: &str, entry: &StoredEntry) -> Result<()> {
        let plaintext = serde_json::to_vec(entry)?;
        let path = self.path(key_id);
        let password = password.to_owned();

        tokio::task::spawn_blocking(move || {
            let blob = encrypt(&password, &plaintext);
            std::fs::write(&path, blob)
        })
        .await
        .expect("blob store write task panicked")?;

        Ok(())
    }

    /// Read and decrypt the entry named `key_id`.
    ///
    /// Any failure -- missing file, corrupt file, wrong password -- surfaces
    /// as [`Error::DecryptingFailed`], deliberately indistinguishable from one
    /// another so a caller can't use this to probe for valid key ids.
    #[instrument(skip(self, password))]
    pub async fn get(&self, key_id: &str, password: &str) -> Result<StoredEntry> {
        let path = self.path(key_id);
        let password = password.to_owned();

        let plaintext = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let blob = std::fs::read(&path).map_err(|_| Error::DecryptingFailed)?;
            decrypt(&password, &blob)
        })
        .await
        .expect("blob store read task panicked")?;

        serde_json::from_slice(&plaintext).map_err(|_| Error::DecryptingFailed)
    }

    /// Delete the entry named `key_id`.
    #[instrument(skip(self))]
    pub async fn delete(&self, key_id: &str) -> Result<()> {
        let path = self.path(key_id);

        tokio::task::spawn_blocking(move || std::fs::remove_file(path))
            .await
            .expect("blob store delete task panicked")?;

        Ok(())
    }

    /// The directory this store reads from and writes to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> StoredEntry {
        StoredEntry {
            service_id: "gd".into(),
            expires: Utc::now(),
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            json: serde_json::json!({"access_token": "access"}),
        }
    }

    #[tokio::test]
    async fn round_trips_with_correct_password() {
        let dir = tempdir();
        let store = EncryptedStore::new(dir.path());
        let entry = sample_entry();

        store.put("abc123", "correct horse", &entry).await.unwrap();
        let read_back = store.get("abc123", "correct horse").await.unwrap();

        assert_eq!(read_back.refresh_token, entry.refresh_token);
        assert_eq!(read_back.service_id, entry.service_id);
    }

    #[tokio::test]
    async fn wrong_password_fails_opaquely() {
        let dir = tempdir();
        let store = EncryptedStore::new(dir.path());
        store.put("abc123", "right", &sample_entry()).await.unwrap();

        let err = store.get("abc123", "wrong").await.unwrap_err();
        assert!(matches!(err, Error::DecryptingFailed));
    }

    #[tokio::test]
    async fn missing_file_fails_the_same_way_as_wrong_password() {
        let dir = tempdir();
        let store = EncryptedStore::new(dir.path());

        let err = store.get("never-written", "whatever").await.unwrap_err();
        assert!(matches!(err, Error::DecryptingFailed));
    }

    #[tokio::test]
    async fn delete_removes_the_file() {
        let dir = tempdir();
        let store = EncryptedStore::new(dir.path());
        store.put("abc123", "pw", &sample_entry()).await.unwrap();

        store.delete("abc123").await.unwrap();

        let err = store.get("abc123", "pw").await.unwrap_err();
        assert!(matches!(err, Error::DecryptingFailed));
    }

    /// Minimal scoped temp directory, cleaned up on drop.
    struct TempDir(PathBuf);

    impl TempDir {
        fn path(&self) -> &Path {
            &self.0
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn tempdir() -> TempDir {
        let mut dir = std::env::temp_dir();
        dir.push(format!("broker-core-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        TempDir(dir)
    }
}
