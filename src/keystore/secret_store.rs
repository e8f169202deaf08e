//! Secret storage backends for the private key.
//!
//! The primary backend is the platform credential store. Environments
//! without one (headless boxes, some WSL setups) fall back to an
//! AES-256-GCM encrypted file whose key lives beside it with owner-only
//! permissions.

use std::fs;
use std::path::{Path, PathBuf};

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use rand::RngCore;
use tracing::debug;

use crate::error::{VpnError, VpnResult};

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;

/// Storage for one secret string.
pub trait SecretStore: Send + Sync {
    /// Read the secret; `None` when it has never been stored.
    fn get(&self) -> VpnResult<Option<String>>;

    /// Store or replace the secret.
    fn set(&self, secret: &str) -> VpnResult<()>;

    /// Remove the secret; absent is not an error.
    fn delete(&self) -> VpnResult<()>;
}

/// Platform credential store backend (`keyring` crate).
pub struct KeyringStore {
    service: String,
    account: String,
}

impl KeyringStore {
    pub fn new(service: &str, account: &str) -> Self {
        KeyringStore {
            service: service.to_string(),
            account: account.to_string(),
        }
    }

    fn entry(&self) -> VpnResult<keyring::Entry> {
        keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| VpnError::KeyStoreUnavailable(e.to_string()))
    }
}

impl SecretStore for KeyringStore {
    fn get(&self) -> VpnResult<Option<String>> {
        match self.entry()?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(VpnError::KeyStoreUnavailable(e.to_string())),
        }
    }

    fn set(&self, secret: &str) -> VpnResult<()> {
        self.entry()?
            .set_password(secret)
            .map_err(|e| VpnError::KeyStoreUnavailable(e.to_string()))
    }

    fn delete(&self) -> VpnResult<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(VpnError::KeyStoreUnavailable(e.to_string())),
        }
    }
}

/// Encrypted-file backend for hosts without a usable credential store.
///
/// Layout on disk: `secret.key` holds 32 random key bytes, `secret.bin`
/// holds `nonce || ciphertext`. Both are created with mode 0o600.
pub struct EncryptedFileStore {
    key_path: PathBuf,
    secret_path: PathBuf,
}

impl EncryptedFileStore {
    pub fn open(dir: impl AsRef<Path>) -> VpnResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(EncryptedFileStore {
            key_path: dir.join("secret.key"),
            secret_path: dir.join("secret.bin"),
        })
    }

    fn load_or_create_key(&self) -> VpnResult<[u8; KEY_SIZE]> {
        if self.key_path.exists() {
            let bytes = fs::read(&self.key_path)?;
            let key: [u8; KEY_SIZE] = bytes.as_slice().try_into().map_err(|_| {
                VpnError::KeyStoreUnavailable(format!(
                    "corrupt key file {} ({} bytes)",
                    self.key_path.display(),
                    bytes.len()
                ))
            })?;
            return Ok(key);
        }
        let mut key = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        write_private(&self.key_path, &key)?;
        debug!(path = %self.key_path.display(), "created local encryption key");
        Ok(key)
    }

    fn cipher(&self) -> VpnResult<Aes256Gcm> {
        let key = self.load_or_create_key()?;
        Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key)))
    }
}

impl SecretStore for EncryptedFileStore {
    fn get(&self) -> VpnResult<Option<String>> {
        if !self.secret_path.exists() {
            return Ok(None);
        }
        let blob = fs::read(&self.secret_path)?;
        if blob.len() < NONCE_SIZE {
            return Err(VpnError::KeyStoreUnavailable(
                "stored secret is too short to hold a nonce".to_string(),
            ));
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| VpnError::KeyStoreUnavailable(format!("decryption failed: {}", e)))?;
        let secret = String::from_utf8(plaintext)
            .map_err(|_| VpnError::KeyStoreUnavailable("stored secret is not UTF-8".to_string()))?;
        Ok(Some(secret))
    }

    fn set(&self, secret: &str) -> VpnResult<()> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let ciphertext = self
            .cipher()?
            .encrypt(Nonce::from_slice(&nonce_bytes), secret.as_bytes())
            .map_err(|e| VpnError::KeyStoreUnavailable(format!("encryption failed: {}", e)))?;
        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        write_private(&self.secret_path, &blob)
    }

    fn delete(&self) -> VpnResult<()> {
        match fs::remove_file(&self.secret_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn write_private(path: &Path, bytes: &[u8]) -> VpnResult<()> {
    fs::write(path, bytes)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
