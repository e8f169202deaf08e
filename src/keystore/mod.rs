//! Local WireGuard identity.
//!
//! The private key is generated once, base64-encoded and kept in the
//! platform secret store; only the public key touches the filesystem, as a
//! plaintext file other tools can read. Tunnel configs embed the private key
//! at write time, which is why config files themselves are owner-only.

mod secret_store;

pub use secret_store::{EncryptedFileStore, KeyringStore, SecretStore};

use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::{info, warn};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::{VpnError, VpnResult};
use crate::platform;

/// Secret store service name.
pub const SERVICE: &str = "wgkeeper";
/// Secret store account under which the base64 private key lives.
pub const ACCOUNT: &str = "wireguard_private_key_b64";
/// File name of the plaintext public key, in the app data directory.
pub const PUBLIC_KEY_FILE: &str = "wireguard_public.key";

/// A base64-encoded X25519 keypair.
#[derive(Debug, Clone)]
pub struct Keypair {
    pub private_b64: String,
    pub public_b64: String,
}

/// The local identity: one secret store plus one public key file.
pub struct KeyStore {
    store: Box<dyn SecretStore>,
    public_key_path: PathBuf,
}

impl KeyStore {
    /// Open the default key store.
    ///
    /// Probes the platform credential store first; when it cannot be
    /// reached at all the encrypted-file backend takes over.
    pub fn open_default() -> VpnResult<Self> {
        let app_dir = platform::app_data_dir()?;
        fs::create_dir_all(&app_dir)?;

        let keyring = KeyringStore::new(SERVICE, ACCOUNT);
        let store: Box<dyn SecretStore> = match keyring.get() {
            Ok(_) => Box::new(keyring),
            Err(e) => {
                warn!(error = %e, "credential store unavailable, using encrypted file store");
                Box::new(EncryptedFileStore::open(app_dir.join("secrets"))?)
            }
        };

        Ok(KeyStore {
            store,
            public_key_path: app_dir.join(PUBLIC_KEY_FILE),
        })
    }

    /// Build a key store over an explicit backend and public key path.
    pub fn new(store: Box<dyn SecretStore>, public_key_path: impl Into<PathBuf>) -> Self {
        KeyStore {
            store,
            public_key_path: public_key_path.into(),
        }
    }

    pub fn public_key_path(&self) -> &Path {
        &self.public_key_path
    }

    /// Generate the keypair on first run; repair the public file on later
    /// runs.
    ///
    /// An existing private key is never replaced. If the public key file is
    /// missing or disagrees with the stored private key, it is rewritten
    /// from the private key.
    pub fn ensure_keypair(&self) -> VpnResult<Keypair> {
        if let Some(private_b64) = self.store.get()? {
            let public_b64 = derive_public(&private_b64)?;
            let on_disk = fs::read_to_string(&self.public_key_path)
                .ok()
                .map(|s| s.trim().to_string());
            if on_disk.as_deref() != Some(public_b64.as_str()) {
                fs::write(&self.public_key_path, &public_b64)?;
                info!("rewrote public key file from stored private key");
            }
            return Ok(Keypair {
                private_b64,
                public_b64,
            });
        }

        let secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
        let private_b64 = BASE64.encode(secret.to_bytes());
        let public_b64 = BASE64.encode(PublicKey::from(&secret).to_bytes());

        self.store.set(&private_b64)?;
        fs::write(&self.public_key_path, &public_b64)?;
        info!("generated new WireGuard keypair");

        Ok(Keypair {
            private_b64,
            public_b64,
        })
    }

    /// The public key, derived from the stored private key.
    ///
    /// A public key file with no private key behind it is inconsistent and
    /// is never trusted; `None` is returned until a keypair exists.
    pub fn public_key(&self) -> VpnResult<Option<String>> {
        match self.store.get()? {
            Some(private_b64) => Ok(Some(derive_public(&private_b64)?)),
            None => Ok(None),
        }
    }
}

/// Derive the base64 public key from a base64 private key.
pub fn derive_public(private_b64: &str) -> VpnResult<String> {
    let bytes = BASE64
        .decode(private_b64.trim())
        .map_err(|e| VpnError::KeyStoreUnavailable(format!("stored key is not base64: {}", e)))?;
    let bytes: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        VpnError::KeyStoreUnavailable(format!("stored key has {} bytes, expected 32", bytes.len()))
    })?;
    let secret = StaticSecret::from(bytes);
    Ok(BASE64.encode(PublicKey::from(&secret).to_bytes()))
}
