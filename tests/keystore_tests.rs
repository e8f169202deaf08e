use std::sync::Mutex;

use tempfile::tempdir;

use wgkeeper::error::VpnResult;
use wgkeeper::keystore::{derive_public, KeyStore, SecretStore};

/// In-memory secret store for exercising the key lifecycle without a
/// platform keychain.
#[derive(Default)]
struct MemoryStore {
    secret: Mutex<Option<String>>,
}

impl SecretStore for MemoryStore {
    fn get(&self) -> VpnResult<Option<String>> {
        Ok(self.secret.lock().unwrap().clone())
    }

    fn set(&self, secret: &str) -> VpnResult<()> {
        *self.secret.lock().unwrap() = Some(secret.to_string());
        Ok(())
    }

    fn delete(&self) -> VpnResult<()> {
        *self.secret.lock().unwrap() = None;
        Ok(())
    }
}

fn keystore_in(dir: &std::path::Path) -> KeyStore {
    KeyStore::new(
        Box::new(MemoryStore::default()),
        dir.join("wireguard_public.key"),
    )
}

#[test]
fn first_run_generates_and_persists_both_halves() {
    let dir = tempdir().unwrap();
    let store = keystore_in(dir.path());

    let keypair = store.ensure_keypair().unwrap();
    assert!(!keypair.private_b64.is_empty());
    assert_eq!(derive_public(&keypair.private_b64).unwrap(), keypair.public_b64);

    let on_disk = std::fs::read_to_string(store.public_key_path()).unwrap();
    assert_eq!(on_disk.trim(), keypair.public_b64);
}

#[test]
fn existing_private_key_is_never_regenerated() {
    let dir = tempdir().unwrap();
    let store = keystore_in(dir.path());

    let first = store.ensure_keypair().unwrap();
    let second = store.ensure_keypair().unwrap();
    assert_eq!(first.private_b64, second.private_b64);
    assert_eq!(first.public_b64, second.public_b64);
}

#[test]
fn missing_public_file_is_repaired_from_the_private_key() {
    let dir = tempdir().unwrap();
    let store = keystore_in(dir.path());

    let original = store.ensure_keypair().unwrap();
    std::fs::remove_file(store.public_key_path()).unwrap();

    let repaired = store.ensure_keypair().unwrap();
    assert_eq!(repaired.private_b64, original.private_b64);
    assert_eq!(repaired.public_b64, original.public_b64);
    assert!(store.public_key_path().exists());
}

#[test]
fn corrupted_public_file_is_rewritten() {
    let dir = tempdir().unwrap();
    let store = keystore_in(dir.path());

    let original = store.ensure_keypair().unwrap();
    std::fs::write(store.public_key_path(), "not-a-key").unwrap();

    let repaired = store.ensure_keypair().unwrap();
    assert_eq!(repaired.public_b64, original.public_b64);
    let on_disk = std::fs::read_to_string(store.public_key_path()).unwrap();
    assert_eq!(on_disk.trim(), original.public_b64);
}

#[test]
fn public_key_is_derivable_without_the_file() {
    let dir = tempdir().unwrap();
    let store = keystore_in(dir.path());

    let keypair = store.ensure_keypair().unwrap();
    std::fs::remove_file(store.public_key_path()).unwrap();

    assert_eq!(store.public_key().unwrap().as_deref(), Some(keypair.public_b64.as_str()));
}

#[test]
fn no_keypair_means_no_public_key() {
    let dir = tempdir().unwrap();
    let store = keystore_in(dir.path());
    assert_eq!(store.public_key().unwrap(), None);
}

#[test]
fn orphan_public_key_file_is_not_trusted() {
    let dir = tempdir().unwrap();
    let store = keystore_in(dir.path());
    std::fs::write(store.public_key_path(), "stale-key-from-a-previous-life").unwrap();

    assert_eq!(store.public_key().unwrap(), None);

    // Bootstrap replaces the orphan with a consistent pair.
    let keypair = store.ensure_keypair().unwrap();
    let on_disk = std::fs::read_to_string(store.public_key_path()).unwrap();
    assert_eq!(on_disk.trim(), keypair.public_b64);
}
