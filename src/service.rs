//! The service facade tying the pieces together.
//!
//! One `VpnService` owns the key store, the config repository, the
//! controller and the installation checker, and exposes the operations a
//! frontend needs. The CLI consumes this; a GUI would too.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ConfigRepository;
use crate::controller::{TunnelController, TunnelStatus};
use crate::driver::{driver_for, TunnelDriver};
use crate::error::{VpnError, VpnResult};
use crate::install::InstallationChecker;
use crate::keystore::{KeyStore, Keypair};
use crate::platform::{self, Platform};
use crate::settings::Settings;

pub struct VpnService {
    repo: Arc<ConfigRepository>,
    driver: Arc<dyn TunnelDriver>,
    controller: TunnelController,
    keystore: KeyStore,
    installer: InstallationChecker,
}

impl VpnService {
    /// Build the service for the current platform from settings.
    pub fn new(settings: Settings) -> VpnResult<Self> {
        let platform = Platform::current()?;
        let driver = driver_for(platform, &settings);
        let dir = match &settings.tunnel_dir {
            Some(dir) => dir.clone(),
            None => platform::tunnel_dir()?,
        };
        let repo = Arc::new(ConfigRepository::open(dir)?);
        let keystore = KeyStore::open_default()?;
        Ok(Self::from_parts(repo, driver, keystore, platform, settings))
    }

    /// Build the service from explicit collaborators.
    pub fn from_parts(
        repo: Arc<ConfigRepository>,
        driver: Arc<dyn TunnelDriver>,
        keystore: KeyStore,
        platform: Platform,
        settings: Settings,
    ) -> Self {
        let controller = TunnelController::new(
            driver.clone(),
            repo.clone(),
            settings.clone(),
            CancellationToken::new(),
        );
        let installer = InstallationChecker::new(driver.clone(), platform, &settings);
        VpnService {
            repo,
            driver,
            controller,
            keystore,
            installer,
        }
    }

    /// First-run bootstrap: make sure the keypair exists and seed the demo
    /// config when the tunnel directory is empty.
    pub fn ensure_ready(&self) -> VpnResult<Keypair> {
        let keypair = self.keystore.ensure_keypair()?;
        self.repo.ensure_demo_config(&keypair.private_b64)?;
        Ok(keypair)
    }

    pub fn list_tunnels(&self) -> VpnResult<Vec<String>> {
        self.repo.list_tunnels()
    }

    pub async fn query(&self, name: &str) -> VpnResult<TunnelStatus> {
        self.controller.query(name).await
    }

    pub async fn activate(&self, name: &str) -> VpnResult<TunnelStatus> {
        self.controller.activate(name).await
    }

    pub async fn deactivate(&self, name: &str) -> VpnResult<TunnelStatus> {
        self.controller.deactivate(name).await
    }

    /// Import config text; returns the tunnel name it was stored under.
    pub fn import_config(&self, raw: &str, suggested_name: &str) -> VpnResult<String> {
        self.repo.import_config(raw, suggested_name)
    }

    /// Delete a tunnel: tear down any OS-side registration first, then
    /// remove the config file. Works on malformed configs too; only
    /// absence is an error.
    pub async fn delete(&self, name: &str) -> VpnResult<()> {
        let path = self.repo.path_for(name);
        if !path.exists() {
            return Err(VpnError::ConfigNotFound(name.to_string()));
        }
        self.driver.uninstall_tunnel(&path).await?;
        self.repo.delete(name)?;
        info!(tunnel = %name, "tunnel removed");
        Ok(())
    }

    pub async fn is_installed(&self) -> bool {
        self.installer.is_installed().await
    }

    pub async fn ensure_installed(&self) -> VpnResult<()> {
        self.installer.ensure_installed().await
    }

    /// The local public key, if a keypair exists.
    pub fn public_key(&self) -> VpnResult<Option<String>> {
        self.keystore.public_key()
    }

    /// Abandon in-progress convergence waits (process shutdown).
    pub fn shutdown(&self) {
        self.controller.shutdown();
    }
}
