//! WireGuard installation check and guided install.
//!
//! When the tooling is missing, each platform gets its native path: the
//! official signed installer on Windows (downloaded over HTTPS and launched
//! through the UAC prompt), the distribution package manager on Linux,
//! Homebrew on macOS. Every failure mode collapses into `NotInstalled`
//! with guidance a person can act on; nothing here panics.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::driver::command::{find_program, run};
use crate::driver::elevation::elevate_linux;
use crate::driver::TunnelDriver;
use crate::error::{VpnError, VpnResult};
use crate::platform::Platform;
use crate::settings::Settings;

/// Official signed Windows installer.
const WINDOWS_INSTALLER_URL: &str =
    "https://download.wireguard.com/windows-client/wireguard-installer.exe";

const INSTALL_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct InstallationChecker {
    driver: Arc<dyn TunnelDriver>,
    platform: Platform,
    installer_timeout: Duration,
}

impl InstallationChecker {
    pub fn new(driver: Arc<dyn TunnelDriver>, platform: Platform, settings: &Settings) -> Self {
        InstallationChecker {
            driver,
            platform,
            installer_timeout: settings.installer_timeout(),
        }
    }

    /// True when the WireGuard tooling is present.
    pub async fn is_installed(&self) -> bool {
        self.driver.is_installed().await
    }

    /// Install WireGuard if it is missing; no-op when already present.
    pub async fn ensure_installed(&self) -> VpnResult<()> {
        if self.driver.is_installed().await {
            return Ok(());
        }
        info!(platform = self.platform.name(), "WireGuard not found, attempting install");

        match self.platform {
            Platform::Windows => self.install_windows().await?,
            Platform::Linux => self.install_linux().await?,
            Platform::MacOs => self.install_macos().await?,
        }

        self.wait_until_installed().await
    }

    /// Poll until the tooling shows up or the installer timeout elapses.
    /// Windows installers return before the files land, so one check is not
    /// enough.
    async fn wait_until_installed(&self) -> VpnResult<()> {
        let deadline = tokio::time::Instant::now() + self.installer_timeout;
        loop {
            if self.driver.is_installed().await {
                info!("WireGuard installation verified");
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(VpnError::NotInstalled {
                    guidance: format!(
                        "the installer did not finish within {}s; install WireGuard manually \
                         from wireguard.com and try again",
                        self.installer_timeout.as_secs()
                    ),
                });
            }
            tokio::time::sleep(INSTALL_POLL_INTERVAL).await;
        }
    }

    async fn install_windows(&self) -> VpnResult<()> {
        let installer = self.download_windows_installer().await?;
        let path = installer.to_string_lossy().into_owned();
        info!(installer = %path, "launching WireGuard installer");

        // Start-Process -Verb RunAs raises the UAC prompt; /S installs
        // silently once the user approves.
        let script = format!(
            "Start-Process -FilePath '{}' -ArgumentList '/S' -Verb RunAs -Wait",
            path.replace('\'', "''")
        );
        run(
            "powershell",
            &["-NoProfile", "-NonInteractive", "-Command", &script],
            self.installer_timeout,
        )
        .await
        .map_err(|e| match e {
            VpnError::PermissionDenied(_) => e,
            other => VpnError::NotInstalled {
                guidance: format!(
                    "installer launch failed ({}); run the WireGuard installer manually",
                    other
                ),
            },
        })?;
        Ok(())
    }

    async fn download_windows_installer(&self) -> VpnResult<PathBuf> {
        info!(url = WINDOWS_INSTALLER_URL, "downloading WireGuard installer");
        let response = reqwest::get(WINDOWS_INSTALLER_URL)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| VpnError::NotInstalled {
                guidance: format!(
                    "could not download the installer ({}); fetch it from wireguard.com",
                    e
                ),
            })?;
        let bytes = response.bytes().await.map_err(|e| VpnError::NotInstalled {
            guidance: format!("installer download was interrupted ({})", e),
        })?;

        let path = std::env::temp_dir().join("wireguard-installer.exe");
        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        Ok(path)
    }

    async fn install_linux(&self) -> VpnResult<()> {
        let (manager, args): (&str, Vec<&str>) = if find_program("apt-get", &[]).is_some() {
            ("apt-get", vec!["install", "-y", "wireguard"])
        } else if find_program("dnf", &[]).is_some() {
            ("dnf", vec!["install", "-y", "wireguard-tools"])
        } else if find_program("pacman", &[]).is_some() {
            ("pacman", vec!["-S", "--noconfirm", "wireguard-tools"])
        } else {
            return Err(VpnError::NotInstalled {
                guidance: "no supported package manager found; install the 'wireguard' \
                           package with your distribution's tools"
                    .to_string(),
            });
        };

        info!(%manager, "installing WireGuard through the package manager");
        let elevated = elevate_linux(manager, &args);
        run(&elevated.program, &elevated.arg_refs(), self.installer_timeout)
            .await
            .map_err(|e| match e {
                VpnError::PermissionDenied(_) => e,
                other => {
                    warn!(error = %other, "package install failed");
                    VpnError::NotInstalled {
                        guidance: format!(
                            "'{} install' failed ({}); install the wireguard package manually",
                            manager, other
                        ),
                    }
                }
            })?;
        Ok(())
    }

    async fn install_macos(&self) -> VpnResult<()> {
        // Homebrew refuses to run as root; no elevation here.
        if find_program("brew", &["/usr/local/bin", "/opt/homebrew/bin"]).is_none() {
            return Err(VpnError::NotInstalled {
                guidance: "Homebrew was not found; install it from brew.sh, then run \
                           'brew install wireguard-tools'"
                    .to_string(),
            });
        }
        info!("installing wireguard-tools through Homebrew");
        run("brew", &["install", "wireguard-tools"], self.installer_timeout)
            .await
            .map_err(|e| VpnError::NotInstalled {
                guidance: format!(
                    "'brew install wireguard-tools' failed ({}); run it manually",
                    e
                ),
            })?;
        Ok(())
    }
}
