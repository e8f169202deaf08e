//! macOS driver: `wg-quick` behind the native authorization dialog.
//!
//! macOS assigns `utunN` interface names; `wg-quick` records the mapping in
//! `/var/run/wireguard/<name>.name`, which is what the unprivileged status
//! check reads. Elevation happens per call through `osascript`, so no
//! credential is ever held by this process.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use super::command::{failure_mentions, find_program, run};
use super::elevation::elevate_macos;
use super::probe::{self, ProbeConfig};
use super::{tunnel_name_for, StatusSample, TunnelDriver, COMMAND_TIMEOUT};
use crate::error::VpnResult;
use crate::platform::Platform;

const KNOWN_DIRS: &[&str] = &["/usr/local/bin", "/opt/homebrew/bin"];
const RUN_DIR: &str = "/var/run/wireguard";

pub struct MacOsDriver {
    probe: ProbeConfig,
    run_dir: PathBuf,
}

impl MacOsDriver {
    pub fn new(probe: ProbeConfig) -> Self {
        MacOsDriver {
            probe,
            run_dir: PathBuf::from(RUN_DIR),
        }
    }

    #[cfg(test)]
    fn with_run_dir(probe: ProbeConfig, run_dir: impl Into<PathBuf>) -> Self {
        MacOsDriver {
            probe,
            run_dir: run_dir.into(),
        }
    }

    /// The OS-assigned utun name for a tunnel, if wg-quick recorded one.
    fn utun_name(&self, tunnel: &str) -> Option<String> {
        let name_file = self.run_dir.join(format!("{}.name", tunnel));
        std::fs::read_to_string(name_file)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    async fn run_elevated(&self, program: &str, args: &[&str]) -> VpnResult<String> {
        let elevated = elevate_macos(program, args);
        run(&elevated.program, &elevated.arg_refs(), COMMAND_TIMEOUT).await
    }
}

#[async_trait]
impl TunnelDriver for MacOsDriver {
    async fn is_installed(&self) -> bool {
        find_program("wg-quick", KNOWN_DIRS).is_some() && find_program("wg", KNOWN_DIRS).is_some()
    }

    async fn sample(&self, config_path: &Path) -> VpnResult<StatusSample> {
        let name = tunnel_name_for(config_path)?;
        // A stale name file can outlive the interface; confirm with ifconfig.
        let up = match self.utun_name(&name) {
            Some(utun) => run("ifconfig", &[&utun], COMMAND_TIMEOUT).await.is_ok(),
            None => false,
        };
        let reachable = if up {
            probe::observe(Platform::MacOs, &self.probe).await
        } else {
            None
        };
        debug!(tunnel = %name, interface_up = up, ?reachable, "sampled tunnel");
        Ok(StatusSample {
            interface_up: up,
            reachable,
        })
    }

    async fn start(&self, config_path: &Path) -> VpnResult<()> {
        let path = config_path.to_string_lossy();
        match self.run_elevated("wg-quick", &["up", &path]).await {
            Ok(_) => {
                info!(config = %path, "wg-quick up succeeded");
                Ok(())
            }
            Err(e) if failure_mentions(&e, &["already exists"]) => {
                debug!(config = %path, "tunnel already up");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn stop(&self, config_path: &Path) -> VpnResult<()> {
        let path = config_path.to_string_lossy();
        match self.run_elevated("wg-quick", &["down", &path]).await {
            Ok(_) => {
                info!(config = %path, "wg-quick down succeeded");
                Ok(())
            }
            Err(e) if failure_mentions(&e, &["is not a wireguard interface", "does not exist"]) => {
                debug!(config = %path, "tunnel already down");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn install_tunnel(&self, _config_path: &Path) -> VpnResult<()> {
        Ok(())
    }

    async fn uninstall_tunnel(&self, config_path: &Path) -> VpnResult<()> {
        if self.sample(config_path).await?.interface_up {
            self.stop(config_path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn utun_name_comes_from_the_name_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("office.name"), "utun4\n").unwrap();

        let driver = MacOsDriver::with_run_dir(ProbeConfig::default(), dir.path());
        assert_eq!(driver.utun_name("office").as_deref(), Some("utun4"));
        assert_eq!(driver.utun_name("absent"), None);
    }

    #[test]
    fn empty_name_file_counts_as_absent() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("office.name"), "  \n").unwrap();

        let driver = MacOsDriver::with_run_dir(ProbeConfig::default(), dir.path());
        assert_eq!(driver.utun_name("office"), None);
    }
}
