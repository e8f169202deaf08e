//! Linux driver: `wg-quick` under per-call elevation.
//!
//! Status checks stay unprivileged by asking `ip link` whether the
//! interface exists; `wg-quick` tears the interface down on `down`, so
//! existence tracks tunnel state.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use super::command::{failure_mentions, find_program, run};
use super::elevation::elevate_linux;
use super::probe::{self, ProbeConfig};
use super::{tunnel_name_for, StatusSample, TunnelDriver, COMMAND_TIMEOUT};
use crate::error::VpnResult;
use crate::platform::Platform;

const KNOWN_DIRS: &[&str] = &["/usr/bin", "/usr/local/bin", "/usr/sbin"];

pub struct LinuxDriver {
    probe: ProbeConfig,
}

impl LinuxDriver {
    pub fn new(probe: ProbeConfig) -> Self {
        LinuxDriver { probe }
    }

    async fn run_elevated(&self, program: &str, args: &[&str]) -> VpnResult<String> {
        let elevated = elevate_linux(program, args);
        run(&elevated.program, &elevated.arg_refs(), COMMAND_TIMEOUT).await
    }
}

#[async_trait]
impl TunnelDriver for LinuxDriver {
    async fn is_installed(&self) -> bool {
        find_program("wg-quick", KNOWN_DIRS).is_some() && find_program("wg", KNOWN_DIRS).is_some()
    }

    async fn sample(&self, config_path: &Path) -> VpnResult<StatusSample> {
        let name = tunnel_name_for(config_path)?;
        let up = run("ip", &["link", "show", "dev", &name], COMMAND_TIMEOUT)
            .await
            .is_ok();
        let reachable = if up {
            probe::observe(Platform::Linux, &self.probe).await
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
        // wg-quick works straight off the config file.
        Ok(())
    }

    async fn uninstall_tunnel(&self, config_path: &Path) -> VpnResult<()> {
        if self.sample(config_path).await?.interface_up {
            self.stop(config_path).await?;
        }
        Ok(())
    }
}
