//! Windows driver: the WireGuard tunnel service.
//!
//! On Windows each tunnel is a Windows service named
//! `WireGuardTunnel$<name>`, registered with `wireguard.exe
//! /installtunnelservice` and driven through `sc`. Service queries need no
//! elevation; registration and start/stop rely on the caller's token (UAC
//! surfaces "Access is denied" which is classified as `PermissionDenied`).

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use super::command::{failure_mentions, find_program, run};
use super::probe::{self, ProbeConfig};
use super::{tunnel_name_for, StatusSample, TunnelDriver, COMMAND_TIMEOUT};
use crate::error::{VpnError, VpnResult};
use crate::platform::Platform;

const KNOWN_DIRS: &[&str] = &[
    r"C:\Program Files\WireGuard",
    r"C:\Program Files (x86)\WireGuard",
];

fn service_name(tunnel: &str) -> String {
    format!("WireGuardTunnel${}", tunnel)
}

pub struct WindowsDriver {
    probe: ProbeConfig,
}

impl WindowsDriver {
    pub fn new(probe: ProbeConfig) -> Self {
        WindowsDriver { probe }
    }

    fn wireguard_exe(&self) -> VpnResult<String> {
        find_program("wireguard.exe", KNOWN_DIRS)
            .map(|p| p.to_string_lossy().into_owned())
            .ok_or_else(|| VpnError::NotInstalled {
                guidance: "wireguard.exe was not found; install WireGuard from wireguard.com"
                    .to_string(),
            })
    }
}

#[async_trait]
impl TunnelDriver for WindowsDriver {
    async fn is_installed(&self) -> bool {
        find_program("wireguard.exe", KNOWN_DIRS).is_some()
    }

    async fn sample(&self, config_path: &Path) -> VpnResult<StatusSample> {
        let name = tunnel_name_for(config_path)?;
        let service = service_name(&name);
        let up = match run("sc", &["query", &service], COMMAND_TIMEOUT).await {
            // `STATE : 4 RUNNING` when the tunnel is up.
            Ok(output) => output.contains("RUNNING"),
            Err(e) if failure_mentions(&e, &["does not exist", "1060"]) => false,
            Err(e) => return Err(e),
        };
        let reachable = if up {
            probe::observe(Platform::Windows, &self.probe).await
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
        let name = tunnel_name_for(config_path)?;
        let service = service_name(&name);
        match run("sc", &["start", &service], COMMAND_TIMEOUT).await {
            Ok(_) => {
                info!(tunnel = %name, "started tunnel service");
                Ok(())
            }
            // Registering the service also starts it.
            Err(e) if failure_mentions(&e, &["does not exist", "1060"]) => {
                self.install_tunnel(config_path).await
            }
            Err(e) if failure_mentions(&e, &["already been started", "already running", "1056"]) => {
                debug!(tunnel = %name, "tunnel service already running");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn stop(&self, config_path: &Path) -> VpnResult<()> {
        let name = tunnel_name_for(config_path)?;
        let service = service_name(&name);
        match run("sc", &["stop", &service], COMMAND_TIMEOUT).await {
            Ok(_) => {
                info!(tunnel = %name, "stopped tunnel service");
                Ok(())
            }
            Err(e) if failure_mentions(&e, &["has not been started", "does not exist", "1060", "1062"]) => {
                debug!(tunnel = %name, "tunnel service already stopped");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn install_tunnel(&self, config_path: &Path) -> VpnResult<()> {
        let exe = self.wireguard_exe()?;
        let path = config_path.to_string_lossy();
        match run(&exe, &["/installtunnelservice", &path], COMMAND_TIMEOUT).await {
            Ok(_) => {
                info!(config = %path, "installed tunnel service");
                Ok(())
            }
            Err(e) if failure_mentions(&e, &["already exists"]) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn uninstall_tunnel(&self, config_path: &Path) -> VpnResult<()> {
        let name = tunnel_name_for(config_path)?;
        let exe = self.wireguard_exe()?;
        match run(&exe, &["/uninstalltunnelservice", &name], COMMAND_TIMEOUT).await {
            Ok(_) => {
                info!(tunnel = %name, "uninstalled tunnel service");
                Ok(())
            }
            Err(e) if failure_mentions(&e, &["does not exist", "1060"]) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_name_uses_the_tunnel_service_prefix() {
        assert_eq!(service_name("demo"), "WireGuardTunnel$demo");
    }
}
