//! Platform tunnel drivers.
//!
//! This module defines the driver trait and the per-OS implementations that
//! talk to the WireGuard tooling: the tunnel service on Windows, `wg-quick`
//! on Linux and macOS. A driver is selected once by [`driver_for`] and
//! shared behind a trait object; nothing above this layer branches on the
//! operating system.

pub mod command;
pub mod elevation;
pub mod probe;

mod linux;
mod macos;
mod windows;

pub use linux::LinuxDriver;
pub use macos::MacOsDriver;
pub use windows::WindowsDriver;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{VpnError, VpnResult};
use crate::platform::Platform;
use crate::settings::Settings;
use probe::ProbeConfig;

/// Default bound on one driver subprocess.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// One point-in-time observation of a tunnel.
///
/// The two fields are independent observations and are never folded into
/// one another: `interface_up` comes from the OS, `reachable` from the
/// optional ping probe (`None` when probing is disabled or inconclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSample {
    pub interface_up: bool,
    pub reachable: Option<bool>,
}

impl StatusSample {
    pub fn down() -> Self {
        StatusSample {
            interface_up: false,
            reachable: None,
        }
    }
}

/// Platform operations on WireGuard tunnels.
///
/// All methods take the full config file path; drivers derive the tunnel
/// name from it. Start and stop are idempotent: starting a running tunnel
/// or stopping a stopped one succeeds as a no-op.
#[async_trait]
pub trait TunnelDriver: Send + Sync {
    /// Whether the WireGuard tooling this driver needs is present.
    async fn is_installed(&self) -> bool;

    /// Observe the tunnel without changing it. Never requires elevation.
    async fn sample(&self, config_path: &Path) -> VpnResult<StatusSample>;

    /// Bring the tunnel up. Returns once the OS operation was issued;
    /// convergence is observed by polling `sample`.
    async fn start(&self, config_path: &Path) -> VpnResult<()>;

    /// Tear the tunnel down.
    async fn stop(&self, config_path: &Path) -> VpnResult<()>;

    /// Register the tunnel with the OS where that is a separate step
    /// (the Windows tunnel service). Elsewhere a no-op.
    async fn install_tunnel(&self, config_path: &Path) -> VpnResult<()>;

    /// Remove the OS registration, tearing the tunnel down if needed.
    async fn uninstall_tunnel(&self, config_path: &Path) -> VpnResult<()>;
}

/// Tunnel name for a config path: the file stem.
pub fn tunnel_name_for(config_path: &Path) -> VpnResult<String> {
    config_path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            VpnError::Other(format!(
                "config path {} has no usable file name",
                config_path.display()
            ))
        })
}

/// Select the driver for a platform.
pub fn driver_for(platform: Platform, settings: &Settings) -> Arc<dyn TunnelDriver> {
    let probe = ProbeConfig {
        address: settings.probe_address.clone(),
        timeout: settings.probe_timeout(),
    };
    match platform {
        Platform::Windows => Arc::new(WindowsDriver::new(probe)),
        Platform::Linux => Arc::new(LinuxDriver::new(probe)),
        Platform::MacOs => Arc::new(MacOsDriver::new(probe)),
    }
}
