//! Reachability probe.
//!
//! A single bounded `ping` against a configured address through the tunnel.
//! The probe answers a different question than the interface check: the
//! interface can be up while the far side is unreachable. A probe that
//! cannot run at all is reported as inconclusive, never as "down".

use std::time::Duration;

use tracing::warn;

use crate::driver::command;
use crate::error::{VpnError, VpnResult};
use crate::platform::Platform;

/// Probe settings threaded into each driver.
#[derive(Debug, Clone, Default)]
pub struct ProbeConfig {
    /// Address to ping; probing is disabled when unset.
    pub address: Option<String>,
    /// Bound on one probe, command timeout included.
    pub timeout: Duration,
}

/// Ping `address` once with a platform-appropriate deadline.
///
/// `Ok(true)`: reply received. `Ok(false)`: ping ran but got no reply.
/// `Err(NetworkProbeFailed)`: ping could not be executed or timed out as a
/// process.
pub async fn ping(platform: Platform, address: &str, timeout: Duration) -> VpnResult<bool> {
    let secs = timeout.as_secs().max(1).to_string();
    let millis = timeout.as_millis().max(1).to_string();
    let args: Vec<&str> = match platform {
        Platform::Windows => vec!["-n", "1", "-w", &millis, address],
        Platform::Linux => vec!["-c", "1", "-W", &secs, address],
        Platform::MacOs => vec!["-c", "1", "-t", &secs, address],
    };

    // Give the process a little slack beyond ping's own deadline.
    match command::run("ping", &args, timeout + Duration::from_secs(2)).await {
        Ok(_) => Ok(true),
        Err(VpnError::CommandFailed { code: Some(_), .. }) => Ok(false),
        Err(e) => Err(VpnError::NetworkProbeFailed(e.to_string())),
    }
}

/// Run the configured probe, folding every failure mode into the
/// three-valued reachability observation.
pub async fn observe(platform: Platform, config: &ProbeConfig) -> Option<bool> {
    let address = config.address.as_deref()?;
    match ping(platform, address, config.timeout).await {
        Ok(reply) => Some(reply),
        Err(e) => {
            warn!(%address, error = %e, "reachability probe inconclusive");
            None
        }
    }
}
