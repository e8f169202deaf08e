//! Tunnel lifecycle controller.
//!
//! Owns the per-tunnel state machine and drives start/stop to convergence
//! by polling the platform driver. All state lives in this struct; there is
//! no global. Operations on the same tunnel are mutually exclusive through
//! an in-flight permit, while distinct tunnels proceed concurrently.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ConfigRepository;
use crate::driver::{StatusSample, TunnelDriver};
use crate::error::{VpnError, VpnResult};
use crate::settings::Settings;

/// Lifecycle state of one tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelState {
    /// Never observed since startup.
    Unknown,
    Stopped,
    Starting,
    Running,
    Stopping,
    /// A start or stop failed; the reason sticks until the next explicit
    /// operation on the tunnel.
    Error(String),
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunnelState::Unknown => write!(f, "unknown"),
            TunnelState::Stopped => write!(f, "stopped"),
            TunnelState::Starting => write!(f, "starting"),
            TunnelState::Running => write!(f, "running"),
            TunnelState::Stopping => write!(f, "stopping"),
            TunnelState::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// What a status query reports: the lifecycle state plus the independent
/// reachability observation (when a probe is configured and conclusive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelStatus {
    pub state: TunnelState,
    pub reachable: Option<bool>,
}

impl TunnelStatus {
    fn new(state: TunnelState, reachable: Option<bool>) -> Self {
        TunnelStatus { state, reachable }
    }
}

pub struct TunnelController {
    driver: Arc<dyn TunnelDriver>,
    repo: Arc<ConfigRepository>,
    settings: Settings,
    states: Mutex<HashMap<String, TunnelState>>,
    in_flight: Mutex<HashSet<String>>,
    cancel: CancellationToken,
}

/// Releases the per-tunnel permit when the operation ends, on every path.
struct Permit<'a> {
    controller: &'a TunnelController,
    name: String,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.controller
            .in_flight
            .lock()
            .unwrap()
            .remove(&self.name);
    }
}

impl TunnelController {
    pub fn new(
        driver: Arc<dyn TunnelDriver>,
        repo: Arc<ConfigRepository>,
        settings: Settings,
        cancel: CancellationToken,
    ) -> Self {
        TunnelController {
            driver,
            repo,
            settings,
            states: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
            cancel,
        }
    }

    /// Abandon all in-progress convergence waits. The OS operations that
    /// were already issued keep running; only the waiting stops.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn state_of(&self, name: &str) -> TunnelState {
        self.states
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or(TunnelState::Unknown)
    }

    fn set_state(&self, name: &str, state: TunnelState) {
        self.states
            .lock()
            .unwrap()
            .insert(name.to_string(), state);
    }

    /// Take the per-tunnel permit, first step of every mutating operation.
    fn acquire_permit(&self, name: &str) -> VpnResult<Permit<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap();
        if !in_flight.insert(name.to_string()) {
            return Err(VpnError::OperationInProgress(name.to_string()));
        }
        Ok(Permit {
            controller: self,
            name: name.to_string(),
        })
    }

    /// Bring a tunnel up and wait for it to converge to Running.
    ///
    /// Activating a tunnel that is already up succeeds as a no-op. A driver
    /// failure or a convergence timeout leaves the tunnel in `Error` with
    /// the reason attached.
    pub async fn activate(&self, name: &str) -> VpnResult<TunnelStatus> {
        let _permit = self.acquire_permit(name)?;
        self.repo.read(name)?;
        let path = self.repo.path_for(name);

        let pre = match self.driver.sample(&path).await {
            Ok(sample) => sample,
            Err(e) => {
                self.set_state(name, TunnelState::Error(e.to_string()));
                return Err(e);
            }
        };
        if pre.interface_up {
            self.set_state(name, TunnelState::Running);
            return Ok(TunnelStatus::new(TunnelState::Running, pre.reachable));
        }

        info!(tunnel = %name, "activating tunnel");
        self.set_state(name, TunnelState::Starting);
        if let Err(e) = self.driver.start(&path).await {
            warn!(tunnel = %name, error = %e, "tunnel start failed");
            self.set_state(name, TunnelState::Error(e.to_string()));
            return Err(e);
        }

        match self.wait_for(name, &path, true, "Running").await {
            Ok(sample) => {
                info!(tunnel = %name, "tunnel is running");
                self.set_state(name, TunnelState::Running);
                Ok(TunnelStatus::new(TunnelState::Running, sample.reachable))
            }
            Err(e @ VpnError::Cancelled) => {
                self.set_state(name, TunnelState::Unknown);
                Err(e)
            }
            Err(e) => {
                warn!(tunnel = %name, error = %e, "tunnel did not converge");
                self.set_state(name, TunnelState::Error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Tear a tunnel down and wait for it to converge to Stopped.
    pub async fn deactivate(&self, name: &str) -> VpnResult<TunnelStatus> {
        let _permit = self.acquire_permit(name)?;
        self.repo.read(name)?;
        let path = self.repo.path_for(name);

        let pre = match self.driver.sample(&path).await {
            Ok(sample) => sample,
            Err(e) => {
                self.set_state(name, TunnelState::Error(e.to_string()));
                return Err(e);
            }
        };
        if !pre.interface_up {
            self.set_state(name, TunnelState::Stopped);
            return Ok(TunnelStatus::new(TunnelState::Stopped, None));
        }

        info!(tunnel = %name, "deactivating tunnel");
        self.set_state(name, TunnelState::Stopping);
        if let Err(e) = self.driver.stop(&path).await {
            warn!(tunnel = %name, error = %e, "tunnel stop failed");
            self.set_state(name, TunnelState::Error(e.to_string()));
            return Err(e);
        }

        match self.wait_for(name, &path, false, "Stopped").await {
            Ok(_) => {
                info!(tunnel = %name, "tunnel is stopped");
                self.set_state(name, TunnelState::Stopped);
                Ok(TunnelStatus::new(TunnelState::Stopped, None))
            }
            Err(e @ VpnError::Cancelled) => {
                self.set_state(name, TunnelState::Unknown);
                Err(e)
            }
            Err(e) => {
                warn!(tunnel = %name, error = %e, "tunnel did not converge");
                self.set_state(name, TunnelState::Error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Report a tunnel's status.
    ///
    /// An in-flight operation reports its transitional state; a recorded
    /// error is returned as-is, without touching the driver, until the next
    /// explicit operation. Otherwise the driver is sampled fresh.
    pub async fn query(&self, name: &str) -> VpnResult<TunnelStatus> {
        if self.in_flight.lock().unwrap().contains(name) {
            return Ok(TunnelStatus::new(self.state_of(name), None));
        }
        if let TunnelState::Error(reason) = self.state_of(name) {
            return Ok(TunnelStatus::new(TunnelState::Error(reason), None));
        }

        self.repo.read(name)?;
        let sample = self.driver.sample(&self.repo.path_for(name)).await?;
        let state = if sample.interface_up {
            TunnelState::Running
        } else {
            TunnelState::Stopped
        };
        self.set_state(name, state.clone());
        Ok(TunnelStatus::new(state, sample.reachable))
    }

    /// Poll the driver until the interface reaches the wanted direction,
    /// the convergence timeout elapses or the controller shuts down.
    async fn wait_for(
        &self,
        name: &str,
        path: &std::path::Path,
        want_up: bool,
        target: &'static str,
    ) -> VpnResult<StatusSample> {
        let timeout = self.settings.convergence_timeout();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let sample = self.driver.sample(path).await?;
            if sample.interface_up == want_up {
                return Ok(sample);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(VpnError::ConvergenceTimeout {
                    tunnel: name.to_string(),
                    target,
                    timeout_secs: timeout.as_secs(),
                });
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(VpnError::Cancelled),
                _ = tokio::time::sleep(self.settings.poll_interval()) => {}
            }
        }
    }
}
