//! Runtime settings for the lifecycle manager.
//!
//! Settings are loaded from a TOML file and control polling cadence,
//! convergence bounds and the optional reachability probe. Every field has a
//! default so an absent file yields a fully usable configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{VpnError, VpnResult};

/// Tuning knobs for status polling and convergence waits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Interval between status samples while waiting for convergence (ms)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum time to wait for a start/stop to converge (ms)
    #[serde(default = "default_convergence_timeout_ms")]
    pub convergence_timeout_ms: u64,

    /// Address pinged as a secondary reachability observation; disabled when
    /// unset
    #[serde(default)]
    pub probe_address: Option<String>,

    /// Bound on a single reachability probe (ms)
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Bound on waiting for a platform installer to finish (s)
    #[serde(default = "default_installer_timeout_secs")]
    pub installer_timeout_secs: u64,

    /// Override for the tunnel configuration directory
    #[serde(default)]
    pub tunnel_dir: Option<PathBuf>,

    /// Log level: trace, debug, info, warn or error
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_convergence_timeout_ms() -> u64 {
    5_000
}

fn default_probe_timeout_ms() -> u64 {
    2_000
}

fn default_installer_timeout_secs() -> u64 {
    180
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            poll_interval_ms: default_poll_interval_ms(),
            convergence_timeout_ms: default_convergence_timeout_ms(),
            probe_address: None,
            probe_timeout_ms: default_probe_timeout_ms(),
            installer_timeout_secs: default_installer_timeout_secs(),
            tunnel_dir: None,
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> VpnResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| VpnError::Other(format!("invalid settings file {}: {}", path.display(), e)))
    }

    /// Load settings from a file, falling back to defaults when the file is
    /// absent.
    pub fn load_or_default(path: impl AsRef<Path>) -> VpnResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "no settings file, using defaults");
            Ok(Settings::default())
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn convergence_timeout(&self) -> Duration {
        Duration::from_millis(self.convergence_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn installer_timeout(&self) -> Duration {
        Duration::from_secs(self.installer_timeout_secs)
    }
}
