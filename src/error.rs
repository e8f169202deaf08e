//! Error types for the tunnel lifecycle manager.

use std::io;
use thiserror::Error;

/// Result type for VPN lifecycle operations.
pub type VpnResult<T> = Result<T, VpnError>;

/// Error types that can occur while managing tunnels.
#[derive(Debug, Error)]
pub enum VpnError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The WireGuard tooling (binaries or platform service) is absent
    #[error("WireGuard is not installed: {guidance}")]
    NotInstalled { guidance: String },

    /// Elevation was refused, dismissed or failed
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A requested state was never observed within the bound
    #[error("tunnel '{tunnel}' did not reach {target} within {timeout_secs}s")]
    ConvergenceTimeout {
        tunnel: String,
        target: &'static str,
        timeout_secs: u64,
    },

    /// Re-entrancy guard: an operation is already running for this tunnel
    #[error("an operation is already in progress for tunnel '{0}'")]
    OperationInProgress(String),

    /// Malformed tunnel configuration file
    #[error("failed to parse config '{name}': {reason}")]
    ConfigParse { name: String, reason: String },

    /// No configuration file with the given name
    #[error("no tunnel config named '{0}'")]
    ConfigNotFound(String),

    /// A configuration file with the given name is already present
    #[error("tunnel '{0}' already exists; delete it first")]
    ConfigExists(String),

    /// Secure key storage could not be reached or used
    #[error("key store unavailable: {0}")]
    KeyStoreUnavailable(String),

    /// Reachability probe was inconclusive (distinct from interface-down)
    #[error("reachability probe failed: {0}")]
    NetworkProbeFailed(String),

    /// A subprocess exited with a failure status
    #[error("`{program}` exited with {code:?}: {stderr}")]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The surrounding operation was cancelled before completion
    #[error("operation cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl VpnError {
    /// Build a `ConfigParse` error for a named tunnel.
    pub fn parse(name: impl Into<String>, reason: impl Into<String>) -> Self {
        VpnError::ConfigParse {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl From<String> for VpnError {
    fn from(s: String) -> Self {
        VpnError::Other(s)
    }
}

impl From<&str> for VpnError {
    fn from(s: &str) -> Self {
        VpnError::Other(s.to_string())
    }
}
