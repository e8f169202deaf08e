//! Platform detection and per-user filesystem locations.
//!
//! The platform is resolved once at startup and threaded through the driver
//! factory; nothing else in the crate branches on `cfg!` for behavior that
//! differs per OS.

use std::path::PathBuf;

use crate::error::{VpnError, VpnResult};

/// Directory name used for all per-user application data.
pub const APP_DIR_NAME: &str = "wgkeeper";

/// Supported operating systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
}

impl Platform {
    /// Detect the platform the process is running on.
    pub fn current() -> VpnResult<Self> {
        if cfg!(target_os = "windows") {
            Ok(Platform::Windows)
        } else if cfg!(target_os = "macos") {
            Ok(Platform::MacOs)
        } else if cfg!(target_os = "linux") {
            Ok(Platform::Linux)
        } else {
            Err(VpnError::Other(format!(
                "unsupported platform: {}",
                std::env::consts::OS
            )))
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::Linux => "Linux",
            Platform::MacOs => "macOS",
        }
    }
}

/// Per-user application data directory.
///
/// Resolves to `%APPDATA%\wgkeeper` on Windows, `~/Library/Application
/// Support/wgkeeper` on macOS and `$XDG_CONFIG_HOME/wgkeeper` (usually
/// `~/.config/wgkeeper`) on Linux. The directory is not created here;
/// callers create what they need.
pub fn app_data_dir() -> VpnResult<PathBuf> {
    dirs::config_dir()
        .map(|base| base.join(APP_DIR_NAME))
        .ok_or_else(|| VpnError::Other("no per-user config directory on this system".to_string()))
}

/// Default directory for tunnel configuration files.
pub fn tunnel_dir() -> VpnResult<PathBuf> {
    Ok(app_data_dir()?.join("wireguard"))
}

/// True when the current process already runs with root privileges.
#[cfg(unix)]
pub fn is_elevated() -> bool {
    nix::unistd::geteuid().is_root()
}

/// On Windows elevation is detected indirectly: privileged commands fail
/// with an access-denied status and are surfaced as `PermissionDenied`.
#[cfg(not(unix))]
pub fn is_elevated() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_platform_is_supported() {
        // The test suite only runs on the three supported targets.
        let platform = Platform::current().unwrap();
        assert!(!platform.name().is_empty());
    }

    #[test]
    fn tunnel_dir_is_under_app_dir() {
        let dir = tunnel_dir().unwrap();
        assert!(dir.ends_with("wireguard"));
        assert!(dir.to_string_lossy().contains(APP_DIR_NAME));
    }
}
