//! Tunnel configuration storage.
//!
//! Configurations live as `<name>.conf` files in a per-user directory. All
//! writes go through a temp file in the same directory followed by a rename,
//! so a crash mid-write never leaves a truncated config behind.

mod tunnel;

pub use tunnel::{Endpoint, TunnelConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{VpnError, VpnResult};
use crate::platform;

/// Name of the bootstrap tunnel created for first-run users.
pub const DEMO_TUNNEL_NAME: &str = "demo";

/// Repository of tunnel configuration files under one directory.
pub struct ConfigRepository {
    dir: PathBuf,
}

impl ConfigRepository {
    /// Open the repository at the default per-user location, creating the
    /// directory if needed.
    pub fn open_default() -> VpnResult<Self> {
        Self::open(platform::tunnel_dir()?)
    }

    /// Open the repository at an explicit directory, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> VpnResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(ConfigRepository { dir })
    }

    /// The directory holding the `.conf` files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the config file for a tunnel name.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.conf", name))
    }

    /// Names of all parseable tunnel configs, sorted.
    ///
    /// Malformed files are skipped with a warning rather than failing the
    /// whole listing.
    pub fn list_tunnels(&self) -> VpnResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("conf") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.read(name) {
                Ok(_) => names.push(name.to_string()),
                Err(e) => {
                    warn!(config = %path.display(), error = %e, "skipping malformed tunnel config");
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Read and parse one tunnel config.
    pub fn read(&self, name: &str) -> VpnResult<TunnelConfig> {
        let path = self.path_for(name);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VpnError::ConfigNotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        TunnelConfig::parse(name, &text)
    }

    /// Write raw config text atomically.
    pub fn write(&self, name: &str, raw: &str) -> VpnResult<()> {
        let path = self.path_for(name);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(raw.as_bytes())?;
        tmp.flush()?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // The file carries the private key.
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600))?;
        }
        tmp.persist(&path)
            .map_err(|e| VpnError::Io(e.error))?;
        debug!(config = %path.display(), "wrote tunnel config");
        Ok(())
    }

    /// Serialize and write a parsed config atomically.
    pub fn write_config(&self, config: &TunnelConfig) -> VpnResult<()> {
        self.write(&config.name, &config.to_conf())
    }

    /// Delete a tunnel config.
    pub fn delete(&self, name: &str) -> VpnResult<()> {
        let path = self.path_for(name);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(tunnel = %name, "deleted tunnel config");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(VpnError::ConfigNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Import config text under a sanitized name.
    ///
    /// The text is validated by parsing before anything touches the disk, and
    /// an existing tunnel with the same name is never clobbered. Returns the
    /// final tunnel name.
    pub fn import_config(&self, raw: &str, suggested_name: &str) -> VpnResult<String> {
        let name = sanitize_name(suggested_name);
        TunnelConfig::parse(&name, raw)?;
        if self.path_for(&name).exists() {
            return Err(VpnError::ConfigExists(name));
        }
        self.write(&name, raw)?;
        info!(tunnel = %name, "imported tunnel config");
        Ok(name)
    }

    /// Create `demo.conf` on first run.
    ///
    /// Only runs when the directory holds no `.conf` files at all, parseable
    /// or not: a malformed config is still the user's file and is never
    /// overwritten, and a user who deleted the demo does not get it back.
    /// Returns true when the file was created.
    pub fn ensure_demo_config(&self, private_key_b64: &str) -> VpnResult<bool> {
        if self.has_any_config_file()? {
            return Ok(false);
        }
        self.write(DEMO_TUNNEL_NAME, &demo_template(private_key_b64))?;
        info!("created demo tunnel config");
        Ok(true)
    }

    /// Whether any `.conf` entry exists, without parsing it.
    fn has_any_config_file(&self) -> VpnResult<bool> {
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("conf") {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Reduce a suggested tunnel name to a safe file stem.
fn sanitize_name(suggested: &str) -> String {
    let stem = suggested.strip_suffix(".conf").unwrap_or(suggested);
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('-');
    if trimmed.is_empty() {
        "imported".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Template for the bootstrap config. The peer values are placeholders the
/// user must replace with their server's details.
fn demo_template(private_key_b64: &str) -> String {
    format!(
        "# Demo tunnel created by wgkeeper. Replace the [Peer] placeholders\n\
         # with your server's public key and endpoint before bringing it up.\n\
         [Interface]\n\
         PrivateKey = {}\n\
         Address = 10.0.0.2/32\n\
         DNS = 1.1.1.1\n\
         \n\
         [Peer]\n\
         PublicKey = SERVER_PUBLIC_KEY_HERE\n\
         AllowedIPs = 0.0.0.0/0\n\
         Endpoint = vpn.example.org:51820\n\
         PersistentKeepalive = 25\n",
        private_key_b64
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_extension_and_path_chars() {
        assert_eq!(sanitize_name("office.conf"), "office");
        assert_eq!(sanitize_name("../evil"), "evil");
        assert_eq!(sanitize_name("my tunnel!"), "my-tunnel");
        assert_eq!(sanitize_name(".."), "imported");
    }

    #[test]
    fn demo_template_round_trips() {
        let text = demo_template("PRIVATE_KEY_B64=");
        let config = TunnelConfig::parse(DEMO_TUNNEL_NAME, &text).unwrap();
        assert_eq!(config.private_key, "PRIVATE_KEY_B64=");
        assert_eq!(config.peer_public_key, "SERVER_PUBLIC_KEY_HERE");
        assert_eq!(config.endpoint.unwrap().port, 51820);
        assert_eq!(config.persistent_keepalive, Some(25));
    }
}
