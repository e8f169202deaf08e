//! Tunnel configuration data model and the WireGuard INI-subset codec.

use std::fmt;
use std::str::FromStr;

use crate::error::{VpnError, VpnResult};

/// Peer endpoint, `host:port` with the split taken on the last `:` so IPv6
/// literals survive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl FromStr for Endpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("endpoint '{}' has no port", s))?;
        if host.is_empty() {
            return Err(format!("endpoint '{}' has no host", s));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| format!("endpoint '{}' has an invalid port", s))?;
        Ok(Endpoint {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One WireGuard tunnel configuration.
///
/// The name is derived from the config file's base name and is unique within
/// the tunnel directory. List-valued fields hold the comma-separated entries
/// of their line; a missing line yields an empty list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TunnelConfig {
    pub name: String,
    pub private_key: String,
    pub addresses: Vec<String>,
    pub dns: Vec<String>,
    pub peer_public_key: String,
    pub allowed_ips: Vec<String>,
    pub endpoint: Option<Endpoint>,
    pub preshared_key: Option<String>,
    pub persistent_keepalive: Option<u16>,
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl TunnelConfig {
    /// Parse the INI-like WireGuard format.
    ///
    /// Keys are matched case-sensitively, values split on the first `=` and
    /// trimmed. Section headers and comments are skipped. A present
    /// `Endpoint` without a port is a parse error, never a silent default.
    pub fn parse(name: &str, text: &str) -> VpnResult<Self> {
        let mut config = TunnelConfig {
            name: name.to_string(),
            ..Default::default()
        };

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('[') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "PrivateKey" => config.private_key = value.to_string(),
                "Address" => config.addresses = split_list(value),
                "DNS" => config.dns = split_list(value),
                "PublicKey" => config.peer_public_key = value.to_string(),
                "AllowedIPs" => config.allowed_ips = split_list(value),
                "Endpoint" => {
                    let endpoint = value
                        .parse::<Endpoint>()
                        .map_err(|reason| VpnError::parse(name, reason))?;
                    config.endpoint = Some(endpoint);
                }
                "PresharedKey" => config.preshared_key = Some(value.to_string()),
                "PersistentKeepalive" => {
                    let secs = value.parse::<u16>().map_err(|_| {
                        VpnError::parse(
                            name,
                            format!("PersistentKeepalive '{}' is not a number of seconds", value),
                        )
                    })?;
                    config.persistent_keepalive = Some(secs);
                }
                _ => {}
            }
        }

        Ok(config)
    }

    /// Serialize back to the WireGuard file format.
    ///
    /// Lines for empty fields are omitted, so `parse(to_conf(c)) == c`.
    pub fn to_conf(&self) -> String {
        let mut out = String::from("[Interface]\n");
        if !self.private_key.is_empty() {
            out.push_str(&format!("PrivateKey = {}\n", self.private_key));
        }
        if !self.addresses.is_empty() {
            out.push_str(&format!("Address = {}\n", self.addresses.join(", ")));
        }
        if !self.dns.is_empty() {
            out.push_str(&format!("DNS = {}\n", self.dns.join(", ")));
        }

        out.push_str("\n[Peer]\n");
        if !self.peer_public_key.is_empty() {
            out.push_str(&format!("PublicKey = {}\n", self.peer_public_key));
        }
        if let Some(psk) = &self.preshared_key {
            out.push_str(&format!("PresharedKey = {}\n", psk));
        }
        if !self.allowed_ips.is_empty() {
            out.push_str(&format!("AllowedIPs = {}\n", self.allowed_ips.join(", ")));
        }
        if let Some(endpoint) = &self.endpoint {
            out.push_str(&format!("Endpoint = {}\n", endpoint));
        }
        if let Some(secs) = self.persistent_keepalive {
            out.push_str(&format!("PersistentKeepalive = {}\n", secs));
        }
        out
    }
}
