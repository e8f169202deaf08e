//! wgkeeper: WireGuard tunnel lifecycle management.
//!
//! Keeps a local X25519 identity in the platform secret store, stores
//! tunnel configs as plain `.conf` files, and drives tunnels up and down
//! through the platform's own WireGuard tooling, polling until the OS
//! agrees with the requested state.

pub mod cli;
pub mod config;
pub mod controller;
pub mod driver;
pub mod error;
pub mod install;
pub mod keystore;
pub mod logging;
pub mod platform;
pub mod service;
pub mod settings;

pub use controller::{TunnelController, TunnelState, TunnelStatus};
pub use error::{VpnError, VpnResult};
pub use service::VpnService;
