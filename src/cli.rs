//! Command-line interface for wgkeeper.
//!
//! Thin layer over [`VpnService`]: parse arguments, call the facade, print
//! the result. All policy lives below this module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{debug, warn};

use crate::error::VpnResult;
use crate::logging::{init_logging, LogOptions};
use crate::service::VpnService;
use crate::settings::Settings;

/// wgkeeper CLI application
#[derive(Parser)]
#[command(author, version, about = "Manage WireGuard tunnel lifecycles", long_about = None)]
pub struct Cli {
    /// Path to the settings file
    #[arg(short, long, value_name = "FILE")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the configured tunnels
    List,
    /// Show the status of a tunnel
    Status { name: String },
    /// Bring a tunnel up and wait for it to run
    Up { name: String },
    /// Tear a tunnel down
    Down { name: String },
    /// Import a tunnel config file
    Import { file: PathBuf },
    /// Delete a tunnel and its OS registration
    Delete { name: String },
    /// Show the local public key
    Keys,
    /// Verify WireGuard is installed, installing it if needed
    CheckInstall,
}

/// Parse arguments and run one command.
pub async fn run() -> VpnResult<()> {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::load_or_default(default_settings_path()?)?,
    };
    let _guard = init_logging(LogOptions::with_level_str(&settings.log_level));

    let service = VpnService::new(settings)?;
    // A broken secret store disables key-dependent features, nothing more.
    if let Err(e) = service.ensure_ready() {
        warn!(error = %e, "bootstrap incomplete, continuing without a keypair");
    }

    match cli.command {
        Commands::List => {
            for name in service.list_tunnels()? {
                println!("{}", name);
            }
        }
        Commands::Status { name } => {
            let status = service.query(&name).await?;
            match status.reachable {
                Some(true) => println!("{}: {} (reachable)", name, status.state),
                Some(false) => println!("{}: {} (unreachable)", name, status.state),
                None => println!("{}: {}", name, status.state),
            }
        }
        Commands::Up { name } => {
            let status = service.activate(&name).await?;
            println!("{}: {}", name, status.state);
        }
        Commands::Down { name } => {
            let status = service.deactivate(&name).await?;
            println!("{}: {}", name, status.state);
        }
        Commands::Import { file } => {
            let raw = std::fs::read_to_string(&file)?;
            let suggested = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "imported".to_string());
            let name = service.import_config(&raw, &suggested)?;
            println!("imported tunnel '{}'", name);
        }
        Commands::Delete { name } => {
            service.delete(&name).await?;
            println!("deleted tunnel '{}'", name);
        }
        Commands::Keys => match service.public_key()? {
            Some(key) => println!("{}", key),
            None => println!("no keypair yet; run any command to generate one"),
        },
        Commands::CheckInstall => {
            service.ensure_installed().await?;
            println!("WireGuard is installed");
        }
    }

    debug!("command finished");
    Ok(())
}

fn default_settings_path() -> VpnResult<PathBuf> {
    Ok(crate::platform::app_data_dir()?.join("settings.toml"))
}
