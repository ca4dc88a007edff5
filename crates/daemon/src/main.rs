//! Bolt Daemon
//!
//! System service authorizing Thunderbolt devices, plus a small client for
//! talking to it.

use std::path::PathBuf;

use bolt_protocol::{DeviceInfo, Policy, Request, Response};
use boltd::config::Config;
use boltd::ipc::IpcClient;
use boltd::Daemon;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Bolt Daemon - Thunderbolt device authorization.
#[derive(Parser, Debug)]
#[command(name = "boltd")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the daemon
    Start,

    /// List stored devices
    List,

    /// Show a stored device
    Info {
        /// Device uid
        uid: String,
    },

    /// Enroll a connected device
    Enroll {
        /// Device uid
        uid: String,

        /// Policy to store (default, manual, auto, auto-connected)
        #[arg(long, short, default_value = "default")]
        policy: Policy,
    },

    /// Forget a stored device and its key
    Forget {
        /// Device uid
        uid: String,
    },

    /// Authorize a connected, stored device
    Authorize {
        /// Device uid
        uid: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    config.apply_env_overrides();

    init_tracing(&cli, &config);
    config.validate()?;

    match cli.command.into_request() {
        None => run_daemon(config).await,
        Some(request) => run_client(&config, request).await,
    }
}

impl Commands {
    /// The request a client command sends; `None` for `start`.
    fn into_request(self) -> Option<Request> {
        match self {
            Commands::Start => None,
            Commands::List => Some(Request::ListDevices),
            Commands::Info { uid } => Some(Request::DeviceByUid { uid }),
            Commands::Enroll { uid, policy } => Some(Request::EnrollDevice { uid, policy }),
            Commands::Forget { uid } => Some(Request::ForgetDevice { uid }),
            Commands::Authorize { uid } => Some(Request::Authorize { uid }),
        }
    }
}

/// Initializes logging. `RUST_LOG` wins over `--verbose`, which wins over
/// the configured level.
fn init_tracing(cli: &Cli, config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(config.daemon.log_level.to_lowercase())
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_daemon(config: Config) -> anyhow::Result<()> {
    tracing::info!("Bolt daemon starting...");

    let daemon = Daemon::new(config)?;

    let shutdown = daemon.shutdown_token();
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(()) => tracing::info!("Received shutdown signal"),
            Err(e) => tracing::error!("Failed to listen for signals: {}", e),
        }
        shutdown.cancel();
    });

    let mut signals = daemon.manager().subscribe();
    tokio::spawn(async move {
        while let Ok(signal) = signals.recv().await {
            tracing::debug!("Manager signal: {:?}", signal);
        }
    });

    daemon.run().await
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        }
    }
    Ok(())
}

async fn run_client(config: &Config, request: Request) -> anyhow::Result<()> {
    let socket_path = &config.daemon.socket_path;
    let mut client = match IpcClient::connect(socket_path).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Daemon is not running: {}", e);
            std::process::exit(1);
        }
    };

    match client.call(request).await? {
        Response::Devices { devices } => {
            if devices.is_empty() {
                println!("No devices stored.");
            } else {
                for device in &devices {
                    print_device(device);
                }
            }
        }
        Response::Device { device } => print_device(&device),
        Response::Done => println!("Done"),
        Response::Error { error } => {
            eprintln!("Error: {}", error);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_device(device: &DeviceInfo) {
    println!("{} {}", device.vendor, device.name);
    println!("  uid:    {}", device.uid);
    println!("  policy: {}", device.policy);
    println!("  key:    {}", device.key);
    println!("  stored: {}", if device.stored { "yes" } else { "no" });
}
