//! Daemon service wiring configuration, store, gatekeeper and transport.

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use bolt_protocol::{Response, RpcError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::{Gatekeeper, PkcheckAuthority, PolicyAuthority};
use crate::config::Config;
use crate::devices::Store;
use crate::ipc::{IpcConnection, IpcError, IpcServer};
use crate::manager::Manager;
use crate::sysfs::Sysfs;

/// The running daemon.
pub struct Daemon<A: PolicyAuthority> {
    config: Config,
    manager: Arc<Manager<A>>,
    shutdown_token: CancellationToken,
}

impl Daemon<PkcheckAuthority> {
    /// Creates a daemon backed by the system policy authority.
    pub fn new(config: Config) -> Result<Self> {
        let gatekeeper = Gatekeeper::from_config(&config.auth)
            .context("Failed to initialize authorization")?;
        Self::with_gatekeeper(config, gatekeeper)
    }
}

impl<A: PolicyAuthority + 'static> Daemon<A> {
    /// Creates a daemon that authorizes calls through `gatekeeper`.
    pub fn with_gatekeeper(config: Config, gatekeeper: Gatekeeper<A>) -> Result<Self> {
        let store = Store::open(&config.daemon.store_dir).with_context(|| {
            format!(
                "Failed to open device store at {}",
                config.daemon.store_dir.display()
            )
        })?;
        info!("Device store at {}", store.root().display());

        let manager = Manager::new(
            Arc::new(store),
            Arc::new(gatekeeper),
            Sysfs::new(&config.sysfs.devices_dir),
        )
        .context("Failed to load stored devices")?;

        Ok(Self {
            config,
            manager: Arc::new(manager),
            shutdown_token: CancellationToken::new(),
        })
    }

    pub fn manager(&self) -> &Arc<Manager<A>> {
        &self.manager
    }

    /// Returns the shutdown token for external tasks to observe shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Requests shutdown. Pending authorization checks are cancelled.
    pub fn stop(&self) {
        info!("Stopping daemon...");
        self.shutdown_token.cancel();
    }

    /// Serves the control socket until [`Daemon::stop`] is called.
    pub async fn run(&self) -> Result<()> {
        let socket_path = &self.config.daemon.socket_path;
        let server = IpcServer::bind(socket_path)
            .await
            .with_context(|| format!("Failed to bind {}", socket_path.display()))?;
        info!("Listening on {}", socket_path.display());

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => break,
                accepted = server.accept() => match accepted {
                    Ok(conn) => {
                        debug!("Accepted connection from {}", conn.caller());
                        tokio::spawn(serve_connection(
                            Arc::clone(&self.manager),
                            conn,
                            self.shutdown_token.child_token(),
                        ));
                    }
                    Err(e) => warn!("Failed to accept connection: {}", e),
                },
            }
        }

        drop(server);
        match std::fs::remove_file(socket_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", socket_path.display(), e),
        }

        info!("Daemon stopped");
        Ok(())
    }
}

/// Handles requests on one connection, in order, until the peer hangs up.
async fn serve_connection<A: PolicyAuthority + 'static>(
    manager: Arc<Manager<A>>,
    mut conn: IpcConnection,
    shutdown: CancellationToken,
) {
    let caller = conn.caller().clone();

    loop {
        let request = tokio::select! {
            _ = shutdown.cancelled() => break,
            request = conn.read_request() => request,
        };

        let response = match request {
            Ok(Some(request)) => {
                manager
                    .dispatch(request, caller.clone(), shutdown.child_token())
                    .await
            }
            Ok(None) => break,
            Err(IpcError::Json(e)) => Response::from(RpcError::InvalidArgument {
                message: format!("malformed request: {e}"),
            }),
            Err(e) => {
                debug!("Connection from {} failed: {}", caller, e);
                break;
            }
        };

        if let Err(e) = conn.send_response(&response).await {
            debug!("Failed to reply to {}: {}", caller, e);
            break;
        }
    }

    debug!("Connection from {} closed", caller);
}
