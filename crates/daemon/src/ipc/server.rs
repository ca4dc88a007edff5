//! IPC Server for handling client connections via Unix Domain Sockets.
//!
//! The server listens on a Unix socket and accepts connections from local
//! clients. Each connection carries the kernel-reported credentials of its
//! peer, which identify the caller for authorization.

use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use bolt_protocol::{Request, Response};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use crate::rpc::Caller;

/// Permissions of the socket file. Access control is done per method.
const SOCKET_MODE: u32 = 0o666;

/// A server that listens for IPC connections on a Unix Domain Socket.
pub struct IpcServer {
    listener: UnixListener,
}

impl IpcServer {
    /// Bind the server to the specified socket path.
    ///
    /// This will create the socket file and any necessary parent directories.
    /// If a socket file already exists at the path, it will be removed first.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The parent directories cannot be created
    /// - The existing socket cannot be removed
    /// - The socket cannot be bound or its permissions set
    pub async fn bind(path: &Path) -> Result<Self, io::Error> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        if path.exists() {
            std::fs::remove_file(path)?;
        }

        let listener = UnixListener::bind(path)?;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(SOCKET_MODE))?;

        Ok(Self { listener })
    }

    /// Accept a new incoming connection.
    ///
    /// Fails if the peer's credentials cannot be determined.
    pub async fn accept(&self) -> Result<IpcConnection, IpcError> {
        let (stream, _addr) = self.listener.accept().await?;
        let cred = stream.peer_cred()?;
        let caller = Caller::from_ucred(&cred).ok_or(IpcError::UnknownPeer)?;
        Ok(IpcConnection::new(stream, caller))
    }
}

/// A connection to an IPC client.
///
/// This struct wraps a Unix stream and provides methods for reading
/// requests and sending responses using JSON newline-delimited protocol.
pub struct IpcConnection {
    reader: BufReader<tokio::io::ReadHalf<UnixStream>>,
    writer: tokio::io::WriteHalf<UnixStream>,
    caller: Caller,
}

impl IpcConnection {
    fn new(stream: UnixStream, caller: Caller) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            caller,
        }
    }

    /// The peer on the other end of the connection.
    pub fn caller(&self) -> &Caller {
        &self.caller
    }

    /// Read the next request from the client.
    ///
    /// Returns `None` if the client has disconnected.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be read or parsed.
    pub async fn read_request(&mut self) -> Result<Option<Request>, IpcError> {
        let mut line = String::new();
        let bytes_read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(IpcError::Io)?;

        if bytes_read == 0 {
            return Ok(None);
        }

        let request = serde_json::from_str(line.trim()).map_err(IpcError::Json)?;
        Ok(Some(request))
    }

    /// Send a response to the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the response cannot be serialized or sent.
    pub async fn send_response(&mut self, response: &Response) -> Result<(), IpcError> {
        let mut json = serde_json::to_string(response).map_err(IpcError::Json)?;
        json.push('\n');

        self.writer
            .write_all(json.as_bytes())
            .await
            .map_err(IpcError::Io)?;
        self.writer.flush().await.map_err(IpcError::Io)?;

        Ok(())
    }
}

/// Errors that can occur during IPC communication.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A JSON serialization/deserialization error occurred.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The kernel did not report who is connecting.
    #[error("peer credentials unavailable")]
    UnknownPeer,
}
