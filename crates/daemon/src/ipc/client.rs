//! IPC Client for communicating with the daemon via Unix Domain Sockets.
//!
//! The client connects to the daemon's Unix socket and sends requests,
//! receiving responses in a request-response pattern.

use std::io;
use std::path::Path;
use std::time::Duration;

use bolt_protocol::{Policy, Request, Response};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use super::server::IpcError;

/// Default timeout for client operations in seconds.
///
/// Privileged calls may wait on an authentication prompt.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// A client for communicating with the daemon via IPC.
pub struct IpcClient {
    reader: BufReader<tokio::io::ReadHalf<UnixStream>>,
    writer: tokio::io::WriteHalf<UnixStream>,
    timeout: Duration,
}

impl IpcClient {
    /// Connect to the daemon at the specified socket path.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    /// This typically indicates that the daemon is not running.
    pub async fn connect(path: &Path) -> Result<Self, IpcError> {
        let stream = UnixStream::connect(path).await.map_err(IpcError::Io)?;
        let (read_half, write_half) = tokio::io::split(stream);

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Set the timeout for operations.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Send a request to the daemon and wait for a response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent, the response cannot
    /// be read or parsed, or the operation times out. A method that failed
    /// on the daemon side is reported as [`Response::Error`], not as an
    /// `Err`.
    pub async fn call(&mut self, request: Request) -> Result<Response, IpcError> {
        tokio::time::timeout(self.timeout, self.call_internal(request))
            .await
            .map_err(|_| {
                IpcError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "operation timed out",
                ))
            })?
    }

    async fn call_internal(&mut self, request: Request) -> Result<Response, IpcError> {
        let mut json = serde_json::to_string(&request).map_err(IpcError::Json)?;
        json.push('\n');

        self.writer
            .write_all(json.as_bytes())
            .await
            .map_err(IpcError::Io)?;
        self.writer.flush().await.map_err(IpcError::Io)?;

        let mut line = String::new();
        let bytes_read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(IpcError::Io)?;

        if bytes_read == 0 {
            return Err(IpcError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "daemon closed connection",
            )));
        }

        let response = serde_json::from_str(line.trim()).map_err(IpcError::Json)?;
        Ok(response)
    }

    /// List all stored devices.
    pub async fn list_devices(&mut self) -> Result<Response, IpcError> {
        self.call(Request::ListDevices).await
    }

    /// Look up a stored device.
    pub async fn device_by_uid(&mut self, uid: &str) -> Result<Response, IpcError> {
        self.call(Request::DeviceByUid {
            uid: uid.to_string(),
        })
        .await
    }

    /// Enroll a connected device.
    pub async fn enroll_device(&mut self, uid: &str, policy: Policy) -> Result<Response, IpcError> {
        self.call(Request::EnrollDevice {
            uid: uid.to_string(),
            policy,
        })
        .await
    }

    /// Forget a stored device.
    pub async fn forget_device(&mut self, uid: &str) -> Result<Response, IpcError> {
        self.call(Request::ForgetDevice {
            uid: uid.to_string(),
        })
        .await
    }

    /// Authorize a connected, stored device.
    pub async fn authorize(&mut self, uid: &str) -> Result<Response, IpcError> {
        self.call(Request::Authorize {
            uid: uid.to_string(),
        })
        .await
    }
}
