//! Unix Domain Socket IPC between clients and the daemon.
//!
//! The IPC system uses a JSON newline-delimited protocol. Each message is a
//! single JSON object followed by a newline: clients send
//! [`bolt_protocol::Request`]s and receive one [`bolt_protocol::Response`]
//! per request, in order.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use boltd::ipc::IpcClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = IpcClient::connect(Path::new("/run/boltd/boltd.sock")).await?;
//!     println!("{:?}", client.list_devices().await?);
//!     Ok(())
//! }
//! ```

mod client;
mod server;

pub use client::IpcClient;
pub use server::{IpcConnection, IpcError, IpcServer};
