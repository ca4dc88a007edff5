//! # Bolt Daemon Library
//!
//! This crate provides the system daemon that decides which Thunderbolt
//! devices may connect to the host.
//!
//! ## Overview
//!
//! - **Device Store**: durable records of known devices, their policy and
//!   key material
//! - **Gatekeeper**: per-method authorization of privileged calls through
//!   the system policy authority
//! - **Manager**: the exported objects and the operations on them
//! - **IPC**: newline-delimited JSON over a Unix socket
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                        Daemon                         │
//! ├───────────────────────────────────────────────────────┤
//! │  ┌─────────────┐    ┌──────────────────────────────┐  │
//! │  │ IPC Server  │ -> │ Manager (manager + devices)  │  │
//! │  └─────────────┘    └──────────────────────────────┘  │
//! │                        │          │          │        │
//! │              ┌─────────┴──┐  ┌────┴────┐  ┌──┴─────┐  │
//! │              │ Gatekeeper │  │  Store  │  │ Sysfs  │  │
//! │              └────────────┘  └─────────┘  └────────┘  │
//! │                    │                                  │
//! │              ┌─────┴──────┐                           │
//! │              │  pkcheck   │                           │
//! │              └────────────┘                           │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`devices`]: Device and key store
//! - [`auth`]: Policy authority client and gatekeeper
//! - [`rpc`]: Exported objects and invocations
//! - [`sysfs`]: Kernel device tree access
//! - [`manager`]: Request handling
//! - [`ipc`]: Socket transport
//! - [`service`]: Daemon wiring

pub mod auth;
pub mod config;
pub mod devices;
pub mod ipc;
pub mod manager;
pub mod rpc;
pub mod service;
pub mod sysfs;

// Re-export protocol for convenience
pub use bolt_protocol;

pub use auth::{Gatekeeper, GatekeeperError, PkcheckAuthority, PolicyAuthority};
pub use config::Config;
pub use devices::{Device, Key, Store, StoreError, StoreEvent};
pub use manager::Manager;
pub use rpc::{Caller, Invocation, Skeleton};
pub use service::Daemon;
