//! # boltd Protocol Library
//!
//! Types shared between the boltd daemon and its clients.
//!
//! ## Overview
//!
//! - **Device types**: [`Policy`], [`KeyState`] and the [`DeviceInfo`] summary
//! - **Messages**: [`Request`] / [`Response`] method invocations on exported
//!   objects, and [`ManagerSignal`] change notifications
//! - **Errors**: the [`RpcError`] surface every failed invocation returns
//!
//! ## Example Usage
//!
//! ```rust
//! use bolt_protocol::{Policy, Request, MANAGER_PATH};
//!
//! let request = Request::EnrollDevice {
//!     uid: "d2c5c4a1-0001".to_string(),
//!     policy: Policy::Auto,
//! };
//! assert_eq!(request.method_name(), "EnrollDevice");
//! assert_eq!(request.object_path(), MANAGER_PATH);
//! ```
//!
//! ## Modules
//!
//! - [`types`]: Policy, key state and device summaries
//! - [`messages`]: Requests, responses and signals
//! - [`error`]: Error types

pub mod error;
pub mod messages;
pub mod types;

pub use error::{Result, RpcError};
pub use messages::{
    device_object_path, method, ManagerSignal, Request, Response, DEVICES_PATH, MANAGER_PATH,
};
pub use types::{DeviceInfo, KeyState, ParsePolicyError, Policy};
