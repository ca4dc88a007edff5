//! Request and response messages exchanged between clients and the daemon.
//!
//! Every request is a method invocation on an exported object: the manager
//! object at [`MANAGER_PATH`] or a device object below [`DEVICES_PATH`].

use serde::{Deserialize, Serialize};

use crate::error::RpcError;
use crate::types::{DeviceInfo, Policy};

/// Object path of the manager object.
pub const MANAGER_PATH: &str = "/org/freedesktop/bolt";

/// Parent path of all exported device objects.
pub const DEVICES_PATH: &str = "/org/freedesktop/bolt/devices";

/// Method names, as matched by the authorization table.
pub mod method {
    /// List all known devices.
    pub const LIST_DEVICES: &str = "ListDevices";
    /// Look up a single device by uid.
    pub const DEVICE_BY_UID: &str = "DeviceByUid";
    /// Enroll a connected device into the store.
    pub const ENROLL_DEVICE: &str = "EnrollDevice";
    /// Remove a device from the store.
    pub const FORGET_DEVICE: &str = "ForgetDevice";
    /// Authorize a connected device.
    pub const AUTHORIZE: &str = "Authorize";
}

/// Returns the object path a device with the given uid is exported under.
///
/// ASCII letters and digits are kept; every other byte, `_` included, is
/// written as `_` plus two lowercase hex digits. Distinct uids therefore
/// always get distinct paths. The empty uid maps to `_`.
pub fn device_object_path(uid: &str) -> String {
    let mut element = String::with_capacity(uid.len());
    for byte in uid.bytes() {
        if byte.is_ascii_alphanumeric() {
            element.push(char::from(byte));
        } else {
            element.push_str(&format!("_{byte:02x}"));
        }
    }
    if element.is_empty() {
        element.push('_');
    }
    format!("{DEVICES_PATH}/{element}")
}

/// Requests that can be sent from a client to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Request {
    /// List all stored devices.
    ListDevices,
    /// Look up a stored device.
    DeviceByUid {
        /// The device uid.
        uid: String,
    },
    /// Enroll a connected device with the given policy.
    EnrollDevice {
        /// The device uid.
        uid: String,
        /// Policy to store for the device.
        #[serde(default)]
        policy: Policy,
    },
    /// Forget a stored device and its key.
    ForgetDevice {
        /// The device uid.
        uid: String,
    },
    /// Authorize a connected device.
    Authorize {
        /// The device uid.
        uid: String,
    },
}

impl Request {
    /// The method name this request invokes.
    pub fn method_name(&self) -> &'static str {
        match self {
            Request::ListDevices => method::LIST_DEVICES,
            Request::DeviceByUid { .. } => method::DEVICE_BY_UID,
            Request::EnrollDevice { .. } => method::ENROLL_DEVICE,
            Request::ForgetDevice { .. } => method::FORGET_DEVICE,
            Request::Authorize { .. } => method::AUTHORIZE,
        }
    }

    /// The object the method is invoked on.
    ///
    /// `Authorize` lives on the device object; everything else on the
    /// manager.
    pub fn object_path(&self) -> String {
        match self {
            Request::Authorize { uid } => device_object_path(uid),
            _ => MANAGER_PATH.to_string(),
        }
    }
}

/// Responses sent from the daemon to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Response {
    /// List of devices.
    Devices {
        /// Information about each device.
        devices: Vec<DeviceInfo>,
    },
    /// A single device.
    Device {
        /// Information about the device.
        device: DeviceInfo,
    },
    /// The method completed without a return value.
    Done,
    /// The invocation failed.
    Error {
        /// What went wrong.
        error: RpcError,
    },
}

impl From<RpcError> for Response {
    fn from(error: RpcError) -> Self {
        Response::Error { error }
    }
}

/// Signals broadcast by the manager when the set of stored devices changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ManagerSignal {
    /// A device was stored.
    DeviceAdded {
        /// Object path of the new device.
        object_path: String,
    },
    /// A device was removed from the store.
    DeviceRemoved {
        /// Object path of the removed device.
        object_path: String,
    },
}
