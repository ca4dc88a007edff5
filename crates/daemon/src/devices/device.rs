//! Transient device views built from store loads.

use bolt_protocol::{device_object_path, DeviceInfo, KeyState, Policy};

/// A device as seen by the store.
///
/// Values are snapshots: the store holds no reference to them, and a write
/// returns a fresh snapshot instead of updating the caller's copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Unique, stable identifier; also the record's file name.
    pub uid: String,
    /// Device name.
    pub name: String,
    /// Vendor name.
    pub vendor: String,
    /// Authorization policy.
    pub policy: Policy,
    /// Whether a key record exists.
    pub key: KeyState,
    /// Whether the device has a record in the store.
    pub stored: bool,
}

impl Device {
    /// Creates an unstored device with default policy and no key.
    pub fn new(
        uid: impl Into<String>,
        name: impl Into<String>,
        vendor: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            vendor: vendor.into(),
            policy: Policy::Default,
            key: KeyState::Missing,
            stored: false,
        }
    }

    /// The object path the device is exported under.
    pub fn object_path(&self) -> String {
        device_object_path(&self.uid)
    }

    /// Converts the view into the summary returned to RPC callers.
    pub fn to_info(&self) -> DeviceInfo {
        DeviceInfo {
            uid: self.uid.clone(),
            object_path: self.object_path(),
            name: self.name.clone(),
            vendor: self.vendor.clone(),
            policy: self.policy,
            key: self.key,
            stored: self.stored,
        }
    }
}
