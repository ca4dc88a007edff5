//! Device-facing value types shared by the daemon and its clients.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authorization policy of a stored device.
///
/// Governs whether future connections of the device are authorized
/// automatically. `Default` is the "no explicit choice" value: it is never
/// written to a device record, and a record without a policy reads back as
/// `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// No explicit policy; the daemon-wide default applies.
    #[default]
    Default,
    /// Every connection needs an explicit `Authorize` call.
    Manual,
    /// The device is authorized automatically when it connects.
    Auto,
    /// Automatic authorization scoped to connected devices.
    #[serde(rename = "auto-connected")]
    AutoConnected,
}

impl Policy {
    /// All policies, in declaration order.
    pub const ALL: [Policy; 4] = [
        Policy::Default,
        Policy::Manual,
        Policy::Auto,
        Policy::AutoConnected,
    ];

    /// The symbolic name used on disk and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::Default => "default",
            Policy::Manual => "manual",
            Policy::Auto => "auto",
            Policy::AutoConnected => "auto-connected",
        }
    }

    /// Whether this policy carries an explicit user choice worth persisting.
    pub fn is_explicit(&self) -> bool {
        !matches!(self, Policy::Default)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a policy name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown policy: {0:?}")]
pub struct ParsePolicyError(pub String);

impl FromStr for Policy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Policy::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ParsePolicyError(s.to_string()))
    }
}

/// Whether key material is on record for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeyState {
    /// No key record exists.
    #[default]
    Missing,
    /// A key record exists.
    Present,
}

impl KeyState {
    /// Returns `true` if a key is on record.
    pub fn is_present(&self) -> bool {
        matches!(self, KeyState::Present)
    }
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyState::Missing => f.write_str("missing"),
            KeyState::Present => f.write_str("present"),
        }
    }
}

/// Summary of a known device as returned to RPC callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Unique, stable device identifier.
    pub uid: String,
    /// Object path the device is exported under.
    pub object_path: String,
    /// Device name.
    pub name: String,
    /// Vendor name.
    pub vendor: String,
    /// Stored authorization policy.
    pub policy: Policy,
    /// Key state, recomputed from the store on every read.
    pub key: KeyState,
    /// Whether the device has a record in the store.
    pub stored: bool,
}
