//! On-disk device record format.
//!
//! A record is a small TOML document with a `[device]` table holding the
//! identity strings and an optional `[user]` table holding choices the user
//! made about the device:
//!
//! ```toml
//! [device]
//! name = "Dock"
//! vendor = "Acme"
//!
//! [user]
//! policy = "manual"
//! ```
//!
//! The policy is kept as a raw TOML value so a damaged entry of any type
//! (an unknown name, a number, a `user` key that is not a table) can be
//! detected and replaced on load instead of failing the whole record.

use bolt_protocol::{ParsePolicyError, Policy};
use serde::{Deserialize, Deserializer, Serialize};
use toml::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct DeviceRecord {
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(
        default,
        deserialize_with = "lenient_user",
        skip_serializing_if = "UserSection::is_empty"
    )]
    pub user: UserSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DeviceSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct UserSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<Value>,
}

/// Accepts any value for the `user` entry. A non-table entry is kept as the
/// policy so it is reported as invalid rather than rejected by the parser.
fn lenient_user<'de, D>(deserializer: D) -> Result<UserSection, D::Error>
where
    D: Deserializer<'de>,
{
    let policy = match Value::deserialize(deserializer)? {
        Value::Table(mut table) => table.remove("policy"),
        other => Some(other),
    };
    Ok(UserSection { policy })
}

impl UserSection {
    fn is_empty(&self) -> bool {
        self.policy.is_none()
    }
}

impl DeviceRecord {
    /// Builds a record; `Policy::Default` is left out entirely.
    pub fn new(name: &str, vendor: &str, policy: Policy) -> Self {
        Self {
            device: DeviceSection {
                name: Some(name.to_string()),
                vendor: Some(vendor.to_string()),
            },
            user: UserSection {
                policy: policy
                    .is_explicit()
                    .then(|| Value::String(policy.as_str().to_string())),
            },
        }
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    pub fn from_toml(data: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(data)
    }

    /// The stored policy; an absent value is `Policy::Default`.
    pub fn policy(&self) -> Result<Policy, ParsePolicyError> {
        match &self.user.policy {
            Some(Value::String(value)) => value.parse(),
            Some(other) => Err(ParsePolicyError(other.to_string())),
            None => Ok(Policy::Default),
        }
    }
}
