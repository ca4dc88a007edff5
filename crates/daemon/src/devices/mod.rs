//! Device management module.
//!
//! This module provides the durable store of known devices, their
//! authorization policy and their key material, plus the transient views
//! built from it.

mod atomic;
pub mod device;
pub mod error;
pub mod events;
pub mod key;
mod record;
pub mod store;

pub use device::Device;
pub use error::StoreError;
pub use events::{StoreEvent, SubscriptionId};
pub use key::{Key, KeyDecodeError, KEY_BYTES};
pub use store::{validate_uid, Store, DEVICES_DIR, KEYS_DIR};
