//! Thunderbolt devices as exposed by the kernel under
//! `/sys/bus/thunderbolt/devices`.
//!
//! Each device directory carries a handful of text attributes. The ones used
//! here:
//!
//! - `unique_id`: stable identifier, matched against stored uids
//! - `device_name`, `vendor_name`: human-readable labels
//! - `authorized`: `0` until the device is authorized
//! - `key`: present only when the domain runs in secure mode

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::devices::Key;

/// A connected device as seen in sysfs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysDevice {
    pub uid: String,
    pub name: String,
    pub vendor: String,
    pub syspath: PathBuf,
    /// Whether the device supports key-based authorization.
    pub key_supported: bool,
}

/// How to authorize a device.
#[derive(Debug, Clone, Copy)]
pub enum Authorization<'a> {
    /// Plain authorization, no key involved.
    Plain,
    /// Hand a freshly generated key to the device.
    NewKey(&'a Key),
    /// Challenge the device with a previously stored key.
    Challenge(&'a Key),
}

/// Reader and writer for the thunderbolt device tree.
#[derive(Debug, Clone)]
pub struct Sysfs {
    devices_dir: PathBuf,
}

impl Sysfs {
    pub fn new<P: Into<PathBuf>>(devices_dir: P) -> Self {
        Self {
            devices_dir: devices_dir.into(),
        }
    }

    pub fn devices_dir(&self) -> &Path {
        &self.devices_dir
    }

    /// Finds the connected device with `uid`.
    ///
    /// Entries without a `unique_id` (domains, retimers) are skipped. A
    /// missing devices directory means nothing is connected.
    pub fn find(&self, uid: &str) -> io::Result<Option<SysDevice>> {
        let entries = match fs::read_dir(&self.devices_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        for entry in entries {
            let syspath = entry?.path();
            match read_attr(&syspath, "unique_id")? {
                Some(found) if found == uid => return Self::load(uid, syspath).map(Some),
                _ => continue,
            }
        }

        Ok(None)
    }

    fn load(uid: &str, syspath: PathBuf) -> io::Result<SysDevice> {
        let name = read_attr(&syspath, "device_name")?.unwrap_or_default();
        let vendor = read_attr(&syspath, "vendor_name")?.unwrap_or_default();
        let key_supported = syspath.join("key").exists();

        Ok(SysDevice {
            uid: uid.to_string(),
            name,
            vendor,
            syspath,
            key_supported,
        })
    }

    /// Reads the `authorized` attribute; `0` means not yet authorized.
    pub fn authorized_level(&self, device: &SysDevice) -> io::Result<u8> {
        let value = read_attr(&device.syspath, "authorized")?.unwrap_or_default();
        value.parse().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid authorized value '{}'", value),
            )
        })
    }

    /// Authorizes `device`. Already authorized devices are left alone.
    pub fn authorize(&self, device: &SysDevice, auth: Authorization<'_>) -> io::Result<()> {
        let level = self.authorized_level(device)?;
        if level > 0 {
            debug!("[{}] already authorized (level {})", device.uid, level);
            return Ok(());
        }

        let value = match auth {
            Authorization::Plain => "1",
            Authorization::NewKey(key) => {
                write_attr(&device.syspath, "key", &key.to_hex())?;
                "1"
            }
            Authorization::Challenge(key) => {
                write_attr(&device.syspath, "key", &key.to_hex())?;
                "2"
            }
        };

        write_attr(&device.syspath, "authorized", value)?;
        info!("[{}] authorized ({})", device.uid, value);
        Ok(())
    }
}

fn read_attr(dir: &Path, name: &str) -> io::Result<Option<String>> {
    match fs::read_to_string(dir.join(name)) {
        Ok(value) => Ok(Some(value.trim().to_string())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::IsADirectory => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::NotADirectory => Ok(None),
        Err(e) => Err(e),
    }
}

fn write_attr(dir: &Path, name: &str, value: &str) -> io::Result<()> {
    fs::write(dir.join(name), value)
}
