//! Persistent device and key storage.
//!
//! The store owns a root directory with two collections, one file per
//! device in each:
//!
//! ```text
//! <root>/devices/<uid>   device record (TOML)
//! <root>/keys/<uid>      key record (hex, mode 0600)
//! ```
//!
//! Records are replaced atomically, so readers in this or any other process
//! see either the old or the new record. Inside the process, mutations are
//! serialized by a store-wide lock. Successful mutations notify observers
//! synchronously before returning.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bolt_protocol::{KeyState, Policy};
use tracing::{debug, error, info, warn};

use super::atomic::{ensure_dir, replace_contents};
use super::device::Device;
use super::error::StoreError;
use super::events::{Observers, StoreEvent, SubscriptionId};
use super::key::Key;
use super::record::DeviceRecord;

/// Name of the device collection below the root.
pub const DEVICES_DIR: &str = "devices";

/// Name of the key collection below the root.
pub const KEYS_DIR: &str = "keys";

const DEVICE_FILE_MODE: u32 = 0o644;
const KEY_FILE_MODE: u32 = 0o600;

/// Durable store of device records and key records.
pub struct Store {
    root: PathBuf,
    devices: PathBuf,
    keys: PathBuf,
    write_lock: Mutex<()>,
    observers: Observers,
}

impl Store {
    /// Opens a store rooted at `root`.
    ///
    /// Neither the root nor its collections need to exist yet; they are
    /// created on the first write. Fails only if `root` exists and is not
    /// a directory, or cannot be inspected.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();

        match fs::metadata(&root) {
            Ok(meta) if !meta.is_dir() => {
                return Err(StoreError::io(
                    &root,
                    io::Error::new(
                        io::ErrorKind::NotADirectory,
                        "store root is not a directory",
                    ),
                ));
            }
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("Store root {:?} does not exist yet", root);
            }
            Err(err) => return Err(StoreError::io(&root, err)),
        }

        Ok(Self {
            devices: root.join(DEVICES_DIR),
            keys: root.join(KEYS_DIR),
            root,
            write_lock: Mutex::new(()),
            observers: Observers::default(),
        })
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory holding device records.
    pub fn devices_dir(&self) -> &Path {
        &self.devices
    }

    /// The directory holding key records.
    pub fn keys_dir(&self) -> &Path {
        &self.keys
    }

    /// Registers an observer for [`StoreEvent`]s.
    ///
    /// The observer runs on the thread performing the mutation, after the
    /// change is on disk and before the mutating call returns.
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.observers.subscribe(observer)
    }

    /// Removes an observer. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Lists the uids of all stored devices, sorted ascending.
    ///
    /// Dot-prefixed entries are skipped. A device directory that does not
    /// exist yet is an empty store, not an error.
    pub fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.devices) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io(&self.devices, err)),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.devices, e))?;
            let Ok(name) = entry.file_name().into_string() else {
                warn!("Skipping non UTF-8 entry {:?} in {:?}", entry.path(), self.devices);
                continue;
            };

            if name.starts_with('.') {
                continue;
            }

            ids.push(name);
        }

        ids.sort();
        Ok(ids)
    }

    /// Writes the record for `device` with the given policy.
    ///
    /// If `key` is supplied it is written first, and a failure to do so is
    /// only logged: device identity persistence does not depend on key
    /// persistence. The device record itself is replaced atomically and any
    /// failure there is returned.
    ///
    /// On success, observers receive [`StoreEvent::DeviceAdded`] and the
    /// returned snapshot carries `stored = true`, the policy and the key
    /// state (`Present` if the key was just written, otherwise whatever is
    /// on disk).
    pub fn put_device(
        &self,
        device: &Device,
        policy: Policy,
        key: Option<&Key>,
    ) -> Result<Device, StoreError> {
        let uid = device.uid.as_str();
        validate_uid(uid)?;

        if device.name.is_empty() {
            return Err(StoreError::InvalidArgument(format!(
                "device '{}' has no name",
                uid
            )));
        }
        if device.vendor.is_empty() {
            return Err(StoreError::InvalidArgument(format!(
                "device '{}' has no vendor",
                uid
            )));
        }

        let data = DeviceRecord::new(&device.name, &device.vendor, policy)
            .to_toml()
            .map_err(|e| StoreError::InvalidArgument(format!("cannot encode record: {e}")))?;

        let entry = self.devices.join(uid);

        let key_written = {
            let _guard = self.lock();

            ensure_dir(&self.devices).map_err(|e| StoreError::io(&self.devices, e))?;

            let key_written = match key {
                Some(key) => match self.write_key(uid, key) {
                    Ok(()) => true,
                    Err(err) => {
                        warn!("[{}] failed to store key: {}", uid, err);
                        false
                    }
                },
                None => false,
            };

            replace_contents(&entry, data.as_bytes(), DEVICE_FILE_MODE)
                .map_err(|e| StoreError::io(&entry, e))?;

            key_written
        };

        let key_state = if key_written {
            KeyState::Present
        } else {
            self.have_key(uid)
        };

        info!(
            "Stored device {} ({} / {}) with policy {}",
            uid, device.vendor, device.name, policy
        );

        self.observers
            .emit(&StoreEvent::DeviceAdded(uid.to_string()));

        Ok(Device {
            uid: uid.to_string(),
            name: device.name.clone(),
            vendor: device.vendor.clone(),
            policy,
            key: key_state,
            stored: true,
        })
    }

    /// Loads the stored device `uid`.
    ///
    /// The key state is always recomputed from the key collection. A policy
    /// value that cannot be parsed is replaced with `Policy::Manual` and a
    /// warning is logged.
    pub fn get_device(&self, uid: &str) -> Result<Device, StoreError> {
        validate_uid(uid)?;

        let path = self.devices.join(uid);
        let bytes = fs::read(&path).map_err(|e| StoreError::from_io(uid, &path, e))?;
        let data = String::from_utf8(bytes)
            .map_err(|_| StoreError::parse(&path, "record is not valid UTF-8"))?;

        let record =
            DeviceRecord::from_toml(&data).map_err(|e| StoreError::parse(&path, e.message()))?;

        let policy = match record.policy() {
            Ok(policy) => policy,
            Err(err) => {
                warn!("[{}] invalid policy in store: {}", uid, err.0);
                Policy::Manual
            }
        };

        let (Some(name), Some(vendor)) = (record.device.name, record.device.vendor) else {
            error!("[{}] device record lacks name or vendor", uid);
            return Err(StoreError::parse(&path, "record lacks name or vendor"));
        };

        Ok(Device {
            uid: uid.to_string(),
            name,
            vendor,
            policy,
            key: self.have_key(uid),
            stored: true,
        })
    }

    /// Removes the device record for `uid`.
    ///
    /// The key record is left untouched. On success observers receive
    /// [`StoreEvent::DeviceRemoved`].
    pub fn delete_device(&self, uid: &str) -> Result<(), StoreError> {
        validate_uid(uid)?;

        let path = self.devices.join(uid);
        {
            let _guard = self.lock();
            fs::remove_file(&path).map_err(|e| StoreError::from_io(uid, &path, e))?;
        }

        info!("Removed device {} from store", uid);
        self.observers
            .emit(&StoreEvent::DeviceRemoved(uid.to_string()));
        Ok(())
    }

    /// Reports whether a key record exists for `uid`.
    ///
    /// Existence alone counts as present; the contents are not checked.
    /// Errors other than "not found" are logged and reported as missing.
    pub fn have_key(&self, uid: &str) -> KeyState {
        if let Err(err) = validate_uid(uid) {
            warn!("Refusing key lookup: {}", err);
            return KeyState::Missing;
        }

        let path = self.keys.join(uid);
        match fs::metadata(&path) {
            Ok(_) => KeyState::Present,
            Err(err) if err.kind() == io::ErrorKind::NotFound => KeyState::Missing,
            Err(err) => {
                warn!("error querying key info for {}: {}", uid, err);
                KeyState::Missing
            }
        }
    }

    /// Loads the key for `uid`.
    pub fn get_key(&self, uid: &str) -> Result<Key, StoreError> {
        validate_uid(uid)?;

        let path = self.keys.join(uid);
        let data = fs::read_to_string(&path).map_err(|e| StoreError::from_io(uid, &path, e))?;
        Key::decode(&data).map_err(|e| StoreError::parse(&path, e.to_string()))
    }

    /// Removes the key record for `uid`.
    pub fn delete_key(&self, uid: &str) -> Result<(), StoreError> {
        validate_uid(uid)?;

        let path = self.keys.join(uid);
        let _guard = self.lock();
        fs::remove_file(&path).map_err(|e| StoreError::from_io(uid, &path, e))?;

        info!("Removed key of device {}", uid);
        Ok(())
    }

    fn write_key(&self, uid: &str, key: &Key) -> Result<(), StoreError> {
        ensure_dir(&self.keys).map_err(|e| StoreError::io(&self.keys, e))?;

        let path = self.keys.join(uid);
        replace_contents(&path, key.encode().as_bytes(), KEY_FILE_MODE)
            .map_err(|e| StoreError::io(&path, e))
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Checks that `uid` is usable as a record file name.
pub fn validate_uid(uid: &str) -> Result<(), StoreError> {
    if uid.is_empty() {
        return Err(StoreError::InvalidArgument("empty uid".to_string()));
    }
    if uid.starts_with('.') || uid.contains('/') || uid.contains('\0') {
        return Err(StoreError::InvalidArgument(format!(
            "invalid uid '{}'",
            uid.escape_default()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use tracing_subscriber::fmt::MakeWriter;

    fn create_test_store(temp_dir: &TempDir) -> Store {
        Store::open(temp_dir.path().join("store")).unwrap()
    }

    fn dock() -> Device {
        Device::new("0001", "Dock", "Acme")
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, logs.contents())
    }

    #[test]
    fn test_open_does_not_create_directories() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);

        assert!(!store.root().exists());
        assert_eq!(store.devices_dir(), store.root().join("devices"));
        assert_eq!(store.keys_dir(), store.root().join("keys"));
    }

    #[test]
    fn test_open_rejects_file_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("not-a-dir");
        fs::write(&root, b"x").unwrap();

        let err = Store::open(&root).err().unwrap();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn test_list_ids_empty_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);
        assert!(store.list_ids().unwrap().is_empty());
    }

    #[test]
    fn test_list_ids_sorted_and_skips_hidden() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);

        for uid in ["c", "a", "b"] {
            store
                .put_device(&Device::new(uid, "Dev", "Vendor"), Policy::Auto, None)
                .unwrap();
        }
        fs::write(store.devices_dir().join(".hidden"), b"junk").unwrap();
        fs::write(store.devices_dir().join(".a.tmp"), b"junk").unwrap();

        assert_eq!(store.list_ids().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_put_get_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);

        for policy in Policy::ALL {
            let written = store.put_device(&dock(), policy, None).unwrap();
            let loaded = store.get_device("0001").unwrap();

            assert_eq!(loaded, written);
            assert_eq!(loaded.name, "Dock");
            assert_eq!(loaded.vendor, "Acme");
            assert_eq!(loaded.policy, policy);
            assert!(loaded.stored);
        }
    }

    #[test]
    fn test_put_returns_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);
        let device = dock();

        let stored = store
            .put_device(&device, Policy::Manual, Some(&Key::generate()))
            .unwrap();

        assert!(!device.stored);
        assert_eq!(device.key, KeyState::Missing);
        assert!(stored.stored);
        assert_eq!(stored.policy, Policy::Manual);
        assert_eq!(stored.key, KeyState::Present);
    }

    #[test]
    fn test_put_default_policy_omits_user_section() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);

        store.put_device(&dock(), Policy::Default, None).unwrap();
        let data = fs::read_to_string(store.devices_dir().join("0001")).unwrap();

        assert!(data.contains("name = \"Dock\""));
        assert!(!data.contains("policy"));
    }

    #[test]
    fn test_put_updates_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);

        store.put_device(&dock(), Policy::Manual, None).unwrap();
        let renamed = Device::new("0001", "Dock 2", "Acme Corp");
        store.put_device(&renamed, Policy::Auto, None).unwrap();

        let loaded = store.get_device("0001").unwrap();
        assert_eq!(loaded.name, "Dock 2");
        assert_eq!(loaded.vendor, "Acme Corp");
        assert_eq!(loaded.policy, Policy::Auto);
        assert_eq!(store.list_ids().unwrap(), vec!["0001"]);
    }

    #[test]
    fn test_put_rejects_empty_fields() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);

        let err = store
            .put_device(&Device::new("0001", "", "Acme"), Policy::Auto, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));

        let err = store
            .put_device(&Device::new("0001", "Dock", ""), Policy::Auto, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[test]
    fn test_put_rejects_bad_uids() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);

        for uid in ["", ".hidden", "../escape", "a/b"] {
            let err = store
                .put_device(&Device::new(uid, "Dock", "Acme"), Policy::Auto, None)
                .unwrap_err();
            assert!(matches!(err, StoreError::InvalidArgument(_)), "uid {uid:?}");
        }
        assert!(!temp_dir.path().join("escape").exists());
    }

    #[test]
    fn test_put_survives_key_write_failure() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);

        // A plain file where the key directory should be.
        fs::create_dir_all(store.root()).unwrap();
        fs::write(store.keys_dir(), b"in the way").unwrap();

        let (result, logs) = with_captured_logs(|| {
            store.put_device(&dock(), Policy::Manual, Some(&Key::generate()))
        });

        let stored = result.unwrap();
        assert_eq!(stored.key, KeyState::Missing);
        assert!(logs.contains("failed to store key"));
        assert_eq!(store.get_device("0001").unwrap().policy, Policy::Manual);
    }

    #[test]
    fn test_put_fails_when_device_write_fails() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);

        fs::create_dir_all(store.root()).unwrap();
        fs::write(store.devices_dir(), b"in the way").unwrap();

        let err = store.put_device(&dock(), Policy::Manual, None).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn test_put_without_key_reports_existing_key() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);

        store
            .put_device(&dock(), Policy::Manual, Some(&Key::generate()))
            .unwrap();
        let updated = store.put_device(&dock(), Policy::Auto, None).unwrap();

        assert_eq!(updated.key, KeyState::Present);
    }

    #[test]
    fn test_get_unknown_device() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);

        let err = store.get_device("nope").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_get_invalid_policy_falls_back_to_manual() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);

        fs::create_dir_all(store.devices_dir()).unwrap();
        fs::write(
            store.devices_dir().join("0001"),
            "[device]\nname = \"Dock\"\nvendor = \"Acme\"\n\n[user]\npolicy = \"bogus\"\n",
        )
        .unwrap();

        let (result, logs) = with_captured_logs(|| store.get_device("0001"));
        let device = result.unwrap();

        assert_eq!(device.policy, Policy::Manual);
        assert_eq!(device.name, "Dock");
        assert!(logs.contains("invalid policy in store"));
        assert!(logs.contains("bogus"));
    }

    #[test]
    fn test_get_mistyped_policy_falls_back_to_manual() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);
        fs::create_dir_all(store.devices_dir()).unwrap();

        let records = [
            ("0001", "[device]\nname = \"Dock\"\nvendor = \"Acme\"\n\n[user]\npolicy = 3\n"),
            ("0002", "[device]\nname = \"Dock\"\nvendor = \"Acme\"\n\n[user]\npolicy = true\n"),
            ("0003", "user = \"x\"\n\n[device]\nname = \"Dock\"\nvendor = \"Acme\"\n"),
        ];
        for (uid, data) in records {
            fs::write(store.devices_dir().join(uid), data).unwrap();
        }

        for (uid, _) in records {
            let (result, logs) = with_captured_logs(|| store.get_device(uid));
            let device = result.unwrap();
            assert_eq!(device.policy, Policy::Manual);
            assert_eq!(device.vendor, "Acme");
            assert!(logs.contains("invalid policy in store"));
        }
    }

    #[test]
    fn test_get_corrupt_record() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);

        fs::create_dir_all(store.devices_dir()).unwrap();
        fs::write(store.devices_dir().join("0001"), "[device\nname =").unwrap();

        let err = store.get_device("0001").unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[test]
    fn test_get_record_without_vendor() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);

        fs::create_dir_all(store.devices_dir()).unwrap();
        fs::write(store.devices_dir().join("0001"), "[device]\nname = \"Dock\"\n").unwrap();

        let err = store.get_device("0001").unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[test]
    fn test_get_recomputes_key_state() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);

        store.put_device(&dock(), Policy::Manual, None).unwrap();
        assert_eq!(store.get_device("0001").unwrap().key, KeyState::Missing);

        fs::create_dir_all(store.keys_dir()).unwrap();
        fs::write(store.keys_dir().join("0001"), "aabb\n").unwrap();
        assert_eq!(store.get_device("0001").unwrap().key, KeyState::Present);
    }

    #[test]
    fn test_delete_device_keeps_key() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);

        store
            .put_device(&dock(), Policy::Manual, Some(&Key::generate()))
            .unwrap();
        store.delete_device("0001").unwrap();

        assert!(store.get_device("0001").unwrap_err().is_not_found());
        assert_eq!(store.have_key("0001"), KeyState::Present);
    }

    #[test]
    fn test_delete_unknown_device() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);

        assert!(store.delete_device("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_key_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);
        let key = Key::from_bytes(vec![0xAA, 0xBB]);

        assert_eq!(store.have_key("0001"), KeyState::Missing);
        store.put_device(&dock(), Policy::Manual, Some(&key)).unwrap();
        assert_eq!(store.have_key("0001"), KeyState::Present);
        assert_eq!(store.get_key("0001").unwrap(), key);

        store.delete_key("0001").unwrap();
        assert_eq!(store.have_key("0001"), KeyState::Missing);
        assert!(store.get_key("0001").unwrap_err().is_not_found());
        assert!(store.delete_key("0001").unwrap_err().is_not_found());
    }

    #[test]
    fn test_key_file_is_private() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);

        store
            .put_device(&dock(), Policy::Manual, Some(&Key::generate()))
            .unwrap();
        let mode = fs::metadata(store.keys_dir().join("0001"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[test]
    fn test_empty_key_file_counts_as_present() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);

        fs::create_dir_all(store.keys_dir()).unwrap();
        fs::write(store.keys_dir().join("0001"), b"").unwrap();

        assert_eq!(store.have_key("0001"), KeyState::Present);
        assert!(matches!(
            store.get_key("0001").unwrap_err(),
            StoreError::Parse { .. }
        ));
    }

    #[test]
    fn test_events_for_put_and_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let id = store.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        store.put_device(&dock(), Policy::Auto, None).unwrap();
        store.delete_device("0001").unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                StoreEvent::DeviceAdded("0001".to_string()),
                StoreEvent::DeviceRemoved("0001".to_string()),
            ]
        );

        assert!(store.unsubscribe(id));
        store.put_device(&dock(), Policy::Auto, None).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_no_event_on_failure() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);
        let seen = Arc::new(Mutex::new(0usize));

        let sink = Arc::clone(&seen);
        store.subscribe(move |_| *sink.lock().unwrap() += 1);

        assert!(store.delete_device("0001").is_err());
        assert!(store
            .put_device(&Device::new("0001", "", "Acme"), Policy::Auto, None)
            .is_err());
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[test]
    fn test_observer_sees_written_record() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(create_test_store(&temp_dir));
        let loaded = Arc::new(Mutex::new(None));

        let reader = Arc::clone(&store);
        let sink = Arc::clone(&loaded);
        store.subscribe(move |event| {
            if let StoreEvent::DeviceAdded(uid) = event {
                *sink.lock().unwrap() = reader.get_device(uid).ok();
            }
        });

        store.put_device(&dock(), Policy::Auto, None).unwrap();
        let device = loaded.lock().unwrap().clone().unwrap();
        assert_eq!(device.policy, Policy::Auto);
    }

    #[test]
    fn test_validate_uid() {
        assert!(validate_uid("d2c5c4a1-0001").is_ok());
        assert!(validate_uid("").is_err());
        assert!(validate_uid(".").is_err());
        assert!(validate_uid("..").is_err());
        assert!(validate_uid("a/b").is_err());
        assert!(validate_uid("a\0b").is_err());
    }
}
