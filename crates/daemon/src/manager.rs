//! The manager object and the device objects it exports.
//!
//! Requests arrive as [`Request`] values, are routed to their object,
//! authorized by that object's [`Skeleton`] and then handled one at a time.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use bolt_protocol::{
    device_object_path, DeviceInfo, ManagerSignal, Policy, Request, Response, RpcError,
    MANAGER_PATH,
};
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::{Gatekeeper, PolicyAuthority};
use crate::devices::{validate_uid, Device, Key, Store, StoreError, StoreEvent, SubscriptionId};
use crate::rpc::{Caller, Invocation, Skeleton};
use crate::sysfs::{Authorization, SysDevice, Sysfs};

/// Capacity of the signal channel.
const SIGNAL_CAPACITY: usize = 64;

type ObjectTable<A> = Arc<RwLock<HashMap<String, Skeleton<A>>>>;

/// Owns the store, the gatekeeper and the exported objects.
pub struct Manager<A: PolicyAuthority> {
    store: Arc<Store>,
    sysfs: Sysfs,
    skeleton: Skeleton<A>,
    objects: ObjectTable<A>,
    signals: broadcast::Sender<ManagerSignal>,
    dispatch_lock: Mutex<()>,
    subscription: SubscriptionId,
}

impl<A: PolicyAuthority + 'static> Manager<A> {
    /// Creates the manager and exports an object for every stored device.
    pub fn new(
        store: Arc<Store>,
        gatekeeper: Arc<Gatekeeper<A>>,
        sysfs: Sysfs,
    ) -> Result<Self, StoreError> {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);

        let mut skeleton = Skeleton::new(MANAGER_PATH);
        gatekeeper.add_client(&mut skeleton);

        let objects: ObjectTable<A> = Arc::new(RwLock::new(HashMap::new()));
        for uid in store.list_ids()? {
            export(&objects, &gatekeeper, &uid);
        }

        let subscription = {
            let objects = Arc::clone(&objects);
            let signals = signals.clone();
            store.subscribe(move |event| on_store_event(&objects, &gatekeeper, &signals, event))
        };

        info!(
            "Manager ready with {} stored device(s)",
            objects.read().unwrap_or_else(PoisonError::into_inner).len()
        );

        Ok(Self {
            store,
            sysfs,
            skeleton,
            objects,
            signals,
            dispatch_lock: Mutex::new(()),
            subscription,
        })
    }
}

impl<A: PolicyAuthority> Manager<A> {
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Subscribes to device added/removed signals.
    pub fn subscribe(&self) -> broadcast::Receiver<ManagerSignal> {
        self.signals.subscribe()
    }

    /// Object paths of all exported device objects, sorted.
    pub fn exported_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        paths.sort();
        paths
    }

    /// Authorizes and runs a single request.
    pub async fn dispatch(
        &self,
        request: Request,
        caller: Caller,
        cancel: CancellationToken,
    ) -> Response {
        let invocation = Invocation::new(
            request.object_path(),
            request.method_name(),
            caller,
            cancel,
        );

        match self.invoke(request, &invocation).await {
            Ok(response) => response,
            Err(err) => {
                debug!(
                    "{} on {} from {} failed: {}",
                    invocation.method, invocation.object_path, invocation.caller, err
                );
                Response::from(err)
            }
        }
    }

    /// Runs one invocation. The dispatch lock is held across both the
    /// authority round trip and the handler, so invocations never overlap.
    async fn invoke(&self, request: Request, invocation: &Invocation) -> Result<Response, RpcError> {
        let cancelled = || RpcError::Cancelled {
            method: invocation.method.clone(),
        };

        let _guard = tokio::select! {
            guard = self.dispatch_lock.lock() => guard,
            _ = invocation.cancel.cancelled() => return Err(cancelled()),
        };

        let Some(skeleton) = self.lookup(&invocation.object_path) else {
            let uid = match &request {
                Request::Authorize { uid } => uid.clone(),
                _ => invocation.object_path.clone(),
            };
            return Err(RpcError::NotFound { uid });
        };

        skeleton.authorize_method(invocation).await?;

        if invocation.cancel.is_cancelled() {
            return Err(cancelled());
        }

        match request {
            Request::ListDevices => Ok(Response::Devices {
                devices: self.list_devices()?,
            }),
            Request::DeviceByUid { uid } => Ok(Response::Device {
                device: self.device_by_uid(&uid)?,
            }),
            Request::EnrollDevice { uid, policy } => Ok(Response::Device {
                device: self.enroll_device(&uid, policy)?,
            }),
            Request::ForgetDevice { uid } => {
                self.forget_device(&uid)?;
                Ok(Response::Done)
            }
            Request::Authorize { uid } => {
                self.authorize_device(&uid)?;
                Ok(Response::Done)
            }
        }
    }

    fn lookup(&self, object_path: &str) -> Option<Skeleton<A>> {
        if object_path == self.skeleton.object_path() {
            return Some(self.skeleton.clone());
        }

        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(object_path)
            .cloned()
    }

    fn list_devices(&self) -> Result<Vec<DeviceInfo>, RpcError> {
        let mut devices = Vec::new();
        for uid in self.store.list_ids()? {
            match self.store.get_device(&uid) {
                Ok(device) => devices.push(device.to_info()),
                Err(err) => warn!("Skipping unreadable device {}: {}", uid, err),
            }
        }
        Ok(devices)
    }

    fn device_by_uid(&self, uid: &str) -> Result<DeviceInfo, RpcError> {
        Ok(self.store.get_device(uid)?.to_info())
    }

    fn enroll_device(&self, uid: &str, policy: Policy) -> Result<DeviceInfo, RpcError> {
        validate_uid(uid)?;
        let sys = self.connected(uid)?;

        let stored_key = if self.store.have_key(uid).is_present() {
            Some(self.store.get_key(uid)?)
        } else {
            None
        };
        let new_key = (sys.key_supported && stored_key.is_none()).then(Key::generate);

        let auth = match (&new_key, &stored_key) {
            (Some(key), _) => Authorization::NewKey(key),
            (None, Some(key)) if sys.key_supported => Authorization::Challenge(key),
            _ => Authorization::Plain,
        };
        self.sysfs.authorize(&sys, auth).map_err(sysfs_error)?;

        let device = Device::new(uid, sys.name, sys.vendor);
        let stored = self.store.put_device(&device, policy, new_key.as_ref())?;

        info!("Enrolled device {} with policy {}", uid, policy);
        Ok(stored.to_info())
    }

    fn forget_device(&self, uid: &str) -> Result<(), RpcError> {
        self.store.delete_device(uid)?;

        match self.store.delete_key(uid) {
            Ok(()) => {}
            Err(err) if err.is_not_found() => debug!("Device {} had no key", uid),
            Err(err) => warn!("[{}] failed to remove key: {}", uid, err),
        }

        info!("Forgot device {}", uid);
        Ok(())
    }

    fn authorize_device(&self, uid: &str) -> Result<(), RpcError> {
        let stored = self.store.get_device(uid)?;
        let sys = self.connected(uid)?;

        let key = if sys.key_supported && stored.key.is_present() {
            Some(self.store.get_key(uid)?)
        } else {
            None
        };

        let auth = match &key {
            Some(key) => Authorization::Challenge(key),
            None => Authorization::Plain,
        };
        self.sysfs.authorize(&sys, auth).map_err(sysfs_error)
    }

    fn connected(&self, uid: &str) -> Result<SysDevice, RpcError> {
        self.sysfs
            .find(uid)
            .map_err(sysfs_error)?
            .ok_or_else(|| RpcError::NotFound {
                uid: uid.to_string(),
            })
    }
}

impl<A: PolicyAuthority> Drop for Manager<A> {
    fn drop(&mut self) {
        self.store.unsubscribe(self.subscription);
    }
}

fn sysfs_error(err: std::io::Error) -> RpcError {
    RpcError::Io {
        message: format!("sysfs: {err}"),
    }
}

fn export<A: PolicyAuthority>(
    objects: &ObjectTable<A>,
    gatekeeper: &Arc<Gatekeeper<A>>,
    uid: &str,
) -> Option<String> {
    let path = device_object_path(uid);
    let mut objects = objects.write().unwrap_or_else(PoisonError::into_inner);
    if objects.contains_key(&path) {
        return None;
    }

    let mut skeleton = Skeleton::new(path.clone());
    gatekeeper.add_client(&mut skeleton);
    objects.insert(path.clone(), skeleton);
    debug!("Exported {}", path);
    Some(path)
}

fn on_store_event<A: PolicyAuthority>(
    objects: &ObjectTable<A>,
    gatekeeper: &Arc<Gatekeeper<A>>,
    signals: &broadcast::Sender<ManagerSignal>,
    event: &StoreEvent,
) {
    let signal = match event {
        StoreEvent::DeviceAdded(uid) => export(objects, gatekeeper, uid)
            .map(|object_path| ManagerSignal::DeviceAdded { object_path }),
        StoreEvent::DeviceRemoved(uid) => {
            let path = device_object_path(uid);
            objects
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&path)
                .map(|_| ManagerSignal::DeviceRemoved { object_path: path })
        }
    };

    if let Some(signal) = signal {
        // No receivers is fine.
        let _ = signals.send(signal);
    }
}
