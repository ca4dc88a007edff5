//! Exported objects and the invocations made on them.

use std::fmt;
use std::sync::Arc;

use bolt_protocol::RpcError;
use tokio::net::unix::UCred;
use tokio_util::sync::CancellationToken;

use crate::auth::{Gatekeeper, PolicyAuthority, Subject};

/// Identity of whoever sent a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// A local process, identified by socket credentials.
    Process { pid: i32, uid: u32 },
    /// A peer on the system message bus.
    BusName(String),
}

impl Caller {
    /// Builds a caller from peer credentials. Returns `None` when the
    /// kernel did not report a pid.
    pub fn from_ucred(cred: &UCred) -> Option<Self> {
        cred.pid().map(|pid| Caller::Process {
            pid,
            uid: cred.uid(),
        })
    }

    pub(crate) fn to_subject(&self) -> Subject {
        match self {
            Caller::Process { pid, uid } => Subject::unix_process(*pid, *uid),
            Caller::BusName(name) => Subject::SystemBusName(name.clone()),
        }
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Caller::Process { pid, uid } => write!(f, "pid {} (uid {})", pid, uid),
            Caller::BusName(name) => write!(f, "{}", name),
        }
    }
}

/// A single pending method call.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub object_path: String,
    pub method: String,
    pub caller: Caller,
    /// Fires when the caller is gone or the daemon shuts down.
    pub cancel: CancellationToken,
}

impl Invocation {
    pub fn new(
        object_path: impl Into<String>,
        method: impl Into<String>,
        caller: Caller,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            object_path: object_path.into(),
            method: method.into(),
            caller,
            cancel,
        }
    }
}

/// Server-side half of an exported object.
///
/// A skeleton without a gatekeeper lets every call through; once
/// [`Gatekeeper::add_client`] has run, every method call is checked first.
pub struct Skeleton<A> {
    object_path: String,
    gatekeeper: Option<Arc<Gatekeeper<A>>>,
}

impl<A> Clone for Skeleton<A> {
    fn clone(&self) -> Self {
        Self {
            object_path: self.object_path.clone(),
            gatekeeper: self.gatekeeper.clone(),
        }
    }
}

impl<A: PolicyAuthority> Skeleton<A> {
    pub fn new(object_path: impl Into<String>) -> Self {
        Self {
            object_path: object_path.into(),
            gatekeeper: None,
        }
    }

    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    pub fn is_guarded(&self) -> bool {
        self.gatekeeper.is_some()
    }

    pub(crate) fn set_gatekeeper(&mut self, gatekeeper: Arc<Gatekeeper<A>>) {
        self.gatekeeper = Some(gatekeeper);
    }

    /// Runs the authorization hook for `invocation`.
    pub async fn authorize_method(&self, invocation: &Invocation) -> Result<(), RpcError> {
        match &self.gatekeeper {
            Some(gatekeeper) => gatekeeper
                .authorize_method(invocation)
                .await
                .map_err(RpcError::from),
            None => Ok(()),
        }
    }
}
