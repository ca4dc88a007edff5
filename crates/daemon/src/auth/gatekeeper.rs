//! Per-method authorization of incoming calls.
//!
//! Every exported object is guarded by the same [`Gatekeeper`]. Before a
//! method runs, the gatekeeper maps the method name to a [`MethodRule`]:
//! read-only methods pass straight through, mutating methods need the
//! matching action granted by the policy authority, and anything not in the
//! table is refused without asking anyone.

use std::sync::Arc;

use bolt_protocol::{method, RpcError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::authority::{AuthorityError, CheckFlags, PolicyAuthority, Subject};
use super::pkcheck::PkcheckAuthority;
use crate::config::AuthConfig;
use crate::rpc::{Caller, Invocation, Skeleton};

/// Default prefix for action identifiers.
pub const DEFAULT_ACTION_PREFIX: &str = "org.freedesktop.bolt";

/// Privileged actions known to the policy authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Store a device and its policy.
    Enroll,
    /// Authorize a connected device.
    Authorize,
    /// Change or remove stored devices.
    Manage,
}

impl Action {
    /// Suffix appended to the action prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Enroll => "enroll",
            Action::Authorize => "authorize",
            Action::Manage => "manage",
        }
    }
}

/// What a method needs before it may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodRule {
    /// Always allowed.
    Allow,
    /// Allowed if the authority grants the action.
    Require(Action),
    /// Never allowed.
    Deny,
}

/// Looks up the rule for `method`.
pub fn method_rule(method: &str) -> MethodRule {
    match method {
        method::LIST_DEVICES | method::DEVICE_BY_UID => MethodRule::Allow,
        method::ENROLL_DEVICE => MethodRule::Require(Action::Enroll),
        method::AUTHORIZE => MethodRule::Require(Action::Authorize),
        method::FORGET_DEVICE => MethodRule::Require(Action::Manage),
        _ => MethodRule::Deny,
    }
}

/// Reasons a call was refused.
#[derive(Debug, Error)]
pub enum GatekeeperError {
    /// The method is unknown or the authority said no.
    #[error("Bolt operation '{method}' not allowed for user")]
    AccessDenied { method: String },

    /// The authority could not answer.
    #[error("Authorization error: {source}")]
    Authority {
        method: String,
        #[source]
        source: AuthorityError,
    },

    /// The caller went away while the check was pending.
    #[error("authorization of '{method}' cancelled")]
    Cancelled { method: String },

    /// The authority client could not be created.
    #[error("failed to initialize authorization: {0}")]
    Init(#[source] AuthorityError),
}

impl From<GatekeeperError> for RpcError {
    fn from(err: GatekeeperError) -> Self {
        match err {
            GatekeeperError::AccessDenied { method } => RpcError::access_denied(method),
            GatekeeperError::Authority { source, .. } => RpcError::AuthorizationFailed {
                message: source.to_string(),
            },
            GatekeeperError::Cancelled { method } => RpcError::Cancelled { method },
            GatekeeperError::Init(source) => RpcError::AuthorizationFailed {
                message: source.to_string(),
            },
        }
    }
}

/// Authorizes method calls against a [`PolicyAuthority`].
pub struct Gatekeeper<A> {
    authority: A,
    action_prefix: String,
    flags: CheckFlags,
}

impl<A: PolicyAuthority> Gatekeeper<A> {
    /// Creates a gatekeeper with the default action prefix and user
    /// interaction allowed.
    pub fn new(authority: A) -> Self {
        Self {
            authority,
            action_prefix: DEFAULT_ACTION_PREFIX.to_string(),
            flags: CheckFlags {
                allow_user_interaction: true,
            },
        }
    }

    pub fn with_action_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.action_prefix = prefix.into();
        self
    }

    pub fn with_user_interaction(mut self, allow: bool) -> Self {
        self.flags.allow_user_interaction = allow;
        self
    }

    pub fn authority(&self) -> &A {
        &self.authority
    }

    /// Full action identifier, e.g. `org.freedesktop.bolt.enroll`.
    pub fn action_id(&self, action: Action) -> String {
        format!("{}.{}", self.action_prefix, action.as_str())
    }

    /// Installs this gatekeeper as the authorization hook of `skeleton`.
    pub fn add_client(self: &Arc<Self>, skeleton: &mut Skeleton<A>) {
        debug!("Guarding {}", skeleton.object_path());
        skeleton.set_gatekeeper(Arc::clone(self));
    }

    /// Decides whether `caller` may invoke `method`.
    ///
    /// Resolves to `Ok(())` only on an explicit grant or for a method that
    /// needs none. The authority is consulted at most once and only for
    /// methods that require an action.
    pub async fn authorize(
        &self,
        method: &str,
        caller: &Caller,
        cancel: &CancellationToken,
    ) -> Result<(), GatekeeperError> {
        let action = match method_rule(method) {
            MethodRule::Allow => {
                debug!("Method {} needs no authorization", method);
                return Ok(());
            }
            MethodRule::Deny => {
                warn!("Refusing unknown method {} from {}", method, caller);
                return Err(GatekeeperError::AccessDenied {
                    method: method.to_string(),
                });
            }
            MethodRule::Require(action) => action,
        };

        if cancel.is_cancelled() {
            return Err(GatekeeperError::Cancelled {
                method: method.to_string(),
            });
        }

        let action_id = self.action_id(action);
        let subject = caller.to_subject();

        let result = self
            .authority
            .check_authorization(&subject, &action_id, self.flags, cancel)
            .await;

        match result {
            Ok(verdict) if verdict.is_authorized => {
                info!("Granted {} to {}", action_id, caller);
                Ok(())
            }
            Ok(verdict) => {
                info!(
                    "Denied {} to {}{}",
                    action_id,
                    caller,
                    if verdict.is_challenge {
                        " (authentication required)"
                    } else {
                        ""
                    }
                );
                Err(GatekeeperError::AccessDenied {
                    method: method.to_string(),
                })
            }
            Err(AuthorityError::Cancelled) => {
                debug!("Authorization of {} for {} cancelled", method, caller);
                Err(GatekeeperError::Cancelled {
                    method: method.to_string(),
                })
            }
            Err(source) => {
                warn!("Authorization check for {} failed: {}", action_id, source);
                Err(GatekeeperError::Authority {
                    method: method.to_string(),
                    source,
                })
            }
        }
    }

    /// Authorizes an incoming invocation.
    pub async fn authorize_method(&self, invocation: &Invocation) -> Result<(), GatekeeperError> {
        self.authorize(&invocation.method, &invocation.caller, &invocation.cancel)
            .await
    }
}

impl Gatekeeper<PkcheckAuthority> {
    /// Connects to the system policy authority as configured.
    pub fn from_config(config: &AuthConfig) -> Result<Self, GatekeeperError> {
        let authority = PkcheckAuthority::new(&config.pkcheck).map_err(GatekeeperError::Init)?;
        info!("Using policy authority at {}", authority.program().display());

        Ok(Gatekeeper::new(authority)
            .with_action_prefix(config.action_prefix.clone())
            .with_user_interaction(config.allow_user_interaction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::authority::AuthorizationResult;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Authority that answers from a script and records every question.
    struct MockAuthority {
        answer: Result<AuthorizationResult, AuthorityError>,
        delay: Option<Duration>,
        calls: Mutex<Vec<(Subject, String, CheckFlags)>>,
    }

    impl MockAuthority {
        fn answering(answer: Result<AuthorizationResult, AuthorityError>) -> Self {
            Self {
                answer,
                delay: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(Subject, String, CheckFlags)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PolicyAuthority for MockAuthority {
        async fn check_authorization(
            &self,
            subject: &Subject,
            action_id: &str,
            flags: CheckFlags,
            cancel: &CancellationToken,
        ) -> Result<AuthorizationResult, AuthorityError> {
            self.calls
                .lock()
                .unwrap()
                .push((subject.clone(), action_id.to_string(), flags));
            if let Some(delay) = self.delay {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(AuthorityError::Cancelled),
                }
            }
            self.answer.clone()
        }
    }

    fn caller() -> Caller {
        Caller::Process {
            pid: i32::MAX,
            uid: 1000,
        }
    }

    fn gatekeeper(
        answer: Result<AuthorizationResult, AuthorityError>,
    ) -> Gatekeeper<Arc<MockAuthority>> {
        Gatekeeper::new(Arc::new(MockAuthority::answering(answer)))
    }

    #[test]
    fn test_method_rules() {
        assert_eq!(method_rule("ListDevices"), MethodRule::Allow);
        assert_eq!(method_rule("DeviceByUid"), MethodRule::Allow);
        assert_eq!(
            method_rule("EnrollDevice"),
            MethodRule::Require(Action::Enroll)
        );
        assert_eq!(
            method_rule("Authorize"),
            MethodRule::Require(Action::Authorize)
        );
        assert_eq!(
            method_rule("ForgetDevice"),
            MethodRule::Require(Action::Manage)
        );
        assert_eq!(method_rule("Frobnicate"), MethodRule::Deny);
        assert_eq!(method_rule("listdevices"), MethodRule::Deny);
        assert_eq!(method_rule(""), MethodRule::Deny);
    }

    #[test]
    fn test_action_ids() {
        let gk = gatekeeper(Ok(AuthorizationResult::authorized()));
        assert_eq!(gk.action_id(Action::Enroll), "org.freedesktop.bolt.enroll");
        assert_eq!(
            gk.action_id(Action::Authorize),
            "org.freedesktop.bolt.authorize"
        );
        assert_eq!(gk.action_id(Action::Manage), "org.freedesktop.bolt.manage");

        let gk = gk.with_action_prefix("com.example.tb");
        assert_eq!(gk.action_id(Action::Manage), "com.example.tb.manage");
    }

    #[tokio::test]
    async fn test_read_only_methods_skip_authority() {
        let gk = gatekeeper(Ok(AuthorizationResult::not_authorized()));
        let cancel = CancellationToken::new();

        gk.authorize("ListDevices", &caller(), &cancel).await.unwrap();
        gk.authorize("DeviceByUid", &caller(), &cancel).await.unwrap();
        assert!(gk.authority().calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_method_denied_without_authority() {
        let gk = gatekeeper(Ok(AuthorizationResult::authorized()));

        let err = gk
            .authorize("Frobnicate", &caller(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GatekeeperError::AccessDenied { ref method } if method == "Frobnicate"));
        assert_eq!(
            err.to_string(),
            "Bolt operation 'Frobnicate' not allowed for user"
        );
        assert!(gk.authority().calls().is_empty());
    }

    #[tokio::test]
    async fn test_enroll_granted() {
        let gk = gatekeeper(Ok(AuthorizationResult::authorized()));

        gk.authorize("EnrollDevice", &caller(), &CancellationToken::new())
            .await
            .unwrap();

        let calls = gk.authority().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, "org.freedesktop.bolt.enroll");
        assert!(calls[0].2.allow_user_interaction);
        assert!(matches!(
            calls[0].0,
            Subject::UnixProcess { pid: i32::MAX, uid: 1000, .. }
        ));
    }

    #[tokio::test]
    async fn test_each_mutating_method_asks_its_action() {
        let gk = gatekeeper(Ok(AuthorizationResult::authorized()));
        let cancel = CancellationToken::new();

        gk.authorize("Authorize", &caller(), &cancel).await.unwrap();
        gk.authorize("ForgetDevice", &caller(), &cancel).await.unwrap();

        let actions: Vec<String> = gk.authority().calls().into_iter().map(|c| c.1).collect();
        assert_eq!(
            actions,
            vec!["org.freedesktop.bolt.authorize", "org.freedesktop.bolt.manage"]
        );
    }

    #[tokio::test]
    async fn test_denied_by_authority() {
        let gk = gatekeeper(Ok(AuthorizationResult {
            is_authorized: false,
            is_challenge: true,
        }));

        let err = gk
            .authorize("ForgetDevice", &caller(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Bolt operation 'ForgetDevice' not allowed for user"
        );
        let rpc: RpcError = err.into();
        assert!(rpc.is_denial());
    }

    #[tokio::test]
    async fn test_authority_failure_is_reported() {
        let gk = gatekeeper(Err(AuthorityError::Failed(
            "polkitd not running".to_string(),
        )));

        let err = gk
            .authorize("EnrollDevice", &caller(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Authorization error: polkitd not running");
        assert_eq!(
            RpcError::from(err),
            RpcError::AuthorizationFailed {
                message: "polkitd not running".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_user_interaction_flag() {
        let gk = gatekeeper(Ok(AuthorizationResult::authorized())).with_user_interaction(false);

        gk.authorize("Authorize", &caller(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(!gk.authority().calls()[0].2.allow_user_interaction);
    }

    #[tokio::test]
    async fn test_bus_name_caller() {
        let gk = gatekeeper(Ok(AuthorizationResult::authorized()));

        gk.authorize(
            "EnrollDevice",
            &Caller::BusName(":1.7".to_string()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(
            gk.authority().calls()[0].0,
            Subject::SystemBusName(":1.7".to_string())
        );
    }

    #[tokio::test]
    async fn test_cancelled_while_pending() {
        let mut authority = MockAuthority::answering(Ok(AuthorizationResult::authorized()));
        authority.delay = Some(Duration::from_secs(30));
        let gk = Gatekeeper::new(authority);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = gk
            .authorize("EnrollDevice", &caller(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, GatekeeperError::Cancelled { .. }));
        assert!(matches!(RpcError::from(err), RpcError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_already_cancelled_skips_authority() {
        let gk = gatekeeper(Ok(AuthorizationResult::authorized()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = gk
            .authorize("Authorize", &caller(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, GatekeeperError::Cancelled { .. }));
        assert!(gk.authority().calls().is_empty());
    }

    #[tokio::test]
    async fn test_authorize_method_uses_invocation() {
        let gk = gatekeeper(Ok(AuthorizationResult::not_authorized()));
        let invocation = Invocation::new(
            "/org/freedesktop/bolt",
            "EnrollDevice",
            caller(),
            CancellationToken::new(),
        );

        let err = gk.authorize_method(&invocation).await.unwrap_err();
        assert!(matches!(err, GatekeeperError::AccessDenied { .. }));
        assert_eq!(gk.authority().calls().len(), 1);
    }

    #[test]
    fn test_from_config_missing_helper() {
        let config = AuthConfig {
            pkcheck: "/nonexistent/pkcheck".to_string(),
            ..AuthConfig::default()
        };
        let err = Gatekeeper::from_config(&config).err().unwrap();
        assert!(matches!(err, GatekeeperError::Init(AuthorityError::Unavailable(_))));
    }
}
