//! Authorization of privileged operations.
//!
//! The [`Gatekeeper`] decides per method whether a caller may proceed. It
//! asks a [`PolicyAuthority`] for the mutating methods; the production
//! authority is [`PkcheckAuthority`].

pub mod authority;
pub mod gatekeeper;
pub mod pkcheck;

pub use authority::{AuthorityError, AuthorizationResult, CheckFlags, PolicyAuthority, Subject};
pub use gatekeeper::{
    method_rule, Action, Gatekeeper, GatekeeperError, MethodRule, DEFAULT_ACTION_PREFIX,
};
pub use pkcheck::PkcheckAuthority;
