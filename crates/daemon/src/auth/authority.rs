//! Client interface to the system policy authority.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// The party whose authorization is being checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// A local process. `start_time` guards against pid reuse; `0` lets the
    /// authority look it up itself.
    UnixProcess {
        /// Process id.
        pid: i32,
        /// Process start time in clock ticks since boot.
        start_time: u64,
        /// User id the process runs as.
        uid: u32,
    },
    /// A unique name on the system message bus.
    SystemBusName(String),
}

impl Subject {
    /// Builds a process subject, reading the start time from procfs.
    pub fn unix_process(pid: i32, uid: u32) -> Self {
        Subject::UnixProcess {
            pid,
            start_time: process_start_time(pid).unwrap_or(0),
            uid,
        }
    }
}

/// Options for an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckFlags {
    /// Allow the authority to interact with the user, e.g. prompt for a
    /// password. The check may then take human-scale time.
    pub allow_user_interaction: bool,
}

/// Verdict of the policy authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationResult {
    /// Whether the subject may perform the action.
    pub is_authorized: bool,
    /// Whether the subject could be authorized after authenticating.
    pub is_challenge: bool,
}

impl AuthorizationResult {
    /// An affirmative verdict.
    pub fn authorized() -> Self {
        Self {
            is_authorized: true,
            is_challenge: false,
        }
    }

    /// A negative verdict.
    pub fn not_authorized() -> Self {
        Self {
            is_authorized: false,
            is_challenge: false,
        }
    }
}

/// Failures talking to the policy authority.
///
/// These are distinct from a negative verdict: they mean the question could
/// not be answered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorityError {
    /// The authority cannot be reached at all.
    #[error("policy authority unavailable: {0}")]
    Unavailable(String),

    /// A single check failed.
    #[error("{0}")]
    Failed(String),

    /// The check was cancelled before a verdict arrived.
    #[error("authorization check cancelled")]
    Cancelled,
}

/// Answers "may subject S perform action A?".
pub trait PolicyAuthority: Send + Sync {
    /// Checks whether `subject` is authorized for `action_id`.
    ///
    /// Implementations must return [`AuthorityError::Cancelled`] promptly
    /// once `cancel` fires.
    fn check_authorization(
        &self,
        subject: &Subject,
        action_id: &str,
        flags: CheckFlags,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<AuthorizationResult, AuthorityError>> + Send;
}

impl<A: PolicyAuthority> PolicyAuthority for Arc<A> {
    fn check_authorization(
        &self,
        subject: &Subject,
        action_id: &str,
        flags: CheckFlags,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<AuthorizationResult, AuthorityError>> + Send {
        (**self).check_authorization(subject, action_id, flags, cancel)
    }
}

/// Reads the start time of `pid` from `/proc/<pid>/stat`.
fn process_start_time(pid: i32) -> Option<u64> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    parse_start_time(&stat)
}

/// Extracts field 22 (`starttime`) of a procfs stat line.
///
/// The command name in field 2 may contain spaces and parentheses, so
/// parsing starts after the last `)`.
fn parse_start_time(stat: &str) -> Option<u64> {
    let rest = &stat[stat.rfind(')')? + 1..];
    rest.split_whitespace().nth(19)?.parse().ok()
}
