//! Policy authority backed by polkit's `pkcheck` helper.
//!
//! Each check runs `pkcheck` once. The exit status carries the verdict:
//!
//! | status | meaning |
//! |---|---|
//! | 0 | authorized |
//! | 1 | not authorized |
//! | 2 | not authorized, authentication would be needed |
//! | 3 | not authorized, the user dismissed the dialog |
//! | other | the check itself failed |

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::authority::{AuthorityError, AuthorizationResult, CheckFlags, PolicyAuthority, Subject};

/// Policy authority client that shells out to `pkcheck`.
#[derive(Debug, Clone)]
pub struct PkcheckAuthority {
    program: PathBuf,
}

impl PkcheckAuthority {
    /// Locates `program` (a bare name is searched in `PATH`).
    ///
    /// Fails with [`AuthorityError::Unavailable`] if it cannot be found or
    /// is not executable.
    pub fn new<S: AsRef<OsStr>>(program: S) -> Result<Self, AuthorityError> {
        let program = program.as_ref();
        which::which(program)
            .map(|program| Self { program })
            .map_err(|e| {
                AuthorityError::Unavailable(format!(
                    "cannot locate {}: {}",
                    program.to_string_lossy(),
                    e
                ))
            })
    }

    /// Path of the resolved helper.
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl PolicyAuthority for PkcheckAuthority {
    async fn check_authorization(
        &self,
        subject: &Subject,
        action_id: &str,
        flags: CheckFlags,
        cancel: &CancellationToken,
    ) -> Result<AuthorizationResult, AuthorityError> {
        let args = command_args(subject, action_id, flags);
        debug!("Running {:?} {:?}", self.program, args);

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AuthorityError::Failed(format!("failed to run {}: {}", self.program.display(), e))
            })?;

        let output = tokio::select! {
            output = child.wait_with_output() => output.map_err(|e| {
                AuthorityError::Failed(format!("failed to wait for pkcheck: {e}"))
            })?,
            _ = cancel.cancelled() => return Err(AuthorityError::Cancelled),
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        interpret_status(output.status.code(), stderr.trim())
    }
}

fn command_args(subject: &Subject, action_id: &str, flags: CheckFlags) -> Vec<String> {
    let mut args = Vec::with_capacity(5);

    match subject {
        Subject::UnixProcess {
            pid,
            start_time,
            uid,
        } => {
            args.push("--process".to_string());
            args.push(format!("{pid},{start_time},{uid}"));
        }
        Subject::SystemBusName(name) => {
            args.push("--system-bus-name".to_string());
            args.push(name.clone());
        }
    }

    args.push("--action-id".to_string());
    args.push(action_id.to_string());

    if flags.allow_user_interaction {
        args.push("--allow-user-interaction".to_string());
    }

    args
}

fn interpret_status(
    code: Option<i32>,
    stderr: &str,
) -> Result<AuthorizationResult, AuthorityError> {
    match code {
        Some(0) => Ok(AuthorizationResult::authorized()),
        Some(1) | Some(3) => Ok(AuthorizationResult::not_authorized()),
        Some(2) => Ok(AuthorizationResult {
            is_authorized: false,
            is_challenge: true,
        }),
        Some(code) if stderr.is_empty() => Err(AuthorityError::Failed(format!(
            "pkcheck exited with status {code}"
        ))),
        Some(_) => Err(AuthorityError::Failed(stderr.to_string())),
        None => Err(AuthorityError::Failed(
            "pkcheck was terminated by a signal".to_string(),
        )),
    }
}
