//! Error surface returned to RPC callers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a remote method invocation, as seen by the caller.
///
/// Every variant renders a human-readable message. Denials always name the
/// method; authority failures keep the underlying error text so operators
/// can tell "you may not do this" apart from "authorization is broken".
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RpcError {
    /// The policy authority refused the call, or the method is not allowed.
    #[error("Bolt operation '{method}' not allowed for user")]
    AccessDenied {
        /// Name of the refused method.
        method: String,
    },

    /// The policy authority could not be queried.
    #[error("Authorization error: {message}")]
    AuthorizationFailed {
        /// Underlying error text.
        message: String,
    },

    /// The authorization check was cancelled before it completed.
    #[error("authorization of '{method}' was cancelled")]
    Cancelled {
        /// Name of the method being authorized.
        method: String,
    },

    /// No device with the given uid is known.
    #[error("device '{uid}' not found")]
    NotFound {
        /// The unknown uid.
        uid: String,
    },

    /// A filesystem or other I/O failure.
    #[error("I/O error: {message}")]
    Io {
        /// Underlying error text.
        message: String,
    },

    /// The request carried an invalid argument.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },
}

impl RpcError {
    /// Shorthand for an access-denied error.
    pub fn access_denied(method: impl Into<String>) -> Self {
        RpcError::AccessDenied {
            method: method.into(),
        }
    }

    /// Returns `true` for denials, as opposed to failures of the machinery.
    pub fn is_denial(&self) -> bool {
        matches!(self, RpcError::AccessDenied { .. })
    }
}

/// Result type alias for RPC operations.
pub type Result<T> = std::result::Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_denied_names_method() {
        let err = RpcError::access_denied("EnrollDevice");
        assert_eq!(
            err.to_string(),
            "Bolt operation 'EnrollDevice' not allowed for user"
        );
        assert!(err.is_denial());
    }

    #[test]
    fn test_authorization_failed_keeps_message() {
        let err = RpcError::AuthorizationFailed {
            message: "polkitd is not running".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Authorization error: polkitd is not running"
        );
        assert!(!err.is_denial());
    }

    #[test]
    fn test_error_serialization_is_tagged() {
        let err = RpcError::NotFound {
            uid: "0001".to_string(),
        };
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"kind\":\"not_found\""));
        assert!(json.contains("0001"));

        let restored: RpcError = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, err);
    }
}
