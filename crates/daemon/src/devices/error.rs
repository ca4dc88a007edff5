//! Error type for store operations.

use std::io;
use std::path::{Path, PathBuf};

use bolt_protocol::RpcError;
use thiserror::Error;

/// Errors surfaced by [`Store`](super::Store) operations.
///
/// The store never retries; every failure is reported to the caller, except
/// the best-effort key write inside `put_device`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists for the uid.
    #[error("no record for '{uid}'")]
    NotFound {
        /// The uid that was looked up.
        uid: String,
    },

    /// A filesystem failure unrelated to existence.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// A record exists but cannot be decoded.
    #[error("failed to parse {}: {message}", path.display())]
    Parse {
        /// The path of the malformed record.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },

    /// A write was attempted with missing or malformed input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Maps `ErrorKind::NotFound` to [`StoreError::NotFound`] and everything
    /// else to [`StoreError::Io`].
    pub(crate) fn from_io(uid: &str, path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound {
                uid: uid.to_string(),
            }
        } else {
            StoreError::io(path, source)
        }
    }

    pub(crate) fn parse(path: &Path, message: impl Into<String>) -> Self {
        StoreError::Parse {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Returns `true` if the record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

impl From<StoreError> for RpcError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { uid } => RpcError::NotFound { uid },
            StoreError::InvalidArgument(message) => RpcError::InvalidArgument { message },
            other => RpcError::Io {
                message: other.to_string(),
            },
        }
    }
}
