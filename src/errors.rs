//! Error taxonomy shared by every storage component
//!
//! Components return `anyhow::Result` and attach context as they go, but the
//! root cause of a failure is always one of the variants below so callers can
//! tell the categories apart with `anyhow::Error::downcast_ref::<Error>()`.
//! None of them is recovered from: each one aborts the running command.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The control directory does not exist
    #[error("not a kit repository: no .git directory at {path}")]
    NotInitialized { path: PathBuf },

    #[error("object {oid} not found")]
    ObjectNotFound { oid: String },

    /// The object file exists but cannot be decoded (truncated write, bad header, ...)
    #[error("malformed object {oid}: {reason}")]
    MalformedObject { oid: String, reason: String },

    #[error("corrupt index file: {reason}")]
    CorruptIndex { reason: String },

    #[error("unable to resolve reference '{name}'")]
    UnresolvableRef { name: String },

    #[error("pathspec '{pathspec}' did not match any files")]
    InvalidPathspec { pathspec: String },

    #[error("network failure while talking to {url}: {reason}")]
    NetworkFailure { url: String, reason: String },

    #[error("protocol error: {reason}")]
    ProtocolError { reason: String },
}

impl Error {
    pub fn not_initialized(path: impl Into<PathBuf>) -> Self {
        Error::NotInitialized { path: path.into() }
    }

    pub fn object_not_found(oid: impl Into<String>) -> Self {
        Error::ObjectNotFound { oid: oid.into() }
    }

    pub fn malformed_object(oid: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedObject {
            oid: oid.into(),
            reason: reason.into(),
        }
    }

    pub fn corrupt_index(reason: impl Into<String>) -> Self {
        Error::CorruptIndex {
            reason: reason.into(),
        }
    }

    pub fn unresolvable_ref(name: impl Into<String>) -> Self {
        Error::UnresolvableRef { name: name.into() }
    }

    pub fn invalid_pathspec(pathspec: impl Into<String>) -> Self {
        Error::InvalidPathspec {
            pathspec: pathspec.into(),
        }
    }

    pub fn network_failure(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::NetworkFailure {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn protocol_error(reason: impl Into<String>) -> Self {
        Error::ProtocolError {
            reason: reason.into(),
        }
    }
}
