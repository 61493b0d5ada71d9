//! Error handling module for the provisioner
//!
//! Component-level errors (`ParseError`, `AllocationError`, `PolicyLookupError`)
//! live next to the code that raises them. This module holds the per-call
//! errors of the engine and the umbrella type handed to the controller.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::engine::allocator::AllocationError;
use crate::engine::ownership::IgnoreReason;
use crate::params::ParseError;
use crate::policy::PolicyLookupError;

/// Why a `provision` call failed. Fatal to the call, never to the process.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("invalid capacity {0}: must be greater than zero")]
    InvalidCapacity(i64),

    #[error("bad storage class parameters: {0}")]
    BadConfig(#[from] ParseError),

    #[error("failed to create directory {}: {source}", .path.display())]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no free directory name left for {}", .base.display())]
    NamesExhausted { base: PathBuf },

    #[error("invalid directory name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
}

impl From<AllocationError> for ProvisionError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::DirectoryCreateFailed { path, source } => {
                Self::DirectoryCreateFailed { path, source }
            }
            AllocationError::NamesExhausted { base } => Self::NamesExhausted { base },
            AllocationError::InvalidName { name, reason } => Self::InvalidName { name, reason },
        }
    }
}

/// Why a `delete` call could not complete. The caller should retry later.
#[derive(Error, Debug)]
pub enum DeleteFailure {
    #[error("volume has no storage class to resolve its root directory")]
    MissingStorageClass,

    #[error("failed to fetch policy for storage class {class:?}: {source}")]
    PolicyUnavailable {
        class: String,
        #[source]
        source: PolicyLookupError,
    },

    #[error("bad storage class parameters: {0}")]
    BadConfig(#[from] ParseError),

    #[error("refusing to remove {}: {reason}", .path.display())]
    UnsafePath { path: PathBuf, reason: &'static str },

    #[error("failed to remove {}: {source}", .path.display())]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Main error type returned across the controller boundary
#[derive(Error, Debug)]
pub enum ProvisionerError {
    #[error("provision failed: {0}")]
    Provision(#[from] ProvisionError),

    #[error("delete failed: {0}")]
    Delete(#[from] DeleteFailure),

    /// Deliberate no-op. Not a failure; the controller must not retry it.
    #[error("ignored: {reason}")]
    Ignored { reason: IgnoreReason },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for provisioner operations
pub type Result<T> = std::result::Result<T, ProvisionerError>;

impl ProvisionerError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns true for the deliberate no-op signal
    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored { .. })
    }

    /// Returns true if a later attempt of the same call may succeed.
    ///
    /// Filesystem and policy lookup failures are transient; bad requests and
    /// ignored deletes are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provision(ProvisionError::DirectoryCreateFailed { .. })
            | Self::Provision(ProvisionError::NamesExhausted { .. })
            | Self::Delete(_)
            | Self::Io(_) => true,
            Self::Provision(_) | Self::Ignored { .. } | Self::Config(_) | Self::Json(_) => false,
        }
    }
}
