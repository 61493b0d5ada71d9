//! Delete authorization.
//!
//! Several provisioners can share one cluster, and manual volumes can point
//! at the same filesystem. Before anything is removed the guard checks, in
//! order:
//!
//! 1. the ownership marker is present and names this engine,
//! 2. the reclaim policy allows removal (unless configured to always delete),
//! 3. the storage class policy can be fetched and parsed,
//! 4. the stored volume path is absolute, normal and not a top-level directory.
//!
//! Failing 1 or 2 is not an error: someone else is responsible for the
//! volume, so the guard answers [`Decision::Ignore`]. Failing 3 or 4 is
//! [`Decision::Fail`].
//!
//! The stored path is what gets removed. It is not compared against the
//! current class root, which may have changed since the volume was created.

use std::fmt;
use std::path::{Component, Path};
use std::sync::Arc;

use tracing::debug;

use crate::error::DeleteFailure;
use crate::params;
use crate::policy::PolicySource;
use crate::types::{ReclaimCheck, ReclaimPolicy};
use crate::volume::VolumeRecord;

/// Why a delete request was deliberately not acted on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    MissingOwner,
    ForeignOwner { owner: String },
    PolicyRetains { policy: ReclaimPolicy },
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingOwner => write!(f, "identity annotation not found on volume"),
            Self::ForeignOwner { owner } => {
                write!(f, "identity annotation {owner:?} on volume does not match ours")
            }
            Self::PolicyRetains { policy } => {
                write!(f, "reclaim policy {policy} does not allow removal")
            }
        }
    }
}

/// Outcome of an authorization check
#[derive(Debug)]
pub enum Decision {
    Proceed,
    Ignore(IgnoreReason),
    Fail(DeleteFailure),
}

pub struct OwnershipGuard {
    identity: String,
    reclaim_check: ReclaimCheck,
    policies: Arc<dyn PolicySource>,
}

impl fmt::Debug for OwnershipGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnershipGuard")
            .field("identity", &self.identity)
            .field("reclaim_check", &self.reclaim_check)
            .finish_non_exhaustive()
    }
}

impl OwnershipGuard {
    pub fn new(
        identity: impl Into<String>,
        reclaim_check: ReclaimCheck,
        policies: Arc<dyn PolicySource>,
    ) -> Self {
        Self {
            identity: identity.into(),
            reclaim_check,
            policies,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Decide whether this engine may remove the directory of `record`
    pub fn authorize_delete(&self, record: &VolumeRecord) -> Decision {
        match record.owner_id.as_deref() {
            None => return Decision::Ignore(IgnoreReason::MissingOwner),
            Some(owner) if owner != self.identity => {
                return Decision::Ignore(IgnoreReason::ForeignOwner {
                    owner: owner.to_string(),
                });
            }
            Some(_) => {}
        }

        if self.reclaim_check == ReclaimCheck::PolicyAware
            && !record.reclaim_policy.allows_removal()
        {
            return Decision::Ignore(IgnoreReason::PolicyRetains {
                policy: record.reclaim_policy,
            });
        }

        match self.check_removable(record) {
            Ok(()) => Decision::Proceed,
            Err(failure) => Decision::Fail(failure),
        }
    }

    /// Fetch and parse the class policy, then validate the stored path on its own.
    ///
    /// The class root only has to be resolvable. A volume created under an
    /// earlier root is still removed at the path it was created at.
    fn check_removable(&self, record: &VolumeRecord) -> Result<(), DeleteFailure> {
        let class = record
            .storage_class
            .as_deref()
            .ok_or(DeleteFailure::MissingStorageClass)?;

        let parameters =
            self.policies
                .parameters(class)
                .map_err(|source| DeleteFailure::PolicyUnavailable {
                    class: class.to_string(),
                    source,
                })?;
        let config = params::parse(&parameters)?;

        validate_volume_path(&record.on_disk_path).map_err(|reason| {
            DeleteFailure::UnsafePath {
                path: record.on_disk_path.clone(),
                reason,
            }
        })?;

        if !record.on_disk_path.starts_with(&config.root_dir) {
            debug!(
                path = %record.on_disk_path.display(),
                root = %config.root_dir.display(),
                "volume lies outside the current class root, removing stored path"
            );
        }
        Ok(())
    }
}

/// Lexical checks on a stored volume path.
///
/// The path must be absolute, made only of normal components, and sit at
/// least two levels below `/`.
pub fn validate_volume_path(path: &Path) -> Result<(), &'static str> {
    let mut components = path.components();
    if components.next() != Some(Component::RootDir) {
        return Err("path is not absolute");
    }

    let mut depth = 0;
    for component in components {
        match component {
            Component::Normal(_) => depth += 1,
            _ => return Err("path contains `.` or `..`"),
        }
    }
    if depth < 2 {
        return Err("path is too close to the filesystem root");
    }
    Ok(())
}
