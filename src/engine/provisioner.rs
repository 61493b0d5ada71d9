//! Provisioning engine
//!
//! Composes parameter parsing, path allocation and the ownership guard into
//! the two calls the controller makes: [`ProvisioningEngine::provision`] and
//! [`ProvisioningEngine::delete`].
//!
//! The engine keeps no per-volume state. The controller persists the returned
//! record and hands it back on release, and the path to remove is always the
//! one stored in that record.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn};

use crate::engine::allocator;
use crate::engine::ownership::{Decision, IgnoreReason, OwnershipGuard};
use crate::error::{DeleteFailure, ProvisionError, ProvisionerError};
use crate::params;
use crate::policy::PolicySource;
use crate::settings::EngineSettings;
use crate::types::PathLayout;
use crate::volume::{
    OWNER_ANNOTATION, ProvisionRequest, ProvisionedVolume, VolumeDescriptor, VolumePhase,
    VolumeRecord,
};

/// Result of a `delete` call
#[derive(Debug)]
pub enum DeleteOutcome {
    Deleted,
    /// Deliberate no-op; report success to the user
    Ignored(IgnoreReason),
    /// Nothing was removed; the controller should retry
    Failed(DeleteFailure),
}

impl DeleteOutcome {
    /// Terminal lifecycle phase reached, if any
    pub fn phase(&self) -> Option<VolumePhase> {
        match self {
            Self::Deleted => Some(VolumePhase::Deleted),
            Self::Ignored(IgnoreReason::PolicyRetains { .. }) => Some(VolumePhase::Retained),
            Self::Ignored(_) => Some(VolumePhase::Ignored),
            Self::Failed(_) => None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored(_))
    }

    /// Controller-facing form: ignored deletes become [`ProvisionerError::Ignored`]
    pub fn into_result(self) -> crate::error::Result<()> {
        match self {
            Self::Deleted => Ok(()),
            Self::Ignored(reason) => Err(ProvisionerError::Ignored { reason }),
            Self::Failed(failure) => Err(failure.into()),
        }
    }
}

#[derive(Debug)]
pub struct ProvisioningEngine {
    settings: EngineSettings,
    guard: OwnershipGuard,
}

impl ProvisioningEngine {
    /// Create an engine. The identity in `settings` is fixed for its lifetime.
    pub fn new(
        settings: EngineSettings,
        policies: Arc<dyn PolicySource>,
    ) -> crate::error::Result<Self> {
        settings.validate()?;
        let guard = OwnershipGuard::new(settings.identity.clone(), settings.reclaim_check, policies);
        Ok(Self { settings, guard })
    }

    pub fn identity(&self) -> &str {
        self.guard.identity()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Create the backing directory for a new volume.
    ///
    /// On failure after the namespace directory was created, that directory
    /// is left in place for later allocations.
    pub fn provision(&self, request: &ProvisionRequest) -> Result<ProvisionedVolume, ProvisionError> {
        let span = info_span!("provision", volume = %request.volume_name);
        let _enter = span.enter();

        if request.capacity_bytes <= 0 {
            warn!(capacity = request.capacity_bytes, "rejecting volume with invalid capacity");
            return Err(ProvisionError::InvalidCapacity(request.capacity_bytes));
        }

        let config = params::parse(&request.parameters).inspect_err(|e| {
            error!("failed to parse storage class parameters: {}", e);
        })?;
        let trace = self.settings.trace || config.trace_enabled;

        let namespace = match self.settings.layout {
            PathLayout::Flat => None,
            PathLayout::Namespaced => Some(request.namespace_or_default()),
        };
        let preferred = request.preferred_name();
        if trace {
            debug!(
                phase = %VolumePhase::Requested,
                root = %config.root_dir.display(),
                namespace = ?namespace,
                preferred,
                "allocating volume directory"
            );
        }

        let path = allocator::allocate(&config.root_dir, namespace, preferred).map_err(|e| {
            error!("failed to allocate directory for {}: {}", request.volume_name, e);
            ProvisionError::from(e)
        })?;
        // allocation creates the directory, so both steps complete together
        let phase = advance(trace, VolumePhase::Requested, VolumePhase::Allocated);
        advance(trace, phase, VolumePhase::Created);
        if trace {
            debug!(path = %path.display(), "directory created");
        }

        let record = VolumeRecord {
            name: request.volume_name.clone(),
            on_disk_path: path.clone(),
            owner_id: Some(self.identity().to_string()),
            reclaim_policy: request.reclaim_policy,
            capacity_bytes: request.capacity_bytes,
            storage_class: request.storage_class.clone(),
        };
        let descriptor = VolumeDescriptor {
            name: request.volume_name.clone(),
            annotations: BTreeMap::from([(OWNER_ANNOTATION.to_string(), self.identity().to_string())]),
            reclaim_policy: request.reclaim_policy,
            access_modes: request.access_modes.clone(),
            capacity_bytes: request.capacity_bytes,
            host_path: path,
            storage_class: request.storage_class.clone(),
        };

        info!(
            "successfully created hostpath volume {} ({})",
            record.name,
            record.on_disk_path.display()
        );
        Ok(ProvisionedVolume { record, descriptor })
    }

    /// Release a volume, removing its directory if this engine may.
    pub fn delete(&self, record: &VolumeRecord) -> DeleteOutcome {
        let span = info_span!("delete", volume = %record.name);
        let _enter = span.enter();

        let trace = self.settings.trace;
        advance(trace, VolumePhase::Active, VolumePhase::DeletionRequested);
        if trace {
            debug!(
                path = %record.on_disk_path.display(),
                owner = ?record.owner_id,
                policy = %record.reclaim_policy,
                "authorizing delete"
            );
        }

        let outcome = match self.guard.authorize_delete(record) {
            Decision::Ignore(reason) => {
                info!("not removing volume {}: {}", record.name, reason);
                DeleteOutcome::Ignored(reason)
            }
            Decision::Fail(failure) => {
                error!("not removing volume {}: {}", record.name, failure);
                DeleteOutcome::Failed(failure)
            }
            Decision::Proceed => self.remove(record),
        };
        if let Some(phase) = outcome.phase() {
            advance(trace, VolumePhase::DeletionRequested, phase);
        }
        outcome
    }

    /// Refuse to remove through a symbolic link in the part of the path the
    /// engine created (the leaf, and the namespace directory when namespaced).
    fn check_no_symlinks(&self, path: &Path) -> Result<(), DeleteFailure> {
        for ancestor in path.ancestors().take(self.settings.layout.created_depth()) {
            match fs::symlink_metadata(ancestor) {
                Ok(meta) if meta.file_type().is_symlink() => {
                    return Err(DeleteFailure::UnsafePath {
                        path: ancestor.to_path_buf(),
                        reason: "path goes through a symbolic link",
                    });
                }
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(DeleteFailure::RemoveFailed {
                        path: ancestor.to_path_buf(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    fn remove(&self, record: &VolumeRecord) -> DeleteOutcome {
        let path = &record.on_disk_path;
        if let Err(failure) = self.check_no_symlinks(path) {
            error!("not removing volume {}: {}", record.name, failure);
            return DeleteOutcome::Failed(failure);
        }
        match fs::remove_dir_all(path) {
            Ok(()) => {
                info!("removed volume {} ({})", record.name, path.display());
                DeleteOutcome::Deleted
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("volume {} directory {} was already gone", record.name, path.display());
                DeleteOutcome::Deleted
            }
            Err(source) => {
                error!("failed to remove volume {} ({}): {}", record.name, path.display(), source);
                DeleteOutcome::Failed(DeleteFailure::RemoveFailed {
                    path: path.clone(),
                    source,
                })
            }
        }
    }
}

/// Step a volume to its next lifecycle phase, logging it when traced
fn advance(trace: bool, from: VolumePhase, to: VolumePhase) -> VolumePhase {
    debug_assert!(from.can_transition_to(to), "illegal phase change {from} -> {to}");
    if trace {
        debug!(from = %from, to = %to, "volume phase changed");
    }
    to
}
