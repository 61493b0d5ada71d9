//! Volume model
//!
//! - [`ProvisionRequest`]: what the controller asks for
//! - [`VolumeRecord`]: what the engine needs back to release a volume
//! - [`VolumeDescriptor`]: the cluster-visible volume object
//! - [`VolumePhase`]: where a volume is in its lifecycle
//!
//! # Lifecycle
//!
//! ```text
//! Requested
//!     ↓
//! Allocated
//!     ↓
//! Created
//!     ↓
//! Active
//!     ↓
//! DeletionRequested
//!     ↓
//! Deleted | Retained | Ignored
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::{AccessMode, ReclaimPolicy};

/// Name this provisioner registers under
pub const PROVISIONER_NAME: &str = "dynamic-hostpath-provisioner";

/// Annotation carrying the identity of the engine that created a volume
pub const OWNER_ANNOTATION: &str = "dynamic-hostpath-provisioner/provisioner-id";

/// Namespace directory used when a request has none
pub const DEFAULT_NAMESPACE: &str = "_";

/// A request for a new volume. Immutable once handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    /// Volume name generated by the controller
    pub volume_name: String,
    /// Name of the claim; preferred as the directory name when present
    pub claim_name: Option<String>,
    pub namespace: Option<String>,
    pub capacity_bytes: i64,
    pub reclaim_policy: ReclaimPolicy,
    pub access_modes: BTreeSet<AccessMode>,
    pub storage_class: Option<String>,
    /// Parameters of the storage class, as fetched by the controller
    pub parameters: HashMap<String, String>,
}

impl ProvisionRequest {
    pub fn new(volume_name: impl Into<String>, capacity_bytes: i64) -> Self {
        Self {
            volume_name: volume_name.into(),
            claim_name: None,
            namespace: None,
            capacity_bytes,
            reclaim_policy: ReclaimPolicy::default(),
            access_modes: BTreeSet::new(),
            storage_class: None,
            parameters: HashMap::new(),
        }
    }

    #[must_use]
    pub fn claim(mut self, name: impl Into<String>) -> Self {
        self.claim_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn reclaim_policy(mut self, policy: ReclaimPolicy) -> Self {
        self.reclaim_policy = policy;
        self
    }

    #[must_use]
    pub fn access_mode(mut self, mode: AccessMode) -> Self {
        self.access_modes.insert(mode);
        self
    }

    #[must_use]
    pub fn storage_class(mut self, class: impl Into<String>) -> Self {
        self.storage_class = Some(class.into());
        self
    }

    #[must_use]
    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Directory name to try first: the claim name, else the volume name
    pub fn preferred_name(&self) -> &str {
        match self.claim_name.as_deref() {
            Some(claim) if !claim.is_empty() => claim,
            _ => &self.volume_name,
        }
    }

    /// Namespace directory, falling back to [`DEFAULT_NAMESPACE`]
    pub fn namespace_or_default(&self) -> &str {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => ns,
            _ => DEFAULT_NAMESPACE,
        }
    }
}

/// What the engine needs to know about a volume in order to release it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRecord {
    pub name: String,
    pub on_disk_path: PathBuf,
    /// Identity of the creating engine; `None` when the marker is absent
    pub owner_id: Option<String>,
    pub reclaim_policy: ReclaimPolicy,
    pub capacity_bytes: i64,
    #[serde(default)]
    pub storage_class: Option<String>,
}

impl VolumeRecord {
    /// Rebuild a record from a persisted cluster volume object
    pub fn from_descriptor(descriptor: &VolumeDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            on_disk_path: descriptor.host_path.clone(),
            owner_id: descriptor.owner().map(str::to_string),
            reclaim_policy: descriptor.reclaim_policy,
            capacity_bytes: descriptor.capacity_bytes,
            storage_class: descriptor.storage_class.clone(),
        }
    }
}

/// The volume object the controller publishes to the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeDescriptor {
    pub name: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    pub reclaim_policy: ReclaimPolicy,
    #[serde(default)]
    pub access_modes: BTreeSet<AccessMode>,
    pub capacity_bytes: i64,
    pub host_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

impl VolumeDescriptor {
    /// Value of the ownership annotation, if any
    pub fn owner(&self) -> Option<&str> {
        self.annotations.get(OWNER_ANNOTATION).map(String::as_str)
    }
}

/// A freshly provisioned volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedVolume {
    pub record: VolumeRecord,
    pub descriptor: VolumeDescriptor,
}

impl ProvisionedVolume {
    /// Absolute on-disk path of the volume directory
    pub fn path(&self) -> &Path {
        &self.record.on_disk_path
    }
}

/// Lifecycle phase of a single volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumePhase {
    Requested,
    /// A free path was chosen and reserved
    Allocated,
    /// The backing directory exists
    Created,
    /// Published by the controller and in use
    Active,
    DeletionRequested,
    Deleted,
    /// Kept on disk because of its reclaim policy
    Retained,
    /// Not ours to delete
    Ignored,
}

impl VolumePhase {
    /// Returns true for the three outcomes of a deletion
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Deleted | Self::Retained | Self::Ignored)
    }

    /// Returns true if `next` directly follows `self`
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Requested, Self::Allocated)
                | (Self::Allocated, Self::Created)
                | (Self::Created, Self::Active)
                | (Self::Active, Self::DeletionRequested)
                | (Self::DeletionRequested, Self::Deleted)
                | (Self::DeletionRequested, Self::Retained)
                | (Self::DeletionRequested, Self::Ignored)
        )
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Allocated => "path allocated",
            Self::Created => "directory created",
            Self::Active => "active",
            Self::DeletionRequested => "deletion requested",
            Self::Deleted => "deleted",
            Self::Retained => "retained",
            Self::Ignored => "ignored",
        }
    }
}

impl fmt::Display for VolumePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}
