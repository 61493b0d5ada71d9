//! Dynamic hostpath provisioner library
//!
//! Allocates and reclaims directories on a shared filesystem that back
//! dynamically provisioned cluster volumes. The reconciliation controller
//! that calls into this crate lives elsewhere; this crate owns naming,
//! directory creation, and the guarded deletion protocol.

pub mod cli;
pub mod engine;
pub mod error;
pub mod params;
pub mod policy;
pub mod process;
pub mod settings;
pub mod types;
pub mod volume;

// Re-export main types for convenience
pub use engine::allocator::{AllocationError, allocate};
pub use engine::ownership::{Decision, IgnoreReason, OwnershipGuard};
pub use engine::provisioner::{DeleteOutcome, ProvisioningEngine};
pub use error::{DeleteFailure, ProvisionError, ProvisionerError};
pub use params::{EngineConfig, ParseError};
pub use policy::{InMemoryPolicySource, PolicyLookupError, PolicySource};
pub use settings::EngineSettings;
pub use types::{AccessMode, PathLayout, ReclaimCheck, ReclaimPolicy};
pub use volume::{
    OWNER_ANNOTATION, ProvisionRequest, ProvisionedVolume, VolumeDescriptor, VolumePhase,
    VolumeRecord,
};
