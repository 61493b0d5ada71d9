//! Engine modules: the path-allocation and lifecycle-safety core.
//!
//! - `allocator` picks and creates collision-free volume directories
//! - `ownership` decides whether a volume may be removed
//! - `provisioner` composes both into the `provision` / `delete` contract

pub mod allocator;
pub mod ownership;
pub mod provisioner;
