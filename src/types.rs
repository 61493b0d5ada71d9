//! Type-safe enums shared by the provisioning engine
//!
//! String forms follow the cluster API spelling (`Delete`, `ReadWriteOnce`)
//! so descriptors round-trip through JSON unchanged.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// What happens to the backing directory when its volume is released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum ReclaimPolicy {
    #[default]
    Delete,
    Retain,
    /// Legacy policy; never removed by this engine
    Recycle,
}

impl ReclaimPolicy {
    /// Returns true if the policy allows the directory to be removed
    pub const fn allows_removal(self) -> bool {
        matches!(self, Self::Delete)
    }
}

/// Requested access mode for a volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum AccessMode {
    #[strum(to_string = "ReadWriteOnce", serialize = "RWO")]
    ReadWriteOnce,
    #[strum(to_string = "ReadOnlyMany", serialize = "ROX")]
    ReadOnlyMany,
    #[strum(to_string = "ReadWriteMany", serialize = "RWX")]
    ReadWriteMany,
    #[strum(to_string = "ReadWriteOncePod", serialize = "RWOP")]
    ReadWriteOncePod,
}

/// How volume directories are laid out beneath the root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PathLayout {
    /// `<root>/<name>`
    Flat,
    /// `<root>/<namespace>/<name>`
    #[default]
    Namespaced,
}

impl PathLayout {
    /// Number of trailing path components the engine creates under the root
    pub const fn created_depth(self) -> usize {
        match self {
            Self::Flat => 1,
            Self::Namespaced => 2,
        }
    }
}

/// Whether deletion consults the volume's reclaim policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ReclaimCheck {
    /// Remove every owned volume regardless of its policy
    AlwaysDelete,
    /// Only remove owned volumes whose policy is `Delete`
    #[default]
    PolicyAware,
}
