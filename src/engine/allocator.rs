//! Path allocation
//!
//! Picks a free directory name for a new volume and creates it in one step.
//!
//! # Naming
//!
//! | Attempt | Directory                       |
//! |---------|---------------------------------|
//! | 1       | `<root>/<namespace>/<name>`     |
//! | 2       | `<root>/<namespace>/<name>-01`  |
//! | ...     | ...                             |
//! | 100     | `<root>/<namespace>/<name>-99`  |
//!
//! Each attempt is a single exclusive `mkdir`, so the existence check and the
//! creation cannot be separated by another allocator. When every name is
//! taken the call fails with [`AllocationError::NamesExhausted`].

use std::fs::DirBuilder;
use std::io::ErrorKind;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Highest numeric suffix tried before giving up
pub const MAX_SUFFIX: u32 = 99;

/// Mode for every directory the engine creates (subject to the umask)
pub const DIR_MODE: u32 = 0o777;

#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("failed to create directory {}: {source}", .path.display())]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("all names derived from {} are taken", .base.display())]
    NamesExhausted { base: PathBuf },

    #[error("invalid directory name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
}

/// Check that `name` is exactly one normal path component
pub fn validate_component(name: &str) -> Result<(), AllocationError> {
    let invalid = |reason| AllocationError::InvalidName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(invalid("must be a single path component"));
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid("must not be `.` or `..`")),
    }
}

/// Directory names tried for `preferred`, in order
pub fn candidate_names(preferred: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(preferred.to_string())
        .chain((1..=MAX_SUFFIX).map(move |n| format!("{preferred}-{n:02}")))
}

/// Create `path` and any missing ancestors. Existing directories are left as they are.
pub fn ensure_dir(path: &Path) -> Result<(), AllocationError> {
    DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(path)
        .map_err(|source| AllocationError::DirectoryCreateFailed {
            path: path.to_path_buf(),
            source,
        })
}

/// Allocate and create a fresh volume directory.
///
/// `namespace` of `None` places the volume directly under `root_dir`.
/// The returned path exists and was created by this call.
pub fn allocate(
    root_dir: &Path,
    namespace: Option<&str>,
    preferred_name: &str,
) -> Result<PathBuf, AllocationError> {
    validate_component(preferred_name)?;

    let ns_path = match namespace {
        Some(ns) => {
            validate_component(ns)?;
            root_dir.join(ns)
        }
        None => root_dir.to_path_buf(),
    };
    ensure_dir(&ns_path)?;

    let mut builder = DirBuilder::new();
    builder.mode(DIR_MODE);

    for name in candidate_names(preferred_name) {
        let candidate = ns_path.join(&name);
        match builder.create(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %candidate.display(), "name taken, trying next suffix");
            }
            Err(source) => {
                return Err(AllocationError::DirectoryCreateFailed {
                    path: candidate,
                    source,
                });
            }
        }
    }

    Err(AllocationError::NamesExhausted {
        base: ns_path.join(preferred_name),
    })
}
