//! Process-wide setup for the provisioner binary
//!
//! Only the binary calls into this module. The library never changes
//! process state on its own.

use nix::sys::stat::{Mode, umask};
use tracing_subscriber::EnvFilter;

/// Clear the file-creation mask so volume directories come out 0777.
///
/// Consumers on other nodes may map to different users and groups, so the
/// shared directories must be group- and other-writable whatever umask the
/// process inherited. Returns the previous mask.
pub fn set_permissive_umask() -> Mode {
    let previous = umask(Mode::empty());
    tracing::debug!("umask cleared (was {:o})", previous.bits());
    previous
}

/// Initialize logging to stderr.
///
/// `RUST_LOG` overrides the default level (`info`, or `debug` when verbose).
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // try_init: a second call (tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_umask_is_cleared_and_restorable() {
        let previous = set_permissive_umask();
        let current = umask(previous);
        assert!(current.is_empty());
    }

    #[test]
    fn test_init_logging_twice_does_not_panic() {
        init_logging(false);
        init_logging(true);
    }
}
