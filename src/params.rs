//! Storage class parameter parsing.
//!
//! Parameters arrive as an opaque string map from the cluster. The accepted
//! set is closed: anything other than [`PV_DIR`] and [`ENABLE_TRACE`] is
//! rejected rather than ignored, so a typo in a storage class fails loudly on
//! the first request.

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

/// Root directory under which volume directories are created
pub const PV_DIR: &str = "pvDir";

/// Turns on per-call tracing for volumes of this class
pub const ENABLE_TRACE: &str = "enableTrace";

/// Validated engine configuration for one storage class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub root_dir: PathBuf,
    pub trace_enabled: bool,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid option {key:?}")]
    InvalidOption { key: String },

    #[error("option {key:?} is given more than once")]
    DuplicateOption { key: String },

    #[error("missing required option {option}")]
    MissingRequiredOption { option: &'static str },

    #[error("invalid value {value:?} for {option}: {reason}")]
    InvalidValue {
        option: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Known {
    PvDir,
    EnableTrace,
}

/// Map a supplied key to its option, ignoring ASCII case
fn canonical(key: &str) -> Option<Known> {
    if key.eq_ignore_ascii_case(PV_DIR) {
        Some(Known::PvDir)
    } else if key.eq_ignore_ascii_case(ENABLE_TRACE) {
        Some(Known::EnableTrace)
    } else {
        None
    }
}

/// Parse storage class parameters into an [`EngineConfig`].
///
/// Unknown keys are checked across the whole map before anything else, so
/// they are reported even when the rest of the map is also invalid.
pub fn parse(parameters: &HashMap<String, String>) -> Result<EngineConfig, ParseError> {
    let mut entries: Vec<(&String, &String)> = parameters.iter().collect();
    entries.sort();

    let resolved = entries
        .into_iter()
        .map(|(key, value)| match canonical(key) {
            Some(option) => Ok((option, key, value)),
            None => Err(ParseError::InvalidOption { key: key.clone() }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen: Vec<Known> = Vec::with_capacity(resolved.len());
    let mut root_dir = String::new();
    let mut trace_enabled = false;

    for (option, key, value) in resolved {
        if seen.contains(&option) {
            return Err(ParseError::DuplicateOption { key: key.clone() });
        }
        seen.push(option);

        match option {
            Known::PvDir => root_dir = value.trim().to_string(),
            Known::EnableTrace => trace_enabled = value == "true",
        }
    }

    if root_dir.is_empty() {
        return Err(ParseError::MissingRequiredOption { option: PV_DIR });
    }

    let root_dir = PathBuf::from(root_dir);
    if !root_dir.is_absolute() {
        return Err(ParseError::InvalidValue {
            option: PV_DIR,
            value: root_dir.display().to_string(),
            reason: "must be an absolute path",
        });
    }

    Ok(EngineConfig {
        root_dir,
        trace_enabled,
    })
}
