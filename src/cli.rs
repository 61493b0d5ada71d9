use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::settings::EngineSettings;
use crate::types::{AccessMode, PathLayout, ReclaimCheck, ReclaimPolicy};

/// Storage class name used for `--param` values when a volume names none
pub const CLI_CLASS: &str = "cli";

/// Dynamic hostpath provisioner - allocate and reclaim volume directories
#[derive(Parser, Debug)]
#[command(name = "hostpath-provisioner")]
#[command(about = "Allocates and reclaims shared-filesystem directories backing cluster volumes")]
#[command(version)]
pub struct Cli {
    /// Engine settings file (JSON); flags below override it
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Identity written into the ownership annotation of created volumes
    #[arg(long, global = true)]
    pub identity: Option<String>,

    /// Directory layout beneath the root (flat, namespaced)
    #[arg(long, global = true)]
    pub layout: Option<PathLayout>,

    /// Remove owned volumes regardless of their reclaim policy
    #[arg(long, global = true)]
    pub always_delete: bool,

    /// Trace every call of this instance
    #[arg(long, global = true)]
    pub trace: bool,

    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the directory for a new volume and print its descriptor
    Provision {
        /// Generated volume name
        #[arg(long)]
        name: String,
        /// Claim name, preferred as the directory name
        #[arg(long)]
        claim: Option<String>,
        /// Namespace of the claim
        #[arg(short, long)]
        namespace: Option<String>,
        /// Requested capacity in bytes
        #[arg(long, allow_negative_numbers = true)]
        capacity: i64,
        /// Reclaim policy (Delete, Retain, Recycle)
        #[arg(long, default_value = "Delete")]
        reclaim_policy: ReclaimPolicy,
        /// Access mode; may be repeated (RWO, ROX, RWX, RWOP)
        #[arg(long = "access-mode")]
        access_modes: Vec<AccessMode>,
        /// Storage class the volume belongs to
        #[arg(long)]
        storage_class: Option<String>,
        /// Storage class parameter as key=value; may be repeated
        #[arg(short, long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
    /// Release a volume described by a descriptor JSON file
    Delete {
        /// Path to the volume descriptor printed by `provision`
        #[arg(long)]
        volume: PathBuf,
        /// Parameters of the volume's storage class as key=value
        #[arg(short, long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
    /// Validate storage class parameters
    CheckParams {
        /// Parameter as key=value; may be repeated
        #[arg(short, long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
}

/// Parse a `key=value` pair; the value may itself contain `=`
pub fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got {s:?}")),
    }
}

/// Collect repeated `--param` pairs; later pairs replace earlier ones
pub fn params_map(pairs: &[(String, String)]) -> HashMap<String, String> {
    pairs.iter().cloned().collect()
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Engine settings from `--config` (or defaults) with flag overrides applied
    pub fn settings(&self) -> Result<EngineSettings> {
        let mut settings = match &self.config {
            Some(path) => EngineSettings::load_from_file(path)?,
            None => EngineSettings::default(),
        };

        if let Some(identity) = &self.identity {
            settings.identity = identity.clone();
        }
        if let Some(layout) = self.layout {
            settings.layout = layout;
        }
        if self.always_delete {
            settings.reclaim_check = ReclaimCheck::AlwaysDelete;
        }
        if self.trace {
            settings.trace = true;
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("pvDir=/srv/volumes"),
            Ok(("pvDir".to_string(), "/srv/volumes".to_string()))
        );
        assert_eq!(
            parse_key_val("opt=a=b"),
            Ok(("opt".to_string(), "a=b".to_string()))
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_provision_command() {
        let cli = Cli::try_parse_from([
            "hostpath-provisioner",
            "provision",
            "--name",
            "pvc-1",
            "--capacity",
            "1024",
            "--access-mode",
            "RWX",
            "-p",
            "pvDir=/srv",
            "--reclaim-policy",
            "Retain",
        ])
        .unwrap();

        match cli.command {
            Commands::Provision {
                name,
                capacity,
                access_modes,
                params,
                reclaim_policy,
                ..
            } => {
                assert_eq!(name, "pvc-1");
                assert_eq!(capacity, 1024);
                assert_eq!(access_modes, vec![AccessMode::ReadWriteMany]);
                assert_eq!(reclaim_policy, ReclaimPolicy::Retain);
                assert_eq!(params_map(&params).get("pvDir").map(String::as_str), Some("/srv"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_negative_capacity_reaches_engine() {
        let cli = Cli::try_parse_from([
            "hostpath-provisioner",
            "provision",
            "--name",
            "v",
            "--capacity",
            "-5",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Provision { capacity: -5, .. }));
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = Cli::try_parse_from([
            "hostpath-provisioner",
            "check-params",
            "--identity",
            "node-a",
            "--layout",
            "flat",
            "--always-delete",
        ])
        .unwrap();

        let settings = cli.settings().unwrap();
        assert_eq!(settings.identity, "node-a");
        assert_eq!(settings.layout, PathLayout::Flat);
        assert_eq!(settings.reclaim_check, ReclaimCheck::AlwaysDelete);
        assert!(!settings.trace);
    }
}
