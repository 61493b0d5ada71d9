//! Dynamic hostpath provisioner - command line driver
//!
//! Runs single provision / delete calls against the engine. Descriptors are
//! written to stdout as JSON; logs go to stderr.

use std::fs;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{debug, error, info};

use hostpath_provisioner::cli::{CLI_CLASS, Cli, Commands, params_map};
use hostpath_provisioner::{
    DeleteOutcome, InMemoryPolicySource, ProvisionRequest, ProvisioningEngine, VolumeDescriptor,
    VolumeRecord, params, process,
};

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    process::init_logging(cli.verbose);
    process::set_permissive_umask();
    debug!("CLI arguments parsed");

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("✗ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let settings = cli.settings()?;

    match cli.command {
        Commands::Provision {
            name,
            claim,
            namespace,
            capacity,
            reclaim_policy,
            access_modes,
            storage_class,
            params,
        } => {
            let mut request = ProvisionRequest::new(name, capacity).reclaim_policy(reclaim_policy);
            request.claim_name = claim;
            request.namespace = namespace;
            request.storage_class = storage_class;
            request.access_modes = access_modes.into_iter().collect();
            request.parameters = params_map(&params);

            let engine = ProvisioningEngine::new(settings, Arc::new(InMemoryPolicySource::new()))?;
            let volume = engine.provision(&request)?;
            println!("{}", serde_json::to_string_pretty(&volume.descriptor)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Delete { volume, params } => {
            let content = fs::read_to_string(&volume)
                .with_context(|| format!("Failed to read volume descriptor {:?}", volume))?;
            let descriptor: VolumeDescriptor =
                serde_json::from_str(&content).context("Failed to parse volume descriptor")?;

            let mut record = VolumeRecord::from_descriptor(&descriptor);
            let policies = InMemoryPolicySource::new();
            if !params.is_empty() {
                let class = record
                    .storage_class
                    .get_or_insert_with(|| CLI_CLASS.to_string())
                    .clone();
                policies.insert(class, params_map(&params));
            }

            let engine = ProvisioningEngine::new(settings, Arc::new(policies))?;
            let outcome = engine.delete(&record);
            let report = match &outcome {
                DeleteOutcome::Deleted => json!({ "volume": record.name, "outcome": "deleted" }),
                DeleteOutcome::Ignored(reason) => json!({
                    "volume": record.name,
                    "outcome": "ignored",
                    "reason": reason.to_string(),
                }),
                DeleteOutcome::Failed(failure) => json!({
                    "volume": record.name,
                    "outcome": "failed",
                    "reason": failure.to_string(),
                }),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);

            match outcome.into_result() {
                Ok(()) => Ok(ExitCode::SUCCESS),
                Err(e) if e.is_ignored() => Ok(ExitCode::SUCCESS),
                Err(_) => Ok(ExitCode::FAILURE),
            }
        }
        Commands::CheckParams { params: pairs } => match params::parse(&params_map(&pairs)) {
            Ok(config) => {
                info!("Parameters are valid");
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "pvDir": config.root_dir,
                        "enableTrace": config.trace_enabled,
                    }))?
                );
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                eprintln!("✗ Invalid parameters: {}", e);
                Ok(ExitCode::FAILURE)
            }
        },
    }
}
