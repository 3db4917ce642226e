//! `syndic sync` — whole-catalog synchronization between two instances.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use serde::Deserialize;

use syndic_core::types::InstanceName;
use syndic_sync::{batch, SyncJob};

use super::{instance_client, load_config, parse_params};

#[derive(Debug, Deserialize)]
struct SyncParams {
    source_instance: String,
    target_instance: String,
    target_organization: String,
    #[serde(default)]
    dataset_prefix: String,
    #[serde(default)]
    title_prefix: Option<String>,
    #[serde(default)]
    force: bool,
}

/// Arguments for `syndic sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// JSON object with source_instance, target_instance,
    /// target_organization, dataset_prefix, title_prefix and force.
    pub params: String,

    /// Configuration file (defaults to ~/.syndic/config.yaml).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let params: SyncParams = parse_params(&self.params)?;
        let config = load_config(&self.config)?;

        let source_name = InstanceName::from(params.source_instance);
        let target_name = InstanceName::from(params.target_instance);
        let source = instance_client(&config, &source_name)?;
        let target = instance_client(&config, &target_name)?;
        let http = reqwest::blocking::Client::new();

        let job = SyncJob {
            source_base_url: config.instance(&source_name)?.base_url.clone(),
            target_instance: target_name,
            target_organization: params.target_organization,
            dataset_prefix: params.dataset_prefix,
            title_prefix: params.title_prefix,
            force: params.force,
        };
        let stats = batch::run_job(&source, &target, &http, &config.lock.settings(), &job)?;

        println!("{stats}");
        if !stats.success() {
            bail!("sync finished with {} error(s)", stats.errors);
        }
        Ok(())
    }
}
